use crate::interface::PortId;

/// Failures of the subsystem outside per-packet validation.
///
/// Configuration variants are setup-time errors and should stop initialization; the rest are
/// local to one request and leave the owning core serving other traffic.
#[derive(Debug, thiserror::Error)]
pub enum LlsError {
    #[error("{family} cache key width is {configured} bytes, but addresses are {expected} bytes")]
    KeyWidthMismatch {
        family: &'static str,
        expected: usize,
        configured: usize,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("{0} cache is full and every entry is held")]
    CacheFull(&'static str),
    #[error("modification channel is full")]
    ChannelFull,
    #[error("modification channel is disconnected")]
    ChannelDisconnected,
    #[error("{family} is not configured on interface {iface}")]
    FamilyNotConfigured { family: &'static str, iface: String },
}

/// Why an inbound protocol packet was discarded. Drops never touch the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DropReason {
    #[error("packet is {len} bytes, at least {min} expected")]
    TooShort { len: usize, min: usize },
    #[error("link-layer header does not match the interface")]
    L2Mismatch,
    #[error("protocol header fields do not match the address family")]
    HeaderMismatch,
    #[error("bad checksum")]
    BadChecksum,
    #[error("sender is outside the interface subnet")]
    OffSubnet,
    #[error("sender address is unspecified")]
    UnspecifiedSender,
    #[error("no link-layer address for the sender")]
    MissingLinkAddr,
    #[error("unknown operation {0}")]
    UnknownOperation(u16),
    #[error("interface {0} has no such address family or is disabled")]
    Disabled(PortId),
    #[error("no interface for port {0}")]
    UnknownPort(PortId),
}
