use std::convert::TryFrom;
use std::fmt;

/// Raw bytes of a frame, starting at the Ethernet header.
pub type PacketData = Vec<u8>;

/// Marker for types that wrap a frame buffer.
pub trait Packet {}

pub const ARP_ETHER_TYPE: u16 = 0x0806;
pub const IPV4_ETHER_TYPE: u16 = 0x0800;
pub const IPV6_ETHER_TYPE: u16 = 0x86DD;
pub const VLAN_ETHER_TYPE: u16 = 0x8100;

/// 48-bit Ethernet address, kept in wire order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MacAddr {
    pub bytes: [u8; 6],
}

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr { bytes: [0xff; 6] };
    pub const ZERO: MacAddr = MacAddr { bytes: [0; 6] };

    pub fn new(bytes: [u8; 6]) -> Self {
        MacAddr { bytes }
    }

    /// Copies the first six bytes of `bytes`, if there are that many.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 6 {
            return None;
        }
        <[u8; 6]>::try_from(&bytes[..6]).ok().map(MacAddr::new)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == MacAddr::BROADCAST
    }

    /// Group bit of the first octet; broadcast is also multicast.
    pub fn is_multicast(&self) -> bool {
        self.bytes[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.bytes;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_display() {
        let mac = MacAddr::new([0x02, 0, 0xab, 0x10, 0xff, 0x01]);
        assert_eq!(mac.to_string(), "02:00:ab:10:ff:01");
    }

    #[test]
    fn mac_from_short_slice() {
        assert_eq!(MacAddr::from_slice(&[1, 2, 3]), None);
        assert_eq!(
            MacAddr::from_slice(&[1, 2, 3, 4, 5, 6, 7]),
            Some(MacAddr::new([1, 2, 3, 4, 5, 6]))
        );
    }

    #[test]
    fn multicast_bit() {
        assert!(MacAddr::BROADCAST.is_multicast());
        assert!(MacAddr::new([0x33, 0x33, 0xff, 0, 0, 1]).is_multicast());
        assert!(!MacAddr::new([0x02, 0, 0, 0, 0, 1]).is_multicast());
    }
}
