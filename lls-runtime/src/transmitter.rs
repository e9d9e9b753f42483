use crate::interface::{Interfaces, PortId};
use crate::io::PacketIo;
use crate::protocol::ResolutionProtocol;
use lls_packets::MacAddr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Bounded retransmission: at most `max_attempts` requests per resolution, the first one
/// included, spaced at least `interval` apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

/// Bookkeeping of the resolution in flight for one address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pending {
    pub attempts: u32,
    pub next_retry: Instant,
    pub unicast: bool,
}

impl Pending {
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_retry
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            interval,
        }
    }

    pub fn first(&self, now: Instant, unicast: bool) -> Pending {
        Pending {
            attempts: 1,
            next_retry: now + self.interval,
            unicast,
        }
    }

    pub fn next(&self, pending: &Pending, now: Instant, unicast: bool) -> Pending {
        Pending {
            attempts: pending.attempts + 1,
            next_retry: now + self.interval,
            unicast,
        }
    }

    pub fn exhausted(&self, pending: &Pending) -> bool {
        pending.attempts >= self.max_attempts
    }
}

/// Builds and sends resolution requests for one family.
///
/// A request that cannot be sent is a lost attempt. It still counts against the retry budget,
/// so buffer shortage never turns into extra requests.
pub struct RequestTransmitter<P: ResolutionProtocol> {
    protocol: P,
    interfaces: Interfaces,
    sent: u64,
    lost: u64,
}

impl<P: ResolutionProtocol> RequestTransmitter<P> {
    pub fn new(protocol: P, interfaces: Interfaces) -> Self {
        RequestTransmitter {
            protocol,
            interfaces,
            sent: 0,
            lost: 0,
        }
    }

    /// Sends one request for `target` out `port` on the interface's LLS queue. Returns whether
    /// it left.
    pub fn send<I: PacketIo>(
        &mut self,
        io: &mut I,
        port: PortId,
        target: P::Addr,
        dest: Option<MacAddr>,
    ) -> bool {
        let iface = match self.interfaces.get(port) {
            Some(iface) if iface.enabled && self.protocol.configured(iface) => iface,
            _ => {
                warn!(family = P::FAMILY, port, %target, "no usable interface for request");
                self.lost += 1;
                return false;
            }
        };

        let buffer = match io.alloc() {
            Some(buffer) => buffer,
            None => {
                warn!(family = P::FAMILY, %target, "no packet buffer, request lost");
                self.lost += 1;
                return false;
            }
        };

        let frame = match self.protocol.request(iface, buffer, target, dest) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(family = P::FAMILY, %target, %err, "could not build request");
                self.lost += 1;
                return false;
            }
        };

        let mut burst = vec![frame];
        if io.tx_burst(port, iface.tx_queue, &mut burst) == 0 {
            for frame in burst {
                io.free(frame.data);
            }
            warn!(family = P::FAMILY, %target, iface = %iface.name, "request not transmitted");
            self.lost += 1;
            return false;
        }

        debug!(
            family = P::FAMILY,
            %target,
            iface = %iface.name,
            unicast = dest.is_some(),
            "sent resolution request"
        );
        self.sent += 1;
        true
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Arp;
    use crate::utils::test::harness::*;
    use crate::utils::test::packet_collectors::RecordingIo;
    use lls_packets::ArpFrame;
    use std::convert::TryFrom;
    use std::net::Ipv4Addr;

    #[test]
    fn retry_budget() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let t0 = Instant::now();

        let first = policy.first(t0, false);
        assert_eq!(first.attempts, 1);
        assert!(!first.is_due(t0));
        assert!(first.is_due(t0 + Duration::from_secs(1)));
        assert!(!policy.exhausted(&first));

        let second = policy.next(&first, t0 + Duration::from_secs(1), true);
        let third = policy.next(&second, t0 + Duration::from_secs(2), true);
        assert!(!policy.exhausted(&second));
        assert!(policy.exhausted(&third));
        assert_eq!(third.next_retry, t0 + Duration::from_secs(3));
    }

    #[test]
    fn request_leaves_on_lls_queue() {
        let mut io = RecordingIo::new();
        let mut transmitter = RequestTransmitter::new(Arp, interfaces());
        let target = Ipv4Addr::new(10, 0, 0, 50);

        assert!(transmitter.send(&mut io, FRONT_PORT, target, None));
        let sent = io.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].port, FRONT_PORT);
        assert_eq!(sent[0].queue, front().tx_queue);
        let arp = ArpFrame::try_from(sent[0].packet.clone()).unwrap();
        assert_eq!(arp.target().ip, target);
        assert_eq!(transmitter.sent(), 1);
    }

    #[test]
    fn exhaustion_and_refusal_are_lost_attempts() {
        let mut io = RecordingIo::with_buffers(0);
        let mut transmitter = RequestTransmitter::new(Arp, interfaces());
        let target = Ipv4Addr::new(10, 0, 0, 50);
        assert!(!transmitter.send(&mut io, FRONT_PORT, target, None));

        let mut io = RecordingIo::with_buffers(1);
        io.refuse_tx = true;
        assert!(!transmitter.send(&mut io, FRONT_PORT, target, None));
        // the unsent request's buffer went back to the pool
        assert_eq!(io.buffers, Some(1));
        assert!(!transmitter.send(&mut io, 42, target, None));

        assert_eq!(transmitter.lost(), 3);
        assert_eq!(transmitter.sent(), 0);
    }
}
