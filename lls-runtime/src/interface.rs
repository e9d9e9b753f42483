use crate::addr::ipv6_mask;
use lls_packets::{EthernetFrame, MacAddr, Packet};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

pub type PortId = u16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Config {
    pub addr: Ipv4Addr,
    pub mask: Ipv4Addr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv6Config {
    pub addr: Ipv6Addr,
    pub prefix_len: u8,
    /// Link-local address answered alongside `addr`, if any.
    pub link_local: Option<Ipv6Addr>,
}

impl Ipv6Config {
    pub fn mask(&self) -> Ipv6Addr {
        ipv6_mask(self.prefix_len)
    }
}

/// Read-only view of a configured network interface, as provided by the interface
/// module at startup.
#[derive(Clone, Debug)]
pub struct Interface {
    pub name: String,
    pub port: PortId,
    pub mac: MacAddr,
    pub ipv4: Option<Ipv4Config>,
    pub ipv6: Option<Ipv6Config>,
    /// VLAN id inserted on egress and expected on ingress.
    pub vlan: Option<u16>,
    /// Transmit queue reserved for the owning core on this interface.
    pub tx_queue: u16,
    /// Role enablement. A back interface that is not in use is configured but disabled.
    pub enabled: bool,
}

impl Interface {
    pub fn new(name: &str, port: PortId, mac: MacAddr) -> Self {
        Interface {
            name: String::from(name),
            port,
            mac,
            ipv4: None,
            ipv6: None,
            vlan: None,
            tx_queue: 0,
            enabled: true,
        }
    }

    pub fn ipv4(self, addr: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Interface {
            ipv4: Some(Ipv4Config { addr, mask }),
            ..self
        }
    }

    pub fn ipv6(self, addr: Ipv6Addr, prefix_len: u8, link_local: Option<Ipv6Addr>) -> Self {
        Interface {
            ipv6: Some(Ipv6Config {
                addr,
                prefix_len,
                link_local,
            }),
            ..self
        }
    }

    pub fn vlan(self, vlan: u16) -> Self {
        Interface {
            vlan: Some(vlan),
            ..self
        }
    }

    pub fn tx_queue(self, tx_queue: u16) -> Self {
        Interface { tx_queue, ..self }
    }

    pub fn enabled(self, enabled: bool) -> Self {
        Interface { enabled, ..self }
    }

    /// The frame's link-layer encapsulation agrees with this interface: tagged with our VLAN
    /// when we insert one, untagged otherwise.
    pub fn verify_l2(&self, frame: &EthernetFrame) -> bool {
        frame.vlan_id() == self.vlan
    }
}

/// All interfaces served by one owning core, shared read-only with the handlers.
#[derive(Clone, Debug, Default)]
pub struct Interfaces {
    ifaces: Arc<Vec<Interface>>,
}

impl Interfaces {
    pub fn new(ifaces: Vec<Interface>) -> Self {
        Interfaces {
            ifaces: Arc::new(ifaces),
        }
    }

    pub fn get(&self, port: PortId) -> Option<&Interface> {
        self.ifaces.iter().find(|iface| iface.port == port)
    }
}

/// A packet annotated with the port it arrived on (or leaves from) and the queue used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortAnnotated<P: Packet> {
    pub packet: P,
    pub port: PortId,
    pub queue: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_port() {
        let ifaces = Interfaces::new(vec![
            Interface::new("front", 0, MacAddr::new([2, 0, 0, 0, 0, 1])),
            Interface::new("back", 3, MacAddr::new([2, 0, 0, 0, 0, 2])).enabled(false),
        ]);
        assert_eq!(ifaces.get(3).map(|i| i.name.as_str()), Some("back"));
        assert!(!ifaces.get(3).unwrap().enabled);
        assert!(ifaces.get(1).is_none());
    }

    #[test]
    fn l2_verification_follows_vlan_config() {
        let plain = Interface::new("front", 0, MacAddr::ZERO);
        let tagged = plain.clone().vlan(30);

        let untagged_frame = EthernetFrame::build(vec![], None, 0x0806);
        let tagged_frame = EthernetFrame::build(vec![], Some(30), 0x0806);
        let other_vlan = EthernetFrame::build(vec![], Some(31), 0x0806);

        assert!(plain.verify_l2(&untagged_frame));
        assert!(!plain.verify_l2(&tagged_frame));
        assert!(tagged.verify_l2(&tagged_frame));
        assert!(!tagged.verify_l2(&other_vlan));
        assert!(!tagged.verify_l2(&untagged_frame));
    }
}
