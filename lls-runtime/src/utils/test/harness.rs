use crate::interface::{Interface, Interfaces};
use lls_packets::MacAddr;
use std::net::{Ipv4Addr, Ipv6Addr};

pub const FRONT_PORT: u16 = 0;
pub const BACK_PORT: u16 = 1;
pub const BACK_VLAN: u16 = 20;

pub const FRONT_MAC: MacAddr = MacAddr {
    bytes: [0x02, 0, 0, 0, 0, 0x01],
};
pub const BACK_MAC: MacAddr = MacAddr {
    bytes: [0x02, 0, 0, 0, 0, 0x02],
};
pub const PEER_MAC: MacAddr = MacAddr {
    bytes: [0x52, 0x54, 0, 0x12, 0x34, 0x56],
};

pub fn front_ipv4() -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, 1)
}

pub fn back_ipv4() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 20, 1)
}

pub fn front_ipv6() -> Ipv6Addr {
    "2001:db8::1".parse().unwrap()
}

pub fn front_link_local() -> Ipv6Addr {
    "fe80::1".parse().unwrap()
}

pub fn peer_ipv6() -> Ipv6Addr {
    "2001:db8::99".parse().unwrap()
}

/// Untagged front interface with both families configured.
pub fn front() -> Interface {
    Interface::new("front", FRONT_PORT, FRONT_MAC)
        .ipv4(front_ipv4(), Ipv4Addr::new(255, 255, 255, 0))
        .ipv6(front_ipv6(), 64, Some(front_link_local()))
        .tx_queue(3)
}

/// IPv4-only back interface inserting a VLAN tag.
pub fn back() -> Interface {
    Interface::new("back", BACK_PORT, BACK_MAC)
        .ipv4(back_ipv4(), Ipv4Addr::new(255, 255, 255, 0))
        .vlan(BACK_VLAN)
        .tx_queue(5)
}

pub fn interfaces() -> Interfaces {
    Interfaces::new(vec![front(), back()])
}
