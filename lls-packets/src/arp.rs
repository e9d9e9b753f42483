use crate::{EthernetFrame, MacAddr, PacketData, ARP_ETHER_TYPE, IPV4_ETHER_TYPE};
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use std::ops::Range;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

impl ArpOp {
    pub fn from_u16(op: u16) -> Option<ArpOp> {
        match op {
            1 => Some(ArpOp::Request),
            2 => Some(ArpOp::Reply),
            _ => None,
        }
    }
}

pub const ARP_HTYPE_ETHERNET: u16 = 1;

/// Size of an ARP body for Ethernet hardware and IPv4 protocol addresses.
pub const ARP_IPV4_LEN: usize = 28;

const HTYPE: Range<usize> = 0..2;
const PTYPE: Range<usize> = 2..4;
const HLEN: usize = 4;
const PLEN: usize = 5;
const OPER: Range<usize> = 6..8;
const SHA: Range<usize> = 8..14;
const SPA: Range<usize> = 14..18;
const THA: Range<usize> = 18..24;
const TPA: Range<usize> = 24..28;

/// Hardware and protocol address of one side of an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpEndpoint {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
}

///
/// EthernetFrame wrapper for ARP between Ethernet hardware and IPv4 protocol addresses,
/// RFC 826: https://tools.ietf.org/html/rfc826
///
/// The fixed header fields read whatever the frame carries, so callers can check them with
/// `is_ethernet_ipv4`. Address accessors assume that layout.
///
#[derive(Clone, Debug)]
pub struct ArpFrame {
    frame: EthernetFrame,
}

impl ArpFrame {
    /// Writes a complete message into `buffer`, tagged with `vlan` if set. The Ethernet
    /// destination is the target's hardware address, or broadcast while that is unknown (zero).
    pub fn build(
        buffer: PacketData,
        vlan: Option<u16>,
        opcode: u16,
        sender: ArpEndpoint,
        target: ArpEndpoint,
    ) -> Self {
        let mut frame = EthernetFrame::build(buffer, vlan, ARP_ETHER_TYPE);
        frame.set_payload(&[0; ARP_IPV4_LEN]);
        frame.set_src_mac(sender.mac);
        frame.set_dest_mac(if target.mac == MacAddr::ZERO {
            MacAddr::BROADCAST
        } else {
            target.mac
        });

        let mut arp = ArpFrame { frame };
        arp.write(HTYPE, &ARP_HTYPE_ETHERNET.to_be_bytes());
        arp.write(PTYPE, &IPV4_ETHER_TYPE.to_be_bytes());
        arp.write(HLEN..HLEN + 1, &[6]);
        arp.write(PLEN..PLEN + 1, &[4]);
        arp.write(OPER, &opcode.to_be_bytes());
        arp.set_sender(sender);
        arp.set_target(target);
        arp
    }

    pub fn hardware_type(&self) -> u16 {
        self.read_u16(HTYPE)
    }

    pub fn protocol_type(&self) -> u16 {
        self.read_u16(PTYPE)
    }

    pub fn hardware_addr_len(&self) -> u8 {
        self.body()[HLEN]
    }

    pub fn protocol_addr_len(&self) -> u8 {
        self.body()[PLEN]
    }

    pub fn opcode(&self) -> u16 {
        self.read_u16(OPER)
    }

    /// `None` for opcodes other than request and reply.
    pub fn operation(&self) -> Option<ArpOp> {
        ArpOp::from_u16(self.opcode())
    }

    /// The header announces Ethernet hardware and IPv4 protocol addresses.
    pub fn is_ethernet_ipv4(&self) -> bool {
        self.hardware_type() == ARP_HTYPE_ETHERNET
            && self.protocol_type() == IPV4_ETHER_TYPE
            && self.hardware_addr_len() == 6
            && self.protocol_addr_len() == 4
    }

    pub fn sender(&self) -> ArpEndpoint {
        self.endpoint(SHA, SPA)
    }

    pub fn target(&self) -> ArpEndpoint {
        self.endpoint(THA, TPA)
    }

    pub fn set_sender(&mut self, sender: ArpEndpoint) {
        self.write(SHA, &sender.mac.bytes);
        self.write(SPA, &sender.ip.octets());
    }

    pub fn set_target(&mut self, target: ArpEndpoint) {
        self.write(THA, &target.mac.bytes);
        self.write(TPA, &target.ip.octets());
    }

    /// Sender and target protocol addresses are equal: an unsolicited announcement.
    pub fn is_gratuitous(&self) -> bool {
        self.body()[SPA] == self.body()[TPA]
    }

    /// Turns a request into the reply from `local`, in place. The requester becomes the target
    /// and the Ethernet destination; the VLAN tag is kept.
    pub fn answer(&mut self, local: ArpEndpoint) {
        let requester = self.sender();
        let link_src = self.frame.src_mac();
        self.write(OPER, &(ArpOp::Reply as u16).to_be_bytes());
        self.set_target(requester);
        self.set_sender(local);
        self.frame.set_dest_mac(link_src);
        self.frame.set_src_mac(local.mac);
    }

    pub fn ethernet(&self) -> &EthernetFrame {
        &self.frame
    }

    // Move ownership of the frame back to the caller
    pub fn frame(self) -> EthernetFrame {
        self.frame
    }

    fn body(&self) -> &[u8] {
        &self.frame.data[self.frame.payload_offset..]
    }

    fn read_u16(&self, range: Range<usize>) -> u16 {
        let bytes = &self.body()[range];
        u16::from_be_bytes([bytes[0], bytes[1]])
    }

    fn endpoint(&self, hw: Range<usize>, proto: Range<usize>) -> ArpEndpoint {
        let mut mac = MacAddr::ZERO;
        mac.bytes.copy_from_slice(&self.body()[hw]);
        let ip = &self.body()[proto];
        ArpEndpoint {
            mac,
            ip: Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3]),
        }
    }

    fn write(&mut self, range: Range<usize>, bytes: &[u8]) {
        let offset = self.frame.payload_offset;
        self.frame.data[offset + range.start..offset + range.end].copy_from_slice(bytes);
    }
}

impl TryFrom<EthernetFrame> for ArpFrame {
    type Error = &'static str;

    ///
    /// Decorates the given EthernetFrame with ArpFrame accessors.
    /// Validates
    /// - The frame has an ARP ether type
    /// - The payload holds a full Ethernet/IPv4 body. Frames padded up to the Ethernet
    ///   minimum are accepted.
    ///
    fn try_from(frame: EthernetFrame) -> Result<Self, Self::Error> {
        if frame.ether_type() != ARP_ETHER_TYPE {
            return Err("Frame does not have ARP ether type.");
        }
        if frame.payload().len() < ARP_IPV4_LEN {
            return Err("Frame payload is too small for an Ethernet/IPv4 ARP body");
        }
        Ok(ArpFrame { frame })
    }
}
