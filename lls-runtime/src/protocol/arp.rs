use super::{Inbound, Operation, ResolutionProtocol};
use crate::addr::ProtocolAddr;
use crate::error::{DropReason, LlsError};
use crate::interface::{Interface, Ipv4Config};
use lls_packets::{
    ArpEndpoint, ArpFrame, ArpOp, EthernetFrame, MacAddr, PacketData, ARP_ETHER_TYPE,
    ARP_IPV4_LEN,
};
use std::convert::TryFrom;
use std::net::Ipv4Addr;

/// ARP over Ethernet for IPv4, RFC 826.
#[derive(Clone, Copy, Debug, Default)]
pub struct Arp;

impl Arp {
    fn local(iface: &Interface) -> Result<Ipv4Config, LlsError> {
        iface.ipv4.ok_or_else(|| LlsError::FamilyNotConfigured {
            family: Self::FAMILY,
            iface: iface.name.clone(),
        })
    }
}

impl ResolutionProtocol for Arp {
    type Addr = Ipv4Addr;
    type Message = ArpFrame;

    const FAMILY: &'static str = "arp";
    const ETHER_TYPE: u16 = ARP_ETHER_TYPE;

    fn configured(&self, iface: &Interface) -> bool {
        iface.ipv4.is_some()
    }

    fn parse(&self, frame: EthernetFrame) -> Result<Inbound<Ipv4Addr, ArpFrame>, DropReason> {
        if frame.ether_type() != ARP_ETHER_TYPE {
            return Err(DropReason::HeaderMismatch);
        }
        let len = frame.payload().len();
        if len < ARP_IPV4_LEN {
            return Err(DropReason::TooShort {
                len,
                min: ARP_IPV4_LEN,
            });
        }

        let arp = ArpFrame::try_from(frame).map_err(|_| DropReason::HeaderMismatch)?;
        if !arp.is_ethernet_ipv4() {
            return Err(DropReason::HeaderMismatch);
        }

        let sender = arp.sender();
        let operation = match arp.operation() {
            Some(ArpOp::Request) => Operation::Request,
            Some(ArpOp::Reply) => Operation::Reply,
            None => Operation::Unknown(arp.opcode()),
        };

        Ok(Inbound {
            sender: sender.ip,
            sender_mac: sender.mac,
            target: arp.target().ip,
            operation,
            message: arp,
        })
    }

    fn in_subnet(&self, iface: &Interface, sender: &Ipv4Addr) -> bool {
        match iface.ipv4 {
            Some(local) => local.addr.same_subnet(sender, &local.mask),
            None => false,
        }
    }

    fn is_local(&self, iface: &Interface, addr: &Ipv4Addr) -> bool {
        iface.ipv4.map_or(false, |local| local.addr == *addr)
    }

    /// Rewrites the request in place, keeping its link-layer encapsulation.
    fn reply(
        &self,
        iface: &Interface,
        inbound: Inbound<Ipv4Addr, ArpFrame>,
    ) -> Result<EthernetFrame, LlsError> {
        let local = Arp::local(iface)?;
        let mut arp = inbound.message;
        arp.answer(ArpEndpoint {
            mac: iface.mac,
            ip: local.addr,
        });
        Ok(arp.frame())
    }

    fn request(
        &self,
        iface: &Interface,
        buffer: PacketData,
        target: Ipv4Addr,
        dest: Option<MacAddr>,
    ) -> Result<EthernetFrame, LlsError> {
        let local = Arp::local(iface)?;
        let sender = ArpEndpoint {
            mac: iface.mac,
            ip: local.addr,
        };
        let target = ArpEndpoint {
            mac: dest.unwrap_or(MacAddr::ZERO),
            ip: target,
        };
        let request = ArpFrame::build(buffer, iface.vlan, ArpOp::Request as u16, sender, target);
        Ok(request.frame())
    }
}
