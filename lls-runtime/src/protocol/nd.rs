use super::{Inbound, Operation, ResolutionProtocol};
use crate::addr::{ipv6_mask, ProtocolAddr};
use crate::error::{DropReason, LlsError};
use crate::interface::{Interface, Ipv6Config};
use lls_packets::{
    multicast_mac, solicited_node_multicast, EthernetFrame, MacAddr, NdAddressing, NdFrame,
    PacketData, IPV6_ETHER_TYPE, ND_HOP_LIMIT, ND_MIN_LEN,
};
use std::convert::TryFrom;
use std::net::Ipv6Addr;

/// IPv6 neighbor discovery, RFC 4861. Solicitations are requests and advertisements are
/// replies; the advertised target is the sender of an advertisement.
#[derive(Clone, Copy, Debug, Default)]
pub struct Nd;

fn is_link_local(addr: &Ipv6Addr) -> bool {
    let prefix = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0);
    prefix.same_subnet(addr, &ipv6_mask(64))
}

impl Nd {
    fn local(iface: &Interface) -> Result<Ipv6Config, LlsError> {
        iface.ipv6.ok_or_else(|| LlsError::FamilyNotConfigured {
            family: Self::FAMILY,
            iface: iface.name.clone(),
        })
    }
}

impl ResolutionProtocol for Nd {
    type Addr = Ipv6Addr;
    type Message = NdFrame;

    const FAMILY: &'static str = "nd";
    const ETHER_TYPE: u16 = IPV6_ETHER_TYPE;

    fn configured(&self, iface: &Interface) -> bool {
        iface.ipv6.is_some()
    }

    fn parse(&self, frame: EthernetFrame) -> Result<Inbound<Ipv6Addr, NdFrame>, DropReason> {
        if frame.ether_type() != IPV6_ETHER_TYPE {
            return Err(DropReason::HeaderMismatch);
        }
        let len = frame.payload().len();
        if len < ND_MIN_LEN {
            return Err(DropReason::TooShort {
                len,
                min: ND_MIN_LEN,
            });
        }

        let link_src = frame.src_mac();
        let nd = NdFrame::try_from(frame).map_err(|_| DropReason::HeaderMismatch)?;
        if nd.hop_limit() != ND_HOP_LIMIT || nd.code() != 0 {
            return Err(DropReason::HeaderMismatch);
        }
        if !nd.checksum_valid() {
            return Err(DropReason::BadChecksum);
        }

        if nd.is_solicitation() {
            let sender = nd.src_addr();
            if sender.is_unspecified() {
                // duplicate address detection probe, nothing to learn
                return Err(DropReason::UnspecifiedSender);
            }
            let sender_mac = nd
                .source_link_addr()
                .or_else(|| Some(link_src).filter(|mac| !mac.is_multicast()))
                .ok_or(DropReason::MissingLinkAddr)?;
            Ok(Inbound {
                sender,
                sender_mac,
                target: nd.target_addr(),
                operation: Operation::Request,
                message: nd,
            })
        } else {
            let sender = nd.target_addr();
            let sender_mac = nd
                .target_link_addr()
                .or_else(|| Some(link_src).filter(|mac| !mac.is_multicast()))
                .ok_or(DropReason::MissingLinkAddr)?;
            Ok(Inbound {
                sender,
                sender_mac,
                target: nd.dest_addr(),
                operation: Operation::Reply,
                message: nd,
            })
        }
    }

    fn in_subnet(&self, iface: &Interface, sender: &Ipv6Addr) -> bool {
        match iface.ipv6 {
            Some(local) => {
                local.addr.same_subnet(sender, &local.mask())
                    || (local.link_local.is_some() && is_link_local(sender))
            }
            None => false,
        }
    }

    fn is_local(&self, iface: &Interface, addr: &Ipv6Addr) -> bool {
        iface
            .ipv6
            .map_or(false, |local| local.addr == *addr || local.link_local == Some(*addr))
    }

    /// Answers with a solicited advertisement in the request's buffer, tagged like the request.
    fn reply(
        &self,
        iface: &Interface,
        inbound: Inbound<Ipv6Addr, NdFrame>,
    ) -> Result<EthernetFrame, LlsError> {
        Nd::local(iface)?;
        let addressing = NdAddressing {
            vlan: inbound.message.ethernet().vlan_id(),
            src_mac: iface.mac,
            dst_mac: inbound.sender_mac,
            src_ip: inbound.target,
            dst_ip: inbound.sender,
        };
        let buffer = inbound.message.frame().data;
        Ok(NdFrame::advertisement(buffer, addressing, inbound.target, true).frame())
    }

    fn request(
        &self,
        iface: &Interface,
        buffer: PacketData,
        target: Ipv6Addr,
        dest: Option<MacAddr>,
    ) -> Result<EthernetFrame, LlsError> {
        let local = Nd::local(iface)?;
        let src_ip = match local.link_local {
            Some(link_local) if is_link_local(&target) => link_local,
            _ => local.addr,
        };
        let (dst_mac, dst_ip) = match dest {
            Some(mac) => (mac, target),
            None => {
                let group = solicited_node_multicast(target);
                (multicast_mac(group), group)
            }
        };
        let addressing = NdAddressing {
            vlan: iface.vlan,
            src_mac: iface.mac,
            dst_mac,
            src_ip,
            dst_ip,
        };
        Ok(NdFrame::solicitation(buffer, addressing, target).frame())
    }
}
