use crate::{EthernetFrame, MacAddr, PacketData, IPV6_ETHER_TYPE};
use std::convert::{TryFrom, TryInto};
use std::net::Ipv6Addr;

pub const ICMPV6_NEXT_HEADER: u8 = 58;
pub const ND_NEIGHBOR_SOLICITATION: u8 = 135;
pub const ND_NEIGHBOR_ADVERTISEMENT: u8 = 136;
/// RFC 4861 requires neighbor discovery messages to arrive with the maximum hop limit, which
/// proves they were not forwarded by a router.
pub const ND_HOP_LIMIT: u8 = 255;

const IPV6_HDR_LEN: usize = 40;
const ND_BODY_LEN: usize = 24;
const LINK_ADDR_OPTION_LEN: usize = 8;
/// IPv6 header plus the fixed part of a solicitation/advertisement.
pub const ND_MIN_LEN: usize = IPV6_HDR_LEN + ND_BODY_LEN;

const OPTION_SOURCE_LINK_ADDR: u8 = 1;
const OPTION_TARGET_LINK_ADDR: u8 = 2;

const FLAG_ROUTER: u8 = 0x80;
const FLAG_SOLICITED: u8 = 0x40;
const FLAG_OVERRIDE: u8 = 0x20;

///
/// EthernetFrame wrapper for ICMPv6 neighbor solicitations and advertisements, RFC 4861
/// sections 4.3 and 4.4. Offsets below are relative to the start of the IPv6 header; extension
/// headers are not supported, as the RFC forbids them on neighbor discovery traffic that we
/// would accept anyway.
///
#[derive(Clone, Debug)]
pub struct NdFrame {
    frame: EthernetFrame,
}

/// Addressing for a frame built from scratch.
#[derive(Clone, Copy, Debug)]
pub struct NdAddressing {
    pub vlan: Option<u16>,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv6Addr,
    pub dst_ip: Ipv6Addr,
}

impl NdFrame {
    /// Builds a neighbor solicitation for `target` carrying our link address as the
    /// source link-layer address option.
    pub fn solicitation(buffer: PacketData, addressing: NdAddressing, target: Ipv6Addr) -> Self {
        NdFrame::build(
            buffer,
            addressing,
            ND_NEIGHBOR_SOLICITATION,
            0,
            target,
            OPTION_SOURCE_LINK_ADDR,
        )
    }

    /// Builds a neighbor advertisement for `target` carrying our link address as the
    /// target link-layer address option.
    pub fn advertisement(
        buffer: PacketData,
        addressing: NdAddressing,
        target: Ipv6Addr,
        solicited: bool,
    ) -> Self {
        let flags = if solicited {
            FLAG_SOLICITED | FLAG_OVERRIDE
        } else {
            FLAG_OVERRIDE
        };
        NdFrame::build(
            buffer,
            addressing,
            ND_NEIGHBOR_ADVERTISEMENT,
            flags,
            target,
            OPTION_TARGET_LINK_ADDR,
        )
    }

    fn build(
        buffer: PacketData,
        addressing: NdAddressing,
        msg_type: u8,
        flags: u8,
        target: Ipv6Addr,
        option: u8,
    ) -> Self {
        let mut frame = EthernetFrame::build(buffer, addressing.vlan, IPV6_ETHER_TYPE);
        frame.set_dest_mac(addressing.dst_mac);
        frame.set_src_mac(addressing.src_mac);

        let icmp_len = ND_BODY_LEN + LINK_ADDR_OPTION_LEN;
        frame
            .data
            .resize(frame.payload_offset + IPV6_HDR_LEN + icmp_len, 0);

        let ip = frame.payload_mut();
        ip[0] = 0x60;
        ip[4..6].copy_from_slice(&(icmp_len as u16).to_be_bytes());
        ip[6] = ICMPV6_NEXT_HEADER;
        ip[7] = ND_HOP_LIMIT;
        ip[8..24].copy_from_slice(&addressing.src_ip.octets());
        ip[24..40].copy_from_slice(&addressing.dst_ip.octets());
        ip[40] = msg_type;
        ip[44] = flags;
        ip[48..64].copy_from_slice(&target.octets());
        ip[64] = option;
        ip[65] = (LINK_ADDR_OPTION_LEN / 8) as u8;
        ip[66..72].copy_from_slice(&addressing.src_mac.bytes);

        let mut nd_frame = NdFrame { frame };
        let checksum = nd_frame.compute_checksum();
        nd_frame.set_checksum(checksum);
        nd_frame
    }

    pub fn msg_type(&self) -> u8 {
        self.ip_data()[40]
    }

    pub fn code(&self) -> u8 {
        self.ip_data()[41]
    }

    pub fn hop_limit(&self) -> u8 {
        self.ip_data()[7]
    }

    pub fn src_addr(&self) -> Ipv6Addr {
        ipv6_at(self.ip_data(), 8)
    }

    pub fn dest_addr(&self) -> Ipv6Addr {
        ipv6_at(self.ip_data(), 24)
    }

    pub fn target_addr(&self) -> Ipv6Addr {
        ipv6_at(self.ip_data(), 48)
    }

    pub fn is_solicitation(&self) -> bool {
        self.msg_type() == ND_NEIGHBOR_SOLICITATION
    }

    pub fn is_advertisement(&self) -> bool {
        self.msg_type() == ND_NEIGHBOR_ADVERTISEMENT
    }

    pub fn is_router(&self) -> bool {
        self.is_advertisement() && self.ip_data()[44] & FLAG_ROUTER != 0
    }

    pub fn is_solicited(&self) -> bool {
        self.is_advertisement() && self.ip_data()[44] & FLAG_SOLICITED != 0
    }

    pub fn is_override(&self) -> bool {
        self.is_advertisement() && self.ip_data()[44] & FLAG_OVERRIDE != 0
    }

    pub fn source_link_addr(&self) -> Option<MacAddr> {
        self.link_addr_option(OPTION_SOURCE_LINK_ADDR)
    }

    pub fn target_link_addr(&self) -> Option<MacAddr> {
        self.link_addr_option(OPTION_TARGET_LINK_ADDR)
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes(self.ip_data()[42..44].try_into().unwrap())
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        let offset = self.frame.payload_offset + 42;
        self.frame.data[offset..offset + 2].copy_from_slice(&checksum.to_be_bytes());
    }

    /// Checksum over the IPv6 pseudo-header and the ICMPv6 message, with the checksum
    /// field taken as zero.
    pub fn compute_checksum(&self) -> u16 {
        let icmp = self.icmp_data();
        let mut sum = self.pseudo_header_sum();
        sum = ones_complement_add(sum, &icmp[..2]);
        sum = ones_complement_add(sum, &icmp[4..]);
        !fold(sum)
    }

    pub fn checksum_valid(&self) -> bool {
        let sum = ones_complement_add(self.pseudo_header_sum(), self.icmp_data());
        fold(sum) == 0xffff
    }

    pub fn ethernet(&self) -> &EthernetFrame {
        &self.frame
    }

    // Move ownership of the frame back to the caller
    pub fn frame(self) -> EthernetFrame {
        self.frame
    }

    fn payload_len(&self) -> usize {
        u16::from_be_bytes(self.ip_data()[4..6].try_into().unwrap()) as usize
    }

    fn ip_data(&self) -> &[u8] {
        &self.frame.data[self.frame.payload_offset..]
    }

    fn icmp_data(&self) -> &[u8] {
        let end = IPV6_HDR_LEN + self.payload_len();
        &self.ip_data()[IPV6_HDR_LEN..end]
    }

    fn pseudo_header_sum(&self) -> u64 {
        let ip = self.ip_data();
        let mut sum = ones_complement_add(0, &ip[8..40]);
        sum = ones_complement_add(sum, &(self.payload_len() as u32).to_be_bytes());
        ones_complement_add(sum, &[0, 0, 0, ICMPV6_NEXT_HEADER])
    }

    fn link_addr_option(&self, wanted: u8) -> Option<MacAddr> {
        let icmp = self.icmp_data();
        let mut offset = ND_BODY_LEN;
        while offset + 2 <= icmp.len() {
            let kind = icmp[offset];
            let len = icmp[offset + 1] as usize * 8;
            if len == 0 || offset + len > icmp.len() {
                return None;
            }
            if kind == wanted {
                return MacAddr::from_slice(&icmp[offset + 2..offset + len]);
            }
            offset += len;
        }
        None
    }
}

fn ipv6_at(data: &[u8], offset: usize) -> Ipv6Addr {
    let octets: [u8; 16] = data[offset..offset + 16].try_into().unwrap();
    Ipv6Addr::from(octets)
}

fn ones_complement_add(mut sum: u64, bytes: &[u8]) -> u64 {
    for chunk in bytes.chunks(2) {
        let word = match chunk {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [hi] => u16::from_be_bytes([*hi, 0]),
            _ => 0,
        };
        sum += u64::from(word);
    }
    sum
}

fn fold(mut sum: u64) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// Solicited-node multicast group of `addr`: ff02::1:ffXX:XXXX with the low 24 bits of `addr`.
pub fn solicited_node_multicast(addr: Ipv6Addr) -> Ipv6Addr {
    let o = addr.octets();
    Ipv6Addr::from([
        0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xff, o[13], o[14], o[15],
    ])
}

/// Ethernet group address for an IPv6 multicast destination, RFC 2464 section 7.
pub fn multicast_mac(group: Ipv6Addr) -> MacAddr {
    let o = group.octets();
    MacAddr::new([0x33, 0x33, o[12], o[13], o[14], o[15]])
}

impl TryFrom<EthernetFrame> for NdFrame {
    type Error = &'static str;

    ///
    /// Decorates the given EthernetFrame with NdFrame getters. Validates
    /// - The frame has an IPv6 ether type and version
    /// - The payload length field fits in the frame and covers a neighbor discovery body
    /// - The ICMPv6 message is a solicitation or an advertisement
    ///
    fn try_from(frame: EthernetFrame) -> Result<Self, Self::Error> {
        if frame.ether_type() != IPV6_ETHER_TYPE {
            return Err("Frame does not have IPv6 ether type.");
        }

        let nd_frame = NdFrame { frame };
        let available = nd_frame.ip_data().len();
        if available < ND_MIN_LEN {
            return Err("Frame is too short to hold a neighbor discovery message");
        }
        if nd_frame.ip_data()[0] >> 4 != 6 {
            return Err("Packet has incorrect version, is not Ipv6Packet");
        }
        if nd_frame.ip_data()[6] != ICMPV6_NEXT_HEADER {
            return Err("Packet does not carry ICMPv6");
        }

        let payload_len = nd_frame.payload_len();
        if payload_len < ND_BODY_LEN || IPV6_HDR_LEN + payload_len > available {
            return Err("Packet has invalid payload len field");
        }
        if !nd_frame.is_solicitation() && !nd_frame.is_advertisement() {
            return Err("ICMPv6 message is not a neighbor solicitation or advertisement");
        }

        Ok(nd_frame)
    }
}
