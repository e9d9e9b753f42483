use crate::*;
use std::borrow::Cow;
use std::convert::TryInto;

const ETHERNET_HDR_LEN: usize = 14;
const VLAN_HDR_LEN: usize = 4;

#[derive(Clone, Debug)]
pub struct EthernetFrame {
    pub data: PacketData,
    pub layer2_offset: usize,
    pub payload_offset: usize,
}

impl Packet for EthernetFrame {}

impl EthernetFrame {
    pub fn from_buffer(
        frame: PacketData,
        layer2_offset: usize,
    ) -> Result<EthernetFrame, &'static str> {
        // dst mac (6) | src mac (6) | [0x8100 | tci] | ether type (2)
        if frame.len() < layer2_offset + ETHERNET_HDR_LEN {
            return Err("Frame is less than the minimum of 14 bytes");
        }

        let outer_type = u16::from_be_bytes(
            frame[layer2_offset + 12..layer2_offset + 14]
                .try_into()
                .unwrap(),
        );
        let header_len = if outer_type == VLAN_ETHER_TYPE {
            if frame.len() < layer2_offset + ETHERNET_HDR_LEN + VLAN_HDR_LEN {
                return Err("VLAN tagged frame is less than the minimum of 18 bytes");
            }
            ETHERNET_HDR_LEN + VLAN_HDR_LEN
        } else {
            ETHERNET_HDR_LEN
        };

        Ok(EthernetFrame {
            data: frame,
            layer2_offset,
            payload_offset: layer2_offset + header_len,
        })
    }

    /// An untagged, all-zero header with no payload.
    pub fn empty() -> EthernetFrame {
        EthernetFrame::build(vec![], None, 0)
    }

    /// Lays out a fresh header at the start of `buffer`, reusing its allocation. When `vlan` is set
    /// the frame carries an 802.1Q tag with that VLAN id and `ether_type` becomes the inner type.
    pub fn build(mut buffer: PacketData, vlan: Option<u16>, ether_type: u16) -> EthernetFrame {
        buffer.clear();
        let header_len = match vlan {
            Some(_) => ETHERNET_HDR_LEN + VLAN_HDR_LEN,
            None => ETHERNET_HDR_LEN,
        };
        buffer.resize(header_len, 0);

        let mut frame = EthernetFrame {
            data: buffer,
            layer2_offset: 0,
            payload_offset: header_len,
        };
        if let Some(vlan_id) = vlan {
            frame.data[12..14].copy_from_slice(&VLAN_ETHER_TYPE.to_be_bytes());
            frame.data[14..16].copy_from_slice(&(vlan_id & 0x0fff).to_be_bytes());
        }
        frame.set_ether_type(ether_type);
        frame
    }

    pub fn dest_mac(&self) -> MacAddr {
        let start = self.layer2_offset;
        MacAddr::new(self.data[start..start + 6].try_into().unwrap())
    }

    pub fn src_mac(&self) -> MacAddr {
        let start = self.layer2_offset + 6;
        MacAddr::new(self.data[start..start + 6].try_into().unwrap())
    }

    pub fn set_dest_mac(&mut self, mac: MacAddr) {
        let start = self.layer2_offset;
        self.data[start..start + 6].copy_from_slice(&mac.bytes);
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) {
        let start = self.layer2_offset + 6;
        self.data[start..start + 6].copy_from_slice(&mac.bytes);
    }

    /// VLAN id of the 802.1Q tag, if the frame is tagged.
    pub fn vlan_id(&self) -> Option<u16> {
        if !self.is_vlan_tagged() {
            return None;
        }
        let start = self.layer2_offset + 14;
        let tci = u16::from_be_bytes(self.data[start..start + 2].try_into().unwrap());
        Some(tci & 0x0fff)
    }

    pub fn is_vlan_tagged(&self) -> bool {
        self.header_len() == ETHERNET_HDR_LEN + VLAN_HDR_LEN
    }

    /// Length of the link-layer header, including any VLAN tag.
    pub fn header_len(&self) -> usize {
        self.payload_offset - self.layer2_offset
    }

    /// The EtherType of the payload, looking past a VLAN tag.
    pub fn ether_type(&self) -> u16 {
        let start = self.payload_offset - 2;
        u16::from_be_bytes(self.data[start..self.payload_offset].try_into().unwrap())
    }

    pub fn set_ether_type(&mut self, ether_type: u16) {
        let start = self.payload_offset - 2;
        self.data[start..self.payload_offset].copy_from_slice(&ether_type.to_be_bytes());
    }

    /// Everything after the link-layer header, padding included.
    pub fn payload(&self) -> Cow<[u8]> {
        Cow::from(&self.data[self.payload_offset..])
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.payload_offset..]
    }

    pub fn set_payload(&mut self, payload: &[u8]) {
        self.data.truncate(self.payload_offset);
        self.data.reserve_exact(payload.len());
        self.data.extend(payload);
    }

    /// Total length from the start of the Ethernet header.
    pub fn len(&self) -> usize {
        self.data.len() - self.layer2_offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bytes ahead of `layer2_offset` are headroom and do not take part in comparison.
impl PartialEq for EthernetFrame {
    fn eq(&self, other: &Self) -> bool {
        self.data[self.layer2_offset..] == other.data[other.layer2_offset..]
    }
}

impl Eq for EthernetFrame {}
