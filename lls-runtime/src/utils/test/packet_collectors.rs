use crate::interface::{PortAnnotated, PortId};
use crate::io::PacketIo;
use lls_packets::{EthernetFrame, PacketData};

/// Collects every transmitted frame with the port and queue it left on.
///
/// `buffers` limits how many allocations succeed; `None` never runs out. Freed buffers go
/// back into it. With `refuse_tx` set, every burst transmits nothing.
#[derive(Default)]
pub struct RecordingIo {
    pub sent: Vec<PortAnnotated<EthernetFrame>>,
    pub buffers: Option<usize>,
    pub refuse_tx: bool,
}

impl RecordingIo {
    pub fn new() -> Self {
        RecordingIo::default()
    }

    pub fn with_buffers(buffers: usize) -> Self {
        RecordingIo {
            buffers: Some(buffers),
            ..RecordingIo::default()
        }
    }

    pub fn take(&mut self) -> Vec<PortAnnotated<EthernetFrame>> {
        std::mem::replace(&mut self.sent, Vec::new())
    }
}

impl PacketIo for RecordingIo {
    fn alloc(&mut self) -> Option<PacketData> {
        match self.buffers.as_mut() {
            Some(0) => None,
            Some(left) => {
                *left -= 1;
                Some(Vec::with_capacity(128))
            }
            None => Some(Vec::with_capacity(128)),
        }
    }

    fn free(&mut self, _buffer: PacketData) {
        if let Some(left) = self.buffers.as_mut() {
            *left += 1;
        }
    }

    fn tx_burst(&mut self, port: PortId, queue: u16, frames: &mut Vec<EthernetFrame>) -> usize {
        if self.refuse_tx {
            return 0;
        }
        let count = frames.len();
        self.sent
            .extend(frames.drain(..).map(|packet| PortAnnotated {
                packet,
                port,
                queue,
            }));
        count
    }
}
