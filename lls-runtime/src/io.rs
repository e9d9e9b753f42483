use crate::interface::{PortAnnotated, PortId};
use crossbeam::channel::{Sender, TrySendError};
use lls_packets::{EthernetFrame, PacketData};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Packet buffer allocation and burst transmission, supplied by the packet I/O layer.
///
/// Both operations may come up short. Callers treat that as a transient condition.
pub trait PacketIo {
    /// Takes a buffer from the pool, or `None` when the pool is exhausted.
    fn alloc(&mut self) -> Option<PacketData>;

    /// Returns a buffer obtained from `alloc` to the pool.
    fn free(&mut self, buffer: PacketData);

    /// Transmits as many of `frames` as possible out `port` on `queue`, returning how many left.
    /// Sent frames are taken out of `frames`; whatever remains still belongs to the caller.
    fn tx_burst(&mut self, port: PortId, queue: u16, frames: &mut Vec<EthernetFrame>) -> usize;
}

/// Shared count of buffers that may be outstanding at once, standing in for a mempool.
#[derive(Clone, Debug)]
pub struct BufferBudget {
    available: Arc<AtomicUsize>,
}

impl BufferBudget {
    pub fn new(buffers: usize) -> Self {
        BufferBudget {
            available: Arc::new(AtomicUsize::new(buffers)),
        }
    }

    pub fn take(&self) -> bool {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.available.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns a buffer once the receiving side is done with a frame.
    pub fn give_back(&self) {
        self.available.fetch_add(1, Ordering::AcqRel);
    }

    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }
}

/// PacketIo over a bounded crossbeam channel: transmitted frames are handed to whoever holds
/// the receiving end, which plays the wire.
pub struct ChannelIo {
    wire: Sender<PortAnnotated<EthernetFrame>>,
    budget: BufferBudget,
    buffer_len: usize,
}

impl ChannelIo {
    pub fn new(wire: Sender<PortAnnotated<EthernetFrame>>, budget: BufferBudget) -> Self {
        ChannelIo {
            wire,
            budget,
            buffer_len: 128,
        }
    }
}

impl PacketIo for ChannelIo {
    fn alloc(&mut self) -> Option<PacketData> {
        if self.budget.take() {
            Some(Vec::with_capacity(self.buffer_len))
        } else {
            None
        }
    }

    fn free(&mut self, _buffer: PacketData) {
        self.budget.give_back();
    }

    fn tx_burst(&mut self, port: PortId, queue: u16, frames: &mut Vec<EthernetFrame>) -> usize {
        let mut sent = 0;
        let mut unsent = Vec::new();
        for packet in frames.drain(..) {
            if packet.is_empty() {
                unsent.push(packet);
                continue;
            }
            match self.wire.try_send(PortAnnotated {
                packet,
                port,
                queue,
            }) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(back)) | Err(TrySendError::Disconnected(back)) => {
                    unsent.push(back.packet);
                }
            }
        }
        *frames = unsent;
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use lls_packets::ARP_ETHER_TYPE;

    #[test]
    fn budget_limits_allocations() {
        let (wire, _rx) = channel::bounded(4);
        let budget = BufferBudget::new(2);
        let mut io = ChannelIo::new(wire, budget.clone());

        assert!(io.alloc().is_some());
        assert!(io.alloc().is_some());
        assert!(io.alloc().is_none());
        budget.give_back();
        assert!(io.alloc().is_some());
    }

    #[test]
    fn full_wire_is_partial_transmit() {
        let (wire, rx) = channel::bounded(1);
        let budget = BufferBudget::new(2);
        let mut io = ChannelIo::new(wire, budget.clone());

        let first = io.alloc().unwrap();
        let second = io.alloc().unwrap();
        let mut frames = vec![
            EthernetFrame::build(first, None, ARP_ETHER_TYPE),
            EthernetFrame::build(second, None, ARP_ETHER_TYPE),
        ];
        assert_eq!(io.tx_burst(1, 0, &mut frames), 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(budget.available(), 0);

        // the frame that did not fit is handed back for the caller to free
        for frame in frames {
            io.free(frame.data);
        }
        assert_eq!(budget.available(), 1);

        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.port, 1);
        assert_eq!(sent.queue, 0);
    }

    #[test]
    fn failed_reuse_of_foreign_buffer_leaves_pool_alone() {
        let (wire, _rx) = channel::bounded(1);
        let budget = BufferBudget::new(2);
        let mut io = ChannelIo::new(wire, budget.clone());
        let filler = io.alloc().unwrap();
        let mut burst = vec![EthernetFrame::build(filler, None, ARP_ETHER_TYPE)];
        assert_eq!(io.tx_burst(1, 0, &mut burst), 1);

        // an answer written into a received buffer, with the wire full
        let mut replies = vec![EthernetFrame::build(vec![0; 60], None, ARP_ETHER_TYPE)];
        assert_eq!(io.tx_burst(1, 0, &mut replies), 0);
        assert_eq!(replies.len(), 1);
        drop(replies);
        assert_eq!(budget.available(), 1);
    }
}
