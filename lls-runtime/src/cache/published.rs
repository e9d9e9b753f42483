use crate::addr::ProtocolAddr;
use crate::interface::PortId;
use arc_swap::{ArcSwap, ArcSwapOption};
use lls_packets::MacAddr;
use std::collections::HashMap;
use std::sync::Arc;

/// A resolved mapping as seen by readers. `stale` travels with the link address it qualifies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mapping<A: ProtocolAddr> {
    pub addr: A,
    pub mac: MacAddr,
    pub port: PortId,
    pub stale: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishedState {
    Resolved {
        mac: MacAddr,
        port: PortId,
        stale: bool,
    },
    Unresolved,
}

/// Immutable snapshot of one entry. A new one is swapped in on every change and never
/// modified afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Published<A: ProtocolAddr> {
    pub addr: A,
    pub state: PublishedState,
    pub generation: u64,
}

impl<A: ProtocolAddr> Published<A> {
    pub fn lookup(&self) -> Lookup<A> {
        match self.state {
            PublishedState::Resolved { mac, port, stale } => Lookup::Resolved(Mapping {
                addr: self.addr,
                mac,
                port,
                stale,
            }),
            PublishedState::Unresolved => Lookup::Unresolved,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup<A: ProtocolAddr> {
    Resolved(Mapping<A>),
    /// A placeholder exists and resolution is underway or pending.
    Unresolved,
    Absent,
}

/// Storage shared between the owner and its readers: a fixed arena of slots, and an index
/// from address to slot that is replaced wholesale whenever an address is added or removed.
pub(crate) struct Shared<A: ProtocolAddr> {
    slots: Vec<ArcSwapOption<Published<A>>>,
    index: ArcSwap<HashMap<A, usize>>,
}

impl<A: ProtocolAddr> Shared<A> {
    pub(crate) fn new(capacity: usize) -> Self {
        Shared {
            slots: (0..capacity).map(|_| ArcSwapOption::empty()).collect(),
            index: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub(crate) fn store(&self, slot: usize, record: Published<A>) {
        if let Some(cell) = self.slots.get(slot) {
            cell.store(Some(Arc::new(record)));
        }
    }

    pub(crate) fn clear(&self, slot: usize) {
        if let Some(cell) = self.slots.get(slot) {
            cell.store(None);
        }
    }

    pub(crate) fn publish_index(&self, index: HashMap<A, usize>) {
        self.index.store(Arc::new(index));
    }

    fn lookup(&self, addr: &A) -> Lookup<A> {
        let slot = match self.index.load().get(addr) {
            Some(slot) => *slot,
            None => return Lookup::Absent,
        };
        match self.slots.get(slot).map(|cell| cell.load_full()) {
            // The slot may have been reused for another address since the index was loaded.
            Some(Some(record)) if record.addr == *addr => record.lookup(),
            _ => Lookup::Absent,
        }
    }
}

/// Lock-free read handle on one cache. Clone one per worker core.
#[derive(Clone)]
pub struct CacheReader<A: ProtocolAddr> {
    shared: Arc<Shared<A>>,
}

impl<A: ProtocolAddr> CacheReader<A> {
    pub(crate) fn new(shared: Arc<Shared<A>>) -> Self {
        CacheReader { shared }
    }

    /// Two atomic loads, no locks. The answer may trail an in-flight mutation but is always
    /// a whole record.
    pub fn lookup(&self, addr: &A) -> Lookup<A> {
        self.shared.lookup(addr)
    }

    /// The raw snapshot, including its generation.
    pub fn snapshot(&self, addr: &A) -> Option<Arc<Published<A>>> {
        let slot = *self.shared.index.load().get(addr)?;
        let record = self.shared.slots.get(slot)?.load_full()?;
        if record.addr == *addr {
            Some(record)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn record(addr: Ipv4Addr, generation: u64) -> Published<Ipv4Addr> {
        Published {
            addr,
            state: PublishedState::Resolved {
                mac: MacAddr::new([2, 0, 0, 0, 0, generation as u8]),
                port: 1,
                stale: false,
            },
            generation,
        }
    }

    #[test]
    fn reused_slot_reads_absent_for_old_address() {
        let shared = Arc::new(Shared::new(1));
        let reader = CacheReader::new(shared.clone());
        let a = Ipv4Addr::new(10, 0, 0, 1);
        let b = Ipv4Addr::new(10, 0, 0, 2);

        shared.store(0, record(a, 1));
        let mut index = HashMap::new();
        index.insert(a, 0);
        shared.publish_index(index);
        assert!(matches!(reader.lookup(&a), Lookup::Resolved(_)));

        // b takes the slot before the index is republished
        shared.store(0, record(b, 2));
        assert_eq!(reader.lookup(&a), Lookup::Absent);
        assert_eq!(reader.lookup(&b), Lookup::Absent);
        assert!(reader.snapshot(&a).is_none());
    }

    #[test]
    fn cleared_slot_is_absent() {
        let shared = Arc::new(Shared::new(2));
        let reader = CacheReader::new(shared.clone());
        let a = Ipv4Addr::new(10, 0, 0, 1);
        shared.store(1, record(a, 7));
        let mut index = HashMap::new();
        index.insert(a, 1);
        shared.publish_index(index);
        assert_eq!(reader.snapshot(&a).map(|r| r.generation), Some(7));

        shared.clear(1);
        assert_eq!(reader.lookup(&a), Lookup::Absent);
    }
}
