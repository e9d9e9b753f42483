use crate::addr::ProtocolAddr;
use crate::error::LlsError;
use crate::interface::PortId;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use lls_packets::MacAddr;
use std::time::Instant;

/// Identifies the core that placed a hold, so its resolution notices can be routed back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderId(pub u32);

/// A fact or request submitted to the cache owner. Addresses travel by value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModRequest<A: ProtocolAddr> {
    /// `addr` was seen at `mac` behind `port` at time `ts`.
    Learn {
        addr: A,
        mac: MacAddr,
        port: PortId,
        ts: Instant,
    },
    /// `holder` depends on the mapping of `addr`, to be resolved out `port`.
    Hold {
        addr: A,
        holder: HolderId,
        port: PortId,
    },
    /// `holder` no longer depends on `addr`.
    Release { addr: A, holder: HolderId },
}

impl<A: ProtocolAddr> ModRequest<A> {
    pub fn addr(&self) -> A {
        match *self {
            ModRequest::Learn { addr, .. }
            | ModRequest::Hold { addr, .. }
            | ModRequest::Release { addr, .. } => addr,
        }
    }
}

/// Creates the bounded path from any number of producers to the cache owner.
pub fn mod_channel<A: ProtocolAddr>(capacity: usize) -> (ModSender<A>, ModReceiver<A>) {
    let (tx, rx) = channel::bounded(capacity);
    (ModSender { tx }, ModReceiver { rx })
}

/// Producer end. Cheap to clone, one per submitting core.
#[derive(Clone, Debug)]
pub struct ModSender<A: ProtocolAddr> {
    tx: Sender<ModRequest<A>>,
}

impl<A: ProtocolAddr> ModSender<A> {
    /// Enqueues `req` without blocking. A full channel is reported right away so the
    /// caller's fast path never waits on the owner.
    pub fn submit(&self, req: ModRequest<A>) -> Result<(), LlsError> {
        self.tx.try_send(req).map_err(|err| match err {
            TrySendError::Full(_) => LlsError::ChannelFull,
            TrySendError::Disconnected(_) => LlsError::ChannelDisconnected,
        })
    }
}

/// Consumer end, owned by the cache owner. Not cloneable: draining it is what serializes
/// every cache mutation.
#[derive(Debug)]
pub struct ModReceiver<A: ProtocolAddr> {
    rx: Receiver<ModRequest<A>>,
}

impl<A: ProtocolAddr> ModReceiver<A> {
    /// Yields up to `max` requests that are already queued.
    pub fn drain(&self, max: usize) -> Drain<'_, A> {
        Drain {
            rx: &self.rx,
            remaining: max,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

pub struct Drain<'a, A: ProtocolAddr> {
    rx: &'a Receiver<ModRequest<A>>,
    remaining: usize,
}

impl<'a, A: ProtocolAddr> Iterator for Drain<'a, A> {
    type Item = ModRequest<A>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.rx.try_recv() {
            Ok(req) => {
                self.remaining -= 1;
                Some(req)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::thread;

    fn hold(last: u8, holder: u32) -> ModRequest<Ipv4Addr> {
        ModRequest::Hold {
            addr: Ipv4Addr::new(10, 0, 0, last),
            holder: HolderId(holder),
            port: 0,
        }
    }

    #[test]
    fn full_channel_fails_fast() {
        let (tx, rx) = mod_channel(2);
        assert!(tx.submit(hold(1, 0)).is_ok());
        assert!(tx.submit(hold(2, 0)).is_ok());
        assert!(matches!(tx.submit(hold(3, 0)), Err(LlsError::ChannelFull)));
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn disconnected_consumer() {
        let (tx, rx) = mod_channel::<Ipv4Addr>(2);
        drop(rx);
        assert!(matches!(
            tx.submit(hold(1, 0)),
            Err(LlsError::ChannelDisconnected)
        ));
    }

    #[test]
    fn drain_is_bounded() {
        let (tx, rx) = mod_channel(8);
        for i in 0..5 {
            tx.submit(hold(i, 0)).unwrap();
        }
        assert_eq!(rx.drain(3).count(), 3);
        assert_eq!(rx.drain(10).count(), 2);
        assert!(rx.is_empty());
    }

    #[test]
    fn per_producer_order_is_kept() {
        let (tx, rx) = mod_channel(1024);
        let producers: Vec<_> = (0..4)
            .map(|holder| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..100u8 {
                        tx.submit(hold(i, holder)).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut last_seen = [None::<u8>; 4];
        for req in rx.drain(usize::MAX) {
            if let ModRequest::Hold { addr, holder, .. } = req {
                let seq = addr.octets()[3];
                let slot = &mut last_seen[holder.0 as usize];
                assert!(slot.map_or(true, |prev| prev < seq));
                *slot = Some(seq);
            }
        }
        assert!(last_seen.iter().all(|seen| *seen == Some(99)));
    }
}
