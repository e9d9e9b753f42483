//! The resolution cache of one protocol family.
//!
//! All mutation happens on the owning core through [`Cache::apply`] and the aging sweep. Every
//! change to an entry is published as a fresh immutable [`Published`] record, so readers on
//! other cores holding a [`CacheReader`] see either the old record or the new one.

mod published;
pub use self::published::{CacheReader, Lookup, Mapping, Published, PublishedState};

use self::published::Shared;
use crate::addr::ProtocolAddr;
use crate::channel::{HolderId, ModRequest};
use crate::config::CacheConfig;
use crate::error::LlsError;
use crate::interface::PortId;
use crate::transmitter::{Pending, RetryPolicy};
use lls_packets::MacAddr;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Outcome of a resolution, delivered to each holder of the address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution<A: ProtocolAddr> {
    Resolved(Mapping<A>),
    Failed(A),
}

/// Work the owning core has to carry out after a cache mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheEvent<A: ProtocolAddr> {
    /// Send a resolution request for `addr` out `port`, to `dest` or broadcast when `None`.
    Resolve {
        addr: A,
        port: PortId,
        dest: Option<MacAddr>,
    },
    Notify {
        holder: HolderId,
        notice: Resolution<A>,
    },
}

/// Owner-side state of one address.
#[derive(Clone, Debug)]
pub struct CacheEntry<A: ProtocolAddr> {
    addr: A,
    mac: Option<MacAddr>,
    port: PortId,
    stale: bool,
    holders: Vec<HolderId>,
    last_confirmed: Option<Instant>,
    pending: Option<Pending>,
    generation: u64,
    slot: usize,
}

impl<A: ProtocolAddr> CacheEntry<A> {
    pub fn addr(&self) -> A {
        self.addr
    }

    pub fn mac(&self) -> Option<MacAddr> {
        self.mac
    }

    pub fn port(&self) -> PortId {
        self.port
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn hold_count(&self) -> usize {
        self.holders.len()
    }

    pub fn last_confirmed(&self) -> Option<Instant> {
        self.last_confirmed
    }

    pub fn pending(&self) -> Option<&Pending> {
        self.pending.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The mapping, if one is known and not stale.
    pub fn fresh_mapping(&self) -> Option<Mapping<A>> {
        match self.mac {
            Some(mac) if !self.stale => Some(Mapping {
                addr: self.addr,
                mac,
                port: self.port,
                stale: false,
            }),
            _ => None,
        }
    }

    fn published(&self) -> Published<A> {
        let state = match self.mac {
            Some(mac) => PublishedState::Resolved {
                mac,
                port: self.port,
                stale: self.stale,
            },
            None => PublishedState::Unresolved,
        };
        Published {
            addr: self.addr,
            state,
            generation: self.generation,
        }
    }

    fn publish(&mut self, shared: &Shared<A>) {
        self.generation += 1;
        shared.store(self.slot, self.published());
    }

    /// Each holder once, however many holds it placed.
    fn distinct_holders(&self) -> Vec<HolderId> {
        let mut holders = self.holders.clone();
        holders.sort();
        holders.dedup();
        holders
    }
}

pub struct Cache<A: ProtocolAddr> {
    family: &'static str,
    config: CacheConfig,
    retry: RetryPolicy,
    entries: HashMap<A, CacheEntry<A>>,
    free: Vec<usize>,
    shared: Arc<Shared<A>>,
    index_version: u64,
}

impl<A: ProtocolAddr> Cache<A> {
    /// Builds an empty cache. The configured key width has to match the address family.
    pub fn new(
        family: &'static str,
        config: CacheConfig,
        retry: RetryPolicy,
    ) -> Result<Self, LlsError> {
        if config.key_len != A::LEN {
            error!(
                family,
                key_len = config.key_len,
                addr_len = A::LEN,
                "cache key width does not match the address family"
            );
            return Err(LlsError::KeyWidthMismatch {
                family,
                expected: A::LEN,
                configured: config.key_len,
            });
        }
        if config.capacity == 0 {
            return Err(LlsError::InvalidConfig("cache capacity must be non-zero"));
        }

        Ok(Cache {
            family,
            free: (0..config.capacity).rev().collect(),
            shared: Arc::new(Shared::new(config.capacity)),
            entries: HashMap::with_capacity(config.capacity),
            index_version: 0,
            config,
            retry,
        })
    }

    pub fn reader(&self) -> CacheReader<A> {
        CacheReader::new(self.shared.clone())
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, addr: &A) -> Option<&CacheEntry<A>> {
        self.entries.get(addr)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry<A>> {
        self.entries.values()
    }

    /// Applies one modification request.
    ///
    /// Fails only when a new entry is needed and every entry is held. The caller owns the
    /// consequences, such as failing the hold that could not be placed.
    pub fn apply(
        &mut self,
        req: ModRequest<A>,
        now: Instant,
    ) -> Result<Vec<CacheEvent<A>>, LlsError> {
        let mut events = Vec::new();
        match req {
            ModRequest::Learn {
                addr,
                mac,
                port,
                ts,
            } => self.learn(addr, mac, port, ts, &mut events)?,
            ModRequest::Hold { addr, holder, port } => {
                self.hold(addr, holder, port, now, &mut events)?
            }
            ModRequest::Release { addr, holder } => self.release(addr, holder),
        }
        Ok(events)
    }

    fn learn(
        &mut self,
        addr: A,
        mac: MacAddr,
        port: PortId,
        ts: Instant,
        events: &mut Vec<CacheEvent<A>>,
    ) -> Result<(), LlsError> {
        if !self.entries.contains_key(&addr) {
            self.insert(addr, port)?;
        }
        let shared = &self.shared;
        let entry = match self.entries.get_mut(&addr) {
            Some(entry) => entry,
            None => return Ok(()),
        };

        let changed = entry.stale || entry.mac != Some(mac) || entry.port != port;
        entry.mac = Some(mac);
        entry.port = port;
        entry.stale = false;
        entry.pending = None;
        entry.last_confirmed = Some(ts);
        entry.publish(shared);

        if changed {
            if let Some(mapping) = entry.fresh_mapping() {
                for holder in entry.distinct_holders() {
                    events.push(CacheEvent::Notify {
                        holder,
                        notice: Resolution::Resolved(mapping),
                    });
                }
            }
        }
        Ok(())
    }

    fn hold(
        &mut self,
        addr: A,
        holder: HolderId,
        port: PortId,
        now: Instant,
        events: &mut Vec<CacheEvent<A>>,
    ) -> Result<(), LlsError> {
        if !self.entries.contains_key(&addr) {
            self.insert(addr, port)?;
        }
        let retry = self.retry;
        let entry = match self.entries.get_mut(&addr) {
            Some(entry) => entry,
            None => return Ok(()),
        };

        entry.holders.push(holder);
        if let Some(mapping) = entry.fresh_mapping() {
            events.push(CacheEvent::Notify {
                holder,
                notice: Resolution::Resolved(mapping),
            });
        } else if entry.pending.is_none() {
            if entry.mac.is_none() {
                entry.port = port;
            }
            entry.pending = Some(retry.first(now, false));
            events.push(CacheEvent::Resolve {
                addr,
                port: entry.port,
                dest: None,
            });
        } else {
            debug!(family = self.family, %addr, "resolution already in flight");
        }
        Ok(())
    }

    fn release(&mut self, addr: A, holder: HolderId) {
        if let Some(entry) = self.entries.get_mut(&addr) {
            if let Some(pos) = entry.holders.iter().position(|h| *h == holder) {
                entry.holders.remove(pos);
            }
        }
    }

    /// Creates an unresolved placeholder, evicting an unheld entry if the cache is full. The
    /// index is published once, covering both the eviction and the insertion.
    fn insert(&mut self, addr: A, port: PortId) -> Result<(), LlsError> {
        if self.free.is_empty() && !self.evict_one() {
            warn!(family = self.family, %addr, "cache full, every entry is held");
            return Err(LlsError::CacheFull(self.family));
        }
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => return Err(LlsError::CacheFull(self.family)),
        };

        let mut entry = CacheEntry {
            addr,
            mac: None,
            port,
            stale: true,
            holders: Vec::new(),
            last_confirmed: None,
            pending: None,
            generation: 0,
            slot,
        };
        entry.publish(&self.shared);
        self.entries.insert(addr, entry);
        self.publish_index();
        Ok(())
    }

    /// Evicts the unheld entry confirmed longest ago. Never-confirmed placeholders go first.
    fn evict_one(&mut self) -> bool {
        let victim = self
            .entries
            .values()
            .filter(|entry| entry.holders.is_empty())
            .min_by_key(|entry| entry.last_confirmed)
            .map(|entry| entry.addr);
        match victim {
            Some(addr) => {
                debug!(family = self.family, %addr, "evicting to make room");
                self.detach(&addr).is_some()
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, addr: &A) -> Option<CacheEntry<A>> {
        let entry = self.detach(addr)?;
        self.publish_index();
        Some(entry)
    }

    /// Frees the slot of `addr` without republishing the index. Readers still holding the old
    /// index find the slot empty or reused, and see the address as absent.
    fn detach(&mut self, addr: &A) -> Option<CacheEntry<A>> {
        let entry = self.entries.remove(addr)?;
        self.shared.clear(entry.slot);
        self.free.push(entry.slot);
        Some(entry)
    }

    fn publish_index(&mut self) {
        let index = self
            .entries
            .iter()
            .map(|(addr, entry)| (*addr, entry.slot))
            .collect();
        self.shared.publish_index(index);
        self.index_version += 1;
    }

    /// Number of times the address index has been republished.
    pub fn index_version(&self) -> u64 {
        self.index_version
    }

    /// Evicts `addr` after telling each of its holders the resolution failed.
    pub(crate) fn fail(&mut self, addr: &A) -> Vec<CacheEvent<A>> {
        match self.remove(addr) {
            Some(entry) => entry
                .distinct_holders()
                .into_iter()
                .map(|holder| CacheEvent::Notify {
                    holder,
                    notice: Resolution::Failed(entry.addr),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn mark_stale(&mut self, addr: &A) {
        let shared = &self.shared;
        if let Some(entry) = self.entries.get_mut(addr) {
            entry.stale = true;
            entry.publish(shared);
        }
    }

    /// Starts a new resolution of `addr`, replacing any retry state.
    pub(crate) fn start_resolution(
        &mut self,
        addr: &A,
        now: Instant,
        dest: Option<MacAddr>,
    ) -> Option<CacheEvent<A>> {
        let retry = self.retry;
        let entry = self.entries.get_mut(addr)?;
        entry.pending = Some(retry.first(now, dest.is_some()));
        Some(CacheEvent::Resolve {
            addr: entry.addr,
            port: entry.port,
            dest,
        })
    }

    /// Drops the retry state of `addr`, leaving its mapping as it is.
    pub(crate) fn end_resolution(&mut self, addr: &A) {
        if let Some(entry) = self.entries.get_mut(addr) {
            entry.pending = None;
        }
    }

    /// Counts another attempt of the resolution in flight.
    pub(crate) fn retransmit(
        &mut self,
        addr: &A,
        now: Instant,
        dest: Option<MacAddr>,
    ) -> Option<CacheEvent<A>> {
        let retry = self.retry;
        let entry = self.entries.get_mut(addr)?;
        let pending = entry.pending.as_ref()?;
        entry.pending = Some(retry.next(pending, now, dest.is_some()));
        Some(CacheEvent::Resolve {
            addr: entry.addr,
            port: entry.port,
            dest,
        })
    }

    pub fn dump(&self) -> CacheDump<A> {
        let mut records: Vec<DumpRecord<A>> = self
            .entries
            .values()
            .map(|entry| DumpRecord {
                addr: entry.addr,
                mapping: entry.fresh_mapping().map(|m| (m.mac, m.port)),
                holds: entry.hold_count(),
            })
            .collect();
        records.sort_by_key(|record| record.addr);
        CacheDump {
            family: self.family,
            records,
        }
    }
}

/// One line of a cache dump. Stale mappings are rendered as unresolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpRecord<A: ProtocolAddr> {
    pub addr: A,
    pub mapping: Option<(MacAddr, PortId)>,
    pub holds: usize,
}

impl<A: ProtocolAddr> fmt::Display for DumpRecord<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mapping {
            Some((mac, port)) => write!(
                f,
                "{}: {} (port {}) ({} holds)",
                self.addr, mac, port, self.holds
            ),
            None => write!(f, "{}: unresolved ({} holds)", self.addr, self.holds),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CacheDump<A: ProtocolAddr> {
    pub family: &'static str,
    pub records: Vec<DumpRecord<A>>,
}

impl<A: ProtocolAddr> fmt::Display for CacheDump<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    fn cache(capacity: usize) -> Cache<Ipv4Addr> {
        Cache::new(
            "arp",
            CacheConfig::new(4).capacity(capacity),
            RetryPolicy::new(3, Duration::from_secs(1)),
        )
        .unwrap()
    }

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([2, 0, 0, 0, 0, last])
    }

    fn learn(addr: Ipv4Addr, mac: MacAddr, ts: Instant) -> ModRequest<Ipv4Addr> {
        ModRequest::Learn {
            addr,
            mac,
            port: 0,
            ts,
        }
    }

    fn hold(addr: Ipv4Addr, holder: u32) -> ModRequest<Ipv4Addr> {
        ModRequest::Hold {
            addr,
            holder: HolderId(holder),
            port: 0,
        }
    }

    fn release(addr: Ipv4Addr, holder: u32) -> ModRequest<Ipv4Addr> {
        ModRequest::Release {
            addr,
            holder: HolderId(holder),
        }
    }

    #[test]
    fn key_width_must_match_family() {
        let config = CacheConfig::new(16);
        let retry = RetryPolicy::new(3, Duration::from_secs(1));
        let result = Cache::<Ipv4Addr>::new("arp", config, retry);
        assert!(matches!(
            result,
            Err(LlsError::KeyWidthMismatch {
                expected: 4,
                configured: 16,
                ..
            })
        ));
        assert!(Cache::<Ipv6Addr>::new("nd", CacheConfig::new(16), retry).is_ok());
    }

    #[test]
    fn learn_publishes_mapping() {
        let mut cache = cache(4);
        let reader = cache.reader();
        let now = Instant::now();

        assert_eq!(reader.lookup(&ip(1)), Lookup::Absent);
        let events = cache.apply(learn(ip(1), mac(1), now), now).unwrap();
        assert!(events.is_empty());
        assert_eq!(
            reader.lookup(&ip(1)),
            Lookup::Resolved(Mapping {
                addr: ip(1),
                mac: mac(1),
                port: 0,
                stale: false,
            })
        );
        assert_eq!(cache.entry(&ip(1)).unwrap().last_confirmed(), Some(now));
    }

    #[test]
    fn first_hold_requests_broadcast() {
        let mut cache = cache(4);
        let reader = cache.reader();
        let now = Instant::now();

        let events = cache.apply(hold(ip(3), 1), now).unwrap();
        assert_eq!(
            events,
            vec![CacheEvent::Resolve {
                addr: ip(3),
                port: 0,
                dest: None,
            }]
        );
        assert_eq!(reader.lookup(&ip(3)), Lookup::Unresolved);
        let entry = cache.entry(&ip(3)).unwrap();
        assert_eq!(entry.hold_count(), 1);
        assert_eq!(entry.pending().map(|p| p.attempts), Some(1));
    }

    #[test]
    fn second_hold_is_coalesced() {
        let mut cache = cache(4);
        let now = Instant::now();

        cache.apply(hold(ip(3), 1), now).unwrap();
        let events = cache.apply(hold(ip(3), 2), now).unwrap();
        assert!(events.is_empty());
        assert_eq!(cache.entry(&ip(3)).unwrap().hold_count(), 2);
    }

    #[test]
    fn learn_satisfies_holders() {
        let mut cache = cache(4);
        let now = Instant::now();
        cache.apply(hold(ip(3), 1), now).unwrap();
        cache.apply(hold(ip(3), 2), now).unwrap();

        let events = cache.apply(learn(ip(3), mac(3), now), now).unwrap();
        let mapping = Mapping {
            addr: ip(3),
            mac: mac(3),
            port: 0,
            stale: false,
        };
        assert_eq!(
            events,
            vec![
                CacheEvent::Notify {
                    holder: HolderId(1),
                    notice: Resolution::Resolved(mapping),
                },
                CacheEvent::Notify {
                    holder: HolderId(2),
                    notice: Resolution::Resolved(mapping),
                },
            ]
        );
        assert!(cache.entry(&ip(3)).unwrap().pending().is_none());

        // confirming the same mapping again is not news
        let events = cache.apply(learn(ip(3), mac(3), now), now).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn hold_on_resolved_notifies_at_once() {
        let mut cache = cache(4);
        let now = Instant::now();
        cache.apply(learn(ip(5), mac(5), now), now).unwrap();

        let events = cache.apply(hold(ip(5), 9), now).unwrap();
        assert!(matches!(
            events.as_slice(),
            [CacheEvent::Notify {
                holder: HolderId(9),
                notice: Resolution::Resolved(_),
            }]
        ));
    }

    #[test]
    fn hold_release_balance() {
        let mut cache = cache(4);
        let now = Instant::now();
        for _ in 0..5 {
            cache.apply(hold(ip(7), 1), now).unwrap();
        }
        assert_eq!(cache.entry(&ip(7)).unwrap().hold_count(), 5);
        for _ in 0..5 {
            cache.apply(release(ip(7), 1), now).unwrap();
        }
        assert_eq!(cache.entry(&ip(7)).unwrap().hold_count(), 0);

        // floored at zero
        cache.apply(release(ip(7), 1), now).unwrap();
        assert_eq!(cache.entry(&ip(7)).unwrap().hold_count(), 0);
    }

    #[test]
    fn eviction_spares_held_entries() {
        let mut cache = cache(2);
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);

        cache.apply(learn(ip(1), mac(1), t0), t0).unwrap();
        cache.apply(hold(ip(1), 1), t0).unwrap();
        cache.apply(learn(ip(2), mac(2), t1), t1).unwrap();

        // ip(1) is older but held, so ip(2) makes room
        cache.apply(learn(ip(3), mac(3), t1), t1).unwrap();
        assert!(cache.entry(&ip(1)).is_some());
        assert!(cache.entry(&ip(2)).is_none());
        assert!(cache.entry(&ip(3)).is_some());

        cache.apply(hold(ip(3), 1), t1).unwrap();
        let full = cache.apply(learn(ip(4), mac(4), t1), t1);
        assert!(matches!(full, Err(LlsError::CacheFull("arp"))));
        let full = cache.apply(hold(ip(4), 1), t1);
        assert!(matches!(full, Err(LlsError::CacheFull("arp"))));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn eviction_republishes_index_once() {
        let mut cache = cache(2);
        let reader = cache.reader();
        let t0 = Instant::now();
        cache.apply(learn(ip(1), mac(1), t0), t0).unwrap();
        cache.apply(learn(ip(2), mac(2), t0), t0).unwrap();
        assert_eq!(cache.index_version(), 2);

        // confirming a known address leaves the index alone
        let later = t0 + Duration::from_millis(500);
        cache.apply(learn(ip(2), mac(2), later), later).unwrap();
        assert_eq!(cache.index_version(), 2);

        let t1 = t0 + Duration::from_secs(1);
        cache.apply(learn(ip(3), mac(3), t1), t1).unwrap();
        assert_eq!(cache.index_version(), 3);
        assert_eq!(reader.lookup(&ip(1)), Lookup::Absent);
        assert!(matches!(reader.lookup(&ip(3)), Lookup::Resolved(_)));
        assert!(matches!(reader.lookup(&ip(2)), Lookup::Resolved(_)));
    }

    #[test]
    fn eviction_prefers_oldest_confirmation() {
        let mut cache = cache(3);
        let t0 = Instant::now();
        cache
            .apply(learn(ip(1), mac(1), t0 + Duration::from_secs(5)), t0)
            .unwrap();
        cache.apply(learn(ip(2), mac(2), t0), t0).unwrap();
        cache
            .apply(learn(ip(3), mac(3), t0 + Duration::from_secs(9)), t0)
            .unwrap();

        cache.apply(learn(ip(4), mac(4), t0), t0).unwrap();
        assert!(cache.entry(&ip(2)).is_none());
        assert_eq!(cache.reader().lookup(&ip(2)), Lookup::Absent);
    }

    #[test]
    fn failure_notifies_each_holder_once() {
        let mut cache = cache(4);
        let now = Instant::now();
        cache.apply(hold(ip(3), 1), now).unwrap();
        cache.apply(hold(ip(3), 1), now).unwrap();
        cache.apply(hold(ip(3), 2), now).unwrap();

        let events = cache.fail(&ip(3));
        assert_eq!(
            events,
            vec![
                CacheEvent::Notify {
                    holder: HolderId(1),
                    notice: Resolution::Failed(ip(3)),
                },
                CacheEvent::Notify {
                    holder: HolderId(2),
                    notice: Resolution::Failed(ip(3)),
                },
            ]
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_entries_keep_their_mac_for_readers() {
        let mut cache = cache(4);
        let reader = cache.reader();
        let now = Instant::now();
        cache.apply(learn(ip(1), mac(1), now), now).unwrap();
        let before = reader.snapshot(&ip(1)).unwrap().generation;

        cache.mark_stale(&ip(1));
        match reader.lookup(&ip(1)) {
            Lookup::Resolved(mapping) => {
                assert!(mapping.stale);
                assert_eq!(mapping.mac, mac(1));
            }
            other => panic!("unexpected lookup {:?}", other),
        }
        assert!(reader.snapshot(&ip(1)).unwrap().generation > before);
    }

    #[test]
    fn dump_format() {
        let mut cache = cache(4);
        let now = Instant::now();
        cache
            .apply(
                ModRequest::Learn {
                    addr: ip(1),
                    mac: MacAddr::new([0x52, 0x54, 0, 0xab, 0xcd, 0x01]),
                    port: 2,
                    ts: now,
                },
                now,
            )
            .unwrap();
        cache.apply(hold(ip(1), 1), now).unwrap();
        cache.apply(hold(ip(9), 1), now).unwrap();
        cache.apply(hold(ip(9), 2), now).unwrap();

        assert_eq!(
            cache.dump().to_string(),
            "10.0.0.1: 52:54:00:ab:cd:01 (port 2) (1 holds)\n10.0.0.9: unresolved (2 holds)\n"
        );
    }

    #[test]
    fn stale_mapping_dumps_as_unresolved() {
        let mut cache = cache(4);
        let now = Instant::now();
        cache.apply(learn(ip(4), mac(4), now), now).unwrap();
        cache.mark_stale(&ip(4));
        assert_eq!(cache.dump().to_string(), "10.0.0.4: unresolved (0 holds)\n");
    }

    #[test]
    fn concurrent_reader_never_sees_torn_record() {
        let mut cache = cache(8);
        let reader = cache.reader();
        let done = Arc::new(AtomicBool::new(false));
        let addr = ip(42);

        let observer = {
            let done = done.clone();
            thread::spawn(move || {
                let mut last_generation = 0;
                while !done.load(Ordering::Acquire) {
                    if let Some(record) = reader.snapshot(&addr) {
                        assert!(record.generation >= last_generation);
                        last_generation = record.generation;
                        if let PublishedState::Resolved { mac, port, .. } = record.state {
                            // every learned mac encodes the port it was learned on
                            assert_eq!(u16::from(mac.bytes[4]), port);
                        }
                    }
                }
            })
        };

        let mut rng = rand::thread_rng();
        let now = Instant::now();
        for _ in 0..20_000 {
            let port: u8 = rng.gen();
            if rng.gen_bool(0.2) {
                cache.mark_stale(&addr);
            }
            cache
                .apply(
                    ModRequest::Learn {
                        addr,
                        mac: MacAddr::new([2, 0, 0, 0, port, 0]),
                        port: u16::from(port),
                        ts: now,
                    },
                    now,
                )
                .unwrap();
        }
        done.store(true, Ordering::Release);
        observer.join().unwrap();
    }
}
