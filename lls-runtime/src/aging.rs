use crate::addr::ProtocolAddr;
use crate::cache::{Cache, CacheEntry, CacheEvent};
use crate::transmitter::RetryPolicy;
use std::time::{Duration, Instant};
use tracing::debug;

/// What one sweep does with one entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Keep,
    Evict,
    Fail,
    Expire,
    Retransmit,
    Refresh,
    EndRefresh,
}

/// Periodic sweep over a cache. Ticks are coarse: an entry goes stale no earlier than its
/// ttl and is evicted at most one interval after that.
#[derive(Clone, Debug)]
pub struct AgingScheduler {
    interval: Duration,
    next_due: Instant,
}

impl AgingScheduler {
    pub fn new(interval: Duration, now: Instant) -> Self {
        AgingScheduler {
            interval,
            next_due: now + interval,
        }
    }

    pub fn due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Schedules the next tick. Missed ticks are not replayed.
    pub fn tick(&mut self, now: Instant) {
        self.next_due = now + self.interval;
    }

    pub fn sweep<A: ProtocolAddr>(
        &self,
        cache: &mut Cache<A>,
        now: Instant,
    ) -> Vec<CacheEvent<A>> {
        let ttl = cache.config().ttl;
        let refresh_lead = cache.config().refresh_lead;
        let retry = *cache.retry_policy();

        let plan: Vec<(A, Action)> = cache
            .entries()
            .map(|entry| (entry.addr(), decide(entry, now, ttl, refresh_lead, &retry)))
            .filter(|(_, action)| *action != Action::Keep)
            .collect();

        let mut events = Vec::new();
        for (addr, action) in plan {
            match action {
                Action::Keep => {}
                Action::Evict => {
                    debug!(family = cache.family(), %addr, "evicting expired entry");
                    cache.remove(&addr);
                }
                Action::Fail => {
                    debug!(family = cache.family(), %addr, "resolution failed");
                    events.extend(cache.fail(&addr));
                }
                Action::Expire => {
                    cache.mark_stale(&addr);
                    events.extend(cache.start_resolution(&addr, now, None));
                }
                Action::Retransmit => {
                    let dest = cache.entry(&addr).and_then(|e| e.fresh_mapping()).map(|m| m.mac);
                    events.extend(cache.retransmit(&addr, now, dest));
                }
                Action::Refresh => {
                    let dest = cache.entry(&addr).and_then(|e| e.mac());
                    events.extend(cache.start_resolution(&addr, now, dest));
                }
                Action::EndRefresh => {
                    debug!(family = cache.family(), %addr, "refresh unanswered");
                    cache.end_resolution(&addr);
                }
            }
        }
        events
    }
}

fn decide<A: ProtocolAddr>(
    entry: &CacheEntry<A>,
    now: Instant,
    ttl: Duration,
    refresh_lead: Duration,
    retry: &RetryPolicy,
) -> Action {
    let held = entry.hold_count() > 0;
    let age = entry
        .last_confirmed()
        .map(|confirmed| now.saturating_duration_since(confirmed));

    // a fresh mapping reaching its ttl goes stale first, whatever a refresh has used up
    if let (Some(_), false, Some(age)) = (entry.mac(), entry.is_stale(), age) {
        if age >= ttl {
            return if held { Action::Expire } else { Action::Evict };
        }
    }

    match entry.pending() {
        Some(pending) if pending.is_due(now) => {
            if !retry.exhausted(pending) {
                Action::Retransmit
            } else if entry.fresh_mapping().is_some() {
                // only a refresh can be in flight here; the mapping stays valid to its ttl
                Action::EndRefresh
            } else if held {
                Action::Fail
            } else {
                Action::Evict
            }
        }
        Some(_) => Action::Keep,
        None => {
            if entry.fresh_mapping().is_none() {
                if held {
                    Action::Keep
                } else {
                    Action::Evict
                }
            } else if held && age.map_or(false, |age| age + refresh_lead >= ttl) {
                Action::Refresh
            } else {
                Action::Keep
            }
        }
    }
}
