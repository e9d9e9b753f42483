use crate::error::LlsError;
use std::time::Duration;

/// Sizing and timing of one protocol family's cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries, resolved or not.
    pub capacity: usize,
    /// Width of the cache key in bytes. Must equal the family's address width.
    pub key_len: usize,
    /// How long a confirmed mapping stays fresh.
    pub ttl: Duration,
    /// How long before expiry a held mapping is refreshed.
    pub refresh_lead: Duration,
}

impl CacheConfig {
    pub fn new(key_len: usize) -> Self {
        CacheConfig {
            capacity: 1024,
            key_len,
            ttl: Duration::from_secs(300),
            refresh_lead: Duration::from_secs(15),
        }
    }

    pub fn capacity(self, capacity: usize) -> Self {
        CacheConfig { capacity, ..self }
    }

    pub fn ttl(self, ttl: Duration) -> Self {
        CacheConfig { ttl, ..self }
    }

    pub fn refresh_lead(self, refresh_lead: Duration) -> Self {
        CacheConfig {
            refresh_lead,
            ..self
        }
    }

    fn validate(&self) -> Result<(), LlsError> {
        if self.capacity == 0 {
            return Err(LlsError::InvalidConfig("cache capacity must be non-zero"));
        }
        if self.ttl == Duration::from_secs(0) {
            return Err(LlsError::InvalidConfig("cache ttl must be non-zero"));
        }
        if self.refresh_lead >= self.ttl {
            return Err(LlsError::InvalidConfig(
                "refresh lead must be shorter than the ttl",
            ));
        }
        Ok(())
    }
}

/// Configuration of the owning core. Exact capacities and timers are deployment decisions,
/// so everything here is tunable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlsConfig {
    pub arp: CacheConfig,
    pub nd: CacheConfig,
    /// Requests sent per resolution before holders are told it failed.
    pub max_attempts: u32,
    /// Minimum spacing between two requests for the same address.
    pub retry_interval: Duration,
    /// Period of the aging sweep.
    pub aging_interval: Duration,
    /// Capacity of each family's modification channel.
    pub mod_channel_capacity: usize,
    /// Modification requests applied per loop iteration, per family.
    pub drain_batch: usize,
    /// Inbound protocol packets processed per loop iteration.
    pub rx_burst: usize,
    /// Capacity of each holder's notice queue.
    pub notice_capacity: usize,
    /// Period of the diagnostic cache dump. `None` disables it.
    pub dump_interval: Option<Duration>,
}

impl Default for LlsConfig {
    fn default() -> Self {
        LlsConfig {
            arp: CacheConfig::new(4),
            nd: CacheConfig::new(16),
            max_attempts: 5,
            retry_interval: Duration::from_secs(1),
            aging_interval: Duration::from_secs(1),
            mod_channel_capacity: 512,
            drain_batch: 32,
            rx_burst: 32,
            notice_capacity: 64,
            dump_interval: None,
        }
    }
}

impl LlsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arp(self, arp: CacheConfig) -> Self {
        LlsConfig { arp, ..self }
    }

    pub fn nd(self, nd: CacheConfig) -> Self {
        LlsConfig { nd, ..self }
    }

    pub fn max_attempts(self, max_attempts: u32) -> Self {
        LlsConfig {
            max_attempts,
            ..self
        }
    }

    pub fn retry_interval(self, retry_interval: Duration) -> Self {
        LlsConfig {
            retry_interval,
            ..self
        }
    }

    pub fn aging_interval(self, aging_interval: Duration) -> Self {
        LlsConfig {
            aging_interval,
            ..self
        }
    }

    pub fn mod_channel_capacity(self, mod_channel_capacity: usize) -> Self {
        LlsConfig {
            mod_channel_capacity,
            ..self
        }
    }

    pub fn drain_batch(self, drain_batch: usize) -> Self {
        LlsConfig {
            drain_batch,
            ..self
        }
    }

    pub fn rx_burst(self, rx_burst: usize) -> Self {
        LlsConfig { rx_burst, ..self }
    }

    pub fn notice_capacity(self, notice_capacity: usize) -> Self {
        LlsConfig {
            notice_capacity,
            ..self
        }
    }

    pub fn dump_interval(self, dump_interval: Option<Duration>) -> Self {
        LlsConfig {
            dump_interval,
            ..self
        }
    }

    /// Rejects values the owning core cannot run with. Key widths are checked when each
    /// cache is built, against the family it serves.
    pub fn validate(&self) -> Result<(), LlsError> {
        self.arp.validate()?;
        self.nd.validate()?;
        if self.max_attempts == 0 {
            return Err(LlsError::InvalidConfig("max_attempts must be at least 1"));
        }
        if self.mod_channel_capacity == 0 {
            return Err(LlsError::InvalidConfig(
                "modification channel capacity must be non-zero",
            ));
        }
        if self.drain_batch == 0 || self.rx_burst == 0 {
            return Err(LlsError::InvalidConfig(
                "drain batch and rx burst must be non-zero",
            ));
        }
        if self.notice_capacity == 0 {
            return Err(LlsError::InvalidConfig("notice capacity must be non-zero"));
        }
        if self.aging_interval == Duration::from_secs(0) {
            return Err(LlsError::InvalidConfig("aging interval must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(LlsConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_attempts() {
        let config = LlsConfig::new().max_attempts(0);
        assert!(matches!(
            config.validate(),
            Err(LlsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_empty_bursts() {
        assert!(LlsConfig::new().rx_burst(0).validate().is_err());
        assert!(LlsConfig::new().drain_batch(0).validate().is_err());
        assert!(LlsConfig::new().notice_capacity(0).validate().is_err());
        assert!(LlsConfig::new().drain_batch(1).rx_burst(1).validate().is_ok());
    }

    #[test]
    fn rejects_refresh_lead_past_ttl() {
        let arp = CacheConfig::new(4)
            .ttl(Duration::from_secs(10))
            .refresh_lead(Duration::from_secs(10));
        assert!(LlsConfig::new().arp(arp).validate().is_err());
    }

    #[test]
    fn rejects_empty_cache() {
        let nd = CacheConfig::new(16).capacity(0);
        assert!(LlsConfig::new().nd(nd).validate().is_err());
    }
}
