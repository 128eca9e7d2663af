//! Auction Engine Configuration
//!
//! Every knob named in §6, with the spec's defaults. Structured like the
//! teacher's `RustCommerceSettings`: nested sub-structs, each with its own
//! `Default` impl, `Serialize + Deserialize` so the whole thing can be
//! loaded from a config file or overridden piecemeal.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ladder::LadderBand;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub lock: LockSettings,
    pub scheduler: SchedulerSettings,
    pub auction: AuctionSettings,
    pub rate_limits: RateLimitSettings,
    pub ladder: LadderSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock: LockSettings::default(),
            scheduler: SchedulerSettings::default(),
            auction: AuctionSettings::default(),
            rate_limits: RateLimitSettings::default(),
            ladder: LadderSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load defaults, then apply environment overrides (`AUCTION__*`), the
    /// way deployment configs in this ecosystem layer env vars over
    /// defaults rather than requiring a config file.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("AUCTION__LOCK_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                cfg.lock.timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("AUCTION__SCHEDULER_INTERVAL_MS") {
            if let Ok(ms) = v.parse() {
                cfg.scheduler.interval = Duration::from_millis(ms);
            }
        }
        if let Ok(v) = std::env::var("AUCTION__GRACE_PERIOD_MS") {
            if let Ok(ms) = v.parse() {
                cfg.scheduler.grace_period = Duration::from_millis(ms);
            }
        }

        cfg
    }
}

/// KeyedLock defaults (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(with = "duration_millis_mod")]
pub struct LockSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Scheduler defaults (§4.8, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub grace_period: Duration,
    pub bid_grace_period: Duration,
    pub ending_soon_throttle: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            grace_period: Duration::from_secs(60),
            bid_grace_period: Duration::from_secs(2),
            ending_soon_throttle: Duration::from_secs(30),
        }
    }
}

/// Auction-creation defaults (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionSettings {
    pub min_duration: Duration,
    pub ending_soon_threshold: Duration,
    pub max_amount_cents: i64,
}

impl Default for AuctionSettings {
    fn default() -> Self {
        Self {
            min_duration: Duration::from_secs(5 * 60),
            ending_soon_threshold: Duration::from_secs(60),
            max_amount_cents: 100_000_000,
        }
    }
}

/// Advisory rate limits (§6) — not core-critical, enforced at the HTTP edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub max_bids_per_minute: u32,
    pub max_requests_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_bids_per_minute: 10,
            max_requests_per_minute: 100,
        }
    }
}

/// The bid ladder table (§4.4), configurable rather than hardcoded so tests
/// can parameterize over alternate tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderSettings {
    pub bands: Vec<LadderBand>,
}

impl Default for LadderSettings {
    fn default() -> Self {
        Self {
            bands: crate::ladder::production_table(),
        }
    }
}

/// `Duration` doesn't serialize as milliseconds by default; this module
/// keeps `LockSettings` round-trippable through JSON/TOML config without
/// pulling in a whole separate crate for it.
mod duration_millis_mod {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(value: &LockSettings, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct Repr {
            timeout_ms: u64,
            max_retries: u32,
            retry_delay_ms: u64,
        }
        Repr {
            timeout_ms: value.timeout.as_millis() as u64,
            max_retries: value.max_retries,
            retry_delay_ms: value.retry_delay.as_millis() as u64,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<LockSettings, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Repr {
            timeout_ms: u64,
            max_retries: u32,
            retry_delay_ms: u64,
        }
        let repr = Repr::deserialize(deserializer)?;
        Ok(LockSettings {
            timeout: Duration::from_millis(repr.timeout_ms),
            max_retries: repr.max_retries,
            retry_delay: Duration::from_millis(repr.retry_delay_ms),
        })
    }
}
