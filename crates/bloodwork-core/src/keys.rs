//! API key rotation under a per-key sliding quota window.
//!
//! Every completion call must first lease a key. A lease picks the key with
//! the fewest calls in its current window among those still under the quota
//! ceiling, ties going to the earliest key in pool order. When every key is
//! saturated the caller waits until the oldest window rolls over and tries
//! again; saturation is never surfaced as an error.
//!
//! ```text
//! lease() ──lock──> roll expired windows ──> pick least-used key under quota
//!                                               │            │
//!                                          found│            │none
//!                                               v            v
//!                                 increment + unlock    unlock, sleep until
//!                                 return Lease          oldest window resets,
//!                                                       retry
//! ```
//!
//! Selection and increment happen inside one critical section, so two
//! concurrent callers can never both take the last slot of a key.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

/// Quota applied to every key in the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyQuota {
    /// Maximum leases per key within one window.
    pub max_calls: u32,
    /// Length of the quota window.
    pub window: Duration,
}

impl Default for KeyQuota {
    /// 39 calls per minute: one below a 40/min provider limit.
    fn default() -> Self {
        Self {
            max_calls: 39,
            window: Duration::from_secs(60),
        }
    }
}

struct KeySlot {
    api_key: String,
    calls: u32,
    window_start: Instant,
}

/// Permission to make exactly one call with the contained key.
#[derive(Clone)]
pub struct Lease {
    slot: usize,
    api_key: String,
}

impl Lease {
    /// Position of the leased key in the pool.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("slot", &self.slot)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Per-key usage snapshot for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUsage {
    pub slot: usize,
    pub calls: u32,
    pub window_remaining: Duration,
}

/// Thread-safe pool of API keys with least-used selection.
#[derive(Clone)]
pub struct KeyManager {
    quota: KeyQuota,
    slots: Arc<Mutex<Vec<KeySlot>>>,
}

impl KeyManager {
    pub fn new(api_keys: Vec<String>, quota: KeyQuota) -> Result<Self, AppError> {
        if api_keys.is_empty() {
            return Err(AppError::ConfigError(
                "At least one API key is required".into(),
            ));
        }
        if quota.max_calls == 0 {
            return Err(AppError::ConfigError(
                "Key quota must allow at least one call per window".into(),
            ));
        }
        if quota.window.is_zero() {
            return Err(AppError::ConfigError(
                "Key quota window must be non-zero".into(),
            ));
        }

        let now = Instant::now();
        let slots = api_keys
            .into_iter()
            .map(|api_key| KeySlot {
                api_key,
                calls: 0,
                window_start: now,
            })
            .collect();

        Ok(Self {
            quota,
            slots: Arc::new(Mutex::new(slots)),
        })
    }

    /// Number of keys in the pool.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquires the slot lock, recovering from poison if necessary.
    fn lock_slots(&self) -> std::sync::MutexGuard<'_, Vec<KeySlot>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned key pool mutex");
            poisoned.into_inner()
        })
    }

    /// Single non-blocking selection attempt.
    ///
    /// Returns the lease on success, or how long to wait before the oldest
    /// window rolls over when every key is at its ceiling.
    pub fn try_lease(&self) -> Result<Lease, Duration> {
        let mut slots = self.lock_slots();
        let now = Instant::now();

        for slot in slots.iter_mut() {
            if now.duration_since(slot.window_start) >= self.quota.window {
                slot.calls = 0;
                slot.window_start = now;
            }
        }

        // Ties resolve to the first key in pool order.
        let selected = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.calls < self.quota.max_calls)
            .min_by_key(|(_, slot)| slot.calls)
            .map(|(idx, _)| idx);

        match selected {
            Some(idx) => {
                let slot = &mut slots[idx];
                slot.calls += 1;
                Ok(Lease {
                    slot: idx,
                    api_key: slot.api_key.clone(),
                })
            }
            None => {
                let oldest = slots
                    .iter()
                    .map(|slot| slot.window_start)
                    .min()
                    .unwrap_or(now);
                Err(self
                    .quota
                    .window
                    .saturating_sub(now.duration_since(oldest)))
            }
        }
    }

    /// Lease a key, waiting for quota to free up if every key is saturated.
    pub async fn lease(&self) -> Lease {
        loop {
            match self.try_lease() {
                Ok(lease) => return lease,
                Err(wait) => self.back_off(wait).await,
            }
        }
    }

    /// Like [`lease`](Self::lease), but gives up when `cancel` fires.
    pub async fn lease_with_cancel(&self, cancel: &CancellationToken) -> Option<Lease> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            match self.try_lease() {
                Ok(lease) => return Some(lease),
                Err(wait) => {
                    tokio::select! {
                        () = self.back_off(wait) => {}
                        () = cancel.cancelled() => return None,
                    }
                }
            }
        }
    }

    async fn back_off(&self, wait: Duration) {
        tracing::debug!(
            wait_ms = %wait.as_millis(),
            keys = self.len(),
            "All API keys at quota, waiting for window reset"
        );
        if wait.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(wait).await;
        }
    }

    /// Current call counts per key. Windows that have expired report zero.
    pub fn usage(&self) -> Vec<KeyUsage> {
        let slots = self.lock_slots();
        let now = Instant::now();
        slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| {
                let elapsed = now.duration_since(slot.window_start);
                let expired = elapsed >= self.quota.window;
                KeyUsage {
                    slot: idx,
                    calls: if expired { 0 } else { slot.calls },
                    window_remaining: self.quota.window.saturating_sub(elapsed),
                }
            })
            .collect()
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("keys", &self.len())
            .field("quota", &self.quota)
            .finish()
    }
}
