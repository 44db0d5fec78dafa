use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::symbol_resolver::ProviderId;

/// Last-known prices keyed by provider id.
///
/// Freshness is tracked for the store as a whole: `last_refreshed` moves
/// forward on every `bulk_put`, which re-validates every entry already held,
/// including ones the write did not touch.
#[derive(Debug, Clone)]
pub struct PriceCache {
    entries: HashMap<ProviderId, f64>,
    last_refreshed: DateTime<Utc>,
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceCache {
    /// Empty cache whose clock starts at the Unix epoch, i.e. already stale.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            last_refreshed: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn is_valid(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.last_refreshed < ttl
    }

    /// Stored price regardless of freshness; check `is_valid` before trusting it.
    pub fn get(&self, id: ProviderId) -> Option<f64> {
        self.entries.get(&id).copied()
    }

    /// Merges `prices` and moves the shared clock up to `now`, even when
    /// `prices` is empty. A write stamped earlier than the current clock
    /// never moves it back.
    pub fn bulk_put(
        &mut self,
        prices: impl IntoIterator<Item = (ProviderId, f64)>,
        now: DateTime<Utc>,
    ) {
        self.entries.extend(prices);
        self.last_refreshed = self.last_refreshed.max(now);
    }

    pub fn last_refreshed(&self) -> DateTime<Utc> {
        self.last_refreshed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
