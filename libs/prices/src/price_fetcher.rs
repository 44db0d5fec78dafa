use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    price_cache::PriceCache,
    price_client::{PriceProvider, ProviderError, join_ids},
    symbol_resolver::{ProviderId, SymbolResolver, TickerSymbol, resolver},
};

pub const NO_VALID_SYMBOLS: &str = "No valid crypto symbols provided";
pub const RATE_LIMIT_WARNING: &str = "Rate limit reached, showing cached prices";

/// Outcome of one `fetch_prices` call. Failures are reported in `errors`;
/// an empty `prices` map with errors is the only "no data" outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    pub prices: BTreeMap<TickerSymbol, f64>,
    pub from_cache: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl FetchResult {
    fn no_valid_symbols() -> Self {
        Self {
            errors: vec![NO_VALID_SYMBOLS.to_string()],
            ..Default::default()
        }
    }

    pub fn is_hard_miss(&self) -> bool {
        self.prices.is_empty() && !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub entries: usize,
    pub last_refreshed: DateTime<Utc>,
    pub valid: bool,
}

type Pair = (TickerSymbol, ProviderId);
type FlightOutcome = Result<Arc<HashMap<ProviderId, f64>>, ProviderError>;

#[derive(Clone)]
struct Flight {
    id: u64,
    outcome: watch::Receiver<Option<FlightOutcome>>,
}

#[derive(Default)]
struct Shared {
    cache: PriceCache,
    in_flight: HashMap<ProviderId, Flight>,
    next_flight: u64,
}

struct Lead {
    flight: u64,
    tx: watch::Sender<Option<FlightOutcome>>,
    pairs: Vec<Pair>,
}

struct Plan {
    cached: BTreeMap<TickerSymbol, f64>,
    lead: Option<Lead>,
    joined: Vec<(Flight, Vec<Pair>)>,
}

/// Resolves symbols, serves them from the shared cache and batches misses
/// into a single provider call.
///
/// At most one provider request per id is outstanding at a time: a caller
/// that needs an id someone else is already fetching waits for that
/// request instead of issuing its own.
pub struct PriceFetcher<P> {
    provider: P,
    resolver: &'static SymbolResolver,
    cache_ttl: Duration,
    shared: Mutex<Shared>,
}

impl<P: PriceProvider> PriceFetcher<P> {
    pub fn new(provider: P, cache_ttl: Duration) -> Self {
        Self {
            provider,
            resolver: resolver(),
            cache_ttl,
            shared: Mutex::new(Shared::default()),
        }
    }

    pub fn supported_symbols(&self) -> Vec<TickerSymbol> {
        self.resolver.list_supported()
    }

    pub fn is_supported(&self, symbol: &str) -> bool {
        self.resolver.is_supported(symbol)
    }

    pub fn cache_status(&self, now: DateTime<Utc>) -> CacheStatus {
        let shared = self.lock();
        CacheStatus {
            entries: shared.cache.len(),
            last_refreshed: shared.cache.last_refreshed(),
            valid: shared.cache.is_valid(self.cache_ttl, now),
        }
    }

    /// Each element may hold several comma-separated symbols.
    pub async fn fetch_prices<S: AsRef<str>>(&self, raw: &[S]) -> FetchResult {
        self.fetch_prices_at(raw, Utc::now()).await
    }

    /// `fetch_prices` against an explicit clock reading.
    #[instrument(name = "fetch_prices", skip_all, fields(requested = raw.len()))]
    pub async fn fetch_prices_at<S: AsRef<str>>(
        &self,
        raw: &[S],
        now: DateTime<Utc>,
    ) -> FetchResult {
        let pairs = self.resolve_batch(raw);
        if pairs.is_empty() {
            debug!("no resolvable symbols in request");
            return FetchResult::no_valid_symbols();
        }

        let Plan {
            cached,
            lead,
            joined,
        } = self.plan(pairs, now);

        if lead.is_none() && joined.is_empty() {
            debug!(hits = cached.len(), "served from cache");
            return FetchResult {
                prices: cached,
                from_cache: true,
                errors: Vec::new(),
            };
        }

        let mut outcomes = Vec::with_capacity(joined.len() + 1);

        if let Some(lead) = lead {
            let pairs = lead.pairs.clone();
            outcomes.push((self.lead(lead, now).await, pairs));
        }

        for (flight, pairs) in joined {
            outcomes.push((join(flight).await, pairs));
        }

        let stale = self.stale_prices(&outcomes);
        merge(cached, outcomes, &stale)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Whatever is stored for the ids whose fetch failed, however old.
    fn stale_prices(&self, outcomes: &[(FlightOutcome, Vec<Pair>)]) -> HashMap<ProviderId, f64> {
        let failed: Vec<ProviderId> = outcomes
            .iter()
            .filter(|(outcome, _)| outcome.is_err())
            .flat_map(|(_, pairs)| pairs.iter().map(|(_, id)| *id))
            .collect();

        if failed.is_empty() {
            return HashMap::new();
        }

        let shared = self.lock();
        failed
            .into_iter()
            .filter_map(|id| shared.cache.get(id).map(|price| (id, price)))
            .collect()
    }

    fn resolve_batch<S: AsRef<str>>(&self, raw: &[S]) -> Vec<Pair> {
        let mut seen = HashSet::new();

        raw.iter()
            .flat_map(|s| s.as_ref().split(','))
            .filter_map(|s| self.resolver.resolve_pair(s))
            .filter(|(_, id)| seen.insert(*id))
            .collect()
    }

    // Partitioning and flight registration happen under one lock so two
    // callers can never both decide to fetch the same id.
    fn plan(&self, pairs: Vec<Pair>, now: DateTime<Utc>) -> Plan {
        let mut shared = self.lock();
        let valid = shared.cache.is_valid(self.cache_ttl, now);

        let mut cached = BTreeMap::new();
        let mut joined: Vec<(Flight, Vec<Pair>)> = Vec::new();
        let mut owned = Vec::new();

        for (symbol, id) in pairs {
            if valid && let Some(price) = shared.cache.get(id) {
                cached.insert(symbol, price);
            } else if let Some(flight) = shared.in_flight.get(&id) {
                match joined.iter_mut().find(|(f, _)| f.id == flight.id) {
                    Some((_, waiting)) => waiting.push((symbol, id)),
                    None => joined.push((flight.clone(), vec![(symbol, id)])),
                }
            } else {
                owned.push((symbol, id));
            }
        }

        let lead = if owned.is_empty() {
            None
        } else {
            let flight = shared.next_flight;
            shared.next_flight += 1;

            let (tx, rx) = watch::channel(None);
            for (_, id) in &owned {
                shared.in_flight.insert(
                    *id,
                    Flight {
                        id: flight,
                        outcome: rx.clone(),
                    },
                );
            }

            Some(Lead {
                flight,
                tx,
                pairs: owned,
            })
        };

        Plan {
            cached,
            lead,
            joined,
        }
    }

    async fn lead(&self, lead: Lead, now: DateTime<Utc>) -> FlightOutcome {
        let Lead { flight, tx, pairs } = lead;
        let ids: Vec<ProviderId> = pairs.iter().map(|(_, id)| *id).collect();
        let _release = FlightRelease {
            shared: &self.shared,
            flight,
            ids: ids.clone(),
        };

        info!(flight, ids = %join_ids(&ids), "fetching uncached prices");
        let outcome = self.provider.fetch_prices(&ids).await.map(Arc::new);

        match &outcome {
            Ok(prices) => {
                self.lock()
                    .cache
                    .bulk_put(prices.iter().map(|(id, price)| (*id, *price)), now);
                info!(flight, fetched = prices.len(), "cache updated");
            }
            Err(ProviderError::RateLimited) => {
                warn!(
                    flight,
                    "CoinGecko rate limit reached, using cached data if available"
                );
            }
            Err(e) => {
                error!(flight, error = %e, "error fetching prices from CoinGecko");
            }
        }

        tx.send_replace(Some(outcome.clone()));
        outcome
    }
}

async fn join(flight: Flight) -> FlightOutcome {
    let Flight { id, mut outcome } = flight;
    debug!(flight = id, "waiting on in-flight request");

    match outcome.wait_for(Option::is_some).await {
        Ok(done) => (*done).clone().unwrap_or(Err(ProviderError::Abandoned)),
        Err(_) => Err(ProviderError::Abandoned),
    }
}

fn merge(
    cached: BTreeMap<TickerSymbol, f64>,
    outcomes: Vec<(FlightOutcome, Vec<Pair>)>,
    stale: &HashMap<ProviderId, f64>,
) -> FetchResult {
    let mut prices = cached;
    let mut errors: Vec<String> = Vec::new();
    let mut fetched_live = false;
    let mut rate_limited = false;

    for (outcome, pairs) in outcomes {
        let message = match outcome {
            Ok(fresh) => {
                fetched_live = true;
                for (symbol, id) in pairs {
                    if let Some(price) = fresh.get(&id) {
                        prices.insert(symbol, *price);
                    }
                }
                continue;
            }
            Err(e) => {
                let before = prices.len();
                for (symbol, id) in pairs {
                    if let Some(price) = stale.get(&id) {
                        prices.insert(symbol, *price);
                    }
                }
                debug!(stale = prices.len() - before, "falling back to stored prices");

                if e == ProviderError::RateLimited {
                    rate_limited = true;
                    RATE_LIMIT_WARNING.to_string()
                } else {
                    e.to_string()
                }
            }
        };

        if !errors.contains(&message) {
            errors.push(message);
        }
    }

    // Throttling counts as served-from-cache even with nothing cached; any
    // other failure with nothing cached is a plain miss.
    let from_cache = !fetched_live && (rate_limited || !prices.is_empty());

    FetchResult {
        prices,
        from_cache,
        errors,
    }
}

/// Unregisters a lead's ids when the request finishes or its caller goes away.
struct FlightRelease<'a> {
    shared: &'a Mutex<Shared>,
    flight: u64,
    ids: Vec<ProviderId>,
}

impl Drop for FlightRelease<'_> {
    fn drop(&mut self) {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &self.ids {
            if shared
                .in_flight
                .get(id)
                .is_some_and(|f| f.id == self.flight)
            {
                shared.in_flight.remove(id);
            }
        }
    }
}
