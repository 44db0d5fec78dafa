use std::sync::Arc;

use anyhow::Result;
use prices::{FetchResult, PriceFetcher, PriceProvider, TickerSymbol, WatchlistStore};
use tracing::{debug, info, instrument, warn};

/// Runs the price pipeline for an already known set of symbols.
pub async fn refresh_symbols<P: PriceProvider>(
    fetcher: &PriceFetcher<P>,
    symbols: &[TickerSymbol],
) -> FetchResult {
    let raw: Vec<&str> = symbols.iter().map(TickerSymbol::as_str).collect();
    let result = fetcher.fetch_prices(&raw).await;

    if result.is_hard_miss() {
        warn!(errors = ?result.errors, "no prices available");
    } else {
        info!(
            priced = result.prices.len(),
            from_cache = result.from_cache,
            errors = result.errors.len(),
            "prices refreshed"
        );
    }

    result
}

/// Scheduled job: keeps every watchlisted symbol priced.
#[instrument(name = "run_refresh", skip_all)]
pub async fn run_refresh<P: PriceProvider, W: WatchlistStore>(
    fetcher: Arc<PriceFetcher<P>>,
    watchlist: Arc<W>,
) -> Result<()> {
    let symbols = watchlist.list().await?;
    info!(total_symbols = symbols.len(), "loaded watchlist");

    if symbols.is_empty() {
        debug!("nothing to refresh");
        return Ok(());
    }

    refresh_symbols(&fetcher, &symbols).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        future::Future,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use chrono::Duration;
    use prices::{ProviderError, ProviderId, resolver};

    use super::*;

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl PriceProvider for CountingProvider {
        fn fetch_prices(
            &self,
            ids: &[ProviderId],
        ) -> impl Future<Output = Result<HashMap<ProviderId, f64>, ProviderError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prices: HashMap<ProviderId, f64> = ids.iter().map(|id| (*id, 10.0)).collect();
            async move { Ok(prices) }
        }
    }

    fn symbols(raw: &[&str]) -> Vec<TickerSymbol> {
        raw.iter()
            .map(|s| resolver().resolve_pair(s).unwrap().0)
            .collect()
    }

    #[tokio::test]
    async fn refresh_prices_every_symbol_in_one_call() {
        let fetcher = PriceFetcher::new(CountingProvider::default(), Duration::minutes(5));

        let result = refresh_symbols(&fetcher, &symbols(&["BTC", "ETH", "SOL"])).await;

        assert_eq!(result.prices.len(), 3);
        assert!(!result.from_cache);
        assert_eq!(fetcher.cache_status(chrono::Utc::now()).entries, 3);
    }

    #[tokio::test]
    async fn repeated_refresh_within_ttl_reuses_cache() {
        let provider = Arc::new(CountingProvider::default());
        let fetcher = PriceFetcher::new(provider.clone(), Duration::minutes(5));
        let watch = symbols(&["BTC", "ETH"]);

        refresh_symbols(&fetcher, &watch).await;
        let second = refresh_symbols(&fetcher, &watch).await;

        assert!(second.from_cache);
        assert_eq!(second.prices.len(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
