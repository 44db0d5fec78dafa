use std::sync::Arc;

use prices::{PriceClient, PriceFetcher, Watchlist};

pub mod config;
pub mod error;
pub mod refresh;
pub mod routes;

pub struct AppState<P = PriceClient, W = Watchlist> {
    pub fetcher: Arc<PriceFetcher<P>>,
    pub watchlist: Arc<W>,
    pub version: String,
}

impl<P, W> Clone for AppState<P, W> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            watchlist: Arc::clone(&self.watchlist),
            version: self.version.clone(),
        }
    }
}
