mod config;
mod price_cache;
mod price_client;
mod price_fetcher;
mod symbol_resolver;
mod watchlist;

pub use config::{PriceConfig, parse_cache_ttl};
pub use price_cache::PriceCache;
pub use price_client::{PriceClient, PriceProvider, ProviderError};
pub use price_fetcher::{
    CacheStatus, FetchResult, NO_VALID_SYMBOLS, PriceFetcher, RATE_LIMIT_WARNING,
};
pub use symbol_resolver::{ProviderId, SymbolResolver, TickerSymbol, resolver};
pub use watchlist::{Watchlist, WatchlistStore};
