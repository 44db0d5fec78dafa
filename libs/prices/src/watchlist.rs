use std::{future::Future, time::Duration};

use anyhow::Error;
use fred::prelude::*;
use tracing::error;

use crate::symbol_resolver::{TickerSymbol, resolver};

/// Where the watched symbols are kept.
pub trait WatchlistStore: Send + Sync {
    /// Returns true if the symbol was newly added.
    fn add(&self, symbol: TickerSymbol) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Returns true if the symbol was present.
    fn remove(&self, symbol: TickerSymbol) -> impl Future<Output = Result<bool, Error>> + Send;

    /// Every stored symbol the resolver still knows, sorted.
    fn list(&self) -> impl Future<Output = Result<Vec<TickerSymbol>, Error>> + Send;
}

/// Redis set of the crypto symbols the portfolio holds and keeps priced.
#[derive(Clone)]
pub struct Watchlist {
    client: Client,
    key_prefix: String,
}

impl Watchlist {
    pub async fn new(redis_url: &str, key: impl Into<String>) -> Result<Self, Error> {
        let config = Config::from_url(redis_url)?;

        let client = Builder::from_config(config)
            .with_connection_config(|config| {
                config.connection_timeout = Duration::from_secs(5);
                config.tcp = TcpConfig {
                    nodelay: Some(true),
                    ..Default::default()
                };
            })
            .build()?;

        client.on_error(|(error, server)| async move {
            error!(?server, ?error, "redis connection error");
            Ok(())
        });

        client.connect();
        client.wait_for_connect().await?;

        Ok(Self {
            client,
            key_prefix: key.into(),
        })
    }

    /// Create a new Watchlist from environment variables.
    /// Expects REDIS_URL and REDIS_KEY_PREFIX to be set.
    pub async fn from_env() -> Result<Self, Error> {
        use std::env;

        let redis_url = env::var("REDIS_URL")
            .map_err(|_| Error::msg("REDIS_URL environment variable not set"))?;
        let key_prefix = env::var("REDIS_KEY_PREFIX")
            .map_err(|_| Error::msg("REDIS_KEY_PREFIX environment variable not set"))?;

        Self::new(&redis_url, key_prefix).await
    }

    fn watchlist_key(&self) -> String {
        watchlist_key(&self.key_prefix)
    }
}

impl WatchlistStore for Watchlist {
    async fn add(&self, symbol: TickerSymbol) -> Result<bool, Error> {
        let added: i64 = self
            .client
            .sadd(self.watchlist_key(), symbol.as_str())
            .await?;

        Ok(added == 1)
    }

    async fn remove(&self, symbol: TickerSymbol) -> Result<bool, Error> {
        let removed: i64 = self
            .client
            .srem(self.watchlist_key(), symbol.as_str())
            .await?;

        Ok(removed == 1)
    }

    async fn list(&self) -> Result<Vec<TickerSymbol>, Error> {
        let members: Vec<String> = self.client.smembers(self.watchlist_key()).await?;
        Ok(known_symbols(members))
    }
}

fn watchlist_key(prefix: &str) -> String {
    format!("{}:watchlist", prefix)
}

fn known_symbols(members: Vec<String>) -> Vec<TickerSymbol> {
    let mut symbols: Vec<TickerSymbol> = members
        .iter()
        .filter_map(|m| resolver().resolve_pair(m))
        .map(|(symbol, _)| symbol)
        .collect();

    symbols.sort();
    symbols.dedup();
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced() {
        assert_eq!(watchlist_key("portfolio"), "portfolio:watchlist");
    }

    #[test]
    fn stored_members_are_canonicalized_and_filtered() {
        let members = vec![
            "eth".to_string(),
            "BTC".to_string(),
            "delisted".to_string(),
            "ETH".to_string(),
        ];

        let symbols: Vec<&str> = known_symbols(members)
            .iter()
            .map(TickerSymbol::as_str)
            .collect();

        assert_eq!(symbols, vec!["BTC", "ETH"]);
    }
}
