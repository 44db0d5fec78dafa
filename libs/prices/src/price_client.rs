use std::{collections::HashMap, future::Future, sync::Arc};

use anyhow::Result;
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use thiserror::Error;
use tracing::debug;

use crate::{config::PriceConfig, symbol_resolver::ProviderId};

/// Failure modes of a single batched price lookup.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("Rate limit reached")]
    RateLimited,

    #[error("CoinGecko API error: {0}")]
    Status(u16),

    #[error("CoinGecko request failed: {0}")]
    Transport(String),

    #[error("CoinGecko returned a malformed response: {0}")]
    Decode(String),

    #[error("In-flight price request was abandoned")]
    Abandoned,
}

/// Source of live prices for a batch of provider ids.
///
/// Ids missing from the returned map had no quote upstream.
pub trait PriceProvider: Send + Sync {
    fn fetch_prices(
        &self,
        ids: &[ProviderId],
    ) -> impl Future<Output = Result<HashMap<ProviderId, f64>, ProviderError>> + Send;
}

impl<P: PriceProvider> PriceProvider for Arc<P> {
    fn fetch_prices(
        &self,
        ids: &[ProviderId],
    ) -> impl Future<Output = Result<HashMap<ProviderId, f64>, ProviderError>> + Send {
        (**self).fetch_prices(ids)
    }
}

#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    base_api: String,
    vs_currency: String,
}

impl PriceClient {
    pub fn new(
        base_api: String,
        api_key: Option<String>,
        vs_currency: String,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(key) = api_key {
            headers.insert(api_key_header(&key), HeaderValue::from_str(&key)?);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_api,
            vs_currency,
        })
    }

    pub fn from_config(config: &PriceConfig) -> Result<Self> {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.vs_currency.clone(),
            config.request_timeout,
        )
    }

    pub async fn simple_price(
        &self,
        ids: &[ProviderId],
    ) -> Result<HashMap<ProviderId, f64>, ProviderError> {
        let url = format!("{}/simple/price", self.base_api.trim_end_matches('/'));
        let joined = join_ids(ids);

        debug!(ids = %joined, vs_currency = %self.vs_currency, "requesting simple price");

        let res = self
            .client
            .get(url)
            .query(&[("ids", joined.as_str()), ("vs_currencies", self.vs_currency.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        match res.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(ProviderError::RateLimited),
            status if !status.is_success() => return Err(ProviderError::Status(status.as_u16())),
            _ => {}
        }

        let body: SimplePriceResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(extract_prices(body, ids, &self.vs_currency))
    }
}

impl PriceProvider for PriceClient {
    fn fetch_prices(
        &self,
        ids: &[ProviderId],
    ) -> impl Future<Output = Result<HashMap<ProviderId, f64>, ProviderError>> + Send {
        self.simple_price(ids)
    }
}

// Demo keys are prefixed "CG-"; anything else is a Pro key.
fn api_key_header(key: &str) -> &'static str {
    if key.starts_with("CG-") {
        "x-cg-demo-api-key"
    } else {
        "x-cg-pro-api-key"
    }
}

pub(crate) fn join_ids(ids: &[ProviderId]) -> String {
    ids.iter()
        .map(ProviderId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

//
// Match CoinGecko simple/price JSON
// https://docs.coingecko.com/reference/simple-price
//
type SimplePriceResponse = HashMap<String, HashMap<String, Option<f64>>>;

fn extract_prices(
    body: SimplePriceResponse,
    requested: &[ProviderId],
    vs_currency: &str,
) -> HashMap<ProviderId, f64> {
    requested
        .iter()
        .filter_map(|id| {
            let price = body.get(id.as_str())?.get(vs_currency).copied().flatten()?;
            price.is_finite().then_some((*id, price))
        })
        .collect()
}
