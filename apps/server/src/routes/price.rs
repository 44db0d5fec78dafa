use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use prices::{PriceFetcher, PriceProvider, TickerSymbol};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::bad_request;

/// Price lookups that only need the fetcher.
pub fn router<P: PriceProvider + 'static>() -> Router<Arc<PriceFetcher<P>>> {
    Router::new()
        .route("/api/prices", get(get_prices::<P>))
        .route("/api/prices/supported", get(supported::<P>))
        .route("/api/prices/check/{symbol}", get(check_symbol::<P>))
}

#[derive(Deserialize)]
pub struct PricesQuery {
    symbols: Option<String>,
}

async fn get_prices<P: PriceProvider + 'static>(
    State(fetcher): State<Arc<PriceFetcher<P>>>,
    Query(query): Query<PricesQuery>,
) -> Response {
    let Some(symbols) = query.symbols.filter(|s| !s.trim().is_empty()) else {
        debug!("prices: missing symbols parameter");
        return bad_request("symbols query parameter is required (e.g., ?symbols=btc,eth,sol)");
    };

    info!(raw_input = %symbols, "prices: invoked");
    let result = fetcher.fetch_prices(&[symbols]).await;

    info!(
        priced = result.prices.len(),
        from_cache = result.from_cache,
        errors = result.errors.len(),
        "prices: completed"
    );

    Json(result).into_response()
}

#[derive(Serialize)]
struct Supported {
    symbols: Vec<TickerSymbol>,
}

async fn supported<P: PriceProvider + 'static>(
    State(fetcher): State<Arc<PriceFetcher<P>>>,
) -> Json<Supported> {
    Json(Supported {
        symbols: fetcher.supported_symbols(),
    })
}

#[derive(Serialize)]
struct SymbolCheck {
    symbol: String,
    supported: bool,
}

async fn check_symbol<P: PriceProvider + 'static>(
    State(fetcher): State<Arc<PriceFetcher<P>>>,
    Path(symbol): Path<String>,
) -> Json<SymbolCheck> {
    Json(SymbolCheck {
        supported: fetcher.is_supported(&symbol),
        symbol: symbol.trim().to_uppercase(),
    })
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, future::Future};

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use chrono::Duration;
    use prices::{ProviderError, ProviderId};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    enum Upstream {
        Quotes(Vec<(&'static str, f64)>),
        Down,
    }

    impl PriceProvider for Upstream {
        fn fetch_prices(
            &self,
            ids: &[ProviderId],
        ) -> impl Future<Output = Result<HashMap<ProviderId, f64>, ProviderError>> + Send {
            let result = match self {
                Upstream::Quotes(quotes) => Ok(ids
                    .iter()
                    .filter_map(|id| {
                        quotes
                            .iter()
                            .find(|(name, _)| *name == id.as_str())
                            .map(|(_, price)| (*id, *price))
                    })
                    .collect()),
                Upstream::Down => Err(ProviderError::Transport("connection refused".into())),
            };
            async move { result }
        }
    }

    fn app(upstream: Upstream) -> Router {
        router().with_state(Arc::new(PriceFetcher::new(upstream, Duration::minutes(5))))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let res = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn prices_for_valid_and_unknown_symbols() {
        let app = app(Upstream::Quotes(vec![("bitcoin", 50_000.0)]));

        let (status, body) = get_json(app, "/api/prices?symbols=btc,doesnotexist").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "prices": { "BTC": 50_000.0 }, "fromCache": false })
        );
    }

    #[tokio::test]
    async fn missing_symbols_is_a_bad_request() {
        for uri in ["/api/prices", "/api/prices?symbols=%20"] {
            let (status, body) = get_json(app(Upstream::Down), uri).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].as_str().unwrap().contains("symbols"));
        }
    }

    #[tokio::test]
    async fn unresolvable_symbols_are_reported_in_band() {
        let (status, body) = get_json(app(Upstream::Down), "/api/prices?symbols=aapl").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["errors"], json!(["No valid crypto symbols provided"]));
    }

    #[tokio::test]
    async fn provider_outage_is_still_ok() {
        let (status, body) = get_json(app(Upstream::Down), "/api/prices?symbols=btc").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prices"], json!({}));
        assert_eq!(
            body["errors"],
            json!(["CoinGecko request failed: connection refused"])
        );
    }

    #[tokio::test]
    async fn lists_supported_symbols() {
        let (status, body) = get_json(app(Upstream::Down), "/api/prices/supported").await;

        assert_eq!(status, StatusCode::OK);
        let symbols = body["symbols"].as_array().unwrap();
        assert_eq!(symbols[0], "BTC");
        assert!(symbols.contains(&json!("BONK")));
    }

    #[tokio::test]
    async fn checks_single_symbol() {
        let (_, body) = get_json(app(Upstream::Down), "/api/prices/check/eth").await;
        assert_eq!(body, json!({ "symbol": "ETH", "supported": true }));

        let (_, body) = get_json(app(Upstream::Down), "/api/prices/check/tsla").await;
        assert_eq!(body, json!({ "symbol": "TSLA", "supported": false }));
    }
}
