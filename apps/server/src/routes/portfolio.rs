use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use prices::{PriceProvider, WatchlistStore};
use serde_json::json;
use tracing::info;

use crate::{AppState, error::AppError, refresh::refresh_symbols};

/// Prices every watchlisted symbol.
pub async fn portfolio_prices<P: PriceProvider, W: WatchlistStore>(
    State(state): State<AppState<P, W>>,
) -> Result<Response, AppError> {
    let symbols = state.watchlist.list().await?;

    if symbols.is_empty() {
        info!("portfolio: watchlist empty");
        return Ok(Json(json!({
            "prices": {},
            "message": "No crypto assets in portfolio",
        }))
        .into_response());
    }

    let result = refresh_symbols(&state.fetcher, &symbols).await;
    Ok(Json(result).into_response())
}
