use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use prices::{PriceProvider, TickerSymbol, WatchlistStore, resolver};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    AppState,
    error::{AppError, bad_request},
};

#[derive(Serialize)]
pub struct Listing {
    symbols: Vec<TickerSymbol>,
}

pub async fn list<P: PriceProvider, W: WatchlistStore>(
    State(state): State<AppState<P, W>>,
) -> Result<Json<Listing>, AppError> {
    Ok(Json(Listing {
        symbols: state.watchlist.list().await?,
    }))
}

#[derive(Deserialize)]
pub struct AddRequest {
    /// Comma-separated, e.g. "btc,eth"
    symbols: String,
}

#[derive(Serialize, Default)]
pub struct AddOutcome {
    added: Vec<TickerSymbol>,
    already: Vec<TickerSymbol>,
    unsupported: Vec<String>,
}

pub async fn add<P: PriceProvider, W: WatchlistStore>(
    State(state): State<AppState<P, W>>,
    Json(req): Json<AddRequest>,
) -> Result<Response, AppError> {
    info!(raw_input = %req.symbols, "watch: invoked");

    let (known, unsupported) = split_supported(&req.symbols);

    if known.is_empty() && unsupported.is_empty() {
        return Ok(bad_request("No valid symbols provided."));
    }

    let mut outcome = AddOutcome {
        unsupported,
        ..Default::default()
    };

    for symbol in known {
        if state.watchlist.add(symbol).await? {
            debug!(%symbol, "watch: added");
            outcome.added.push(symbol);
        } else {
            debug!(%symbol, "watch: already_watched");
            outcome.already.push(symbol);
        }
    }

    info!(
        added_count = outcome.added.len(),
        already_count = outcome.already.len(),
        unsupported_count = outcome.unsupported.len(),
        "watch: completed"
    );

    Ok(Json(outcome).into_response())
}

#[derive(Serialize)]
pub struct Removal {
    symbol: TickerSymbol,
    removed: bool,
}

pub async fn remove<P: PriceProvider, W: WatchlistStore>(
    State(state): State<AppState<P, W>>,
    Path(symbol): Path<String>,
) -> Result<Response, AppError> {
    let Some((symbol, _)) = resolver().resolve_pair(&symbol) else {
        return Ok(bad_request(format!(
            "{} is not a supported crypto symbol",
            symbol.trim().to_uppercase()
        )));
    };

    let removed = state.watchlist.remove(symbol).await?;
    info!(%symbol, removed, "unwatch: completed");

    Ok(Json(Removal { symbol, removed }).into_response())
}

/// Splits raw comma-separated input into canonical supported symbols and
/// the uppercased leftovers. Blank pieces and repeats are dropped.
fn split_supported(raw: &str) -> (Vec<TickerSymbol>, Vec<String>) {
    let mut known: Vec<TickerSymbol> = Vec::new();
    let mut unsupported: Vec<String> = Vec::new();

    for piece in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if piece.is_empty() {
            continue;
        }
        match resolver().resolve_pair(&piece) {
            Some((symbol, _)) if !known.contains(&symbol) => known.push(symbol),
            Some(_) => {}
            None if !unsupported.contains(&piece) => unsupported.push(piece),
            None => {}
        }
    }

    (known, unsupported)
}
