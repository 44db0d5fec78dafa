use axum::{Json, extract::State};
use chrono::Utc;
use prices::{CacheStatus, PriceProvider};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct Health {
    version: String,
    cache: CacheStatus,
}

pub async fn health<P: PriceProvider, W>(State(state): State<AppState<P, W>>) -> Json<Health> {
    Json(Health {
        version: state.version.clone(),
        cache: state.fetcher.cache_status(Utc::now()),
    })
}
