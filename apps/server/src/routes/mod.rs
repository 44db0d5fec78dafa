mod health;
mod portfolio;
pub mod price;
mod watchlist;

use axum::{
    Router,
    routing::{delete, get},
};
use prices::{PriceProvider, WatchlistStore};

use crate::AppState;

pub fn router<P, W>(state: AppState<P, W>) -> Router
where
    P: PriceProvider + 'static,
    W: WatchlistStore + 'static,
{
    let fetcher = state.fetcher.clone();

    Router::new()
        .route("/health", get(health::health::<P, W>))
        .route("/api/prices/portfolio", get(portfolio::portfolio_prices::<P, W>))
        .route(
            "/api/watchlist",
            get(watchlist::list::<P, W>).post(watchlist::add::<P, W>),
        )
        .route("/api/watchlist/{symbol}", delete(watchlist::remove::<P, W>))
        .with_state(state)
        .merge(price::router::<P>().with_state(fetcher))
}
