use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::Method;
use prices::{PriceClient, PriceFetcher, Watchlist};
use server::{AppState, config::Config, refresh, routes};
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, info_span};
use tracing_futures::Instrument;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::from_env()?;

    let watchlist = Arc::new(
        Watchlist::from_env()
            .await
            .context("init watchlist failed")?,
    );
    let price_client =
        PriceClient::from_config(&config.prices).context("init price client failed")?;
    let fetcher = Arc::new(PriceFetcher::new(price_client, config.prices.cache_ttl));

    info!(
        cache_ttl_ms = config.prices.cache_ttl.num_milliseconds(),
        api_url = %config.prices.api_url,
        "price fetcher ready"
    );

    let sched = JobScheduler::new()
        .await
        .context("failed to create job scheduler")?;

    let fetcher_job = Arc::clone(&fetcher);
    let watchlist_job = Arc::clone(&watchlist);

    sched
        .add(Job::new_repeated_async(
            config.prices.cache_ttl.to_std()?,
            move |uuid, _l| {
                let fetcher = Arc::clone(&fetcher_job);
                let watchlist = Arc::clone(&watchlist_job);
                let span = info_span!("scheduled_refresh", job = %uuid);

                Box::pin(
                    async move {
                        if let Err(e) = refresh::run_refresh(fetcher, watchlist).await {
                            error!(error = ?e, "run_refresh failed");
                        }
                    }
                    .instrument(span),
                )
            },
        )?)
        .await?;

    sched.shutdown_on_ctrl_c();
    sched.start().await?;

    let state = AppState {
        fetcher,
        watchlist,
        version: config.version.clone(),
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        version = %config.version,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::{
            select,
            signal::unix::{SignalKind, signal},
        };
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv()  => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
