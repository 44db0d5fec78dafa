use std::{env::var, net::SocketAddr};

use anyhow::{Context, Result};
use prices::PriceConfig;

#[derive(Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub version: String,
    pub prices: PriceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = var("PORT").unwrap_or_else(|_| "3000".to_string());

        Ok(Self {
            bind_addr: format!("0.0.0.0:{}", port.trim())
                .parse()
                .with_context(|| format!("PORT is not a valid port: {port}"))?,
            version: var("APP_VERSION").unwrap_or_else(|_| "Unknown".to_string()),
            prices: PriceConfig::from_env()?,
        })
    }
}
