use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub meili_url: String,
    pub meili_key: Option<String>,
    pub upstream_url: String,
    pub update_interval: Duration,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("GRIMOIRE_PORT", "3000"),
            meili_url: try_load("MEILI_URL", "http://localhost:7700"),
            meili_key: var("MEILI_ADMIN_KEY").ok(),
            upstream_url: try_load("UPSTREAM_URL", "http://localhost:9000/catalog"),
            update_interval: Duration::from_secs(try_load("UPDATE_INTERVAL_SECS", "3600")),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
