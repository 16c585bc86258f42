use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub mongo_url: String,
    pub mongo_fallback_url: String,
    pub mongo_db: String,
    pub jwt_secret: String,
    pub order_concurrency: usize,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "8080"),
            mongo_url: try_load("MONGO_URL", "mongodb://127.0.0.1:27017"),
            mongo_fallback_url: try_load("MONGO_FALLBACK_URL", "mongodb://127.0.0.1:27017"),
            mongo_db: try_load("MONGO_DB", "canteen"),
            jwt_secret: read_secret("JWT_SECRET"),
            order_concurrency: try_load("ORDER_CONCURRENCY", "5"),
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

fn read_secret(secret_name: &str) -> String {
    let path = format!("/run/secrets/{secret_name}");

    if let Ok(contents) = read_to_string(&path) {
        return contents.trim().to_string();
    }

    // Docker secret not mounted, fall back to the environment (dev setups).
    env::var(secret_name)
        .map_err(|_| {
            warn!("{secret_name} not found in /run/secrets or environment");
        })
        .expect("Secrets misconfigured!")
}
