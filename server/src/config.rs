use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub meili_url: String,
    pub meili_key: Option<String>,
    pub staging_dir: PathBuf,
    pub batch_size: usize,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("TICKETS_PORT", "5500"),
            meili_url: try_load("MEILI_URL", "http://localhost:7700"),
            meili_key: var("MEILI_ADMIN_KEY").ok(),
            staging_dir: PathBuf::from(try_load::<String>("STAGING_DIR", "uploads")),
            batch_size: try_load("IMPORT_BATCH_SIZE", "100"),
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
