use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::constants::{
    DEFAULT_CACHE_DIR, DEFAULT_DIRECTIONS_URL, DEFAULT_GEOCODING_URL, DEFAULT_LISTEN_ADDR,
    DEFAULT_RADAR_URL, DEFAULT_REFRESH_WINDOW, DEFAULT_REQUEST_TIMEOUT,
};

#[derive(Clone)]
pub struct Config {
    pub listen_addr: String,
    pub cache_dir: PathBuf,
    pub radar_url: String,
    pub geocoding_url: String,
    pub directions_url: String,
    pub mapbox_token: String,
    pub refresh_window: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = env_string("VELORAIN_LISTEN_ADDR", DEFAULT_LISTEN_ADDR);
        let cache_dir = PathBuf::from(env_string("VELORAIN_CACHE_DIR", DEFAULT_CACHE_DIR));
        let radar_url = env_string("VELORAIN_RADAR_URL", DEFAULT_RADAR_URL);
        let geocoding_url = env_string("VELORAIN_GEOCODING_URL", DEFAULT_GEOCODING_URL);
        let directions_url = env_string("VELORAIN_DIRECTIONS_URL", DEFAULT_DIRECTIONS_URL);
        let mapbox_token =
            std::env::var("MAPBOX_KEY").context("MAPBOX_KEY must be set for routing")?;
        let refresh_window = Duration::from_secs(env_u64(
            "VELORAIN_REFRESH_SECONDS",
            DEFAULT_REFRESH_WINDOW.as_secs(),
        )?);
        let request_timeout = Duration::from_secs(env_u64(
            "VELORAIN_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?);

        Ok(Self {
            listen_addr,
            cache_dir,
            radar_url,
            geocoding_url,
            directions_url,
            mapbox_token,
            refresh_window,
            request_timeout,
        })
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .with_context(|| format!("Failed to parse {}={} as u64", name, value)),
        Err(_) => Ok(default),
    }
}
