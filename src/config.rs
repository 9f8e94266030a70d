use std::env;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub db_path: String,
    pub prices_path: String,
    pub events_file: String,
    pub replay_delay_ms: u64,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_raw = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|_| {
            ConfigError::InvalidValue(format!("BIND_ADDR must be host:port, got '{}'", bind_raw))
        })?;

        let db_path = env::var("DB_PATH").unwrap_or_else(|_| "data.db".to_string());
        let prices_path = env::var("PRICES_FILE").unwrap_or_else(|_| "prices.json".to_string());
        let events_file = env::var("EVENTS_FILE").unwrap_or_else(|_| "events.jsonl".to_string());

        let replay_delay_ms = env::var("REPLAY_DELAY_MS")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<u64>()
            .unwrap_or(0);

        Ok(Self {
            bind_addr,
            db_path,
            prices_path,
            events_file,
            replay_delay_ms,
        })
    }
}
