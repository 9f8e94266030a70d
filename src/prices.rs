//! Durable gift-id → unit-price table.
//!
//! The whole table is one JSON document on disk. Writes go through a
//! temp-file-then-rename so a reader can never observe a half-written table.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
pub enum PriceError {
    InvalidPrice(f64),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl From<std::io::Error> for PriceError {
    fn from(err: std::io::Error) -> Self {
        PriceError::Io(err)
    }
}

impl From<serde_json::Error> for PriceError {
    fn from(err: serde_json::Error) -> Self {
        PriceError::Serialization(err)
    }
}

impl std::fmt::Display for PriceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceError::InvalidPrice(p) => {
                write!(f, "Price must be a finite non-negative number, got {}", p)
            }
            PriceError::Io(e) => write!(f, "IO error: {}", e),
            PriceError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for PriceError {}

/// Immutable copy of the table, handed to the aggregation engine so one
/// aggregation run prices every gift against the same state.
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot(HashMap<String, f64>);

impl PriceSnapshot {
    pub fn price_of(&self, gift_id: &str) -> f64 {
        self.0.get(gift_id).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
impl From<HashMap<String, f64>> for PriceSnapshot {
    fn from(entries: HashMap<String, f64>) -> Self {
        PriceSnapshot(entries)
    }
}

pub struct PriceTable {
    path: PathBuf,
    entries: Mutex<HashMap<String, f64>>,
}

impl PriceTable {
    /// Load the table from disk. A missing or unreadable file degrades to an
    /// empty table so startup never fails on price state.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<HashMap<String, f64>>(&json) {
                Ok(entries) => {
                    log::info!("Loaded {} gift prices from {}", entries.len(), path.display());
                    entries
                }
                Err(e) => {
                    log::warn!("Ignoring unreadable price file {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => {
                log::info!("No existing price file found: {}", path.display());
                HashMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn set_price(&self, gift_id: &str, price: f64) -> Result<(), PriceError> {
        if !price.is_finite() || price < 0.0 {
            return Err(PriceError::InvalidPrice(price));
        }

        let mut entries = self.entries.lock().unwrap();
        entries.insert(gift_id.to_string(), price);
        self.persist(&entries)
    }

    /// Unknown gift ids price at zero.
    pub fn get_price(&self, gift_id: &str) -> f64 {
        self.entries
            .lock()
            .unwrap()
            .get(gift_id)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> PriceSnapshot {
        PriceSnapshot(self.entries.lock().unwrap().clone())
    }

    fn persist(&self, entries: &HashMap<String, f64>) -> Result<(), PriceError> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("Saved {} gift prices to {}", entries.len(), self.path.display());
        Ok(())
    }
}
