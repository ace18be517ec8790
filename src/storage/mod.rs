//! Persistence adapter over named string slots.
//!
//! Three independent keys are kept:
//! - `quotes` (durable): JSON array of `{text, category}`
//! - `selectedCategory` (durable): plain string
//! - `lastQuote` (session): JSON object of the last displayed quote
//!
//! Loads never fail the caller; they fall back to defaults and log why.

pub mod backends;

use std::sync::Arc;

use crate::error::Result;
use crate::quotes::{default_quotes, Quote, ALL_CATEGORIES};

pub use backends::{FileStore, MemoryStore};

pub const QUOTES_KEY: &str = "quotes";
pub const SELECTED_CATEGORY_KEY: &str = "selectedCategory";
pub const LAST_QUOTE_KEY: &str = "lastQuote";

/// A get/set store of named string blobs.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Reads and writes application state through a durable and a session store.
#[derive(Clone)]
pub struct Persistence {
    durable: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(durable: Arc<dyn KeyValueStore>, session: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    /// Both slots in memory (for tests).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Load the persisted quote list, or the seed quotes when absent or unreadable.
    pub fn load_quotes(&self) -> Vec<Quote> {
        let raw = match self.durable.get(QUOTES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::info!("No stored quotes found, using defaults");
                return default_quotes();
            }
            Err(e) => {
                tracing::warn!("Failed to read stored quotes: {}, using defaults", e);
                return default_quotes();
            }
        };

        let stored: Vec<Quote> = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Failed to parse stored quotes: {}, using defaults", e);
                return default_quotes();
            }
        };

        let total = stored.len();
        let quotes: Vec<Quote> = stored
            .iter()
            .filter_map(|q| Quote::new(&q.text, &q.category).ok())
            .collect();
        if quotes.len() < total {
            tracing::warn!("Dropped {} blank stored quotes", total - quotes.len());
        }
        quotes
    }

    pub fn save_quotes(&self, quotes: &[Quote]) -> Result<()> {
        let json = serde_json::to_string(quotes)?;
        self.durable.set(QUOTES_KEY, &json)?;
        tracing::debug!("Saved {} quotes", quotes.len());
        Ok(())
    }

    pub fn load_selected_category(&self) -> String {
        match self.durable.get(SELECTED_CATEGORY_KEY) {
            Ok(Some(value)) if !value.trim().is_empty() => value,
            Ok(_) => ALL_CATEGORIES.to_string(),
            Err(e) => {
                tracing::warn!("Failed to read selected category: {}", e);
                ALL_CATEGORIES.to_string()
            }
        }
    }

    pub fn save_selected_category(&self, category: &str) -> Result<()> {
        self.durable.set(SELECTED_CATEGORY_KEY, category)
    }

    pub fn load_last_shown(&self) -> Option<Quote> {
        let raw = match self.session.get(LAST_QUOTE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read last shown quote: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(quote) => Some(quote),
            Err(e) => {
                tracing::warn!("Ignoring unreadable last shown quote: {}", e);
                None
            }
        }
    }

    pub fn save_last_shown(&self, quote: &Quote) -> Result<()> {
        let json = serde_json::to_string(quote)?;
        self.session.set(LAST_QUOTE_KEY, &json)
    }
}
