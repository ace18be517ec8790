use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{QuoteError, Result};
use crate::quotes::Quote;
use crate::remote::{RemoteItem, RemoteSource};

/// In-process remote source. Used when no remote URL is configured and as a
/// scripted source in tests.
#[derive(Default)]
pub struct MemoryRemoteSource {
    items: Mutex<Vec<RemoteItem>>,
    failure: Mutex<Option<String>>,
    published: Mutex<Vec<Quote>>,
    fetches: AtomicUsize,
}

impl MemoryRemoteSource {
    pub fn new(items: Vec<RemoteItem>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Self::default()
        }
    }

    pub fn set_items(&self, items: Vec<RemoteItem>) {
        *self.items.lock().unwrap_or_else(|e| e.into_inner()) = items;
    }

    /// Make every following fetch fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn published(&self) -> Vec<Quote> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for MemoryRemoteSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<RemoteItem>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(QuoteError::Remote(message));
        }
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        Ok(items.iter().take(limit).cloned().collect())
    }

    async fn publish(&self, quote: &Quote) -> Result<()> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(quote.clone());
        Ok(())
    }
}
