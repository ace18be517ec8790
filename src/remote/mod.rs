//! Remote quote source.
//!
//! The remote side has no notion of categories: each item's title becomes a
//! quote text and every candidate gets the configured server category.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::quotes::Quote;

pub use http::HttpRemoteSource;
pub use memory::MemoryRemoteSource;

/// One item as returned by the remote read endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: u64,
    pub title: String,
}

impl RemoteItem {
    /// Map to a candidate quote, or `None` when the title is blank.
    pub fn to_candidate(&self, server_category: &str) -> Option<Quote> {
        Quote::new(&self.title, server_category).ok()
    }
}

/// Read/write contract of the remote quote source.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch at most `limit` items, in the order the source returns them.
    async fn fetch(&self, limit: usize) -> Result<Vec<RemoteItem>>;

    /// Send a new quote to the source. The response is informational only.
    async fn publish(&self, quote: &Quote) -> Result<()>;
}
