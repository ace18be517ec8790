//! Quote records and the in-memory quote store.
//!
//! The store keeps insertion order. `text` is the identity used by sync and
//! lookups; categories are free-form labels compared case-insensitively when
//! filtering.

pub mod transfer;

use serde::{Deserialize, Serialize};

use crate::error::{QuoteError, Result};

/// Sentinel category meaning "no filter".
pub const ALL_CATEGORIES: &str = "All";

/// A single quotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    pub category: String,
}

impl Quote {
    /// Build a validated quote. Both fields are trimmed and must be non-empty.
    pub fn new(text: &str, category: &str) -> Result<Self> {
        let text = text.trim();
        let category = category.trim();
        if text.is_empty() || category.is_empty() {
            return Err(QuoteError::Validation(
                "Please fill out both the quote text and its category.".into(),
            ));
        }
        Ok(Self {
            text: text.to_string(),
            category: category.to_string(),
        })
    }
}

/// Built-in quotes used when nothing has been persisted yet.
pub fn default_quotes() -> Vec<Quote> {
    vec![
        Quote {
            text: "The best way to get started is to quit talking and begin doing.".into(),
            category: "Motivation".into(),
        },
        Quote {
            text: "Life is what happens when you're busy making other plans.".into(),
            category: "Life".into(),
        },
        Quote {
            text: "Success is not final, failure is not fatal: it is the courage to continue that counts."
                .into(),
            category: "Success".into(),
        },
    ]
}

/// Ordered, mutable collection of quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteStore {
    quotes: Vec<Quote>,
}

impl QuoteStore {
    pub fn new(quotes: Vec<Quote>) -> Self {
        Self { quotes }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_quotes())
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quote> {
        self.quotes.iter()
    }

    pub fn as_slice(&self) -> &[Quote] {
        &self.quotes
    }

    /// Validate and append a new quote.
    ///
    /// Duplicated text is allowed here; duplicates are collapsed by the next
    /// sync pass.
    pub fn add(&mut self, text: &str, category: &str) -> Result<&Quote> {
        let quote = Quote::new(text, category)?;
        Ok(self.push(quote))
    }

    /// Append an already validated quote.
    pub fn push(&mut self, quote: Quote) -> &Quote {
        self.quotes.push(quote);
        &self.quotes[self.quotes.len() - 1]
    }

    /// First quote whose text matches exactly.
    pub fn find_by_text(&self, text: &str) -> Option<&Quote> {
        self.quotes.iter().find(|q| q.text == text)
    }

    fn find_by_text_mut(&mut self, text: &str) -> Option<&mut Quote> {
        self.quotes.iter_mut().find(|q| q.text == text)
    }

    /// Overwrite the category of the first quote with this text.
    ///
    /// Returns the previous category, or `None` when no quote matched.
    pub fn set_category(&mut self, text: &str, category: &str) -> Option<String> {
        let quote = self.find_by_text_mut(text)?;
        Some(std::mem::replace(&mut quote.category, category.to_string()))
    }

    /// Quotes in `category` (case-insensitive), or all of them for [`ALL_CATEGORIES`].
    pub fn filtered_by<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Quote> + 'a {
        let all = category == ALL_CATEGORIES;
        let wanted = category.to_lowercase();
        self.quotes
            .iter()
            .filter(move |q| all || q.category.to_lowercase() == wanted)
    }

    /// Unique categories in first-seen order.
    pub fn distinct_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for quote in &self.quotes {
            if !categories.contains(&quote.category) {
                categories.push(quote.category.clone());
            }
        }
        categories
    }

    /// Categories as offered to a chooser: `"All"` followed by the distinct values.
    pub fn category_options(&self) -> Vec<String> {
        let mut options = vec![ALL_CATEGORIES.to_string()];
        options.extend(self.distinct_categories());
        options
    }

    /// Collapse quotes sharing a text into their first occurrence.
    ///
    /// The surviving record keeps its position and takes the category of the
    /// last duplicate. Returns the number of records removed.
    pub fn collapse_duplicates(&mut self) -> usize {
        let before = self.quotes.len();
        let mut merged: Vec<Quote> = Vec::with_capacity(before);
        for quote in self.quotes.drain(..) {
            match merged.iter_mut().find(|q| q.text == quote.text) {
                Some(existing) => existing.category = quote.category,
                None => merged.push(quote),
            }
        }
        self.quotes = merged;
        before - self.quotes.len()
    }
}
