//! JSON export and import of the quote collection.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{QuoteError, Result};
use crate::quotes::Quote;

/// File name used for exports.
pub const EXPORT_FILE_NAME: &str = "quotes.json";

/// Result of an import.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub imported: usize,
    pub skipped: usize,
}

/// Serialize quotes as indented JSON.
pub fn export_json(quotes: &[Quote]) -> Result<String> {
    Ok(serde_json::to_string_pretty(quotes)?)
}

/// Write `quotes.json` into `dir` and return its path.
pub fn export_to_dir(quotes: &[Quote], dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(EXPORT_FILE_NAME);
    std::fs::write(&path, export_json(quotes)?)?;
    tracing::info!("Exported {} quotes to {}", quotes.len(), path.display());
    Ok(path)
}

/// Parse an import payload.
///
/// The top level must be an array. Entries without a non-empty string `text`
/// and `category` are skipped and counted.
pub fn parse_import(contents: &str) -> Result<(Vec<Quote>, ImportStats)> {
    let value: serde_json::Value = serde_json::from_str(contents)
        .map_err(|e| QuoteError::Import(format!("Error reading file: {}", e)))?;

    let entries = value.as_array().ok_or_else(|| {
        QuoteError::Import("Invalid file format. Expected an array of quotes.".into())
    })?;

    let mut quotes = Vec::with_capacity(entries.len());
    let mut stats = ImportStats::default();

    for entry in entries {
        let text = entry.get("text").and_then(|v| v.as_str());
        let category = entry.get("category").and_then(|v| v.as_str());
        match (text, category) {
            (Some(text), Some(category)) => match Quote::new(text, category) {
                Ok(quote) => {
                    quotes.push(quote);
                    stats.imported += 1;
                }
                Err(_) => stats.skipped += 1,
            },
            _ => stats.skipped += 1,
        }
    }

    if stats.skipped > 0 {
        tracing::debug!("Skipped {} malformed import entries", stats.skipped);
    }

    Ok((quotes, stats))
}
