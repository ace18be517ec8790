//! Application state: the quote store, the category filter and the user
//! operations on them.
//!
//! `AppState` is owned by the application root and shared by `Arc` with the
//! sync engine, the scheduler and the presenter. Every mutation of the store
//! is persisted and followed by a `QuotesChanged` event.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rand::seq::SliceRandom;

use crate::error::{QuoteError, Result};
use crate::events::{AppEvent, EventBus, Severity};
use crate::quotes::transfer::{self, ImportStats};
use crate::quotes::{Quote, QuoteStore, ALL_CATEGORIES};
use crate::storage::Persistence;

pub struct AppState {
    store: Mutex<QuoteStore>,
    selected_category: Mutex<String>,
    persistence: Persistence,
    events: EventBus,
}

impl AppState {
    /// Initialize from persisted state (or the seed quotes).
    pub fn load(persistence: Persistence, events: EventBus) -> Self {
        let store = QuoteStore::new(persistence.load_quotes());
        let selected = persistence.load_selected_category();
        tracing::info!(
            "Loaded {} quotes, selected category: {}",
            store.len(),
            selected
        );
        Self {
            store: Mutex::new(store),
            selected_category: Mutex::new(selected),
            persistence,
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub(crate) fn lock_store(&self) -> MutexGuard<'_, QuoteStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Persist the (locked) store and publish the refreshed category list.
    pub(crate) fn commit(&self, store: &QuoteStore) -> Result<()> {
        self.persistence.save_quotes(store.as_slice())?;
        let selected = self.selected_category();
        self.events.emit(AppEvent::QuotesChanged {
            categories: store.category_options(),
            visible: store.filtered_by(&selected).count(),
            selected,
        });
        Ok(())
    }

    /// Snapshot of all quotes in order.
    pub fn quotes(&self) -> Vec<Quote> {
        self.lock_store().as_slice().to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_store().is_empty()
    }

    pub fn find_by_text(&self, text: &str) -> Option<Quote> {
        self.lock_store().find_by_text(text).cloned()
    }

    pub fn category_options(&self) -> Vec<String> {
        self.lock_store().category_options()
    }

    /// Add a quote typed in by the user.
    ///
    /// Blank fields are rejected with a warning and leave the store untouched.
    /// On success the new quote becomes the shown quote.
    pub fn add_quote(&self, text: &str, category: &str) -> Result<Quote> {
        let quote = {
            let mut store = self.lock_store();
            let quote = match store.add(text, category).cloned() {
                Ok(quote) => quote,
                Err(e) => {
                    drop(store);
                    self.events
                        .notify("Please fill out both fields.", Severity::Warning);
                    return Err(e);
                }
            };
            if let Err(e) = self.commit(&store) {
                drop(store);
                self.events
                    .notify(format!("Failed to save quotes: {}", e), Severity::Error);
                return Err(e);
            }
            quote
        };

        tracing::info!("Added quote in category {}", quote.category);
        self.display(&quote);
        self.events
            .notify("Quote added successfully!", Severity::Success);
        Ok(quote)
    }

    pub fn selected_category(&self) -> String {
        self.selected_category
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Change the filter and return the quotes it selects.
    ///
    /// A blank value resets the filter to `"All"`.
    pub fn set_selected_category(&self, category: &str) -> Result<Vec<Quote>> {
        let category = match category.trim() {
            "" => ALL_CATEGORIES,
            trimmed => trimmed,
        };
        self.persistence.save_selected_category(category)?;
        *self
            .selected_category
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = category.to_string();
        tracing::debug!("Selected category: {}", category);
        Ok(self.filtered_quotes())
    }

    /// Quotes matching the current filter.
    pub fn filtered_quotes(&self) -> Vec<Quote> {
        let selected = self.selected_category();
        self.lock_store()
            .filtered_by(&selected)
            .cloned()
            .collect()
    }

    /// Pick a random quote from the current filter and display it.
    pub fn show_random_quote(&self) -> Option<Quote> {
        let filtered = self.filtered_quotes();
        let Some(quote) = filtered.choose(&mut rand::thread_rng()).cloned() else {
            let message = if self.is_empty() {
                "No quotes available. Please add one!".to_string()
            } else {
                format!("No quotes in category \"{}\".", self.selected_category())
            };
            self.events.notify(message, Severity::Info);
            return None;
        };
        self.display(&quote);
        Some(quote)
    }

    /// The quote to show at startup: the last one shown in this session, or a
    /// random one.
    pub fn initial_quote(&self) -> Option<Quote> {
        match self.persistence.load_last_shown() {
            Some(quote) => {
                self.events.emit(AppEvent::QuoteShown(quote.clone()));
                Some(quote)
            }
            None => self.show_random_quote(),
        }
    }

    fn display(&self, quote: &Quote) {
        if let Err(e) = self.persistence.save_last_shown(quote) {
            tracing::warn!("Failed to remember last shown quote: {}", e);
        }
        self.events.emit(AppEvent::QuoteShown(quote.clone()));
    }

    /// Write `quotes.json` into `dir`.
    pub fn export_quotes(&self, dir: &Path) -> Result<PathBuf> {
        let quotes = self.quotes();
        match transfer::export_to_dir(&quotes, dir) {
            Ok(path) => {
                self.events.notify(
                    format!("Exported {} quotes to {}", quotes.len(), path.display()),
                    Severity::Success,
                );
                Ok(path)
            }
            Err(e) => {
                self.events
                    .notify(format!("Export failed: {}", e), Severity::Error);
                Err(e)
            }
        }
    }

    /// Import a JSON payload, appending every well-formed entry.
    pub fn import_quotes(&self, contents: &str) -> Result<ImportStats> {
        let (quotes, stats) = match transfer::parse_import(contents) {
            Ok(parsed) => parsed,
            Err(e) => {
                let message = match &e {
                    QuoteError::Import(message) => message.clone(),
                    other => other.to_string(),
                };
                self.events.notify(message, Severity::Error);
                return Err(e);
            }
        };

        {
            let mut store = self.lock_store();
            for quote in quotes {
                store.push(quote);
            }
            if let Err(e) = self.commit(&store) {
                drop(store);
                self.events
                    .notify(format!("Failed to save quotes: {}", e), Severity::Error);
                return Err(e);
            }
        }

        tracing::info!(
            "Imported {} quotes ({} skipped)",
            stats.imported,
            stats.skipped
        );
        self.events
            .notify("Quotes imported successfully!", Severity::Success);
        self.show_random_quote();
        Ok(stats)
    }

    /// Read an import file from disk and import it.
    pub fn import_file(&self, path: &Path) -> Result<ImportStats> {
        match std::fs::read_to_string(path) {
            Ok(contents) => self.import_quotes(&contents),
            Err(e) => {
                self.events
                    .notify(format!("Error reading file: {}", e), Severity::Error);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::default_quotes;

    fn test_state() -> AppState {
        AppState::load(Persistence::in_memory(), EventBus::new(64))
    }

    fn drain_notifications(
        rx: &mut tokio::sync::broadcast::Receiver<AppEvent>,
    ) -> Vec<(Severity, String)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Notification(n) = event {
                out.push((n.severity, n.message));
            }
        }
        out
    }

    #[test]
    fn test_add_quote_refreshes_filtered_view() {
        let state = test_state();
        state.set_selected_category("Wisdom").unwrap();
        let mut rx = state.events().subscribe();

        state.add_quote("Be yourself.", "Wisdom").unwrap();

        let mut refreshed = None;
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::QuotesChanged { selected, visible, categories } = event {
                refreshed = Some((selected, visible, categories));
            }
        }
        let (selected, visible, categories) = refreshed.unwrap();
        assert_eq!(selected, "Wisdom");
        assert_eq!(visible, 1);
        assert!(categories.contains(&"Wisdom".to_string()));
    }

    #[test]
    fn test_load_uses_seed_quotes() {
        let state = test_state();
        assert_eq!(state.quotes(), default_quotes());
        assert_eq!(state.selected_category(), "All");
    }

    #[test]
    fn test_add_quote_persists_and_shows() {
        let state = test_state();
        let mut rx = state.events().subscribe();
        let before = state.len();

        let quote = state.add_quote("Be yourself.", "Wisdom").unwrap();
        assert_eq!(state.len(), before + 1);
        assert_eq!(state.find_by_text("Be yourself."), Some(quote.clone()));
        assert!(state.persistence().load_quotes().contains(&quote));
        assert_eq!(state.persistence().load_last_shown(), Some(quote));
        assert!(state.category_options().contains(&"Wisdom".to_string()));

        let notes = drain_notifications(&mut rx);
        assert!(notes.contains(&(Severity::Success, "Quote added successfully!".into())));
    }

    #[test]
    fn test_add_quote_rejects_blank() {
        let state = test_state();
        let mut rx = state.events().subscribe();
        let before = state.len();

        assert!(state.add_quote("   ", "Life").is_err());
        assert_eq!(state.len(), before);

        let notes = drain_notifications(&mut rx);
        assert_eq!(notes, vec![(Severity::Warning, "Please fill out both fields.".into())]);
    }

    #[test]
    fn test_selected_category_filters_and_persists() {
        let state = test_state();
        let filtered = state.set_selected_category("motivation").unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].category, "Motivation");
        assert_eq!(state.persistence().load_selected_category(), "motivation");

        let all = state.set_selected_category("  ").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(state.selected_category(), "All");
    }

    /// Durable store that rejects every write.
    struct ReadOnlyStore;

    impl crate::storage::KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_selected_category_unchanged_when_save_fails() {
        let persistence = Persistence::new(
            std::sync::Arc::new(ReadOnlyStore),
            std::sync::Arc::new(crate::storage::MemoryStore::new()),
        );
        let state = AppState::load(persistence, EventBus::new(8));

        assert!(state.set_selected_category("Life").is_err());
        assert_eq!(state.selected_category(), "All");
        assert_eq!(state.filtered_quotes().len(), 3);
    }

    #[test]
    fn test_show_random_quote_respects_filter() {
        let state = test_state();
        state.set_selected_category("Life").unwrap();
        for _ in 0..10 {
            let quote = state.show_random_quote().unwrap();
            assert_eq!(quote.category, "Life");
        }
    }

    #[test]
    fn test_show_random_quote_with_empty_filter() {
        let state = test_state();
        let mut rx = state.events().subscribe();
        state.set_selected_category("Humor").unwrap();

        assert!(state.show_random_quote().is_none());
        let notes = drain_notifications(&mut rx);
        assert_eq!(notes[0].0, Severity::Info);
    }

    #[test]
    fn test_initial_quote_prefers_last_shown() {
        let state = test_state();
        let quote = Quote::new("Remembered", "Session").unwrap();
        state.persistence().save_last_shown(&quote).unwrap();
        assert_eq!(state.initial_quote(), Some(quote));
    }

    #[test]
    fn test_import_appends_well_formed_entries() {
        let state = test_state();
        let before = state.len();

        let stats = state
            .import_quotes(r#"[{"text":"B","category":"C"}, {"text":"","category":"D"}]"#)
            .unwrap();

        assert_eq!(stats.imported, 1);
        assert_eq!(state.len(), before + 1);
        assert_eq!(state.find_by_text("B").unwrap().category, "C");
        assert!(state.find_by_text("").is_none());
    }

    #[test]
    fn test_import_rejects_non_array() {
        let state = test_state();
        let mut rx = state.events().subscribe();
        let before = state.len();

        assert!(state.import_quotes(r#"{"text":"B"}"#).is_err());
        assert_eq!(state.len(), before);

        let notes = drain_notifications(&mut rx);
        assert_eq!(
            notes,
            vec![(
                Severity::Error,
                "Invalid file format. Expected an array of quotes.".into()
            )]
        );
    }

    #[test]
    fn test_export_then_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state();
        let path = state.export_quotes(dir.path()).unwrap();

        let other = AppState::load(Persistence::in_memory(), EventBus::new(8));
        let stats = other.import_file(&path).unwrap();
        assert_eq!(stats.imported, 3);
        assert_eq!(other.len(), 6);
    }
}
