//! Remote sync engine.
//!
//! A sync pass fetches a bounded batch of remote items, maps each to a
//! candidate quote and reconciles the candidates against the local store in
//! response order:
//!
//! - no local quote with that text: the candidate is appended
//! - same text, same category: nothing to do
//! - same text, different category: a [`ConflictRecord`] is produced and the
//!   [`ConflictPolicy`] decides which category is kept (server by default)
//!
//! Duplicate local texts are collapsed before any candidate is compared, so a
//! resolved category is the one that survives. Reconciliation is sequential: a
//! candidate is compared against the store as already modified by earlier
//! candidates of the same pass. The store is then persisted and the outcome is
//! published on the event bus. Conflicts stay pending until the user keeps
//! the local version or dismisses them.
//!
//! A conflict settled in favour of the local copy, by policy or by "keep
//! local", is remembered by text and server category and not reported again
//! while the remote keeps sending the same value.
//!
//! The network call happens before the store lock is taken, so edits made
//! while a fetch is in flight are seen by the reconciliation step. Only one
//! pass runs at a time; a pass requested while another is running is skipped.

pub mod scheduler;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::{QuoteError, Result};
use crate::events::{AppEvent, Severity};
use crate::quotes::{Quote, QuoteStore};
use crate::remote::RemoteSource;
use crate::settings::Settings;

pub use scheduler::{Scheduler, SchedulerHandle};

/// Which side wins when categories disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    ServerWins,
    LocalWins,
}

/// Side whose category was applied to a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    Server,
    Local,
}

/// Same text, different category. `local` is the pre-conflict value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRecord {
    pub local: Quote,
    pub server: Quote,
    pub winner: Winner,
}

/// Counts and conflicts of one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub added: usize,
    pub unchanged: usize,
    pub collapsed: usize,
    pub conflicts: Vec<ConflictRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was already running.
    Skipped,
    /// The remote could not be reached or read, or saving failed.
    Failed { message: String },
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub fetch_limit: usize,
    pub server_category: String,
    pub policy: ConflictPolicy,
}

impl SyncConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fetch_limit: settings.fetch_limit,
            server_category: settings.server_category.clone(),
            policy: settings.conflict_policy,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Conflicts settled in favour of the local copy, keyed by text and server category.
#[derive(Debug, Clone, Default)]
pub struct LocalOverrides {
    settled: HashSet<(String, String)>,
}

impl LocalOverrides {
    pub fn insert(&mut self, server: &Quote) {
        self.settled
            .insert((server.text.clone(), server.category.clone()));
    }

    pub fn contains(&self, server: &Quote) -> bool {
        self.settled
            .contains(&(server.text.clone(), server.category.clone()))
    }

    pub fn len(&self) -> usize {
        self.settled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settled.is_empty()
    }
}

/// Reconcile `candidates` into `store`, in order.
///
/// Candidates matching an entry in `overrides` count as unchanged. Under
/// [`ConflictPolicy::LocalWins`] every new conflict is added to `overrides`.
pub fn reconcile(
    store: &mut QuoteStore,
    candidates: Vec<Quote>,
    policy: ConflictPolicy,
    overrides: &mut LocalOverrides,
) -> SyncReport {
    let mut report = SyncReport {
        collapsed: store.collapse_duplicates(),
        ..SyncReport::default()
    };

    for candidate in candidates {
        let local = match store.find_by_text(&candidate.text) {
            None => {
                store.push(candidate);
                report.added += 1;
                continue;
            }
            Some(local) if local.category == candidate.category => {
                report.unchanged += 1;
                continue;
            }
            Some(_) if overrides.contains(&candidate) => {
                report.unchanged += 1;
                continue;
            }
            Some(local) => local.clone(),
        };

        let winner = match policy {
            ConflictPolicy::ServerWins => {
                store.set_category(&candidate.text, &candidate.category);
                Winner::Server
            }
            ConflictPolicy::LocalWins => {
                overrides.insert(&candidate);
                Winner::Local
            }
        };
        report.conflicts.push(ConflictRecord {
            local,
            server: candidate,
            winner,
        });
    }

    report
}

/// Resets the busy flag when a pass ends, including when it is cancelled.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    state: Arc<AppState>,
    remote: Arc<dyn RemoteSource>,
    config: SyncConfig,
    busy: AtomicBool,
    pending: Mutex<Vec<ConflictRecord>>,
    overrides: Mutex<LocalOverrides>,
}

impl SyncEngine {
    pub fn new(state: Arc<AppState>, remote: Arc<dyn RemoteSource>, config: SyncConfig) -> Self {
        Self {
            state,
            remote,
            config,
            busy: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
            overrides: Mutex::new(LocalOverrides::default()),
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run one sync pass unless another is in flight.
    ///
    /// Never returns an error: failures are reported as [`SyncOutcome::Failed`]
    /// and an error notification, leaving the store as it was.
    pub async fn sync_now(&self) -> SyncOutcome {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            tracing::debug!("Sync pass already in progress, skipping");
            return SyncOutcome::Skipped;
        };

        match self.run_pass().await {
            Ok(report) => SyncOutcome::Completed(report),
            Err(e) => {
                self.state
                    .events()
                    .notify(format!("Failed to sync with server: {}", e), Severity::Error);
                SyncOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn run_pass(&self) -> Result<SyncReport> {
        let items = self.remote.fetch(self.config.fetch_limit).await?;
        let candidates: Vec<Quote> = items
            .iter()
            .filter_map(|item| {
                let candidate = item.to_candidate(&self.config.server_category);
                if candidate.is_none() {
                    tracing::debug!("Skipping remote item {} with blank title", item.id);
                }
                candidate
            })
            .collect();

        let report = {
            let mut store = self.state.lock_store();
            let mut overrides = self.overrides.lock().unwrap_or_else(|e| e.into_inner());
            let mut report =
                reconcile(&mut store, candidates, self.config.policy, &mut overrides);
            report.fetched = items.len();
            self.state.commit(&store)?;
            report
        };

        tracing::info!(
            "Sync pass complete: {} fetched, {} added, {} unchanged, {} conflicts",
            report.fetched,
            report.added,
            report.unchanged,
            report.conflicts.len()
        );

        let events = self.state.events();
        if report.conflicts.is_empty() {
            events.notify("Quotes synced with server.", Severity::Success);
        } else {
            let message = match self.config.policy {
                ConflictPolicy::ServerWins => format!(
                    "{} conflict(s) resolved: server data took precedence.",
                    report.conflicts.len()
                ),
                ConflictPolicy::LocalWins => format!(
                    "{} conflict(s) found: local data was kept.",
                    report.conflicts.len()
                ),
            };
            events.notify(message, Severity::Warning);
            self.remember_conflicts(&report.conflicts);
            events.emit(AppEvent::ConflictsDetected {
                conflicts: report.conflicts.clone(),
            });
        }

        Ok(report)
    }

    fn remember_conflicts(&self, conflicts: &[ConflictRecord]) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for conflict in conflicts {
            pending.retain(|p| p.local.text != conflict.local.text);
            pending.push(conflict.clone());
        }
    }

    /// Conflicts awaiting a manual decision.
    pub fn pending_conflicts(&self) -> Vec<ConflictRecord> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn take_pending(&self, text: &str) -> Result<ConflictRecord> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let index = pending
            .iter()
            .position(|p| p.local.text == text)
            .ok_or_else(|| QuoteError::NotFound(format!("no pending conflict for \"{}\"", text)))?;
        Ok(pending.remove(index))
    }

    /// Manual override: restore the category the quote had before the conflict.
    pub fn keep_local(&self, text: &str) -> Result<Quote> {
        let conflict = self.take_pending(text)?;

        let restored = {
            let mut store = self.state.lock_store();
            if store
                .set_category(text, &conflict.local.category)
                .is_none()
            {
                return Err(QuoteError::NotFound(format!(
                    "quote \"{}\" is no longer stored",
                    text
                )));
            }
            self.state.commit(&store)?;
            self.overrides
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(&conflict.server);
            conflict.local.clone()
        };

        tracing::info!("Conflict on \"{}\" resolved in favour of local copy", text);
        self.state.events().notify(
            format!(
                "Kept local category \"{}\" for \"{}\".",
                restored.category, restored.text
            ),
            Severity::Success,
        );
        Ok(restored)
    }

    /// Accept the server version and forget the pending conflict.
    pub fn dismiss_conflict(&self, text: &str) -> Result<ConflictRecord> {
        let conflict = self.take_pending(text)?;
        self.state.events().notify(
            format!("Kept server version of \"{}\".", text),
            Severity::Info,
        );
        Ok(conflict)
    }

    /// Send a newly added quote to the remote source without waiting for it.
    pub fn publish_quote(&self, quote: Quote) -> tokio::task::JoinHandle<()> {
        let remote = Arc::clone(&self.remote);
        tokio::spawn(async move {
            match remote.publish(&quote).await {
                Ok(()) => tracing::debug!("Published quote to server"),
                Err(e) => tracing::warn!("Failed to publish quote: {}", e),
            }
        })
    }
}
