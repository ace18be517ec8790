pub mod app;
pub mod console;
pub mod error;
pub mod events;
pub mod quotes;
pub mod remote;
pub mod settings;
pub mod storage;
pub mod sync;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};

pub use app::AppState;
pub use error::{QuoteError, Result};
pub use events::{AppEvent, EventBus, Notification, NotificationSlot, Severity};
pub use quotes::{Quote, QuoteStore};
pub use remote::{HttpRemoteSource, MemoryRemoteSource, RemoteItem, RemoteSource};
pub use settings::Settings;
pub use storage::{FileStore, KeyValueStore, MemoryStore, Persistence};
pub use sync::{ConflictPolicy, Scheduler, SchedulerHandle, SyncConfig, SyncEngine, SyncOutcome};

/// Install the ring crypto provider for rustls. reqwest is built without one.
pub fn ensure_tls_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Err means another provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Get the app data directory. `QUOTE_SYNC_DATA_DIR` overrides the platform default.
pub fn get_app_data_dir() -> PathBuf {
    match std::env::var_os("QUOTE_SYNC_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("com.quotesync.app"),
    }
}

fn get_settings_path() -> PathBuf {
    get_app_data_dir().join("settings.json")
}

/// Pick the remote source for the configured endpoint. An empty URL runs offline.
fn build_remote(settings: &Settings) -> Arc<dyn RemoteSource> {
    if settings.remote_url.trim().is_empty() {
        tracing::info!("No remote URL configured, running offline");
        Arc::new(MemoryRemoteSource::default())
    } else {
        tracing::info!("Remote source: {}", settings.remote_url);
        Arc::new(HttpRemoteSource::new(
            &settings.remote_url,
            settings.request_timeout(),
        ))
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quote_sync_lib=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting quote-sync v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = get_app_data_dir();
    let settings_path = get_settings_path();
    let settings = Settings::load(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = settings.save(&settings_path) {
            tracing::warn!("Failed to write default settings: {}", e);
        }
    }

    let durable = Arc::new(FileStore::open(&data_dir.join("storage"))?);
    let session = Arc::new(MemoryStore::new());
    let events = EventBus::default();
    let state = Arc::new(AppState::load(Persistence::new(durable, session), events));

    let slot = Arc::new(Mutex::new(NotificationSlot::new(
        settings.notification_timeout(),
    )));
    let printer = console::spawn_printer(state.events(), slot.clone());
    state.initial_quote();

    let engine = Arc::new(SyncEngine::new(
        state.clone(),
        build_remote(&settings),
        SyncConfig::from_settings(&settings),
    ));
    let scheduler = Scheduler::new(engine.clone(), settings.sync_interval()).start();

    let result = console::run_console(&state, &engine, &slot, &data_dir).await;

    scheduler.stop().await;
    printer.abort();
    tracing::info!("Shutting down");
    result
}
