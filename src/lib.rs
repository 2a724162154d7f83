pub mod models;
pub mod services;
pub mod api;

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::{build_router, AppState};
use services::{
    ConfigStore, DetectionOrchestrator, JsonlRecordStore, RecordStore, StaticTokenSessions,
};

static PROCESS_START: OnceLock<Instant> = OnceLock::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_PREFIX: &str = "neuroscope_";
const LOGS_TO_KEEP: usize = 30;

fn startup_elapsed_ms() -> u128 {
    PROCESS_START
        .get()
        .map(|t| t.elapsed().as_millis())
        .unwrap_or(0)
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

/// Initialize logging system with timestamped log files
pub fn init_logging() {
    PROCESS_START.get_or_init(Instant::now);

    let disable_file_log = env_flag("NEUROSCOPE_DISABLE_FILE_LOG");
    let disable_cleanup = env_flag("NEUROSCOPE_DISABLE_LOG_CLEANUP");

    // Configure subscriber filter as early as possible (so fallback logging is consistent).
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if disable_file_log {
        init_console_only_logging(env_filter);
        info!("File logging disabled via NEUROSCOPE_DISABLE_FILE_LOG");
        return;
    }

    let logs_dir = match std::env::var("NEUROSCOPE_LOG_DIR") {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => get_logs_dir(),
    };

    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Failed to create logs directory: {}", e);
        init_console_only_logging(env_filter);
        info!("Falling back to console-only logging (log dir not writable)");
        return;
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_filename = format!("{}{}.log", LOG_FILE_PREFIX, timestamp);

    // One file per process; writes stay off the request path.
    let file_appender = rolling::never(&logs_dir, &log_filename);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(file_guard);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    info!("=== NeuroScope Started ===");
    info!("Log file: {}/{}", logs_dir.display(), log_filename);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if !disable_cleanup {
        std::thread::spawn(move || {
            cleanup_old_logs(&logs_dir, LOGS_TO_KEEP);
        });
    }
}

/// Get the logs directory path
fn get_logs_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("logs")
    }

    #[cfg(not(debug_assertions))]
    {
        if let Some(data_dir) = dirs::data_local_dir() {
            return data_dir.join("neuroscope").join("logs");
        }
        PathBuf::from("logs")
    }
}

fn cleanup_old_logs(logs_dir: &Path, keep: usize) {
    let mut entries: Vec<_> = match fs::read_dir(logs_dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(_) => return,
    };

    entries.retain(|e| {
        let name = e.file_name().to_string_lossy().to_string();
        name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log")
    });

    if entries.len() <= keep {
        return;
    }

    entries.sort_by_key(|e| {
        e.metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });

    let remove_count = entries.len().saturating_sub(keep);
    for entry in entries.into_iter().take(remove_count) {
        let _ = fs::remove_file(entry.path());
    }
}

/// Console-only logging for one-shot tools; quieter default than the server.
pub fn init_cli_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    init_console_only_logging(env_filter);
}

fn init_console_only_logging(env_filter: EnvFilter) {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}

/// Options the server binary can override on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub config_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Load configuration, wire the pipeline and serve the HTTP API until shutdown.
pub async fn run(options: ServeOptions) -> anyhow::Result<()> {
    let config_dir = options
        .config_dir
        .or_else(ConfigStore::default_config_dir)
        .context("no config directory available; pass --config-dir")?;
    let store = ConfigStore::new(config_dir);
    let config = store
        .load()
        .with_context(|| format!("loading config from {}", store.config_dir().display()))?;

    let orchestrator =
        DetectionOrchestrator::from_config(&config).context("building inference client")?;

    let records: Option<Arc<dyn RecordStore>> = if config.history.enabled {
        let jsonl = JsonlRecordStore::new(store.resolve(&config.history.path));
        info!(path = %jsonl.path().display(), "history.enabled");
        Some(Arc::new(jsonl))
    } else {
        None
    };

    let sessions = Arc::new(StaticTokenSessions::new(config.sessions.clone()));
    let state = AppState::new(orchestrator, sessions, records);
    let app = build_router(state);

    let host = options.host.unwrap_or(config.server.host);
    let port = options.port.unwrap_or(config.server.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("binding {}:{}", host, port))?;

    info!(
        startup_ms = startup_elapsed_ms(),
        addr = %listener.local_addr()?,
        "server.listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("=== NeuroScope Exited ===");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("=== NeuroScope Shutting Down ===");
    }
}
