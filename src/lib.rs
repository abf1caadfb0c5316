pub mod combatant;
pub mod config;
pub mod engine;
pub mod parser;
pub mod reader;
pub mod report;
pub mod rules;
pub mod runes;
pub mod specs;
pub mod state;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

/// Logging: write to a daily rolling file in `log_dir`.
///
/// The returned guard flushes the writer on drop; keep it alive until the
/// process exits. `RUST_LOG` adds to the default directive.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {:?}", log_dir))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "rune-ledger.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rune_ledger_lib=info".parse()?),
        )
        .with_writer(non_blocking)
        .with_ansi(false) // log files should not contain ANSI colour codes
        .init();

    // -----------------------------------------------------------------------
    // Panic hook: log panics through tracing before the process dies.
    // -----------------------------------------------------------------------
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        tracing::error!("PANIC at {}: {}", location, message);
        eprintln!("rune-ledger panicked at {}: {}", location, message);
    }));

    tracing::info!("rune-ledger {} starting, logs in {}", env!("CARGO_PKG_VERSION"), log_dir.display());
    Ok(guard)
}

/// Analyze one timeline file (or the newest timeline in a directory).
///
/// Pipeline: reader -> parser -> engine, connected by bounded channels so
/// event order is preserved end to end.
pub async fn analyze(timeline: PathBuf, cfg: config::AnalysisConfig) -> Result<report::FightReport> {
    let path = config::resolve_timeline(&timeline)?;

    let (raw_tx, raw_rx)     = mpsc::channel::<String>(2048);
    let (event_tx, event_rx) = mpsc::channel::<parser::LogEvent>(1024);

    let reader = tokio::spawn(reader::run(path, raw_tx));
    let parser = tokio::spawn(parser::run(raw_rx, event_tx));

    let report = engine::run(event_rx, cfg).await;

    // Surface a reader failure (missing file) ahead of an empty report
    reader.await??;
    parser.await??;
    report
}
