use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voice_note_capture::{
    create_router, AppState, AudioBackendFactory, CloseTrigger, Config, PreviewRegistry,
    VoiceNoteDialog,
};

#[derive(Debug, Parser)]
#[command(name = "voice-note-capture", version, about = "Voice note capture service")]
struct Cli {
    /// Config file path, without extension
    #[arg(long, global = true, default_value = "config/voice-notes")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the capture HTTP API
    Serve,

    /// Record a single voice note from the configured backend
    Record {
        /// Number of elapsed-time ticks to record for
        #[arg(long, default_value_t = 3)]
        ticks: u32,

        /// Where to write the captured note (a directory or a file path)
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "voice-note-capture starting");
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Record { ticks, out } => record(cfg, ticks, out).await,
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let backend = AudioBackendFactory::create(cfg.audio_source(), cfg.backend_config())?;
    info!("Using audio backend: {}", backend.name());

    let state = AppState::new(backend, cfg.session_config()).with_max_recording(cfg.max_recording());
    let app = create_router(state.clone());
    let expiry = cfg.session_idle().map(|max_idle| {
        info!("Expiring sessions idle for {:?}", max_idle);
        state.spawn_expiry(max_idle)
    });

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Some(expiry) = expiry {
        expiry.abort();
    }
    state.close_all().await;
    info!("voice-note-capture stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn record(cfg: Config, ticks: u32, out: PathBuf) -> Result<()> {
    let backend = AudioBackendFactory::create(cfg.audio_source(), cfg.backend_config())?;
    let session_defaults = cfg.session_config();
    let tick = session_defaults.tick_interval;

    let mut dialog = VoiceNoteDialog::new(backend, PreviewRegistry::new(), session_defaults);
    if let Some(limit) = cfg.max_recording() {
        dialog = dialog.with_max_recording(limit);
    }

    let session = dialog.open();
    dialog.start_recording().await?;
    info!("Recording for {} ticks...", ticks);

    tokio::time::sleep(tick * ticks + tick / 2).await;

    // The automatic stop may already have captured the note
    let artifact = match dialog.stop_recording()? {
        Some(artifact) => artifact,
        None => session
            .artifact()
            .context("No voice note was captured")?,
    };

    let path = if out.is_dir() {
        artifact.write_to_dir(&out)?
    } else {
        artifact.write_to(&out)?;
        out
    };

    info!(
        "Saved {} ({} bytes, {} ticks) to {}",
        artifact.suggested_name(),
        artifact.len(),
        session.elapsed_ticks(),
        path.display()
    );

    dialog.close(CloseTrigger::Button);
    Ok(())
}
