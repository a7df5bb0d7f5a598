mod cli;
mod config;
mod constants;
mod core;
mod error;
mod prompts;
mod providers;
mod store;
mod telemetry;
mod transport;
mod utils;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::constants::AVAILABLE_MODELS;
use crate::core::{ConversationTurn, MediaAsset};
use crate::providers::gemini::GeminiClient;
use crate::store::{FileStore, KvStore};
use crate::telemetry::RunMonitor;
use crate::transport::{cancel_pair, HttpTransport, TokioDelay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Command::Analyze {
            source,
            model,
            config,
            store,
        } => run_analyze(source, model, config, store).await,
        cli::Command::Chat {
            message,
            model,
            config,
            store,
        } => run_chat(message, model, config, store).await,
        cli::Command::History { store, clear } => run_history(store, clear),
    }
}

async fn run_analyze(
    source: PathBuf,
    model: Option<String>,
    config: Option<String>,
    store_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let cfg = AppConfig::load(config.as_deref())?;
    let model = resolve_model(model, &cfg);
    let asset = MediaAsset::from_path(&source)?;
    info!(
        source = %source.display(),
        mime = %asset.mime_type,
        bytes = asset.len(),
        %model,
        "starting analysis"
    );

    let monitor = RunMonitor::new();
    let client = GeminiClient::new(
        cfg.api_key.clone(),
        model,
        HttpTransport::new(),
        TokioDelay,
        monitor.clone(),
    );
    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let mut result = client.analyze(&asset, &token).await?;
    result.timestamp = Some(OffsetDateTime::now_utc());

    let store = open_store(store_path, &cfg)?;
    store::append_history(&store, &result)?;
    store::save_diagnosis(&store, &result)?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    log_summary(&monitor);
    Ok(())
}

async fn run_chat(
    message: String,
    model: Option<String>,
    config: Option<String>,
    store_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let cfg = AppConfig::load(config.as_deref())?;
    let model = resolve_model(model, &cfg);
    let store = open_store(store_path, &cfg)?;
    let diagnosis = store::load_diagnosis(&store)?;
    let history = store::load_transcript(&store)?;
    let system_prompt = prompts::chat_system_prompt(diagnosis.as_ref());

    let monitor = RunMonitor::new();
    let client = GeminiClient::new(
        cfg.api_key.clone(),
        model,
        HttpTransport::new(),
        TokioDelay,
        monitor,
    );
    let reply = client
        .send_message(&history, &message, &system_prompt)
        .await?;
    println!("{reply}");

    let mut transcript = history;
    transcript.push(ConversationTurn::user(message));
    transcript.push(ConversationTurn::model(reply));
    store::save_transcript(&store, &transcript)?;
    Ok(())
}

fn run_history(store_path: Option<PathBuf>, clear: bool) -> anyhow::Result<()> {
    let path = store_path.unwrap_or_else(FileStore::default_path);
    let store = FileStore::open(path)?;
    if clear {
        store.remove(store::HISTORY_KEY)?;
        println!("history cleared");
        return Ok(());
    }
    let history = store::load_history(&store)?;
    if history.is_empty() {
        println!("no stored scans");
        return Ok(());
    }
    for item in &history {
        let when = item
            .timestamp
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_else(|| "-".to_string());
        println!("{when}  {} ({}%)", item.diagnosis, item.confidence);
    }
    Ok(())
}

fn resolve_model(model: Option<String>, cfg: &AppConfig) -> String {
    let model = model.unwrap_or_else(|| cfg.model.clone());
    if !AVAILABLE_MODELS.contains(&model.as_str()) {
        warn!(%model, "model not in the known list; trying anyway");
    }
    model
}

fn open_store(store_path: Option<PathBuf>, cfg: &AppConfig) -> anyhow::Result<FileStore> {
    let path = store_path
        .or_else(|| cfg.store_file.clone())
        .unwrap_or_else(FileStore::default_path);
    FileStore::open(path.clone()).with_context(|| format!("opening store {}", path.display()))
}

fn log_summary(monitor: &RunMonitor) {
    for event in monitor.events() {
        debug!(
            operation = %event.operation,
            status = event.status,
            duration_sec = event.duration_seconds(),
            "request"
        );
    }
    let summary = monitor.summarize();
    info!(
        requests = summary.total_requests,
        elapsed_sec = summary.total_duration_seconds,
        "analysis complete"
    );
}
