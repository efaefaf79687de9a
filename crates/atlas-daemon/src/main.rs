// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use atlas_config::AtlasConfig;
use atlas_daemon::{AppState, build_app};
use atlas_executor::Executor;
use atlas_fallback::FallbackManager;
use atlas_providers::{OllamaAdapter, OpenAiAdapter};
use atlas_receipt_store::ReceiptStore;
use atlas_registry::ProviderRegistry;
use atlas_tools::EntityStores;
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "atlas-daemon", version, about = "ATLAS intent-execution daemon")]
struct Args {
    /// Override `API_HOST` / `API_PORT` from the environment.
    #[arg(long)]
    bind: Option<String>,

    /// Enable verbose request/response logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AtlasConfig::from_env().context("loading configuration from the environment")?;
    if args.debug {
        config.debug = true;
    }

    let filter = if config.debug { EnvFilter::new("atlas=debug,tower_http=debug") } else { EnvFilter::new("atlas=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for warning in config.validate() {
        warn!(%warning, "configuration warning");
    }

    let providers = Arc::new(ProviderRegistry::new());
    providers.register(Arc::new(OllamaAdapter::new(config.ollama_base_url.clone()))).await;
    providers.register(Arc::new(OpenAiAdapter::new(config.openai_api_key.clone()))).await;
    // Anthropic/Groq keys are recognized by configuration but no adapter for
    // either provider ships in atlas-providers yet; see DESIGN.md.

    let stores = EntityStores::new();
    let tools = Arc::new(atlas_tools::build_default_registry(&stores).await);
    let skills = Arc::new(atlas_skills::build_default_registry().await);
    let fallback = Arc::new(FallbackManager::default());

    let executor = Executor::new(providers.clone(), fallback).with_skills(skills.clone(), tools.clone());

    let receipts = ReceiptStore::open(&config.data_dir).await.context("opening receipt store")?;

    let state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        executor: Arc::new(executor),
        tools,
        skills,
        providers,
        receipts: Arc::new(receipts),
        started_at: Utc::now(),
    });

    let app = build_app(state);

    let bind = args.bind.clone().unwrap_or_else(|| format!("{}:{}", config.api_host, config.api_port));
    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("bind {bind}"))?;
    info!(%bind, app_name = %config.app_name, "atlas-daemon listening");

    axum::serve(listener, app).await.context("serve")
}
