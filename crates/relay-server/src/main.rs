//! relayd - customer service multi-agent conversation server

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_agent::{
    OpenAiCompatModel, RetryConfig, RetryingModel, Runtime, TimeoutModel, model::BoxedModel,
};
use relay_core::{CheckpointStore, FileCheckpointStore};
use relay_server::{AppState, ConversationService, ServerConfig, build_router};

/// relayd - customer service multi-agent conversation server
#[derive(Parser, Debug)]
#[command(name = "relayd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file (default: platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overriding the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Checkpoint directory, overriding the config file
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "relay=debug,tower_http=debug"
    } else {
        "relay=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load(args.config.as_deref());
    let bind = args.bind.clone().unwrap_or_else(|| config.bind.clone());

    let mut base = OpenAiCompatModel::new(&config.model.base_url, &config.model.model);
    match std::env::var(&config.model.api_key_env) {
        Ok(key) => base = base.with_api_key(key),
        Err(_) => tracing::warn!(
            "{} not set, model requests will be unauthenticated",
            config.model.api_key_env
        ),
    }
    let model: BoxedModel = Arc::new(RetryingModel::new(
        TimeoutModel::new(base, Duration::from_secs(config.model.timeout_secs)),
        RetryConfig::default(),
    ));

    let checkpoint_dir = args
        .checkpoint_dir
        .or_else(|| config.checkpoint_dir.clone())
        .unwrap_or_else(FileCheckpointStore::default_dir);
    tracing::info!("checkpoints stored in {}", checkpoint_dir.display());
    let store: Arc<dyn CheckpointStore> = Arc::new(FileCheckpointStore::new(checkpoint_dir));

    // Graph compilation happens before serving: a misconfigured
    // conversation flow aborts startup instead of reaching a customer.
    let runtime = Runtime::new(model, store.clone());
    let service = ConversationService::from_config(&config, &runtime)?;

    let app = build_router(AppState {
        service: Arc::new(service),
        store,
    });

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("relayd listening on http://{bind}");
    axum::serve(listener, app).await?;

    Ok(())
}
