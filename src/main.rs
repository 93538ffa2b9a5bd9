use paperdeck::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        storage = %config.storage_path.display(),
        model = %config.gemini_model,
        "Starting paperdeck"
    );

    paperdeck::api::serve(config).await
}
