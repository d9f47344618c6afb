// Astro Thesaurus - Server binary

use astro_thesaurus::Config;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .compact()
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.bind_addr(),
        model = %config.model,
        index = %config.index_path.display(),
        "Astro Thesaurus starting"
    );

    astro_thesaurus::run(config).await
}
