// Astro Thesaurus - Prompt-driven N-body simulation server
// Library root: module tree and server entry point

pub mod catalog;
pub mod chat;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fallback;
pub mod index_builder;
pub mod oracle;
pub mod physics_engine;
pub mod prompt;
pub mod protocol;
pub mod retriever;
pub mod scenario;
pub mod scenario_pipeline;
pub mod server;
pub mod session;
pub mod state_manager;
pub mod synthesizer;
pub mod validator;

pub use config::Config;
pub use scenario::{GeneratedScenario, ScenarioDescription, ScenarioSource};
pub use session::SimulationSession;
pub use state_manager::AppState;

/// Build the shared state and serve until the listener fails
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let state = AppState::initialize(config);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("cannot bind {}: {}", addr, e))?;
    server::serve(listener, state).await?;
    Ok(())
}
