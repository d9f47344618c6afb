// State Manager - Shared service handles
// Built once at startup and cloned into every request handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::OrbitalCatalog;
use crate::chat::ChatOrchestrator;
use crate::config::Config;
use crate::fallback::FallbackTable;
use crate::oracle::{OllamaClient, TextOracle};
use crate::protocol::ScenarioPayload;
use crate::retriever::{IndexRetriever, Retriever};
use crate::scenario_pipeline::ScenarioPipeline;
use crate::session::{BodyElements, Frame, SimulationSession};
use crate::synthesizer::ScenarioSynthesizer;
use crate::validator::{ScenarioValidator, ValidatorLimits};

/// Upper bound on frames returned by a one-shot simulation
pub const MAX_REPORT_FRAMES: usize = 300;

// =============================================================================
// GLOBAL STATE
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<OrbitalCatalog>,
    pub retriever: Arc<dyn Retriever>,
    pub oracle: Arc<dyn TextOracle>,
    pub pipeline: Arc<ScenarioPipeline>,
    pub chat: Arc<ChatOrchestrator>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create the production handles and start loading the document index.
    /// Must be called inside a Tokio runtime.
    pub fn initialize(config: Config) -> Self {
        let catalog = match &config.catalog_path {
            Some(path) => match OrbitalCatalog::load(path) {
                Ok(catalog) => {
                    tracing::info!(path = %path.display(), entries = catalog.entry_count(), "Catalog loaded");
                    catalog
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Catalog unreadable, using built-in tables");
                    OrbitalCatalog::builtin()
                }
            },
            None => OrbitalCatalog::builtin(),
        };

        let retriever = Arc::new(IndexRetriever::new(&config.ollama_url, config.retrieval_timeout));
        retriever.load_in_background(config.index_path.clone());

        let oracle: Arc<dyn TextOracle> = Arc::new(OllamaClient::new(&config.ollama_url, &config.model));

        Self::with_components(config, Arc::new(catalog), retriever, oracle)
    }

    /// Wire the services around injected retrieval and oracle backends
    pub fn with_components(
        config: Config,
        catalog: Arc<OrbitalCatalog>,
        retriever: Arc<dyn Retriever>,
        oracle: Arc<dyn TextOracle>,
    ) -> Self {
        let validator = Arc::new(ScenarioValidator::new(
            ValidatorLimits::default(),
            FallbackTable::new(Arc::clone(&catalog)),
        ));
        let synthesizer = ScenarioSynthesizer::new(
            Arc::clone(&retriever),
            Arc::clone(&oracle),
            config.oracle_timeout,
            config.retrieval_k,
        );
        let pipeline = Arc::new(ScenarioPipeline::new(synthesizer, validator, config.prefer_presets));
        let chat = Arc::new(ChatOrchestrator::new(
            Arc::clone(&retriever),
            Arc::clone(&oracle),
            config.oracle_timeout,
            config.retrieval_k,
            config.chat_domain_gate,
        ));

        Self {
            config: Arc::new(config),
            catalog,
            retriever,
            oracle,
            pipeline,
            chat,
            started_at: Utc::now(),
        }
    }

    pub fn rag_ready(&self) -> bool {
        self.retriever.document_count() > 0
    }

    /// Generate a scenario and integrate up to `frames` frames without streaming
    pub async fn simulate_once(&self, prompt: &str, frames: usize) -> SimulationReport {
        let generated = self.pipeline.generate(prompt).await;
        let frames = frames.min(MAX_REPORT_FRAMES);

        let mut session = SimulationSession::new(generated.scenario);
        session.play();
        let scenario = ScenarioPayload::from_session(&session, generated.source, generated.issues);

        let joined = tokio::task::spawn_blocking(move || {
            let mut collected = Vec::with_capacity(frames);
            if frames > 0 {
                collected.push(session.current_frame());
            }
            let mut error = None;
            while collected.len() < frames {
                match session.advance() {
                    Ok(Some(frame)) => collected.push(frame),
                    Ok(None) => break,
                    Err(e) => {
                        error = Some(e.to_string());
                        break;
                    }
                }
            }
            let elements = session.orbital_elements();
            (collected, elements, error)
        })
        .await;

        let (frames, elements, error) = match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "One-shot simulation task failed");
                (Vec::new(), Vec::new(), Some(e.to_string()))
            }
        };

        SimulationReport {
            scenario,
            frames,
            elements,
            error,
        }
    }
}

// =============================================================================
// SERIALIZABLE REPORT FOR HTTP CLIENTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub scenario: ScenarioPayload,
    pub frames: Vec<Frame>,
    pub elements: Vec<BodyElements>,
    /// Set when integration stopped early
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
