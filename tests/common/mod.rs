// Shared stubs for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use astro_thesaurus::catalog::OrbitalCatalog;
use astro_thesaurus::error::{OracleError, RetrievalError};
use astro_thesaurus::oracle::{CompletionRequest, TextOracle};
use astro_thesaurus::retriever::{DocumentCategory, Retriever, ScoredDocument};
use astro_thesaurus::{AppState, Config};

/// A valid Sun + planet scenario as a model would write it
pub const CIRCULAR_ORBIT_JSON: &str = r#"Here is your simulation:
```json
{
  "name": "Lonely Planet",
  "description": "One planet around a Sun-like star",
  "integrator": "ias15",
  "t_per_frame": 0.005,
  "dt": 0.001,
  "bodies": [
    {"name": "Sun", "mass": 1.0, "x": 0, "y": 0, "vx": 0, "vy": 0, "type": "star"},
    {"name": "Planet", "mass": 3e-6, "x": 1.0, "y": 0, "vx": 0, "vy": 6.283185307179586, "type": "planet"}
  ]
}
```"#;

pub enum Script {
    Reply(String),
    Fail,
    /// Never answers within any reasonable timeout
    Hang,
}

pub struct ScriptedOracle {
    script: Script,
    pub calls: Mutex<usize>,
}

impl ScriptedOracle {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl TextOracle for ScriptedOracle {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, OracleError> {
        *self.calls.lock() += 1;
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail => Err(OracleError::Request("connection refused".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(OracleError::Timeout { secs: 3600 })
            }
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Retriever whose index never loaded
pub struct MissingIndex;

#[async_trait]
impl Retriever for MissingIndex {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<ScoredDocument>, RetrievalError> {
        Err(RetrievalError::Unavailable {
            reason: "index not loaded".to_string(),
        })
    }

    async fn retrieve_in(
        &self,
        query: &str,
        k: usize,
        _category: DocumentCategory,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        self.retrieve(query, k).await
    }

    fn document_count(&self) -> usize {
        0
    }
}

pub fn test_config(prefer_presets: bool) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        log_level: "warn".to_string(),
        ollama_url: "http://127.0.0.1:9".to_string(),
        model: "scripted".to_string(),
        index_path: PathBuf::from("missing_index.json"),
        catalog_path: None,
        oracle_timeout: Duration::from_millis(200),
        retrieval_timeout: Duration::from_millis(200),
        retrieval_k: 5,
        default_fps: 60,
        prefer_presets,
        chat_domain_gate: true,
    }
}

pub fn app_state(script: Script, prefer_presets: bool) -> AppState {
    AppState::with_components(
        test_config(prefer_presets),
        Arc::new(OrbitalCatalog::builtin()),
        Arc::new(MissingIndex),
        ScriptedOracle::new(script),
    )
}
