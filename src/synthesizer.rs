// Scenario Synthesizer - Retrieval-augmented scenario generation
// Every failure is returned as SynthesisFailure; nothing else escapes.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{OracleError, SynthesisFailure};
use crate::oracle::TextOracle;
use crate::physics_engine::{BodyType, IntegratorChoice};
use crate::prompt;
use crate::retriever::Retriever;
use crate::scenario::{BodySpec, ScenarioDescription};

const DEFAULT_T_PER_FRAME: f64 = 0.005;

// =============================================================================
// ORACLE OUTPUT SCHEMA
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawScenario {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    bodies: Vec<RawBody>,
    #[serde(default)]
    integrator: Option<IntegratorChoice>,
    #[serde(default)]
    t_per_frame: Option<f64>,
    #[serde(default)]
    dt: Option<f64>,
}

/// Accepts vector fields or the flat x/y/vx/vy layout
#[derive(Debug, Deserialize)]
struct RawBody {
    #[serde(default)]
    name: Option<String>,
    mass: f64,
    #[serde(default, alias = "pos")]
    position: Option<Vec<f64>>,
    #[serde(default, alias = "vel")]
    velocity: Option<Vec<f64>>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    z: Option<f64>,
    #[serde(default)]
    vx: Option<f64>,
    #[serde(default)]
    vy: Option<f64>,
    #[serde(default)]
    vz: Option<f64>,
    #[serde(default, rename = "type")]
    body_type: Option<BodyType>,
    #[serde(default)]
    color: Option<String>,
}

fn vector_field(
    body: &str,
    field: &str,
    values: Option<&Vec<f64>>,
    flat: [Option<f64>; 3],
) -> Result<[f64; 3], SynthesisFailure> {
    match values {
        Some(v) if v.len() == 2 => Ok([v[0], v[1], 0.0]),
        Some(v) if v.len() == 3 => Ok([v[0], v[1], v[2]]),
        Some(v) => Err(SynthesisFailure::Schema(format!(
            "{}: {} has {} components, expected 2 or 3",
            body,
            field,
            v.len()
        ))),
        None => Ok([
            flat[0].unwrap_or(0.0),
            flat[1].unwrap_or(0.0),
            flat[2].unwrap_or(0.0),
        ]),
    }
}

impl RawBody {
    fn into_spec(self, index: usize) -> Result<BodySpec, SynthesisFailure> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Body {}", index + 1));
        let position = vector_field(&name, "position", self.position.as_ref(), [self.x, self.y, self.z])?;
        let velocity = vector_field(&name, "velocity", self.velocity.as_ref(), [self.vx, self.vy, self.vz])?;

        Ok(BodySpec {
            name,
            mass: self.mass,
            position,
            velocity,
            body_type: self.body_type.unwrap_or(BodyType::Planet),
            color: self.color,
        })
    }
}

/// Extract the outermost JSON object from model output
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Strict parse of raw oracle text into a scenario candidate
pub fn parse_scenario(raw: &str) -> Result<ScenarioDescription, SynthesisFailure> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let json = extract_json_object(&cleaned).ok_or(SynthesisFailure::NoJsonObject)?;

    let parsed: RawScenario =
        serde_json::from_str(json).map_err(|e| SynthesisFailure::Schema(e.to_string()))?;

    let bodies = parsed
        .bodies
        .into_iter()
        .enumerate()
        .map(|(i, body)| body.into_spec(i))
        .collect::<Result<Vec<_>, _>>()?;

    let t_per_frame = parsed.t_per_frame.unwrap_or(DEFAULT_T_PER_FRAME);
    // A missing dt follows the frame length; an invalid one is left for repair
    let dt = parsed.dt.unwrap_or(t_per_frame / 5.0);

    Ok(ScenarioDescription {
        name: parsed
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Custom Simulation".to_string()),
        description: parsed.description.unwrap_or_default(),
        bodies,
        integrator: parsed.integrator.unwrap_or(IntegratorChoice::HighPrecision),
        t_per_frame,
        dt,
    })
}

// =============================================================================
// SYNTHESIZER
// =============================================================================

pub struct ScenarioSynthesizer {
    retriever: Arc<dyn Retriever>,
    oracle: Arc<dyn TextOracle>,
    oracle_timeout: Duration,
    retrieval_k: usize,
}

impl ScenarioSynthesizer {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        oracle: Arc<dyn TextOracle>,
        oracle_timeout: Duration,
        retrieval_k: usize,
    ) -> Self {
        Self {
            retriever,
            oracle,
            oracle_timeout,
            retrieval_k,
        }
    }

    pub async fn synthesize(&self, user_prompt: &str) -> Result<ScenarioDescription, SynthesisFailure> {
        let documents = match self.retriever.retrieve(user_prompt, self.retrieval_k).await {
            Ok(documents) => documents,
            Err(e) => {
                tracing::warn!(error = %e, "Retrieval failed, synthesizing without reference data");
                Vec::new()
            }
        };

        let request = prompt::scenario_request(user_prompt, &documents);
        let raw = tokio::time::timeout(self.oracle_timeout, self.oracle.complete(&request))
            .await
            .map_err(|_| OracleError::Timeout {
                secs: self.oracle_timeout.as_secs(),
            })??;

        tracing::debug!(chars = raw.len(), context_docs = documents.len(), "Parsing oracle scenario");
        parse_scenario(&raw)
    }
}
