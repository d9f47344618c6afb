// Scenario Pipeline - Prompt to validated, loadable scenario
// Presets, synthesis, then validation/repair with keyword fallback.

use std::sync::Arc;

use crate::scenario::{GeneratedScenario, ScenarioSource};
use crate::synthesizer::ScenarioSynthesizer;
use crate::validator::ScenarioValidator;

pub struct ScenarioPipeline {
    synthesizer: ScenarioSynthesizer,
    validator: Arc<ScenarioValidator>,
    /// Serve matching presets without consulting the oracle
    prefer_presets: bool,
}

impl ScenarioPipeline {
    pub fn new(synthesizer: ScenarioSynthesizer, validator: Arc<ScenarioValidator>, prefer_presets: bool) -> Self {
        Self {
            synthesizer,
            validator,
            prefer_presets,
        }
    }

    pub fn validator(&self) -> &ScenarioValidator {
        &self.validator
    }

    /// Always returns a scenario that satisfies the validator's invariants
    pub async fn generate(&self, prompt: &str) -> GeneratedScenario {
        if self.prefer_presets {
            if let Some(scenario) = self.validator.fallback().match_preset(prompt) {
                tracing::info!(preset = %scenario.name, "Serving built-in preset");
                return GeneratedScenario {
                    scenario,
                    source: ScenarioSource::Preset,
                    issues: Vec::new(),
                };
            }
        }

        let candidate = self.synthesizer.synthesize(prompt).await;
        let generated = self.validator.validate_and_repair(candidate, prompt);
        tracing::info!(
            scenario = %generated.scenario.name,
            source = generated.source.as_str(),
            bodies = generated.scenario.bodies.len(),
            issues = generated.issues.len(),
            "Scenario ready"
        );
        generated
    }
}
