// Scenario Model - Initial conditions handed from the pipeline to a session
// Positions in AU, velocities in AU/yr, masses in solar masses.

use serde::{Deserialize, Serialize};

use crate::physics_engine::{
    BodyType, CelestialBody, IntegratorChoice, StateVector, Vector3,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BodySpec {
    pub name: String,
    pub mass: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    #[serde(rename = "type")]
    pub body_type: BodyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl BodySpec {
    pub fn new(name: &str, mass: f64, position: Vector3, velocity: Vector3, body_type: BodyType) -> Self {
        Self {
            name: name.to_string(),
            mass,
            position: position.to_array(),
            velocity: velocity.to_array(),
            body_type,
            color: None,
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn position(&self) -> Vector3 {
        Vector3::from_array(self.position)
    }

    pub fn velocity(&self) -> Vector3 {
        Vector3::from_array(self.velocity)
    }

    pub fn to_body(&self) -> CelestialBody {
        CelestialBody::new(
            &self.name,
            self.mass,
            StateVector::new(self.position(), self.velocity()),
            self.body_type,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioDescription {
    pub name: String,
    pub description: String,
    pub bodies: Vec<BodySpec>,
    pub integrator: IntegratorChoice,
    /// Simulated years per rendered frame
    pub t_per_frame: f64,
    /// Integrator timestep (years)
    pub dt: f64,
}

impl ScenarioDescription {
    pub fn to_bodies(&self) -> Vec<CelestialBody> {
        self.bodies.iter().map(BodySpec::to_body).collect()
    }

    pub fn total_mass(&self) -> f64 {
        self.bodies.iter().map(|b| b.mass).sum()
    }
}

/// How a scenario came to be
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioSource {
    /// Oracle output passed every check untouched
    Accepted,
    /// Oracle output needed velocity or timestep repair
    Repaired,
    /// A built-in preset was chosen before asking the oracle
    Preset,
    /// Oracle output was unusable; the keyword table picked a preset
    Fallback,
}

impl ScenarioSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioSource::Accepted => "accepted",
            ScenarioSource::Repaired => "repaired",
            ScenarioSource::Preset => "preset",
            ScenarioSource::Fallback => "fallback",
        }
    }
}

/// Validated scenario plus provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedScenario {
    pub scenario: ScenarioDescription,
    pub source: ScenarioSource,
    pub issues: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_spec_serializes_type_tag() {
        let body = BodySpec::new(
            "Sun",
            1.0,
            Vector3::zero(),
            Vector3::zero(),
            BodyType::Star,
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "star");
        assert_eq!(json["position"], serde_json::json!([0.0, 0.0, 0.0]));
        assert!(json.get("color").is_none());
    }

    #[test]
    fn test_source_tags_are_snake_case() {
        let json = serde_json::to_string(&ScenarioSource::Fallback).unwrap();
        assert_eq!(json, "\"fallback\"");
        assert_eq!(ScenarioSource::Repaired.as_str(), "repaired");
    }
}
