// Streaming Protocol - JSON messages exchanged over the simulation socket
// Client messages are tagged by "action", server messages by "type".

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::physics_engine::IntegratorChoice;
use crate::scenario::{BodySpec, ScenarioSource};
use crate::session::{BodyElements, Frame, SimulationSession};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    Start {
        prompt: String,
        /// Any number; the coordinator rounds and clamps it
        #[serde(default)]
        fps: Option<f64>,
    },
    Pause,
    Resume,
    Reset,
    SetSpeed {
        multiplier: f64,
    },
    GetElements,
    Stop,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPayload {
    pub session_id: Uuid,
    pub name: String,
    pub description: String,
    pub bodies: Vec<BodySpec>,
    pub integrator: IntegratorChoice,
    pub source: ScenarioSource,
    pub t_per_frame: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl ScenarioPayload {
    pub fn from_session(session: &SimulationSession, source: ScenarioSource, issues: Vec<String>) -> Self {
        let scenario = session.scenario();
        Self {
            session_id: session.id(),
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            bodies: scenario.bodies.clone(),
            integrator: scenario.integrator,
            source,
            t_per_frame: scenario.t_per_frame,
            issues,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementsPayload {
    pub bodies: Vec<BodyElements>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Status { message: String },
    Scenario { data: ScenarioPayload },
    Frame { data: Frame },
    Elements { data: ElementsPayload },
    Error { message: String },
}

impl ServerMessage {
    pub fn status(message: impl Into<String>) -> Self {
        ServerMessage::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn scenario(session: &SimulationSession, source: ScenarioSource, issues: Vec<String>) -> Self {
        ServerMessage::Scenario {
            data: ScenarioPayload::from_session(session, source, issues),
        }
    }

    pub fn frame(frame: Frame) -> Self {
        ServerMessage::Frame { data: frame }
    }

    pub fn elements(bodies: Vec<BodyElements>) -> Self {
        ServerMessage::Elements {
            data: ElementsPayload { bodies },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"serialization failed: {}"}}"#, e)
        })
    }
}
