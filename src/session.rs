// Simulation Session - One live integration run and its play state
// Owns the validated scenario, the body set and the energy baseline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IntegratorError;
use crate::physics_engine::{
    calculate_total_energy, find_primary, move_to_center_of_momentum, CelestialBody, Integrator,
    OrbitalElements, G,
};
use crate::scenario::ScenarioDescription;

pub const MIN_SPEED: u32 = 1;
pub const MAX_SPEED: u32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    Created,
    Playing,
    Paused,
    Terminated,
}

// =============================================================================
// SERIALIZABLE SNAPSHOTS FOR FRONTEND
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FrameBody {
    pub name: String,
    #[serde(rename = "type")]
    pub body_type: String,
    pub mass: f64,
    pub position: [f64; 3], // AU
    pub velocity: [f64; 3], // AU/yr
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    pub bodies: Vec<FrameBody>,
    /// Simulation time (years)
    pub t: f64,
    pub frame: u64,
    pub energy_drift: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BodyElements {
    pub name: String,
    pub primary: String,
    pub a: f64,
    pub e: f64,
    pub inc_deg: f64,
    pub node_deg: f64,
    pub peri_deg: f64,
    pub true_anomaly_deg: f64,
    /// Years; absent for unbound orbits
    pub period: Option<f64>,
}

/// Clamp a requested speed multiplier to the supported range
pub fn clamp_speed(multiplier: f64) -> u32 {
    if !multiplier.is_finite() {
        return MIN_SPEED;
    }
    multiplier.round().clamp(MIN_SPEED as f64, MAX_SPEED as f64) as u32
}

// =============================================================================
// SESSION
// =============================================================================

pub struct SimulationSession {
    id: Uuid,
    scenario: ScenarioDescription,
    integrator: Box<dyn Integrator>,
    initial_bodies: Vec<CelestialBody>,
    bodies: Vec<CelestialBody>,
    time: f64,
    frame: u64,
    play_state: PlayState,
    speed: u32,
    initial_energy: f64,
    created_at: DateTime<Utc>,
}

impl SimulationSession {
    /// Load a validated scenario; bodies move to the centre-of-momentum frame
    pub fn new(scenario: ScenarioDescription) -> Self {
        let mut bodies = scenario.to_bodies();
        move_to_center_of_momentum(&mut bodies);
        let initial_energy = calculate_total_energy(&bodies);
        let integrator = scenario.integrator.build(scenario.dt);

        Self {
            id: Uuid::new_v4(),
            integrator,
            initial_bodies: bodies.clone(),
            bodies,
            time: 0.0,
            frame: 0,
            play_state: PlayState::Created,
            speed: MIN_SPEED,
            initial_energy,
            created_at: Utc::now(),
            scenario,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scenario(&self) -> &ScenarioDescription {
        &self.scenario
    }

    pub fn bodies(&self) -> &[CelestialBody] {
        &self.bodies
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn initial_energy(&self) -> f64 {
        self.initial_energy
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_terminated(&self) -> bool {
        self.play_state == PlayState::Terminated
    }

    pub fn play(&mut self) {
        if self.play_state != PlayState::Terminated {
            self.play_state = PlayState::Playing;
        }
    }

    pub fn pause(&mut self) {
        if self.play_state == PlayState::Playing {
            self.play_state = PlayState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if matches!(self.play_state, PlayState::Paused | PlayState::Created) {
            self.play_state = PlayState::Playing;
        }
    }

    /// Restore t = 0; the play state is left alone
    pub fn reset(&mut self) {
        if self.is_terminated() {
            return;
        }
        self.bodies = self.initial_bodies.clone();
        self.time = 0.0;
        self.frame = 0;
    }

    /// Returns the effective multiplier
    pub fn set_speed(&mut self, multiplier: f64) -> u32 {
        self.speed = clamp_speed(multiplier);
        self.speed
    }

    pub fn terminate(&mut self) {
        self.play_state = PlayState::Terminated;
    }

    /// Relative energy change since load, signed
    pub fn energy_drift(&self) -> f64 {
        if self.initial_energy == 0.0 {
            return 0.0;
        }
        (calculate_total_energy(&self.bodies) - self.initial_energy) / self.initial_energy
    }

    /// Integrate one frame while playing; `None` otherwise.
    /// A domain error terminates the session.
    pub fn advance(&mut self) -> Result<Option<Frame>, IntegratorError> {
        if self.play_state != PlayState::Playing {
            return Ok(None);
        }

        let duration = self.scenario.t_per_frame * self.speed as f64;
        // Work on a copy so a failed advance leaves the last good state
        let mut next = self.bodies.clone();
        match self.integrator.advance(&mut next, duration) {
            Ok(_) => {
                self.bodies = next;
                self.time += duration;
                self.frame += 1;
                Ok(Some(self.current_frame()))
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "Integration failed, terminating session");
                self.terminate();
                Err(e)
            }
        }
    }

    pub fn current_frame(&self) -> Frame {
        let bodies = self
            .bodies
            .iter()
            .map(|b| FrameBody {
                name: b.name.clone(),
                body_type: b.body_type.as_str().to_string(),
                mass: b.mass,
                position: b.state.position.to_array(),
                velocity: b.state.velocity.to_array(),
            })
            .collect();

        Frame {
            bodies,
            t: self.time,
            frame: self.frame,
            energy_drift: self.energy_drift(),
        }
    }

    /// Osculating elements of every body that has a primary
    pub fn orbital_elements(&self) -> Vec<BodyElements> {
        (0..self.bodies.len())
            .filter_map(|i| {
                let p = find_primary(&self.bodies, i)?;
                let body = &self.bodies[i];
                let primary = &self.bodies[p];
                let mu = G * (body.mass + primary.mass);
                let rel = body.state.relative_to(&primary.state);
                let elements = OrbitalElements::from_state_vector(&rel, mu);

                Some(BodyElements {
                    name: body.name.clone(),
                    primary: primary.name.clone(),
                    a: elements.semi_major_axis,
                    e: elements.eccentricity,
                    inc_deg: elements.inclination.to_degrees(),
                    node_deg: elements.longitude_ascending_node.to_degrees(),
                    peri_deg: elements.argument_perihelion.to_degrees(),
                    true_anomaly_deg: elements.true_anomaly().to_degrees(),
                    period: elements.period(mu),
                })
            })
            .collect()
    }
}
