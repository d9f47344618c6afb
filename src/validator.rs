// Scenario Validator - Plausibility checks, velocity repair and fallback
// validate_and_repair is total: every input yields a loadable scenario.

use std::f64::consts::PI;

use crate::catalog::OrbitalCatalog;
use crate::error::{RepairError, SynthesisFailure};
use crate::fallback::{star_and_planet, FallbackTable};
use crate::physics_engine::{
    circular_velocity, escape_velocity, find_primary, pericenter_distance, AdaptiveRk4Integrator,
    CelestialBody, IntegratorChoice, Vector3, ADAPTIVE_STEP_FRACTION, G, MAX_SUBSTEPS,
};
use crate::scenario::{GeneratedScenario, ScenarioDescription, ScenarioSource};
use crate::session::MAX_SPEED;

/// Frames per shortest orbit when the timestep has to be derived
const FRAMES_PER_SHORTEST_ORBIT: f64 = 200.0;

/// Integrator substeps per frame when only `dt` has to be derived
const STEPS_PER_FRAME: f64 = 5.0;

/// Frame duration used when no orbit exists to derive one from
const DEFAULT_T_PER_FRAME: f64 = 0.005;

/// Share of the integrator's substep budget one frame may use at top speed
const SUBSTEP_HEADROOM: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct ValidatorLimits {
    pub max_bodies: usize,
    /// M☉
    pub max_mass: f64,
    /// AU from the origin
    pub max_position: f64,
    /// AU between any two bodies
    pub min_separation: f64,
    /// Relative speed ceiling as a multiple of local escape speed
    pub escape_factor: f64,
    /// Pericenter below this fraction of the current separation is a collision course
    pub pericenter_fraction: f64,
}

impl Default for ValidatorLimits {
    fn default() -> Self {
        Self {
            max_bodies: 256,
            max_mass: 1e10,
            max_position: 1e6,
            min_separation: 1e-6,
            escape_factor: 2.0,
            pericenter_fraction: 0.01,
        }
    }
}

// =============================================================================
// CHECKS
// =============================================================================

/// Defects that repair cannot fix
pub fn structural_issues(scenario: &ScenarioDescription, limits: &ValidatorLimits) -> Vec<String> {
    let mut issues = Vec::new();

    if scenario.bodies.is_empty() {
        issues.push("scenario has no bodies".to_string());
        return issues;
    }
    if scenario.bodies.len() > limits.max_bodies {
        issues.push(format!(
            "scenario has {} bodies (limit {})",
            scenario.bodies.len(),
            limits.max_bodies
        ));
    }

    for body in &scenario.bodies {
        if !body.mass.is_finite() || body.mass <= 0.0 {
            issues.push(format!("{}: mass {} is not positive and finite", body.name, body.mass));
        } else if body.mass > limits.max_mass {
            issues.push(format!("{}: mass {:e} exceeds {:e} M☉", body.name, body.mass, limits.max_mass));
        }

        let position = body.position();
        let velocity = body.velocity();
        if !position.is_finite() || !velocity.is_finite() {
            issues.push(format!("{}: non-finite position or velocity", body.name));
        } else if position.magnitude() > limits.max_position {
            issues.push(format!(
                "{}: position {:e} AU from origin exceeds {:e} AU",
                body.name,
                position.magnitude(),
                limits.max_position
            ));
        }
    }

    for i in 0..scenario.bodies.len() {
        for j in (i + 1)..scenario.bodies.len() {
            let r = scenario.bodies[i]
                .position()
                .sub(&scenario.bodies[j].position())
                .magnitude();
            // NaN separations were already reported above
            if r < limits.min_separation {
                issues.push(format!(
                    "{} and {} are {:e} AU apart",
                    scenario.bodies[i].name, scenario.bodies[j].name, r
                ));
            }
        }
    }

    issues
}

/// Velocity defect of one body relative to its primary
pub fn kinematic_issue(bodies: &[CelestialBody], index: usize, limits: &ValidatorLimits) -> Option<String> {
    let primary = find_primary(bodies, index)?;
    let body = &bodies[index];
    let host = &bodies[primary];

    let rel = body.state.relative_to(&host.state);
    let r = rel.position.magnitude();
    let mu = G * (body.mass + host.mass);
    let speed = rel.velocity.magnitude();
    let v_esc = escape_velocity(mu, r);

    if speed > limits.escape_factor * v_esc {
        return Some(format!(
            "{}: speed {:.4} AU/yr relative to {} exceeds {}x escape speed {:.4}",
            body.name, speed, host.name, limits.escape_factor, v_esc
        ));
    }

    let q = pericenter_distance(&rel, mu);
    if q < limits.pericenter_fraction * r {
        return Some(format!(
            "{}: on a collision course with {} (pericenter {:.3e} AU at separation {:.3e} AU)",
            body.name, host.name, q, r
        ));
    }

    None
}

/// Shortest orbital period among body/primary pairs (years)
fn shortest_period(bodies: &[CelestialBody]) -> Option<f64> {
    (0..bodies.len())
        .filter_map(|i| {
            let p = find_primary(bodies, i)?;
            let r = bodies[i].state.position.sub(&bodies[p].state.position).magnitude();
            let mu = G * (bodies[i].mass + bodies[p].mass);
            Some(2.0 * PI * (r.powi(3) / mu).sqrt())
        })
        .filter(|period| period.is_finite() && *period > 0.0)
        .min_by(|a, b| a.total_cmp(b))
}

fn valid_step(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Replace unusable timesteps; returns a note per change
pub fn repair_timesteps(scenario: &mut ScenarioDescription) -> Vec<String> {
    let mut notes = Vec::new();

    if !valid_step(scenario.t_per_frame) {
        let derived = shortest_period(&scenario.to_bodies())
            .map_or(DEFAULT_T_PER_FRAME, |p| p / FRAMES_PER_SHORTEST_ORBIT);
        notes.push(format!(
            "t_per_frame {} replaced with {:.3e} yr",
            scenario.t_per_frame, derived
        ));
        scenario.t_per_frame = derived;
    }

    if !valid_step(scenario.dt) {
        let derived = scenario.t_per_frame / STEPS_PER_FRAME;
        notes.push(format!("dt {} replaced with {:.3e} yr", scenario.dt, derived));
        scenario.dt = derived;
    } else if scenario.dt > scenario.t_per_frame {
        notes.push(format!(
            "dt {:.3e} clamped to t_per_frame {:.3e}",
            scenario.dt, scenario.t_per_frame
        ));
        scenario.dt = scenario.t_per_frame;
    }

    notes
}

/// Keep one frame at top speed inside the integrator's substep budget.
///
/// Fixed-step Verlet needs `t_per_frame * speed / dt` steps, so `dt` is raised.
/// The adaptive integrator steps at a fraction of the shortest pair timescale,
/// so `t_per_frame` is lowered instead.
pub fn fit_substep_budget(scenario: &mut ScenarioDescription) -> Vec<String> {
    let mut notes = Vec::new();
    let budget = MAX_SUBSTEPS as f64 * SUBSTEP_HEADROOM;
    let top_speed = MAX_SPEED as f64;

    match scenario.integrator {
        IntegratorChoice::FastSymplectic => {
            let min_dt = scenario.t_per_frame * top_speed / budget;
            if scenario.dt < min_dt {
                notes.push(format!(
                    "dt {:.3e} raised to {:.3e} yr to fit the step budget",
                    scenario.dt, min_dt
                ));
                scenario.dt = min_dt;
            }
        }
        IntegratorChoice::HighPrecision => {
            let Some(tau) = AdaptiveRk4Integrator::shortest_timescale(&scenario.to_bodies()) else {
                return notes;
            };
            let max_t_per_frame = budget * tau * ADAPTIVE_STEP_FRACTION / top_speed;
            if valid_step(max_t_per_frame) && scenario.t_per_frame > max_t_per_frame {
                notes.push(format!(
                    "t_per_frame {:.3e} lowered to {:.3e} yr to fit the step budget",
                    scenario.t_per_frame, max_t_per_frame
                ));
                scenario.t_per_frame = max_t_per_frame;
                scenario.dt = scenario.dt.min(max_t_per_frame);
            }
        }
    }

    notes
}

/// Unit vector along the prograde circular direction at `rel_position`,
/// staying in the plane of `rel_velocity` when one is defined
fn prograde_tangent(rel_position: &Vector3, rel_velocity: &Vector3) -> Vector3 {
    let r_hat = rel_position.normalize();
    let h = rel_position.cross(rel_velocity);

    let normal = if h.magnitude() > 1e-12 * rel_position.magnitude() * rel_velocity.magnitude().max(1e-300) {
        h.normalize()
    } else if r_hat.cross(&Vector3::new(0.0, 0.0, 1.0)).magnitude() > 1e-9 {
        Vector3::new(0.0, 0.0, 1.0)
    } else {
        // Separation along z: orbit in the y-z plane
        Vector3::new(1.0, 0.0, 0.0)
    };

    normal.cross(&r_hat).normalize()
}

// =============================================================================
// VALIDATOR
// =============================================================================

pub struct ScenarioValidator {
    limits: ValidatorLimits,
    fallback: FallbackTable,
}

impl ScenarioValidator {
    pub fn new(limits: ValidatorLimits, fallback: FallbackTable) -> Self {
        Self { limits, fallback }
    }

    pub fn limits(&self) -> &ValidatorLimits {
        &self.limits
    }

    pub fn fallback(&self) -> &FallbackTable {
        &self.fallback
    }

    /// Check, repair or replace a candidate. Never fails.
    pub fn validate_and_repair(
        &self,
        candidate: Result<ScenarioDescription, SynthesisFailure>,
        original_prompt: &str,
    ) -> GeneratedScenario {
        let mut scenario = match candidate {
            Ok(scenario) => scenario,
            Err(failure) => {
                tracing::warn!(error = %failure, "Scenario synthesis failed, using fallback");
                return self.load_fallback(original_prompt, vec![failure.to_string()]);
            }
        };

        let structural = structural_issues(&scenario, &self.limits);
        if !structural.is_empty() {
            tracing::warn!(scenario = %scenario.name, issues = ?structural, "Scenario is structurally invalid");
            return self.load_fallback(original_prompt, structural);
        }

        let mut issues = repair_timesteps(&mut scenario);
        match self.repair_velocities(&mut scenario) {
            Ok(notes) => issues.extend(notes),
            Err(e) => {
                tracing::warn!(scenario = %scenario.name, error = %e, "Velocity repair failed");
                issues.push(e.to_string());
                return self.load_fallback(original_prompt, issues);
            }
        }
        issues.extend(fit_substep_budget(&mut scenario));

        let source = if issues.is_empty() {
            ScenarioSource::Accepted
        } else {
            tracing::info!(scenario = %scenario.name, repairs = issues.len(), "Scenario repaired");
            ScenarioSource::Repaired
        };

        GeneratedScenario {
            scenario,
            source,
            issues,
        }
    }

    /// Give flagged bodies a circular velocity about their primary, heaviest first
    pub fn repair_velocities(&self, scenario: &mut ScenarioDescription) -> Result<Vec<String>, RepairError> {
        let mut bodies = scenario.to_bodies();
        let mut notes = Vec::new();

        let mut order: Vec<usize> = (0..bodies.len()).collect();
        order.sort_by(|&a, &b| bodies[b].mass.total_cmp(&bodies[a].mass).then(a.cmp(&b)));

        for &index in &order {
            let Some(reason) = kinematic_issue(&bodies, index, &self.limits) else {
                continue;
            };
            let primary = find_primary(&bodies, index).ok_or_else(|| RepairError::NoPrimary {
                body: bodies[index].name.clone(),
            })?;
            let host = bodies[primary].clone();
            if !(host.mass > 0.0) {
                return Err(RepairError::NonPositivePrimaryMass {
                    body: bodies[index].name.clone(),
                });
            }

            let rel = bodies[index].state.relative_to(&host.state);
            let r = rel.position.magnitude();
            let speed = circular_velocity(G * (bodies[index].mass + host.mass), r);
            let tangent = prograde_tangent(&rel.position, &rel.velocity);
            bodies[index].state.velocity = host.state.velocity.add(&tangent.scale(speed));

            notes.push(format!(
                "{}; set circular velocity {:.4} AU/yr about {}",
                reason, speed, host.name
            ));
        }

        for index in 0..bodies.len() {
            if let Some(reason) = kinematic_issue(&bodies, index, &self.limits) {
                return Err(RepairError::StillInvalid {
                    body: bodies[index].name.clone(),
                    reason,
                });
            }
        }

        for (spec, body) in scenario.bodies.iter_mut().zip(&bodies) {
            spec.velocity = body.state.velocity.to_array();
        }
        Ok(notes)
    }

    /// Preset for the prompt, re-checked; a catalog-built preset that fails
    /// falls through to the built-in star-and-planet system
    fn load_fallback(&self, prompt: &str, mut issues: Vec<String>) -> GeneratedScenario {
        let mut scenario = self.fallback.resolve(prompt);
        let defects = structural_issues(&scenario, &self.limits);
        if !defects.is_empty() {
            tracing::warn!(preset = %scenario.name, issues = ?defects, "Fallback preset is invalid, using default");
            issues.extend(defects);
            scenario = star_and_planet(&OrbitalCatalog::builtin());
        }
        issues.extend(fit_substep_budget(&mut scenario));
        tracing::info!(prompt = %prompt, preset = %scenario.name, "Loaded fallback scenario");
        GeneratedScenario {
            scenario,
            source: ScenarioSource::Fallback,
            issues,
        }
    }
}

impl Default for ScenarioValidator {
    fn default() -> Self {
        Self::new(ValidatorLimits::default(), FallbackTable::default())
    }
}
