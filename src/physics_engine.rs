// Physics Engine - N-Body Orbital Mechanics
// Implements mutual gravity, an adaptive RK4 and a Velocity Verlet integrator,
// Keplerian element conversion and energy bookkeeping in solar units.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::IntegratorError;

// =============================================================================
// PHYSICAL CONSTANTS (AU, years, solar masses)
// =============================================================================

/// Gravitational constant (AU³/(M☉·yr²)) - exactly 4π² in these units
pub const G: f64 = 4.0 * PI * PI;

/// Speed conversion: 1 AU/yr in km/s
pub const KM_S_PER_AU_YR: f64 = 4.740_470_463_533_348;

/// Pair separation (AU) below which the integration is considered singular
pub const COLLISION_DISTANCE: f64 = 1e-9;

/// Fraction of the shortest dynamical timescale used as the RK4 substep
pub const ADAPTIVE_STEP_FRACTION: f64 = 0.005;

/// Substep budget for a single advance before the run is declared singular
pub const MAX_SUBSTEPS: usize = 50_000;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    pub fn magnitude_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 1e-15 {
            Self {
                x: self.x / mag,
                y: self.y / mag,
                z: self.z / mag,
            }
        } else {
            Self::zero()
        }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

// =============================================================================
// STATE VECTOR (Position + Velocity)
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StateVector {
    pub position: Vector3, // AU
    pub velocity: Vector3, // AU/yr
}

impl StateVector {
    pub fn new(position: Vector3, velocity: Vector3) -> Self {
        Self { position, velocity }
    }

    pub fn zero() -> Self {
        Self {
            position: Vector3::zero(),
            velocity: Vector3::zero(),
        }
    }

    /// State of `self` as seen from `origin`
    pub fn relative_to(&self, origin: &StateVector) -> StateVector {
        StateVector {
            position: self.position.sub(&origin.position),
            velocity: self.velocity.sub(&origin.velocity),
        }
    }
}

// =============================================================================
// KEPLERIAN ORBITAL ELEMENTS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OrbitalElements {
    /// Semi-major axis (AU); negative for hyperbolic orbits
    pub semi_major_axis: f64,
    /// Eccentricity (0-1 for elliptical)
    pub eccentricity: f64,
    /// Inclination (radians)
    pub inclination: f64,
    /// Longitude of ascending node (radians)
    pub longitude_ascending_node: f64,
    /// Argument of periapsis (radians)
    pub argument_perihelion: f64,
    /// Mean anomaly (radians)
    pub mean_anomaly: f64,
}

impl OrbitalElements {
    /// Elements from degrees, the way catalogs publish them
    pub fn from_degrees(
        semi_major_axis: f64,
        eccentricity: f64,
        inclination_deg: f64,
        node_deg: f64,
        periapsis_deg: f64,
        mean_anomaly_deg: f64,
    ) -> Self {
        Self {
            semi_major_axis,
            eccentricity,
            inclination: inclination_deg.to_radians(),
            longitude_ascending_node: node_deg.to_radians(),
            argument_perihelion: periapsis_deg.to_radians(),
            mean_anomaly: mean_anomaly_deg.to_radians(),
        }
    }

    /// Convert orbital elements to a Cartesian state vector relative to the
    /// primary, for an elliptical orbit with gravitational parameter `mu`
    pub fn to_state_vector(&self, mu: f64) -> StateVector {
        let a = self.semi_major_axis;
        let e = self.eccentricity;
        let i = self.inclination;
        let omega_big = self.longitude_ascending_node; // Ω
        let omega_small = self.argument_perihelion; // ω

        let eccentric_anomaly = solve_kepler_equation(self.mean_anomaly, e);

        let cos_e = eccentric_anomaly.cos();
        let true_anomaly = 2.0
            * ((1.0 + e).sqrt() * (eccentric_anomaly / 2.0).sin())
                .atan2((1.0 - e).sqrt() * (eccentric_anomaly / 2.0).cos());

        // Distance from focus
        let r = a * (1.0 - e * cos_e);

        // Position in orbital plane (perifocal frame)
        let cos_nu = true_anomaly.cos();
        let sin_nu = true_anomaly.sin();
        let x_orb = r * cos_nu;
        let y_orb = r * sin_nu;

        // Velocity in orbital plane
        let sqrt_mu_p = (mu / (a * (1.0 - e * e))).sqrt();
        let vx_orb = -sqrt_mu_p * sin_nu;
        let vy_orb = sqrt_mu_p * (e + cos_nu);

        // Perifocal -> inertial rotation
        let cos_omega = omega_big.cos();
        let sin_omega = omega_big.sin();
        let cos_w = omega_small.cos();
        let sin_w = omega_small.sin();
        let cos_i = i.cos();
        let sin_i = i.sin();

        let r11 = cos_omega * cos_w - sin_omega * sin_w * cos_i;
        let r12 = -cos_omega * sin_w - sin_omega * cos_w * cos_i;
        let r21 = sin_omega * cos_w + cos_omega * sin_w * cos_i;
        let r22 = -sin_omega * sin_w + cos_omega * cos_w * cos_i;
        let r31 = sin_w * sin_i;
        let r32 = cos_w * sin_i;

        let position = Vector3::new(
            r11 * x_orb + r12 * y_orb,
            r21 * x_orb + r22 * y_orb,
            r31 * x_orb + r32 * y_orb,
        );

        let velocity = Vector3::new(
            r11 * vx_orb + r12 * vy_orb,
            r21 * vx_orb + r22 * vy_orb,
            r31 * vx_orb + r32 * vy_orb,
        );

        StateVector { position, velocity }
    }

    /// Osculating elements of a relative state vector
    pub fn from_state_vector(rel: &StateVector, mu: f64) -> Self {
        const EPS: f64 = 1e-11;

        let r_vec = rel.position;
        let v_vec = rel.velocity;
        let r = r_vec.magnitude();
        let v2 = v_vec.magnitude_squared();

        let h_vec = r_vec.cross(&v_vec);
        let h = h_vec.magnitude();
        // Node vector k × h
        let n_vec = Vector3::new(-h_vec.y, h_vec.x, 0.0);
        let n = n_vec.magnitude();

        let e_vec = r_vec
            .scale(v2 - mu / r)
            .sub(&v_vec.scale(r_vec.dot(&v_vec)))
            .scale(1.0 / mu);
        let e = e_vec.magnitude();

        let specific_energy = v2 / 2.0 - mu / r;
        let semi_major_axis = if specific_energy.abs() > EPS {
            -mu / (2.0 * specific_energy)
        } else {
            f64::INFINITY
        };

        let inclination = if h > EPS {
            clamped_acos(h_vec.z / h)
        } else {
            0.0
        };

        let longitude_ascending_node = if n > EPS {
            let node = clamped_acos(n_vec.x / n);
            if n_vec.y < 0.0 {
                2.0 * PI - node
            } else {
                node
            }
        } else {
            0.0
        };

        let argument_perihelion = if e > EPS {
            if n > EPS {
                let w = clamped_acos(n_vec.dot(&e_vec) / (n * e));
                if e_vec.z < 0.0 {
                    2.0 * PI - w
                } else {
                    w
                }
            } else {
                // Equatorial orbit: measure from the x axis
                let w = e_vec.y.atan2(e_vec.x).rem_euclid(2.0 * PI);
                if h_vec.z < 0.0 {
                    (2.0 * PI - w).rem_euclid(2.0 * PI)
                } else {
                    w
                }
            }
        } else {
            0.0
        };

        let true_anomaly = if e > EPS {
            let nu = clamped_acos(e_vec.dot(&r_vec) / (e * r));
            if r_vec.dot(&v_vec) < 0.0 {
                2.0 * PI - nu
            } else {
                nu
            }
        } else if n > EPS {
            // Circular inclined: argument of latitude
            let u = clamped_acos(n_vec.dot(&r_vec) / (n * r));
            if r_vec.z < 0.0 {
                2.0 * PI - u
            } else {
                u
            }
        } else {
            r_vec.y.atan2(r_vec.x).rem_euclid(2.0 * PI)
        };

        let mean_anomaly = if e < 1.0 {
            let ecc_anomaly =
                2.0 * (((1.0 - e) / (1.0 + e)).sqrt() * (true_anomaly / 2.0).tan()).atan();
            (ecc_anomaly - e * ecc_anomaly.sin()).rem_euclid(2.0 * PI)
        } else {
            let hyp_anomaly =
                2.0 * (((e - 1.0) / (e + 1.0)).sqrt() * (true_anomaly / 2.0).tan()).atanh();
            e * hyp_anomaly.sinh() - hyp_anomaly
        };

        Self {
            semi_major_axis,
            eccentricity: e,
            inclination,
            longitude_ascending_node,
            argument_perihelion,
            mean_anomaly,
        }
    }

    /// True anomaly recovered from the mean anomaly (radians)
    pub fn true_anomaly(&self) -> f64 {
        let e = self.eccentricity;
        if e < 1.0 {
            let ecc = solve_kepler_equation(self.mean_anomaly, e);
            (2.0 * ((1.0 + e).sqrt() * (ecc / 2.0).sin()).atan2((1.0 - e).sqrt() * (ecc / 2.0).cos()))
                .rem_euclid(2.0 * PI)
        } else {
            let hyp = solve_hyperbolic_kepler_equation(self.mean_anomaly, e);
            2.0 * (((e + 1.0) / (e - 1.0)).sqrt() * (hyp / 2.0).tanh()).atan()
        }
    }

    /// Orbital period (years); `None` for unbound orbits
    pub fn period(&self, mu: f64) -> Option<f64> {
        if self.eccentricity < 1.0 && self.semi_major_axis.is_finite() && self.semi_major_axis > 0.0 {
            Some(2.0 * PI * (self.semi_major_axis.powi(3) / mu).sqrt())
        } else {
            None
        }
    }
}

fn clamped_acos(x: f64) -> f64 {
    x.clamp(-1.0, 1.0).acos()
}

/// Solve Kepler's equation M = E - e*sin(E) using Newton-Raphson
pub fn solve_kepler_equation(mean_anomaly: f64, eccentricity: f64) -> f64 {
    // Starting at π converges for every e < 1
    let mut e_anom = if eccentricity > 0.8 { PI } else { mean_anomaly };
    let tolerance = 1e-12;
    let max_iterations = 50;

    for _ in 0..max_iterations {
        let f = e_anom - eccentricity * e_anom.sin() - mean_anomaly;
        let f_prime = 1.0 - eccentricity * e_anom.cos();
        let delta = f / f_prime;
        e_anom -= delta;

        if delta.abs() < tolerance {
            break;
        }
    }

    e_anom
}

/// Solve the hyperbolic Kepler equation M = e*sinh(F) - F
pub fn solve_hyperbolic_kepler_equation(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let mut f_anom = (2.0 * mean_anomaly / eccentricity).asinh();
    for _ in 0..50 {
        let f = eccentricity * f_anom.sinh() - f_anom - mean_anomaly;
        let f_prime = eccentricity * f_anom.cosh() - 1.0;
        let delta = f / f_prime;
        f_anom -= delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }
    f_anom
}

// =============================================================================
// TWO-BODY HELPERS
// =============================================================================

/// Circular orbital speed at separation `r` for gravitational parameter `mu`
pub fn circular_velocity(mu: f64, r: f64) -> f64 {
    if r <= 0.0 || mu <= 0.0 {
        return 0.0;
    }
    (mu / r).sqrt()
}

/// Escape speed at separation `r`
pub fn escape_velocity(mu: f64, r: f64) -> f64 {
    if r <= 0.0 || mu <= 0.0 {
        return 0.0;
    }
    (2.0 * mu / r).sqrt()
}

/// Closest approach of a two-body orbit given the relative state.
/// Radial infall (zero angular momentum) returns 0.
pub fn pericenter_distance(rel: &StateVector, mu: f64) -> f64 {
    let r = rel.position.magnitude();
    let h = rel.position.cross(&rel.velocity).magnitude();
    if h < 1e-15 {
        return 0.0;
    }
    let energy = rel.velocity.magnitude_squared() / 2.0 - mu / r;
    let p = h * h / mu;
    let e = (1.0 + 2.0 * energy * h * h / (mu * mu)).max(0.0).sqrt();
    p / (1.0 + e)
}

// =============================================================================
// CELESTIAL BODY
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BodyType {
    #[serde(alias = "dwarf", alias = "giant", alias = "white_dwarf")]
    Star,
    Planet,
    Moon,
    #[serde(alias = "debris", alias = "planetesimal")]
    Asteroid,
    Comet,
    #[serde(alias = "blackhole")]
    BlackHole,
    #[serde(alias = "neutron", alias = "pulsar")]
    NeutronStar,
    Spacecraft,
}

impl BodyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::Star => "star",
            BodyType::Planet => "planet",
            BodyType::Moon => "moon",
            BodyType::Asteroid => "asteroid",
            BodyType::Comet => "comet",
            BodyType::BlackHole => "black_hole",
            BodyType::NeutronStar => "neutron_star",
            BodyType::Spacecraft => "spacecraft",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CelestialBody {
    pub name: String,
    pub mass: f64, // M☉
    pub state: StateVector,
    pub body_type: BodyType,
}

impl CelestialBody {
    pub fn new(name: &str, mass: f64, state: StateVector, body_type: BodyType) -> Self {
        Self {
            name: name.to_string(),
            mass,
            state,
            body_type,
        }
    }
}

/// Index of the body that `index` orbits: among heavier-or-equal bodies, the
/// one with the highest mutual orbital frequency G(mᵢ+mⱼ)/r³.
/// `None` for the heaviest body of the system or a body alone.
pub fn find_primary(bodies: &[CelestialBody], index: usize) -> Option<usize> {
    let body = bodies.get(index)?;
    let mut best: Option<(usize, f64)> = None;

    for (j, other) in bodies.iter().enumerate() {
        if j == index || other.mass < body.mass {
            continue;
        }
        let r = other.state.position.sub(&body.state.position).magnitude();
        if r <= 0.0 {
            continue;
        }
        let frequency = (body.mass + other.mass) / (r * r * r);
        match best {
            Some((_, f)) if f >= frequency => {}
            _ => best = Some((j, frequency)),
        }
    }

    best.map(|(j, _)| j)
}

// =============================================================================
// INTEGRATORS
// =============================================================================

/// Integrator selection carried by a scenario
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorChoice {
    #[serde(alias = "ias15", alias = "high-precision", alias = "mercurius", alias = "bs")]
    HighPrecision,
    #[serde(alias = "whfast", alias = "leapfrog", alias = "saba", alias = "fast-symplectic")]
    FastSymplectic,
}

impl IntegratorChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegratorChoice::HighPrecision => "high_precision",
            IntegratorChoice::FastSymplectic => "fast_symplectic",
        }
    }

    /// Build the integrator; `dt` is the fixed step used by symplectic runs
    pub fn build(&self, dt: f64) -> Box<dyn Integrator> {
        match self {
            IntegratorChoice::HighPrecision => Box::new(AdaptiveRk4Integrator::default()),
            IntegratorChoice::FastSymplectic => Box::new(VelocityVerletIntegrator::new(dt)),
        }
    }
}

/// Advance a body set by a span of simulation time
pub trait Integrator: Send + Sync {
    /// Returns the number of substeps taken
    fn advance(&self, bodies: &mut [CelestialBody], duration: f64) -> Result<usize, IntegratorError>;
}

/// Mutual gravitational accelerations for every body
fn calculate_accelerations(positions: &[Vector3], masses: &[f64]) -> Vec<Vector3> {
    let n = positions.len();
    let mut accelerations = vec![Vector3::zero(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            let r_vec = positions[j].sub(&positions[i]);
            let r2 = r_vec.magnitude_squared();
            if r2 <= 0.0 {
                continue;
            }
            let inv_r3 = 1.0 / (r2 * r2.sqrt());
            // a_i += G m_j r / r³ ; a_j -= G m_i r / r³
            accelerations[i] = accelerations[i].add(&r_vec.scale(G * masses[j] * inv_r3));
            accelerations[j] = accelerations[j].sub(&r_vec.scale(G * masses[i] * inv_r3));
        }
    }

    accelerations
}

/// Reject states the integrators cannot continue from
fn check_domain(bodies: &[CelestialBody]) -> Result<(), IntegratorError> {
    for body in bodies {
        if !body.state.position.is_finite() || !body.state.velocity.is_finite() {
            return Err(IntegratorError::NonFinite {
                body: body.name.clone(),
            });
        }
    }
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let r = bodies[i]
                .state
                .position
                .sub(&bodies[j].state.position)
                .magnitude();
            if r < COLLISION_DISTANCE {
                return Err(IntegratorError::SingularEncounter {
                    first: bodies[i].name.clone(),
                    second: bodies[j].name.clone(),
                    separation: r,
                });
            }
        }
    }
    Ok(())
}

/// High-precision integrator: classical RK4 with the step re-chosen every
/// substep from the shortest pairwise dynamical or crossing timescale.
#[derive(Debug, Clone)]
pub struct AdaptiveRk4Integrator {
    pub step_fraction: f64,
    pub max_substeps: usize,
}

impl Default for AdaptiveRk4Integrator {
    fn default() -> Self {
        Self {
            step_fraction: ADAPTIVE_STEP_FRACTION,
            max_substeps: MAX_SUBSTEPS,
        }
    }
}

impl AdaptiveRk4Integrator {
    /// Shortest timescale over all pairs; `None` with fewer than two bodies
    pub fn shortest_timescale(bodies: &[CelestialBody]) -> Option<f64> {
        let mut shortest: Option<f64> = None;
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let rel = bodies[j].state.relative_to(&bodies[i].state);
                let r = rel.position.magnitude();
                let mu = G * (bodies[i].mass + bodies[j].mass);
                let mut tau = (r * r * r / mu).sqrt();
                let v = rel.velocity.magnitude();
                if v > 0.0 {
                    tau = tau.min(r / v);
                }
                shortest = Some(shortest.map_or(tau, |s: f64| s.min(tau)));
            }
        }
        shortest
    }

    fn rk4_step(bodies: &mut [CelestialBody], h: f64) {
        let masses: Vec<f64> = bodies.iter().map(|b| b.mass).collect();
        let x0: Vec<Vector3> = bodies.iter().map(|b| b.state.position).collect();
        let v0: Vec<Vector3> = bodies.iter().map(|b| b.state.velocity).collect();
        let half = h * 0.5;

        let a1 = calculate_accelerations(&x0, &masses);

        let x2: Vec<Vector3> = x0.iter().zip(&v0).map(|(x, v)| x.add(&v.scale(half))).collect();
        let v2: Vec<Vector3> = v0.iter().zip(&a1).map(|(v, a)| v.add(&a.scale(half))).collect();
        let a2 = calculate_accelerations(&x2, &masses);

        let x3: Vec<Vector3> = x0.iter().zip(&v2).map(|(x, v)| x.add(&v.scale(half))).collect();
        let v3: Vec<Vector3> = v0.iter().zip(&a2).map(|(v, a)| v.add(&a.scale(half))).collect();
        let a3 = calculate_accelerations(&x3, &masses);

        let x4: Vec<Vector3> = x0.iter().zip(&v3).map(|(x, v)| x.add(&v.scale(h))).collect();
        let v4: Vec<Vector3> = v0.iter().zip(&a3).map(|(v, a)| v.add(&a.scale(h))).collect();
        let a4 = calculate_accelerations(&x4, &masses);

        let sixth = h / 6.0;
        for (i, body) in bodies.iter_mut().enumerate() {
            let dx = v0[i]
                .add(&v2[i].scale(2.0))
                .add(&v3[i].scale(2.0))
                .add(&v4[i]);
            let dv = a1[i]
                .add(&a2[i].scale(2.0))
                .add(&a3[i].scale(2.0))
                .add(&a4[i]);
            body.state.position = x0[i].add(&dx.scale(sixth));
            body.state.velocity = v0[i].add(&dv.scale(sixth));
        }
    }
}

impl Integrator for AdaptiveRk4Integrator {
    fn advance(&self, bodies: &mut [CelestialBody], duration: f64) -> Result<usize, IntegratorError> {
        if duration <= 0.0 {
            return Ok(0);
        }

        let Some(_) = Self::shortest_timescale(bodies) else {
            // A lone body drifts
            for body in bodies.iter_mut() {
                body.state.position = body.state.position.add(&body.state.velocity.scale(duration));
            }
            check_domain(bodies)?;
            return Ok(1);
        };

        let mut remaining = duration;
        let mut substeps = 0usize;

        while remaining > 0.0 {
            if substeps >= self.max_substeps {
                return Err(IntegratorError::StepBudgetExhausted {
                    substeps,
                    remaining,
                });
            }
            let tau = Self::shortest_timescale(bodies).unwrap_or(remaining);
            let h = (tau * self.step_fraction).min(remaining);
            if !(h > 0.0) || !h.is_finite() {
                return Err(IntegratorError::StepBudgetExhausted {
                    substeps,
                    remaining,
                });
            }
            Self::rk4_step(bodies, h);
            check_domain(bodies)?;
            remaining -= h;
            substeps += 1;
        }

        Ok(substeps)
    }
}

/// Fast symplectic integrator: fixed-step Velocity Verlet
/// x(t+dt) = x(t) + v(t)*dt + 0.5*a(t)*dt²
/// v(t+dt) = v(t) + 0.5*(a(t) + a(t+dt))*dt
#[derive(Debug, Clone)]
pub struct VelocityVerletIntegrator {
    /// Time step in years
    pub dt: f64,
}

impl VelocityVerletIntegrator {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }

    /// Step the simulation forward by `dt`
    pub fn step(&self, bodies: &mut [CelestialBody], dt: f64) {
        let masses: Vec<f64> = bodies.iter().map(|b| b.mass).collect();
        let dt_sq_half = dt * dt * 0.5;

        let positions: Vec<Vector3> = bodies.iter().map(|b| b.state.position).collect();
        let accelerations = calculate_accelerations(&positions, &masses);

        for (body, a) in bodies.iter_mut().zip(&accelerations) {
            let v = body.state.velocity;
            body.state.position = body
                .state
                .position
                .add(&v.scale(dt))
                .add(&a.scale(dt_sq_half));
        }

        let positions: Vec<Vector3> = bodies.iter().map(|b| b.state.position).collect();
        let new_accelerations = calculate_accelerations(&positions, &masses);

        for (i, body) in bodies.iter_mut().enumerate() {
            let avg_accel = accelerations[i].add(&new_accelerations[i]).scale(0.5);
            body.state.velocity = body.state.velocity.add(&avg_accel.scale(dt));
        }
    }
}

impl Integrator for VelocityVerletIntegrator {
    fn advance(&self, bodies: &mut [CelestialBody], duration: f64) -> Result<usize, IntegratorError> {
        if duration <= 0.0 {
            return Ok(0);
        }
        let steps = (duration / self.dt).ceil().max(1.0);
        if !steps.is_finite() || steps > MAX_SUBSTEPS as f64 {
            return Err(IntegratorError::StepBudgetExhausted {
                substeps: 0,
                remaining: duration,
            });
        }
        let steps = steps as usize;
        let h = duration / steps as f64;

        for _ in 0..steps {
            self.step(bodies, h);
            check_domain(bodies)?;
        }
        Ok(steps)
    }
}

// =============================================================================
// ENERGY & FRAME HELPERS
// =============================================================================

/// Calculate total mechanical energy of the system
pub fn calculate_total_energy(bodies: &[CelestialBody]) -> f64 {
    let mut kinetic = 0.0;
    let mut potential = 0.0;

    for body in bodies {
        // Kinetic energy: 0.5 * m * v²
        kinetic += 0.5 * body.mass * body.state.velocity.magnitude_squared();
    }

    // Potential energy: -G * m1 * m2 / r for each pair
    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let r_vec = bodies[i].state.position.sub(&bodies[j].state.position);
            let r = r_vec.magnitude();
            if r > 1e-15 {
                potential -= G * bodies[i].mass * bodies[j].mass / r;
            }
        }
    }

    kinetic + potential
}

/// Shift positions and velocities so the barycentre sits at rest at the origin
pub fn move_to_center_of_momentum(bodies: &mut [CelestialBody]) {
    let total_mass: f64 = bodies.iter().map(|b| b.mass).sum();
    if total_mass <= 0.0 {
        return;
    }

    let mut com = Vector3::zero();
    let mut momentum = Vector3::zero();
    for body in bodies.iter() {
        com = com.add(&body.state.position.scale(body.mass));
        momentum = momentum.add(&body.state.velocity.scale(body.mass));
    }
    let com = com.scale(1.0 / total_mass);
    let com_velocity = momentum.scale(1.0 / total_mass);

    for body in bodies.iter_mut() {
        body.state.position = body.state.position.sub(&com);
        body.state.velocity = body.state.velocity.sub(&com_velocity);
    }
}

// =============================================================================
// TESTS
// =============================================================================
