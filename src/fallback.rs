// Preset Scenarios - Hand-tuned systems and the keyword fallback table
// Every preset is bound and well-separated so it loads without repair.

use regex::{Regex, RegexBuilder};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::catalog::{OrbitalCatalog, TRAPPIST_1_MASS};
use crate::physics_engine::{circular_velocity, BodyType, IntegratorChoice, Vector3, G};
use crate::scenario::{BodySpec, ScenarioDescription};

pub type PresetBuilder = fn(&OrbitalCatalog) -> ScenarioDescription;

// =============================================================================
// PRESET HELPERS
// =============================================================================

fn scenario(
    name: &str,
    description: &str,
    bodies: Vec<BodySpec>,
    integrator: IntegratorChoice,
    t_per_frame: f64,
    dt: f64,
) -> ScenarioDescription {
    ScenarioDescription {
        name: name.to_string(),
        description: description.to_string(),
        bodies,
        integrator,
        t_per_frame,
        dt,
    }
}

fn star(name: &str, mass: f64) -> BodySpec {
    BodySpec::new(name, mass, Vector3::zero(), Vector3::zero(), BodyType::Star)
}

/// Body on a circular orbit of radius `r` about `host`, at polar angle `angle`
fn circular_about(host: &BodySpec, name: &str, mass: f64, r: f64, angle: f64, body_type: BodyType) -> BodySpec {
    let v = circular_velocity(G * (host.mass + mass), r);
    let (sin, cos) = angle.sin_cos();
    let position = host.position().add(&Vector3::new(r * cos, r * sin, 0.0));
    let velocity = host.velocity().add(&Vector3::new(-v * sin, v * cos, 0.0));
    BodySpec::new(name, mass, position, velocity, body_type)
}

/// Two bodies on circular orbits about their common barycentre
fn circular_pair(a: (&str, f64, BodyType), b: (&str, f64, BodyType), separation: f64) -> Vec<BodySpec> {
    let total = a.1 + b.1;
    let v_rel = circular_velocity(G * total, separation);
    let r_a = separation * b.1 / total;
    let r_b = separation * a.1 / total;
    let v_a = v_rel * b.1 / total;
    let v_b = v_rel * a.1 / total;
    vec![
        BodySpec::new(a.0, a.1, Vector3::new(r_a, 0.0, 0.0), Vector3::new(0.0, v_a, 0.0), a.2),
        BodySpec::new(b.0, b.1, Vector3::new(-r_b, 0.0, 0.0), Vector3::new(0.0, -v_b, 0.0), b.2),
    ]
}

fn sun() -> BodySpec {
    star("Sun", 1.0).with_color("#fff200")
}

// =============================================================================
// PRESETS
// =============================================================================

pub fn star_and_planet(_catalog: &OrbitalCatalog) -> ScenarioDescription {
    let sun = sun();
    let planet = circular_about(&sun, "Planet", 3e-6, 1.0, 0.0, BodyType::Planet).with_color("#4fffb0");
    scenario(
        "Star and Planet",
        "A Sun-like star with an Earth-mass planet on a circular 1 AU orbit",
        vec![sun, planet],
        IntegratorChoice::HighPrecision,
        0.005,
        0.001,
    )
}

pub fn solar_system(catalog: &OrbitalCatalog) -> ScenarioDescription {
    let sun = sun();
    let mut bodies = vec![sun.clone()];
    bodies.extend(
        catalog
            .planets
            .iter()
            .map(|p| p.to_body_spec(&sun, BodyType::Planet)),
    );
    scenario(
        "Solar System",
        "The Sun and eight planets from J2000 orbital elements",
        bodies,
        IntegratorChoice::FastSymplectic,
        0.005,
        0.001,
    )
}

pub fn inner_planets(catalog: &OrbitalCatalog) -> ScenarioDescription {
    let sun = sun();
    let mut bodies = vec![sun.clone()];
    bodies.extend(
        catalog
            .planets
            .iter()
            .take(4)
            .map(|p| p.to_body_spec(&sun, BodyType::Planet)),
    );
    scenario(
        "Inner Planets",
        "The Sun with Mercury, Venus, Earth and Mars",
        bodies,
        IntegratorChoice::FastSymplectic,
        0.003,
        0.0005,
    )
}

pub fn earth_moon(_catalog: &OrbitalCatalog) -> ScenarioDescription {
    let earth = BodySpec::new("Earth", 3.003e-6, Vector3::zero(), Vector3::zero(), BodyType::Planet)
        .with_color("#4fffb0");
    let moon = circular_about(&earth, "Moon", 3.694e-8, 0.00257, 0.0, BodyType::Moon).with_color("#cccccc");
    scenario(
        "Earth-Moon System",
        "Earth and the Moon at 384,400 km on a circular orbit",
        vec![earth, moon],
        IntegratorChoice::HighPrecision,
        0.0001,
        0.00002,
    )
}

/// Chenciner-Montgomery choreography rescaled to G = 4π²
pub fn figure_eight(_catalog: &OrbitalCatalog) -> ScenarioDescription {
    let scale = 2.0 * PI;
    let bodies = vec![
        BodySpec::new(
            "Body A",
            1.0,
            Vector3::new(0.9700436, -0.2430870, 0.0),
            Vector3::new(0.2330018, 0.2161829, 0.0).scale(scale),
            BodyType::Star,
        )
        .with_color("#ff6b35"),
        BodySpec::new(
            "Body B",
            1.0,
            Vector3::new(-0.9700436, 0.2430870, 0.0),
            Vector3::new(0.2330018, 0.2161829, 0.0).scale(scale),
            BodyType::Star,
        )
        .with_color("#4fffb0"),
        BodySpec::new(
            "Body C",
            1.0,
            Vector3::zero(),
            Vector3::new(-0.4660035, -0.4323658, 0.0).scale(scale),
            BodyType::Star,
        )
        .with_color("#bf7fff"),
    ];
    scenario(
        "Figure-8 Choreography",
        "Three equal masses chasing each other along a figure-eight, period 1.007 yr",
        bodies,
        IntegratorChoice::HighPrecision,
        0.004,
        0.0008,
    )
}

pub fn binary_star(_catalog: &OrbitalCatalog) -> ScenarioDescription {
    let mut bodies = circular_pair(
        ("Star A", 1.0, BodyType::Star),
        ("Star B", 0.8, BodyType::Star),
        3.0,
    );
    bodies[0].color = Some("#fff200".to_string());
    bodies[1].color = Some("#aaddff".to_string());
    scenario(
        "Binary Star System",
        "A 1.0 and 0.8 solar-mass pair on circular orbits 3 AU apart",
        bodies,
        IntegratorChoice::HighPrecision,
        0.01,
        0.002,
    )
}

pub fn neutron_star_binary(_catalog: &OrbitalCatalog) -> ScenarioDescription {
    let mut bodies = circular_pair(
        ("Neutron Star A", 1.4, BodyType::NeutronStar),
        ("Neutron Star B", 1.4, BodyType::NeutronStar),
        0.05,
    );
    for body in &mut bodies {
        body.color = Some("#aaffff".to_string());
    }
    scenario(
        "Neutron Star Binary",
        "Two 1.4 solar-mass neutron stars in a tight 0.05 AU orbit",
        bodies,
        IntegratorChoice::HighPrecision,
        0.00005,
        0.00001,
    )
}

pub fn black_hole_cluster(_catalog: &OrbitalCatalog) -> ScenarioDescription {
    let hole = BodySpec::new("Black Hole", 20.0, Vector3::zero(), Vector3::zero(), BodyType::BlackHole)
        .with_color("#220022");
    let stars = [
        ("Star A", 1.0, 2.0, 0.0),
        ("Star B", 0.8, 3.0, PI),
        ("Star C", 1.2, 4.0, PI / 2.0),
        ("Star D", 0.6, 1.5, -PI / 2.0),
    ];
    let mut bodies = vec![hole.clone()];
    bodies.extend(
        stars
            .iter()
            .map(|(name, mass, r, angle)| circular_about(&hole, name, *mass, *r, *angle, BodyType::Star)),
    );
    scenario(
        "Black Hole Stellar Cluster",
        "Four stars orbiting a 20 solar-mass black hole",
        bodies,
        IntegratorChoice::HighPrecision,
        0.002,
        0.0004,
    )
}

pub fn hot_jupiter(_catalog: &OrbitalCatalog) -> ScenarioDescription {
    let host = star("Host Star", 1.1).with_color("#ffcc88");
    let jupiter = circular_about(&host, "Hot Jupiter", 0.001, 0.05, 0.0, BodyType::Planet).with_color("#ff9933");
    let super_earth = circular_about(&host, "Super Earth", 1e-5, 0.5, 0.0, BodyType::Planet).with_color("#44aaff");
    scenario(
        "Hot Jupiter System",
        "A gas giant skimming its star at 0.05 AU with a super-Earth further out",
        vec![host, jupiter, super_earth],
        IntegratorChoice::HighPrecision,
        0.001,
        0.0001,
    )
}

pub fn trappist_1(catalog: &OrbitalCatalog) -> ScenarioDescription {
    let host = star("TRAPPIST-1", TRAPPIST_1_MASS).with_color("#ff4400");
    let mut bodies = vec![host.clone()];
    bodies.extend(
        catalog
            .exoplanets
            .iter()
            .map(|p| p.to_body_spec(&host, BodyType::Planet)),
    );
    scenario(
        "TRAPPIST-1",
        "Seven Earth-sized planets around an ultracool red dwarf",
        bodies,
        IntegratorChoice::FastSymplectic,
        0.0003,
        0.00002,
    )
}

pub fn periodic_comets(catalog: &OrbitalCatalog) -> ScenarioDescription {
    let sun = sun();
    let mut bodies = vec![sun.clone()];
    if let Some(jupiter) = catalog.planet("Jupiter") {
        bodies.push(jupiter.to_body_spec(&sun, BodyType::Planet));
    }
    for (name, color) in [("Encke", "#ccffee"), ("Halley", "#aaddff")] {
        if let Some(comet) = catalog.find(name) {
            bodies.push(comet.to_body_spec(&sun, BodyType::Comet).with_color(color));
        }
    }
    scenario(
        "Periodic Comets",
        "Encke's 3.3-year orbit and Halley's retrograde, highly eccentric one, with Jupiter for company",
        bodies,
        IntegratorChoice::HighPrecision,
        0.02,
        0.002,
    )
}

/// Main-belt asteroids and Jupiter's L4 Trojans from the catalog
pub fn asteroid_belt(catalog: &OrbitalCatalog) -> ScenarioDescription {
    let sun = sun();
    let mut bodies = vec![sun.clone()];
    if let Some(jupiter) = catalog.planet("Jupiter") {
        bodies.push(jupiter.to_body_spec(&sun, BodyType::Planet));
    }
    bodies.extend(
        catalog
            .asteroids
            .iter()
            .chain(&catalog.trojans)
            .map(|entry| entry.to_body_spec(&sun, BodyType::Asteroid)),
    );
    scenario(
        "Asteroid Belt and Trojans",
        "Ceres and Vesta in the main belt, Achilles and Hektor leading Jupiter at L4",
        bodies,
        IntegratorChoice::FastSymplectic,
        0.02,
        0.002,
    )
}

/// Earth to Mars transfer with Mars phased to meet the spacecraft at aphelion
pub fn hohmann_transfer(catalog: &OrbitalCatalog) -> ScenarioDescription {
    let r_earth: f64 = 1.0;
    let r_mars: f64 = 1.524;
    let earth_mass = catalog.planet("Earth").map_or(3.003e-6, |p| p.mass);
    let mars_mass = catalog.planet("Mars").map_or(3.227e-7, |p| p.mass);

    let sun = sun();
    let a_transfer = (r_earth + r_mars) / 2.0;
    let transfer_time = PI * (a_transfer.powi(3) / G).sqrt();
    let mars_mean_motion = (G / r_mars.powi(3)).sqrt();
    let mars_phase = PI - mars_mean_motion * transfer_time;

    // Vis-viva at perihelion of the transfer ellipse
    let v_departure = (G * (2.0 / r_earth - 1.0 / a_transfer)).sqrt();
    let craft = BodySpec::new(
        "Spacecraft",
        1e-15,
        Vector3::new(r_earth, 0.0, 0.0),
        Vector3::new(0.0, v_departure, 0.0),
        BodyType::Spacecraft,
    )
    .with_color("#ffffff");

    // Earth trails the spacecraft by 3° to stay clear of its Hill sphere
    let earth = circular_about(&sun, "Earth", earth_mass, r_earth, -3.0_f64.to_radians(), BodyType::Planet)
        .with_color("#4fffb0");
    let mars = circular_about(&sun, "Mars", mars_mass, r_mars, mars_phase, BodyType::Planet).with_color("#ff6b35");

    scenario(
        "Hohmann Transfer",
        "A spacecraft on a minimum-energy transfer from Earth to Mars",
        vec![sun, earth, mars, craft],
        IntegratorChoice::HighPrecision,
        0.002,
        0.0004,
    )
}

// =============================================================================
// KEYWORD FALLBACK TABLE
// =============================================================================

/// Priority-ordered keyword patterns; first match wins
const FALLBACK_RULES: &[(&str, &str, PresetBuilder)] = &[
    ("hohmann", r"hohmann|transfer\s+orbit|mars\s+transfer", hohmann_transfer),
    ("neutron_star", r"neutron|pulsar|magnetar", neutron_star_binary),
    ("black_hole", r"black\s*-?\s*holes?|\bbh\b", black_hole_cluster),
    ("trappist", r"trappist", trappist_1),
    ("figure_eight", r"figure[\s-]*(8|eight)|three[\s-]*body|\b3[\s-]*body|choreograph", figure_eight),
    ("earth_moon", r"earth[\s-]*(and\s+)?(the\s+)?moon|lunar", earth_moon),
    ("hot_jupiter", r"hot[\s-]*jupiter", hot_jupiter),
    ("comet", r"comet|halley|encke", periodic_comets),
    ("asteroid_belt", r"asteroid|trojan|\bbelt\b|ceres|vesta", asteroid_belt),
    ("inner_planets", r"inner\s+(solar\s+system|planets)|terrestrial\s+planets|rocky\s+planets", inner_planets),
    ("solar_system", r"solar\s*system|all\s+(the\s+)?planets|eight\s+planets", solar_system),
    ("binary", r"binary|double\s+star|two\s+stars|twin\s+stars", binary_star),
];

struct FallbackRule {
    key: &'static str,
    matcher: Regex,
    build: PresetBuilder,
}

/// Deterministic prompt → preset mapping with a guaranteed default
pub struct FallbackTable {
    rules: Vec<FallbackRule>,
    catalog: Arc<OrbitalCatalog>,
}

impl FallbackTable {
    pub fn new(catalog: Arc<OrbitalCatalog>) -> Self {
        let rules = FALLBACK_RULES
            .iter()
            .filter_map(|(key, pattern, build)| {
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(matcher) => Some(FallbackRule {
                        key: *key,
                        matcher,
                        build: *build,
                    }),
                    Err(e) => {
                        tracing::warn!(rule = key, error = %e, "Skipping invalid fallback pattern");
                        None
                    }
                }
            })
            .collect();

        Self { rules, catalog }
    }

    pub fn catalog(&self) -> &OrbitalCatalog {
        &self.catalog
    }

    /// Key of the first rule matching the prompt
    pub fn matching_key(&self, prompt: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.is_match(prompt))
            .map(|rule| rule.key)
    }

    /// Preset for the first matching rule, if any
    pub fn match_preset(&self, prompt: &str) -> Option<ScenarioDescription> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.is_match(prompt))
            .map(|rule| (rule.build)(&self.catalog))
    }

    /// Matching preset, or the default star-and-planet system
    pub fn resolve(&self, prompt: &str) -> ScenarioDescription {
        self.match_preset(prompt)
            .unwrap_or_else(|| star_and_planet(&self.catalog))
    }
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::new(Arc::new(OrbitalCatalog::builtin()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics_engine::calculate_total_energy;

    fn all_presets() -> Vec<ScenarioDescription> {
        let catalog = OrbitalCatalog::builtin();
        let mut presets: Vec<ScenarioDescription> = FALLBACK_RULES
            .iter()
            .map(|(_, _, build)| build(&catalog))
            .collect();
        presets.push(star_and_planet(&catalog));
        presets
    }

    #[test]
    fn test_rule_priority() {
        let table = FallbackTable::default();
        assert_eq!(table.matching_key("two neutron stars spiraling together"), Some("neutron_star"));
        assert_eq!(table.matching_key("Hohmann transfer to Mars"), Some("hohmann"));
        assert_eq!(table.matching_key("a black hole eating a binary"), Some("black_hole"));
        assert_eq!(table.matching_key("the real solar system"), Some("solar_system"));
        assert_eq!(table.matching_key("the inner solar system"), Some("inner_planets"));
        assert_eq!(table.matching_key("Figure-8 three body"), Some("figure_eight"));
        assert_eq!(table.matching_key("Earth and Moon"), Some("earth_moon"));
        assert_eq!(table.matching_key("HALLEY"), Some("comet"));
        assert_eq!(table.matching_key("the asteroid belt"), Some("asteroid_belt"));
        assert_eq!(table.matching_key("Jupiter's Trojans"), Some("asteroid_belt"));
        assert_eq!(table.matching_key("something unrelated"), None);
    }

    #[test]
    fn test_default_is_star_and_planet() {
        let table = FallbackTable::default();
        let scenario = table.resolve("xyzzy");
        assert_eq!(scenario.name, "Star and Planet");
        assert_eq!(scenario.bodies.len(), 2);
        assert_eq!(scenario.integrator, IntegratorChoice::HighPrecision);
    }

    #[test]
    fn test_solar_system_is_deterministic() {
        let table = FallbackTable::default();
        let first = table.resolve("the real solar system");
        let second = table.resolve("the real solar system");
        assert_eq!(first, second);
        let names: Vec<&str> = first.bodies.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Sun", "Mercury", "Venus", "Earth", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune"]
        );
    }

    #[test]
    fn test_every_preset_is_bound_with_valid_timesteps() {
        for preset in all_presets() {
            let bodies = preset.to_bodies();
            assert!(!bodies.is_empty(), "{}", preset.name);
            assert!(calculate_total_energy(&bodies) < 0.0, "{} is unbound", preset.name);
            assert!(preset.t_per_frame > 0.0 && preset.dt > 0.0, "{}", preset.name);
            assert!(preset.dt <= preset.t_per_frame, "{}", preset.name);
        }
    }

    #[test]
    fn test_small_body_presets_draw_on_catalog() {
        let table = FallbackTable::default();
        let names = |scenario: &ScenarioDescription| {
            scenario.bodies.iter().map(|b| b.name.clone()).collect::<Vec<_>>()
        };

        let belt = table.resolve("show me the asteroid belt");
        assert_eq!(names(&belt), vec!["Sun", "Jupiter", "Vesta", "Ceres", "Achilles", "Hektor"]);
        assert!(belt.bodies[2..].iter().all(|b| b.body_type == BodyType::Asteroid));

        let comets = table.resolve("Encke and Halley");
        assert_eq!(names(&comets), vec!["Sun", "Jupiter", "Encke", "Halley"]);

        // Trojans lead Jupiter by about 60 degrees
        let longitude = |spec: &crate::scenario::BodySpec| spec.position[1].atan2(spec.position[0]);
        let lead = (longitude(&belt.bodies[4]) - longitude(&belt.bodies[1])).to_degrees();
        assert!((lead.rem_euclid(360.0) - 60.0).abs() < 15.0, "lead = {}", lead);
    }

    #[test]
    fn test_earth_moon_uses_correct_orbital_speed() {
        let preset = earth_moon(&OrbitalCatalog::builtin());
        let moon_speed = preset.bodies[1].velocity().magnitude();
        assert!((moon_speed - 0.2167).abs() < 1e-3, "speed = {}", moon_speed);
    }

    #[test]
    fn test_hohmann_departure_speed() {
        let preset = hohmann_transfer(&OrbitalCatalog::builtin());
        let craft = preset.bodies.iter().find(|b| b.name == "Spacecraft").unwrap();
        assert!((craft.velocity().magnitude() - 6.905).abs() < 1e-3);
    }

    #[test]
    fn test_binary_has_zero_net_momentum() {
        let preset = binary_star(&OrbitalCatalog::builtin());
        let p = preset
            .bodies
            .iter()
            .fold(Vector3::zero(), |acc, b| acc.add(&b.velocity().scale(b.mass)));
        assert!(p.magnitude() < 1e-12);
        assert!((preset.bodies[0].position[0] - 1.3333).abs() < 1e-3);
        assert!((preset.bodies[1].velocity[1] + 2.704).abs() < 1e-3);
    }
}
