// Orbital Catalog - NASA-derived J2000 elements for presets
// Built-in tables, optionally overridden by a JSON catalog file on disk.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::CatalogError;
use crate::physics_engine::{BodyType, OrbitalElements, StateVector, G};
use crate::scenario::BodySpec;

/// Mass used when a catalog record omits one (comet nucleus scale)
const DEFAULT_SMALL_BODY_MASS: f64 = 1e-16;

// =============================================================================
// CATALOG ENTRIES
// =============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub elements: OrbitalElements,
    pub mass: f64, // M☉
}

impl CatalogEntry {
    fn new(name: &str, a: f64, e: f64, i: f64, node: f64, peri: f64, mean_anomaly: f64, mass: f64) -> Self {
        Self {
            name: name.to_string(),
            elements: OrbitalElements::from_degrees(a, e, i, node, peri, mean_anomaly),
            mass,
        }
    }

    /// Heliocentric state relative to a host of `host_mass`
    pub fn state_about(&self, host_mass: f64) -> StateVector {
        self.elements.to_state_vector(G * (host_mass + self.mass))
    }

    pub fn to_body_spec(&self, host: &BodySpec, body_type: BodyType) -> BodySpec {
        let rel = self.state_about(host.mass);
        BodySpec::new(
            &self.name,
            self.mass,
            host.position().add(&rel.position),
            host.velocity().add(&rel.velocity),
            body_type,
        )
    }
}

/// On-disk record; angles in degrees, NASA field naming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(alias = "a")]
    pub semi_major_axis: f64,
    #[serde(alias = "e")]
    pub eccentricity: f64,
    #[serde(default, alias = "i")]
    pub inclination: f64,
    #[serde(default, alias = "node")]
    pub ascending_node_longitude: f64,
    #[serde(default, alias = "peri")]
    pub perihelion_argument: f64,
    #[serde(default, alias = "M")]
    pub mean_anomaly: f64,
    #[serde(default)]
    pub mass: Option<f64>,
}

impl CatalogRecord {
    /// Convert a catalog record to our internal format
    pub fn to_entry(&self, name: &str) -> Result<CatalogEntry, CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidEntry {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let angles = [
            self.inclination,
            self.ascending_node_longitude,
            self.perihelion_argument,
            self.mean_anomaly,
        ];
        if angles.iter().any(|a| !a.is_finite()) {
            return Err(invalid("non-finite angle"));
        }
        if !(self.semi_major_axis.is_finite() && self.semi_major_axis > 0.0) {
            return Err(invalid("semi-major axis must be positive"));
        }
        if !(0.0..1.0).contains(&self.eccentricity) {
            return Err(invalid("eccentricity must be in [0, 1)"));
        }
        let mass = self.mass.unwrap_or(DEFAULT_SMALL_BODY_MASS);
        if !(mass.is_finite() && mass > 0.0) {
            return Err(invalid("mass must be positive"));
        }

        Ok(CatalogEntry::new(
            name,
            self.semi_major_axis,
            self.eccentricity,
            self.inclination,
            self.ascending_node_longitude,
            self.perihelion_argument,
            self.mean_anomaly,
            mass,
        ))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    planets: BTreeMap<String, CatalogRecord>,
    #[serde(default)]
    exoplanets: BTreeMap<String, CatalogRecord>,
    #[serde(default)]
    asteroids: BTreeMap<String, CatalogRecord>,
    #[serde(default)]
    comets: BTreeMap<String, CatalogRecord>,
    #[serde(default)]
    trojans: BTreeMap<String, CatalogRecord>,
}

// =============================================================================
// CATALOG
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OrbitalCatalog {
    pub planets: Vec<CatalogEntry>,
    /// TRAPPIST-1 planets, elements relative to TRAPPIST-1
    pub exoplanets: Vec<CatalogEntry>,
    pub asteroids: Vec<CatalogEntry>,
    pub comets: Vec<CatalogEntry>,
    pub trojans: Vec<CatalogEntry>,
}

/// Mass of TRAPPIST-1 (M☉)
pub const TRAPPIST_1_MASS: f64 = 0.089;

impl OrbitalCatalog {
    pub fn builtin() -> Self {
        let planets = vec![
            CatalogEntry::new("Mercury", 0.38710, 0.20563, 7.005, 48.331, 29.125, 174.795, 1.660e-7),
            CatalogEntry::new("Venus", 0.72333, 0.00677, 3.39458, 76.680, 54.923, 50.377, 2.448e-6),
            CatalogEntry::new("Earth", 1.0, 0.01671, 0.0, 0.0, 102.937, 357.527, 3.003e-6),
            CatalogEntry::new("Mars", 1.52371, 0.09339, 1.85, 49.558, 286.502, 19.413, 3.227e-7),
            CatalogEntry::new("Jupiter", 5.20289, 0.04839, 1.305, 100.474, 274.254, 19.668, 9.548e-4),
            CatalogEntry::new("Saturn", 9.53668, 0.05386, 2.486, 113.666, 338.933, 317.355, 2.859e-4),
            CatalogEntry::new("Uranus", 19.1892, 0.04726, 0.773, 74.017, 96.937, 142.284, 4.366e-5),
            CatalogEntry::new("Neptune", 30.0699, 0.00859, 1.770, 131.784, 273.181, 259.915, 5.151e-5),
        ];

        let trappist = [
            ("TRAPPIST-1b", 0.01154, 2.5e-6),
            ("TRAPPIST-1c", 0.01580, 2.3e-6),
            ("TRAPPIST-1d", 0.02227, 8.3e-7),
            ("TRAPPIST-1e", 0.02925, 1.9e-6),
            ("TRAPPIST-1f", 0.03849, 2.5e-6),
            ("TRAPPIST-1g", 0.04683, 4.8e-6),
            ("TRAPPIST-1h", 0.06189, 6.3e-7),
        ];
        let exoplanets = trappist
            .iter()
            .map(|(name, a, mass)| CatalogEntry::new(name, *a, 0.0, 0.0, 0.0, 0.0, 0.0, *mass))
            .collect();

        let asteroids = vec![
            CatalogEntry::new("Vesta", 2.3615, 0.0887, 7.14, 103.85, 150.73, 205.5, 1.3e-10),
            CatalogEntry::new("Ceres", 2.7675, 0.0760, 10.59, 80.33, 73.51, 77.37, 4.7e-10),
        ];

        let comets = vec![
            CatalogEntry::new("Encke", 2.215, 0.8483, 11.78, 334.57, 186.54, 0.0, DEFAULT_SMALL_BODY_MASS),
            CatalogEntry::new("Halley", 17.834, 0.96714, 162.26, 58.42, 111.33, 38.38, DEFAULT_SMALL_BODY_MASS),
        ];

        // Mean anomalies place both near Jupiter's L4 point
        let trojans = vec![
            CatalogEntry::new("Achilles", 5.21, 0.148, 10.3, 316.6, 133.2, 4.6, 1e-14),
            CatalogEntry::new("Hektor", 5.24, 0.023, 18.2, 342.8, 185.4, 286.2, 1e-14),
        ];

        Self {
            planets,
            exoplanets,
            asteroids,
            comets,
            trojans,
        }
    }

    /// Built-in tables with entries from a JSON document merged over them
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let mut catalog = Self::builtin();

        merge_group(&mut catalog.planets, &file.planets)?;
        merge_group(&mut catalog.exoplanets, &file.exoplanets)?;
        merge_group(&mut catalog.asteroids, &file.asteroids)?;
        merge_group(&mut catalog.comets, &file.comets)?;
        merge_group(&mut catalog.trojans, &file.trojans)?;

        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Case-insensitive lookup across every group
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        self.planets
            .iter()
            .chain(&self.exoplanets)
            .chain(&self.asteroids)
            .chain(&self.comets)
            .chain(&self.trojans)
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn planet(&self, name: &str) -> Option<&CatalogEntry> {
        self.planets
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn entry_count(&self) -> usize {
        self.planets.len()
            + self.exoplanets.len()
            + self.asteroids.len()
            + self.comets.len()
            + self.trojans.len()
    }
}

impl Default for OrbitalCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn merge_group(
    group: &mut Vec<CatalogEntry>,
    records: &BTreeMap<String, CatalogRecord>,
) -> Result<(), CatalogError> {
    for (name, record) in records {
        let entry = record.to_entry(name)?;
        match group
            .iter_mut()
            .find(|existing| existing.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => *existing = entry,
            None => group.push(entry),
        }
    }
    // Inner to outer keeps preset body order stable
    group.sort_by(|a, b| {
        a.elements
            .semi_major_axis
            .total_cmp(&b.elements.semi_major_axis)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_has_eight_planets_in_order() {
        let catalog = OrbitalCatalog::builtin();
        let names: Vec<&str> = catalog.planets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Mercury", "Venus", "Earth", "Mars", "Jupiter", "Saturn", "Uranus", "Neptune"]
        );
        assert_eq!(catalog.exoplanets.len(), 7);
        assert!(catalog.find("halley").is_some());
        assert!(catalog.find("Pluto").is_none());
    }

    #[test]
    fn test_earth_state_is_near_one_au() {
        let catalog = OrbitalCatalog::builtin();
        let earth = catalog.planet("Earth").unwrap();
        let state = earth.state_about(1.0);
        let r = state.position.magnitude();
        assert!(r > 0.98 && r < 1.02, "r = {}", r);
        let v = state.velocity.magnitude();
        assert!((v - 6.28).abs() < 0.2, "v = {}", v);
    }

    #[test]
    fn test_json_overrides_and_extends() {
        let json = r#"{
            "planets": {"Earth": {"a": 1.1, "e": 0.0, "mass": 3e-6}},
            "comets": {"Tempel 1": {"a": 3.12, "e": 0.51, "i": 10.5}}
        }"#;
        let catalog = OrbitalCatalog::from_json_str(json).unwrap();
        assert!((catalog.planet("earth").unwrap().elements.semi_major_axis - 1.1).abs() < 1e-12);
        assert_eq!(catalog.planets.len(), 8);
        let tempel = catalog.find("Tempel 1").unwrap();
        assert_eq!(tempel.mass, DEFAULT_SMALL_BODY_MASS);
        assert_eq!(catalog.comets.len(), 3);
    }

    #[test]
    fn test_invalid_record_is_rejected() {
        let json = r#"{"asteroids": {"Bad": {"a": -1.0, "e": 0.1}}}"#;
        let err = OrbitalCatalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidEntry { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"trojans": {{"Patroclus": {{"a": 5.21, "e": 0.14, "mass": 1e-13}}}}}}"#).unwrap();
        let catalog = OrbitalCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.trojans.len(), 3);

        let missing = OrbitalCatalog::load(Path::new("/nonexistent/catalog.json"));
        assert!(matches!(missing, Err(CatalogError::Io { .. })));
    }
}
