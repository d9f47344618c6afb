// Index Builder - Reference chunks for the retrieval index
// Concept definitions plus one chunk per catalog body, embedded and saved as JSON.

use std::fmt::Write as _;

use crate::catalog::{CatalogEntry, OrbitalCatalog, TRAPPIST_1_MASS};
use crate::error::RetrievalError;
use crate::physics_engine::G;
use crate::retriever::{DocumentCategory, DocumentIndex, Embedder};

/// Dimension used with the offline hashing embedder
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

/// (id, concept, definition)
const CONCEPTS: &[(&str, &str, &str)] = &[
    (
        "kepler-first-law",
        "Kepler's first law",
        "Every bound orbit is an ellipse with the central mass at one focus. \
         Eccentricity e measures elongation: 0 is a circle, values near 1 are long thin ellipses.",
    ),
    (
        "kepler-second-law",
        "Kepler's second law",
        "A line from the star to an orbiting body sweeps equal areas in equal times, \
         so the body moves fastest at perihelion and slowest at aphelion.",
    ),
    (
        "kepler-third-law",
        "Kepler's third law",
        "The square of the orbital period is proportional to the cube of the semi-major axis. \
         In years, AU and solar masses: P^2 = a^3 / (M + m).",
    ),
    (
        "vis-viva",
        "Vis-viva equation",
        "Orbital speed at distance r on an orbit of semi-major axis a is v^2 = GM (2/r - 1/a). \
         Circular speed is sqrt(GM/r) and escape speed is sqrt(2GM/r).",
    ),
    (
        "hohmann-transfer",
        "Hohmann transfer",
        "The minimum-energy two-impulse transfer between coplanar circular orbits. \
         The transfer ellipse touches both orbits; its flight time is half its period. \
         Earth to Mars takes about 259 days.",
    ),
    (
        "lagrange-points",
        "Lagrange points",
        "Five equilibrium points of the restricted three-body problem. L4 and L5 lead and trail \
         the secondary by 60 degrees and are stable when the mass ratio is below about 1/25; \
         Jupiter's Trojan asteroids librate around them.",
    ),
    (
        "orbital-resonance",
        "Orbital resonance",
        "Bodies whose periods form a small integer ratio exchange energy regularly. \
         Examples: Neptune and Pluto 3:2, the Kirkwood gaps in the asteroid belt, \
         and the resonant chain of the TRAPPIST-1 planets.",
    ),
    (
        "roche-limit",
        "Roche limit",
        "The distance inside which tidal forces from a primary exceed a satellite's self-gravity. \
         For a fluid satellite it is about 2.44 times the primary's radius times the cube root \
         of the density ratio.",
    ),
    (
        "hill-sphere",
        "Hill sphere",
        "Region where a body's gravity dominates its satellites' motion over the star's: \
         r_H = a (1 - e) cube root of m / 3M.",
    ),
    (
        "figure-eight",
        "Figure-eight three-body orbit",
        "A periodic solution where three equal masses chase each other along one figure-eight curve, \
         found numerically by Moore and proven by Chenciner and Montgomery.",
    ),
    (
        "binary-stars",
        "Binary star orbits",
        "Two stars orbit their common barycentre on ellipses of the same eccentricity, with \
         distances from the barycentre inversely proportional to their masses.",
    ),
    (
        "hot-jupiters",
        "Hot Jupiters",
        "Gas giants orbiting within about 0.1 AU of their star with periods of a few days, \
         usually on circularised orbits due to tides.",
    ),
    (
        "symplectic-integration",
        "Symplectic integration",
        "Fixed-step schemes such as leapfrog and Verlet conserve a shadow Hamiltonian, so energy \
         error stays bounded over long runs instead of drifting.",
    ),
    (
        "retrograde-orbits",
        "Retrograde orbits",
        "An orbit with inclination above 90 degrees moves opposite to the planets. \
         Halley's comet, at 162 degrees, is the best-known example.",
    ),
];

pub fn concept_chunks() -> Vec<(String, String, DocumentCategory)> {
    CONCEPTS
        .iter()
        .map(|(id, name, definition)| {
            (
                format!("concept-{}", id),
                format!("CONCEPT: {}\nDEFINITION: {}\nDOMAIN: orbital_dynamics\n", name, definition),
                DocumentCategory::Concept,
            )
        })
        .collect()
}

fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

fn entry_text(heading: &str, entry: &CatalogEntry, host: &str, host_mass: f64, note: Option<&str>) -> String {
    let elements = &entry.elements;
    let mut text = format!("{}: {}\n", heading, entry.name);
    let _ = writeln!(text, "HOST: {}", host);
    if let Some(note) = note {
        let _ = writeln!(text, "{}", note);
    }
    let _ = writeln!(text, "Semi-major axis (AU): {}", elements.semi_major_axis);
    let _ = writeln!(text, "Eccentricity: {}", elements.eccentricity);
    let _ = writeln!(text, "Inclination (deg): {:.2}", elements.inclination.to_degrees());
    if let Some(period) = elements.period(G * (host_mass + entry.mass)) {
        let _ = writeln!(text, "Orbital period (years): {:.4}", period);
    }
    let _ = writeln!(text, "Mass (solar masses): {:e}", entry.mass);
    text.push_str("DOMAIN: orbital_dynamics\n");
    text
}

/// One chunk per catalog body, tagged with its group's category
pub fn catalog_chunks(catalog: &OrbitalCatalog) -> Vec<(String, String, DocumentCategory)> {
    let groups: [(&[CatalogEntry], DocumentCategory, &str, &str, f64, Option<&str>); 5] = [
        (&catalog.planets, DocumentCategory::Planet, "SOLAR SYSTEM BODY", "Sun", 1.0, None),
        (
            &catalog.exoplanets,
            DocumentCategory::Exoplanet,
            "EXOPLANET",
            "TRAPPIST-1",
            TRAPPIST_1_MASS,
            Some("HOST STAR: ultracool red dwarf, 0.089 solar masses"),
        ),
        (&catalog.asteroids, DocumentCategory::Asteroid, "ASTEROID", "Sun", 1.0, None),
        (
            &catalog.trojans,
            DocumentCategory::Trojan,
            "JUPITER TROJAN ASTEROID",
            "Sun",
            1.0,
            Some("ORBITAL TYPE: Trojan, librates around Jupiter's L4 or L5 Lagrange point"),
        ),
        (
            &catalog.comets,
            DocumentCategory::Comet,
            "COMET",
            "Sun",
            1.0,
            Some("OBJECT TYPE: Comet, icy small body with a highly eccentric orbit"),
        ),
    ];

    groups
        .iter()
        .flat_map(|(entries, category, heading, host, host_mass, note)| {
            entries.iter().map(move |entry| {
                (
                    format!("{}-{}", category_prefix(*category), slug(&entry.name)),
                    entry_text(heading, entry, host, *host_mass, *note),
                    *category,
                )
            })
        })
        .collect()
}

fn category_prefix(category: DocumentCategory) -> &'static str {
    match category {
        DocumentCategory::Concept => "concept",
        DocumentCategory::Planet => "planet",
        DocumentCategory::Exoplanet => "exo",
        DocumentCategory::Asteroid => "ast",
        DocumentCategory::Trojan => "tj",
        DocumentCategory::Comet => "cm",
    }
}

pub fn index_chunks(catalog: &OrbitalCatalog) -> Vec<(String, String, DocumentCategory)> {
    let mut chunks = concept_chunks();
    chunks.extend(catalog_chunks(catalog));
    chunks
}

/// Embed every concept and catalog chunk
pub async fn build_index(embedder: &dyn Embedder, catalog: &OrbitalCatalog) -> Result<DocumentIndex, RetrievalError> {
    let chunks = index_chunks(catalog);
    tracing::info!(chunks = chunks.len(), model = %embedder.model(), "Embedding reference chunks");
    DocumentIndex::build(embedder, chunks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::{HashingEmbedder, IndexRetriever, Retriever, HASHING_MODEL};
    use std::collections::HashSet;
    use std::time::Duration;

    #[test]
    fn test_every_catalog_group_is_chunked() {
        let catalog = OrbitalCatalog::builtin();
        let chunks = catalog_chunks(&catalog);
        assert_eq!(chunks.len(), catalog.entry_count());

        let count = |category| chunks.iter().filter(|(_, _, c)| *c == category).count();
        assert_eq!(count(DocumentCategory::Planet), 8);
        assert_eq!(count(DocumentCategory::Exoplanet), 7);
        assert_eq!(count(DocumentCategory::Asteroid), 2);
        assert_eq!(count(DocumentCategory::Trojan), 2);
        assert_eq!(count(DocumentCategory::Comet), 2);

        let (_, mars, _) = chunks.iter().find(|(id, _, _)| id == "planet-mars").unwrap();
        assert!(mars.contains("SOLAR SYSTEM BODY: Mars"));
        assert!(mars.contains("Orbital period (years): 1.88"), "{}", mars);
    }

    #[test]
    fn test_chunk_ids_are_unique() {
        let chunks = index_chunks(&OrbitalCatalog::builtin());
        let ids: HashSet<&str> = chunks.iter().map(|(id, _, _)| id.as_str()).collect();
        assert_eq!(ids.len(), chunks.len());
        assert!(ids.contains("concept-hohmann-transfer"));
        assert!(ids.contains("exo-trappist-1e"));
    }

    #[tokio::test]
    async fn test_built_index_saves_and_serves_queries() {
        let embedder = HashingEmbedder::new(DEFAULT_HASHING_DIMENSION);
        let index = build_index(&embedder, &OrbitalCatalog::builtin()).await.unwrap();
        assert_eq!(index.model, HASHING_MODEL);
        assert_eq!(index.dimension, DEFAULT_HASHING_DIMENSION);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag_index.json");
        index.save(&path).unwrap();

        let retriever = std::sync::Arc::new(IndexRetriever::new("http://localhost:11434", Duration::from_secs(1)));
        retriever.load_in_background(path).await.unwrap();
        assert_eq!(retriever.document_count(), index.documents.len());

        let trojans = retriever
            .retrieve_in("Jupiter trojan Lagrange point", 2, DocumentCategory::Trojan)
            .await
            .unwrap();
        assert_eq!(trojans.len(), 2);
        let concepts = retriever
            .retrieve_in("Hohmann transfer minimum energy", 1, DocumentCategory::Concept)
            .await
            .unwrap();
        assert_eq!(concepts[0].document.id, "concept-hohmann-transfer");
    }
}
