// Document Retriever - Vector similarity search over a prebuilt index
// The index is loaded once in the background and read-only afterwards.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{IndexError, RetrievalError};

/// Index `model` value selecting the offline hashing embedder
pub const HASHING_MODEL: &str = "hashing";

// =============================================================================
// DOCUMENTS & INDEX
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Concept,
    Planet,
    Exoplanet,
    Asteroid,
    Trojan,
    Comet,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub category: DocumentCategory,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIndex {
    pub model: String,
    pub dimension: usize,
    pub documents: Vec<Document>,
}

impl DocumentIndex {
    pub fn from_json_str(json: &str) -> Result<Self, IndexError> {
        let index: DocumentIndex = serde_json::from_str(json)?;
        for doc in &index.documents {
            if doc.embedding.len() != index.dimension {
                return Err(IndexError::Dimension {
                    id: doc.id.clone(),
                    expected: index.dimension,
                    actual: doc.embedding.len(),
                });
            }
        }
        Ok(index)
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let json = std::fs::read_to_string(path).map_err(|source| IndexError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).map_err(|source| IndexError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Embed every chunk with `embedder` and assemble an index
    pub async fn build(
        embedder: &dyn Embedder,
        chunks: Vec<(String, String, DocumentCategory)>,
    ) -> Result<Self, RetrievalError> {
        let mut documents = Vec::with_capacity(chunks.len());
        for (id, text, category) in chunks {
            let embedding = embedder.embed(&text).await?;
            documents.push(Document {
                id,
                text,
                category,
                embedding,
            });
        }
        let dimension = documents.first().map_or(0, |d| d.embedding.len());
        Ok(Self {
            model: embedder.model().to_string(),
            dimension,
            documents,
        })
    }

    /// Top-k by cosine similarity, ties broken by ascending id
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        category: Option<DocumentCategory>,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        if query.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                actual: query.len(),
                expected: self.dimension,
            });
        }

        let mut scored: Vec<ScoredDocument> = self
            .documents
            .iter()
            .filter(|doc| category.map_or(true, |c| doc.category == c))
            .map(|doc| ScoredDocument {
                score: cosine_similarity(query, &doc.embedding),
                document: doc.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let xf = f64::from(x);
        let yf = f64::from(y);
        dot += xf * yf;
        norm_a += xf * xf;
        norm_b += yf * yf;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        sim as f32
    } else {
        0.0
    }
}

// =============================================================================
// EMBEDDERS
// =============================================================================

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Ollama-compatible `/api/embeddings` client
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| RetrievalError::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Embedding(format!(
                "API returned status: {}",
                response.status()
            )));
        }

        let data: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Embedding(format!("Failed to parse response: {}", e)))?;

        Ok(data.embedding)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Deterministic bag-of-words embedder: each lowercase token is hashed with
/// blake3 into a signed bucket, and the result is L2-normalised.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = blake3::hash(token.as_bytes());
            let bytes = digest.as_bytes();
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&bytes[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(self.embed_text(text))
    }

    fn model(&self) -> &str {
        HASHING_MODEL
    }
}

// =============================================================================
// RETRIEVER
// =============================================================================

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, RetrievalError>;

    async fn retrieve_in(
        &self,
        query: &str,
        k: usize,
        category: DocumentCategory,
    ) -> Result<Vec<ScoredDocument>, RetrievalError>;

    fn document_count(&self) -> usize;
}

struct LoadedIndex {
    index: DocumentIndex,
    embedder: Arc<dyn Embedder>,
}

/// Retriever over a [`DocumentIndex`] that may not be loaded yet
pub struct IndexRetriever {
    slot: RwLock<Option<Arc<LoadedIndex>>>,
    ollama_url: String,
    timeout: Duration,
}

impl IndexRetriever {
    pub fn new(ollama_url: &str, timeout: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ollama_url: ollama_url.to_string(),
            timeout,
        }
    }

    /// Make `index` searchable, choosing the embedder its `model` names
    pub fn install(&self, index: DocumentIndex) {
        let embedder: Arc<dyn Embedder> = if index.model == HASHING_MODEL {
            Arc::new(HashingEmbedder::new(index.dimension))
        } else {
            Arc::new(OllamaEmbedder::new(&self.ollama_url, &index.model))
        };
        self.install_with(index, embedder);
    }

    pub fn install_with(&self, index: DocumentIndex, embedder: Arc<dyn Embedder>) {
        tracing::info!(
            documents = index.documents.len(),
            model = %index.model,
            dimension = index.dimension,
            "Document index ready"
        );
        *self.slot.write() = Some(Arc::new(LoadedIndex { index, embedder }));
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Read the index file off the async threads and install it
    pub fn load_in_background(self: &Arc<Self>, path: PathBuf) -> tokio::task::JoinHandle<()> {
        let retriever = Arc::clone(self);
        tokio::spawn(async move {
            let shown = path.display().to_string();
            match tokio::task::spawn_blocking(move || DocumentIndex::load(&path)).await {
                Ok(Ok(index)) => retriever.install(index),
                Ok(Err(e)) => {
                    tracing::warn!(path = %shown, error = %e, "Document index unavailable, retrieval disabled")
                }
                Err(e) => tracing::warn!(error = %e, "Document index load task failed"),
            }
        })
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        category: Option<DocumentCategory>,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        // Clone the Arc so the lock is not held across the embedding call
        let loaded = self.slot.read().clone().ok_or_else(|| RetrievalError::Unavailable {
            reason: "index not loaded".to_string(),
        })?;
        if loaded.index.documents.is_empty() {
            return Err(RetrievalError::Unavailable {
                reason: "index is empty".to_string(),
            });
        }

        let query_vec = tokio::time::timeout(self.timeout, loaded.embedder.embed(query))
            .await
            .map_err(|_| RetrievalError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        loaded.index.search(&query_vec, k, category)
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>, RetrievalError> {
        self.search(query, k, None).await
    }

    async fn retrieve_in(
        &self,
        query: &str,
        k: usize,
        category: DocumentCategory,
    ) -> Result<Vec<ScoredDocument>, RetrievalError> {
        self.search(query, k, Some(category)).await
    }

    fn document_count(&self) -> usize {
        self.slot
            .read()
            .as_ref()
            .map_or(0, |loaded| loaded.index.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks() -> Vec<(String, String, DocumentCategory)> {
        vec![
            (
                "concept-hohmann".to_string(),
                "Hohmann transfer orbit between two circular orbits".to_string(),
                DocumentCategory::Concept,
            ),
            (
                "planet-mars".to_string(),
                "Mars orbital period 1.88 years eccentricity 0.0934".to_string(),
                DocumentCategory::Planet,
            ),
            (
                "comet-halley".to_string(),
                "Halley comet retrograde orbit period 75 years".to_string(),
                DocumentCategory::Comet,
            ),
        ]
    }

    async fn loaded_retriever() -> IndexRetriever {
        let embedder = HashingEmbedder::new(256);
        let index = DocumentIndex::build(&embedder, chunks()).await.unwrap();
        let retriever = IndexRetriever::new("http://localhost:11434", Duration::from_secs(1));
        retriever.install(index);
        retriever
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_hashing_embedder_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(32);
        let a = embedder.embed_text("Orbital period of Mars");
        let b = embedder.embed_text("orbital PERIOD of mars");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(embedder.embed_text("").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_search_orders_and_breaks_ties_by_id() {
        let index = DocumentIndex {
            model: HASHING_MODEL.to_string(),
            dimension: 2,
            documents: vec![
                Document { id: "b".into(), text: String::new(), category: DocumentCategory::Concept, embedding: vec![1.0, 0.0] },
                Document { id: "a".into(), text: String::new(), category: DocumentCategory::Concept, embedding: vec![2.0, 0.0] },
                Document { id: "c".into(), text: String::new(), category: DocumentCategory::Planet, embedding: vec![0.0, 1.0] },
            ],
        };
        let results = index.search(&[1.0, 0.0], 2, None).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let planets = index.search(&[1.0, 0.0], 5, Some(DocumentCategory::Planet)).unwrap();
        assert_eq!(planets.len(), 1);

        assert!(matches!(
            index.search(&[1.0], 1, None),
            Err(RetrievalError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unloaded_retriever_is_unavailable() {
        let retriever = IndexRetriever::new("http://localhost:11434", Duration::from_secs(1));
        assert_eq!(retriever.document_count(), 0);
        let result = retriever.retrieve("mars", 5).await;
        assert!(matches!(result, Err(RetrievalError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_retrieve_finds_matching_document() {
        let retriever = loaded_retriever().await;
        assert_eq!(retriever.document_count(), 3);

        let results = retriever.retrieve("Mars orbital period", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.id, "planet-mars");
        assert!(results[0].score >= results[1].score);

        let comets = retriever
            .retrieve_in("orbit period", 5, DocumentCategory::Comet)
            .await
            .unwrap();
        assert_eq!(comets.len(), 1);
        assert_eq!(comets[0].document.id, "comet-halley");
    }

    #[tokio::test]
    async fn test_index_file_round_trip_and_background_load() {
        let embedder = HashingEmbedder::new(16);
        let index = DocumentIndex::build(&embedder, chunks()).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag_index.json");
        index.save(&path).unwrap();

        let retriever = Arc::new(IndexRetriever::new("http://localhost:11434", Duration::from_secs(1)));
        retriever.load_in_background(path).await.unwrap();
        assert!(retriever.is_loaded());
        assert_eq!(retriever.document_count(), 3);
    }

    #[tokio::test]
    async fn test_background_load_of_missing_file_leaves_retrieval_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = Arc::new(IndexRetriever::new("http://localhost:11434", Duration::from_secs(1)));
        retriever
            .load_in_background(dir.path().join("never_built.json"))
            .await
            .unwrap();
        assert!(!retriever.is_loaded());
        assert!(matches!(
            retriever.retrieve("mars", 3).await,
            Err(RetrievalError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_index_with_wrong_dimension_is_rejected() {
        let json = r#"{"model":"hashing","dimension":3,"documents":[
            {"id":"x","text":"t","category":"concept","embedding":[1.0,0.0]}]}"#;
        assert!(matches!(
            DocumentIndex::from_json_str(json),
            Err(IndexError::Dimension { .. })
        ));
    }
}
