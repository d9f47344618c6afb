// Chat Orchestrator - Retrieval-augmented question answering
// One oracle call per question; failures become user-visible text.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::prompt;
use crate::retriever::{DocumentCategory, Retriever, ScoredDocument};
use crate::oracle::TextOracle;

/// Words that mark a question as within the orbital-mechanics domain
const ORBITAL_KEYWORDS: &[&str] = &[
    "orbit", "orbital", "planet", "star", "comet", "asteroid", "kepler", "gravity", "trajectory",
    "ellipse", "perihelion", "aphelion", "eccentricity", "inclination", "resonance", "lagrange",
    "transfer", "hohmann", "tidal", "binary", "moon", "satellite", "ephemeris", "conjunction",
    "transit", "roche", "retrograde", "prograde", "semi-major", "exoplanet", "solar system",
    "mars", "earth", "jupiter", "saturn", "venus", "mercury", "uranus", "neptune", "simulate",
    "simulation", "black hole", "neutron", "pulsar", "trappist",
];

/// Words that suggest the user wants to watch a simulation
const SIMULATION_KEYWORDS: &[&str] = &["simulate", "show", "animate", "visualize", "watch", "run", "model"];

/// Category lookups beyond the always-present concept definitions.
/// A question naming any of the words pulls that many documents of the category.
const CATEGORY_TRIGGERS: &[(DocumentCategory, usize, &[&str])] = &[
    (
        DocumentCategory::Planet,
        1,
        &["mercury", "venus", "earth", "mars", "jupiter", "saturn", "uranus", "neptune"],
    ),
    (
        DocumentCategory::Exoplanet,
        2,
        &["exoplanet", "hot jupiter", "super earth", "super-earth", "extrasolar", "trappist"],
    ),
    (DocumentCategory::Comet, 2, &["comet", "halley", "encke", "eccentric", "icy"]),
    (DocumentCategory::Asteroid, 2, &["asteroid", "belt", "ceres", "vesta"]),
    (DocumentCategory::Trojan, 2, &["trojan", "achilles", "hektor"]),
];

const CONCEPT_DOCUMENTS: usize = 2;

pub const OFF_TOPIC_REPLY: &str = "I specialize in orbital mechanics. Ask about planet orbits, \
transfers, Lagrange points, Kepler's laws, or tell me to simulate anything!";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatAnswer {
    pub text: String,
    /// Prompt the client can send to the simulation socket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_prompt: Option<String>,
}

pub fn is_orbital_query(question: &str) -> bool {
    let lowered = question.to_lowercase();
    ORBITAL_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Categories to search for a question, in the order their sections appear
pub fn retrieval_plan(question: &str) -> Vec<(DocumentCategory, usize)> {
    let lowered = question.to_lowercase();
    let mut plan = vec![(DocumentCategory::Concept, CONCEPT_DOCUMENTS)];
    plan.extend(
        CATEGORY_TRIGGERS
            .iter()
            .filter(|(_, _, words)| words.iter().any(|w| lowered.contains(w)))
            .map(|(category, k, _)| (*category, *k)),
    );
    plan
}

fn wants_simulation(question: &str) -> bool {
    let lowered = question.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| SIMULATION_KEYWORDS.contains(&word))
}

pub struct ChatOrchestrator {
    retriever: Arc<dyn Retriever>,
    oracle: Arc<dyn TextOracle>,
    oracle_timeout: Duration,
    retrieval_k: usize,
    domain_gate: bool,
}

impl ChatOrchestrator {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        oracle: Arc<dyn TextOracle>,
        oracle_timeout: Duration,
        retrieval_k: usize,
        domain_gate: bool,
    ) -> Self {
        Self {
            retriever,
            oracle,
            oracle_timeout,
            retrieval_k,
            domain_gate,
        }
    }

    pub async fn answer(&self, question: &str) -> ChatAnswer {
        let question = question.trim();

        if self.domain_gate && !is_orbital_query(question) {
            tracing::debug!("Off-topic question rejected");
            return ChatAnswer {
                text: OFF_TOPIC_REPLY.to_string(),
                sim_prompt: None,
            };
        }

        let documents = self.gather_context(question).await;
        let request = prompt::chat_request(question, &documents);
        let text = match tokio::time::timeout(self.oracle_timeout, self.oracle.complete(&request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Chat oracle call failed");
                format!("Error: the language model is unavailable ({})", e)
            }
            Err(_) => {
                tracing::warn!(secs = self.oracle_timeout.as_secs(), "Chat oracle call timed out");
                "Error: the language model did not answer in time".to_string()
            }
        };

        ChatAnswer {
            text,
            sim_prompt: wants_simulation(question).then(|| question.to_string()),
        }
    }

    /// Category-by-category lookups, then one unfiltered search if they found nothing
    async fn gather_context(&self, question: &str) -> Vec<ScoredDocument> {
        let mut documents = Vec::new();
        for (category, k) in retrieval_plan(question) {
            match self.retriever.retrieve_in(question, k, category).await {
                Ok(found) => documents.extend(found),
                Err(e) => tracing::debug!(?category, error = %e, "Category lookup failed"),
            }
        }
        if !documents.is_empty() {
            return documents;
        }

        match self.retriever.retrieve(question, self.retrieval_k).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "Retrieval failed, answering without reference data");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OracleError, RetrievalError};
    use crate::oracle::CompletionRequest;
    use crate::retriever::Document;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct RecordingOracle {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl TextOracle for RecordingOracle {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
            self.prompts.lock().push(request.prompt.clone());
            if self.fail {
                Err(OracleError::Status { status: 500 })
            } else {
                Ok("Mars takes 1.88 years.".to_string())
            }
        }
        fn model(&self) -> &str {
            "recording"
        }
    }

    struct NoIndex;

    #[async_trait]
    impl Retriever for NoIndex {
        async fn retrieve(&self, _q: &str, _k: usize) -> Result<Vec<ScoredDocument>, RetrievalError> {
            Err(RetrievalError::Unavailable {
                reason: "test".to_string(),
            })
        }
        async fn retrieve_in(
            &self,
            _q: &str,
            _k: usize,
            _c: DocumentCategory,
        ) -> Result<Vec<ScoredDocument>, RetrievalError> {
            Ok(Vec::new())
        }
        fn document_count(&self) -> usize {
            0
        }
    }

    /// Answers every lookup with one document naming the category searched
    struct CategoryIndex {
        lookups: Mutex<Vec<Option<DocumentCategory>>>,
        empty_categories: bool,
    }

    impl CategoryIndex {
        fn new(empty_categories: bool) -> Arc<Self> {
            Arc::new(Self {
                lookups: Mutex::new(Vec::new()),
                empty_categories,
            })
        }

        fn hit(label: &str) -> ScoredDocument {
            ScoredDocument {
                document: Document {
                    id: label.to_string(),
                    text: format!("{} reference", label),
                    category: DocumentCategory::Concept,
                    embedding: vec![],
                },
                score: 1.0,
            }
        }
    }

    #[async_trait]
    impl Retriever for CategoryIndex {
        async fn retrieve(&self, _q: &str, _k: usize) -> Result<Vec<ScoredDocument>, RetrievalError> {
            self.lookups.lock().push(None);
            Ok(vec![Self::hit("general")])
        }
        async fn retrieve_in(
            &self,
            _q: &str,
            _k: usize,
            category: DocumentCategory,
        ) -> Result<Vec<ScoredDocument>, RetrievalError> {
            self.lookups.lock().push(Some(category));
            if self.empty_categories {
                return Ok(Vec::new());
            }
            Ok(vec![Self::hit(&format!("{:?}", category).to_lowercase())])
        }
        fn document_count(&self) -> usize {
            1
        }
    }

    fn orchestrator(fail: bool, gate: bool) -> (ChatOrchestrator, Arc<RecordingOracle>) {
        let oracle = Arc::new(RecordingOracle {
            prompts: Mutex::new(Vec::new()),
            fail,
        });
        let chat = ChatOrchestrator::new(Arc::new(NoIndex), oracle.clone(), Duration::from_secs(1), 5, gate);
        (chat, oracle)
    }

    #[test]
    fn test_domain_keywords() {
        assert!(is_orbital_query("What is Mars orbital period?"));
        assert!(is_orbital_query("Explain a HOHMANN transfer"));
        assert!(!is_orbital_query("What is the weather like today?"));
    }

    #[test]
    fn test_retrieval_plan_follows_question() {
        assert_eq!(retrieval_plan("What is a Lagrange point?"), vec![(DocumentCategory::Concept, 2)]);
        assert_eq!(
            retrieval_plan("How eccentric is Halley compared to Jupiter?"),
            vec![
                (DocumentCategory::Concept, 2),
                (DocumentCategory::Planet, 1),
                (DocumentCategory::Comet, 2),
            ]
        );
        assert!(retrieval_plan("Tell me about TRAPPIST-1").contains(&(DocumentCategory::Exoplanet, 2)));
        assert!(retrieval_plan("Where do the Trojans sit?").contains(&(DocumentCategory::Trojan, 2)));
    }

    #[tokio::test]
    async fn test_context_gathered_per_category() {
        let index = CategoryIndex::new(false);
        let oracle = Arc::new(RecordingOracle {
            prompts: Mutex::new(Vec::new()),
            fail: false,
        });
        let chat = ChatOrchestrator::new(index.clone(), oracle.clone(), Duration::from_secs(1), 5, true);
        chat.answer("What is the orbit of Halley's comet?").await;

        assert_eq!(
            *index.lookups.lock(),
            vec![Some(DocumentCategory::Concept), Some(DocumentCategory::Comet)]
        );
        let prompt = oracle.prompts.lock()[0].clone();
        assert!(prompt.contains("concept reference"));
        assert!(prompt.contains("comet reference"));
        assert!(!prompt.contains("general reference"));
    }

    #[tokio::test]
    async fn test_empty_categories_fall_back_to_general_search() {
        let index = CategoryIndex::new(true);
        let oracle = Arc::new(RecordingOracle {
            prompts: Mutex::new(Vec::new()),
            fail: false,
        });
        let chat = ChatOrchestrator::new(index.clone(), oracle.clone(), Duration::from_secs(1), 5, true);
        chat.answer("Explain orbital resonance").await;

        assert_eq!(index.lookups.lock().last(), Some(&None));
        assert!(oracle.prompts.lock()[0].contains("general reference"));
    }

    #[tokio::test]
    async fn test_off_topic_gets_fixed_reply_without_oracle() {
        let (chat, oracle) = orchestrator(false, true);
        let answer = chat.answer("Recommend a pasta recipe").await;
        assert_eq!(answer.text, OFF_TOPIC_REPLY);
        assert!(oracle.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_gate_disabled_passes_everything() {
        let (chat, oracle) = orchestrator(false, false);
        chat.answer("Recommend a pasta recipe").await;
        assert_eq!(oracle.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_without_index() {
        let (chat, oracle) = orchestrator(false, true);
        let answer = chat.answer("What is the orbital period of Mars?").await;
        assert_eq!(answer.text, "Mars takes 1.88 years.");
        assert!(answer.sim_prompt.is_none());
        assert!(oracle.prompts.lock()[0].contains("QUESTION: What is the orbital period of Mars?"));
    }

    #[tokio::test]
    async fn test_oracle_failure_is_user_visible_and_not_retried() {
        let (chat, oracle) = orchestrator(true, true);
        let answer = chat.answer("Simulate the orbit of Jupiter").await;
        assert!(answer.text.starts_with("Error:"));
        assert_eq!(oracle.prompts.lock().len(), 1);
        assert_eq!(answer.sim_prompt.as_deref(), Some("Simulate the orbit of Jupiter"));
    }
}
