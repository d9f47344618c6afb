// Prompt Assembly - System roles and retrieval-augmented prompts
// Scenario prompts carry the JSON schema; chat prompts do not.

use crate::oracle::CompletionRequest;
use crate::retriever::ScoredDocument;

/// Token budget for scenario JSON
pub const SCENARIO_MAX_TOKENS: u32 = 2000;

/// Token budget for chat answers
pub const CHAT_MAX_TOKENS: u32 = 400;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const SCENARIO_SYSTEM_ROLE: &str = "You are a physics simulation expert. \
Convert any user request into initial conditions for an N-body gravity simulation.\n\
Return ONLY valid JSON. No explanation. No markdown. Just the JSON object.";

pub const SCENARIO_SCHEMA: &str = r##"JSON FORMAT:
{
  "name": "Short name",
  "description": "One line description",
  "integrator": "high_precision",
  "t_per_frame": 0.005,
  "dt": 0.001,
  "bodies": [
    {
      "name": "Body name",
      "mass": 1.0,
      "position": [0.0, 0.0, 0.0],
      "velocity": [0.0, 0.0, 0.0],
      "type": "star",
      "color": "#fff200"
    }
  ]
}

UNITS: AU for position, AU/yr for velocity, solar masses for mass. G = 4π² ≈ 39.48.
Vectors have 2 or 3 components; a missing z is 0.

INTEGRATORS:
- "high_precision" for close encounters, chaotic or unknown systems (safest)
- "fast_symplectic" for stable planetary systems and long runs

T_PER_FRAME: simulated years per rendered frame; dt is the integrator step and must not exceed it.
- 0.001-0.003 for fast inner orbits (Mercury, hot Jupiters)
- 0.003-0.008 for Earth-like orbits
- 0.01-0.05 for outer planets and binary stars

MASS REFERENCE (solar masses): Sun 1.0, Jupiter 9.5e-4, Earth 3e-6, Moon 3.7e-8,
spacecraft 1e-15, neutron star 1.4, black hole 5-50, white dwarf 0.6, red dwarf 0.1-0.5.

CIRCULAR ORBIT: a body at distance r from a central mass M moves at v = 2π·sqrt(M/r)
perpendicular to the line joining them. Example: r = 1 AU around 1 M☉ gives 6.28 AU/yr.
For binaries place the stars at opposite sides of the barycentre with opposite velocities.

BODY TYPES: "star", "planet", "moon", "asteroid", "comet", "black_hole", "neutron_star", "spacecraft""##;

pub const CHAT_SYSTEM_ROLE: &str = "You are an expert in orbital mechanics and astronomy.";

/// Retrieved chunks joined in relevance order
pub fn join_context(documents: &[ScoredDocument]) -> String {
    documents
        .iter()
        .map(|d| d.document.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn scenario_request(user_prompt: &str, documents: &[ScoredDocument]) -> CompletionRequest {
    let mut system = String::from(SCENARIO_SYSTEM_ROLE);
    system.push_str("\n\n");
    system.push_str(SCENARIO_SCHEMA);

    let mut prompt = String::new();
    if !documents.is_empty() {
        prompt.push_str("REFERENCE DATA:\n");
        prompt.push_str(&join_context(documents));
        prompt.push_str("\n\n");
    }
    prompt.push_str("User wants to simulate: ");
    prompt.push_str(user_prompt);
    prompt.push_str("\n\nGenerate the JSON:");

    CompletionRequest::new(system, prompt, SCENARIO_MAX_TOKENS)
}

pub fn chat_request(question: &str, documents: &[ScoredDocument]) -> CompletionRequest {
    let context = if documents.is_empty() {
        "(no reference data available)".to_string()
    } else {
        join_context(documents)
    };

    let prompt = format!(
        "Use ONLY the following data to answer the question.\n\
         Be specific and use exact numbers from the data.\n\
         Keep the answer under 150 words.\n\
         If the data doesn't contain the answer, say \"I don't have that data.\"\n\n\
         REFERENCE DATA:\n{}\n\nQUESTION: {}\n\nANSWER:",
        context, question
    );

    CompletionRequest::new(CHAT_SYSTEM_ROLE, prompt, CHAT_MAX_TOKENS)
}
