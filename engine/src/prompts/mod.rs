//! Prompt Builder
//!
//! Pure functions that assemble the instruction pair sent to a language model
//! for each operation. Every structured prompt carries its JSON contract
//! inline. User-supplied values are embedded as JSON string literals so that
//! quotes and control characters cannot break out of the instruction.

use sdk::types::{Decomposition, Pathway};
use serde_json::Value;

/// System and user instructions for one model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    /// Single-string form for backends that take one prompt (image models)
    pub fn flatten(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

const DECOMPOSITION_SCHEMA: &str = r#"{
  "invention": string,
  "summary": string,
  "core_principles": [string],
  "components": [{ "name": string, "function": string, "underlying_technology": string }],
  "prerequisites": [{ "name": string, "category": string, "earliest_plausible_era": string, "rationale": string }],
  "materials": [string]
}"#;

const SIMULATION_SCHEMA: &str = r#"{
  "pathways": [{
    "title": string,
    "summary": string,
    "feasibility_score": number between 0 and 10,
    "technical_steps": [string],
    "key_obstacles": [string],
    "societal_impact": string,
    "timeline": [string]
  }]
}"#;

/// Render a user value as a JSON string literal
pub fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Describe how freely the model may speculate
fn creativity_guidance(creativity: f32) -> &'static str {
    if creativity < 0.34 {
        "Stay conservative: only use techniques and materials documented for that era."
    } else if creativity < 0.67 {
        "Balance historical accuracy with reasonable speculation."
    } else {
        "Be imaginative: allow bold but internally consistent leaps."
    }
}

/// Break an invention into principles, components and prerequisites
pub fn deconstruct(invention: &str) -> PromptPair {
    PromptPair {
        system: format!(
            "You are a historian of science and technology. You analyze inventions into the \
             scientific principles, components, prerequisite technologies and materials they \
             depend on. Respond with a single JSON object matching this schema and nothing \
             else:\n{}",
            DECOMPOSITION_SCHEMA
        ),
        user: format!(
            "Deconstruct the invention {}. List prerequisites in the order they would have to \
             be discovered, with the earliest era each could plausibly have appeared.",
            quote(invention)
        ),
    }
}

/// Imagine how an invention could have emerged in another era
pub fn simulate(
    invention: &str,
    era: &str,
    depth: u8,
    creativity: f32,
    decomposition: Option<&Decomposition>,
) -> PromptPair {
    let mut user = format!(
        "Simulate how the invention {} could have been developed in the era {}. \
         Produce exactly {} distinct pathways. {}",
        quote(invention),
        quote(era),
        depth,
        creativity_guidance(creativity)
    );

    if let Some(decomposition) = decomposition {
        if let Ok(known) = serde_json::to_string(decomposition) {
            user.push_str("\nKnown decomposition of the invention: ");
            user.push_str(&known);
        }
    }

    PromptPair {
        system: format!(
            "You are an alternate-history engineer. For each pathway give concrete technical \
             steps achievable with the era's materials and knowledge, the main obstacles, the \
             societal impact and a timeline. Score feasibility from 0 (impossible) to 10 \
             (likely). Respond with a single JSON object matching this schema and nothing \
             else:\n{}",
            SIMULATION_SCHEMA
        ),
        user,
    }
}

/// Tell the story of one pathway as prose
pub fn narrate(pathway: &Pathway, era: &str) -> PromptPair {
    let pathway_json = serde_json::to_string(pathway).unwrap_or_default();
    PromptPair {
        system: "You are a novelist writing vivid, historically grounded alternate history. \
                 Write three to five paragraphs of plain prose. Do not use markdown, headings \
                 or lists."
            .to_string(),
        user: format!(
            "Narrate the following development pathway as it unfolds in the era {}, from the \
             point of view of the people who built it.\nPathway: {}",
            quote(era),
            pathway_json
        ),
    }
}

/// Build the image prompt for an illustration
pub fn visualize(
    prompt: &str,
    style: Option<&str>,
    era: Option<&str>,
    pathway: Option<&Pathway>,
) -> PromptPair {
    let mut system = String::from("A detailed illustration for an alternate-history exhibition.");
    if let Some(style) = style.filter(|s| !s.trim().is_empty()) {
        system.push_str(&format!(" Style: {}.", style.trim()));
    }
    if let Some(era) = era.filter(|e| !e.trim().is_empty()) {
        system.push_str(&format!(
            " Depict clothing, architecture and materials of the era {}.",
            quote(era.trim())
        ));
    }
    system.push_str(" No text or lettering in the image.");

    let mut user = prompt.trim().to_string();
    if let Some(pathway) = pathway.filter(|p| !p.title.is_empty()) {
        user.push_str(&format!(" Scene: {}", pathway.title));
        if !pathway.summary.is_empty() {
            user.push_str(&format!(". {}", pathway.summary));
        }
    }

    PromptPair { system, user }
}
