//! Generation result types
//!
//! These are the structured shapes the language models are asked to produce.
//! Every struct is `#[serde(default)]` so that partially filled model output
//! still deserializes; `normalize` then enforces the invariants the UI relies on.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Prefix used for synthetic content when a model response could not be parsed.
pub const PLACEHOLDER_MARKER: &str = "[placeholder]";

/// Lowest feasibility score a pathway can carry
pub const MIN_FEASIBILITY: f64 = 0.0;

/// Highest feasibility score a pathway can carry
pub const MAX_FEASIBILITY: f64 = 10.0;

/// Breakdown of an invention into principles, parts, and prerequisites
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decomposition {
    /// Name of the invention as the model understood it
    pub invention: String,

    /// One-paragraph description of what the invention does
    pub summary: String,

    /// Scientific principles the invention depends on
    pub core_principles: Vec<String>,

    /// Major functional parts
    pub components: Vec<Component>,

    /// Technologies and knowledge that must exist first
    pub prerequisites: Vec<Prerequisite>,

    /// Raw materials needed to build it
    pub materials: Vec<String>,
}

impl Decomposition {
    /// Trim whitespace and drop empty list entries.
    pub fn normalize(&mut self) {
        self.invention = self.invention.trim().to_string();
        self.summary = self.summary.trim().to_string();
        retain_non_blank(&mut self.core_principles);
        retain_non_blank(&mut self.materials);
        self.components.retain(|c| !c.name.trim().is_empty());
        self.prerequisites.retain(|p| !p.name.trim().is_empty());
    }

    /// A decomposition is usable when it names at least one principle,
    /// component, or prerequisite.
    pub fn is_usable(&self) -> bool {
        !(self.core_principles.is_empty()
            && self.components.is_empty()
            && self.prerequisites.is_empty())
    }

    /// Every free-text field, in declaration order
    pub fn texts(&self) -> Vec<&str> {
        let mut texts = vec![self.invention.as_str(), self.summary.as_str()];
        texts.extend(self.core_principles.iter().map(String::as_str));
        for component in &self.components {
            texts.extend([
                component.name.as_str(),
                component.function.as_str(),
                component.underlying_technology.as_str(),
            ]);
        }
        for prerequisite in &self.prerequisites {
            texts.extend([
                prerequisite.name.as_str(),
                prerequisite.category.as_str(),
                prerequisite.earliest_plausible_era.as_str(),
                prerequisite.rationale.as_str(),
            ]);
        }
        texts.extend(self.materials.iter().map(String::as_str));
        texts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    pub name: String,
    pub function: String,
    pub underlying_technology: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prerequisite {
    pub name: String,
    pub category: String,
    pub earliest_plausible_era: String,
    pub rationale: String,
}

/// Set of alternate development pathways for an invention in a target era
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Simulation {
    pub pathways: Vec<Pathway>,
}

impl Simulation {
    /// Normalize every pathway and drop the ones without a title.
    pub fn normalize(&mut self) {
        self.pathways.retain(|p| !p.title.trim().is_empty());
        for pathway in &mut self.pathways {
            pathway.normalize();
        }
    }

    /// A simulation is usable when it has at least one pathway and every
    /// pathway has at least one technical step.
    pub fn is_usable(&self) -> bool {
        !self.pathways.is_empty() && self.pathways.iter().all(|p| !p.technical_steps.is_empty())
    }
}

/// One speculative route by which the invention could have emerged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pathway {
    pub title: String,
    pub summary: String,

    /// Plausibility on a 0-10 scale
    #[serde(deserialize_with = "lenient_score")]
    pub feasibility_score: f64,

    /// Ordered steps from the era's state of the art to the invention
    pub technical_steps: Vec<String>,

    pub key_obstacles: Vec<String>,
    pub societal_impact: String,
    pub timeline: Vec<String>,
}

impl Pathway {
    pub fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.summary = self.summary.trim().to_string();
        self.feasibility_score = clamp_score(self.feasibility_score);
        retain_non_blank(&mut self.technical_steps);
        retain_non_blank(&mut self.key_obstacles);
        retain_non_blank(&mut self.timeline);
    }

    /// Every free-text field, in declaration order
    pub fn texts(&self) -> Vec<&str> {
        let mut texts = vec![self.title.as_str(), self.summary.as_str()];
        texts.extend(self.technical_steps.iter().map(String::as_str));
        texts.extend(self.key_obstacles.iter().map(String::as_str));
        texts.push(self.societal_impact.as_str());
        texts.extend(self.timeline.iter().map(String::as_str));
        texts
    }
}

/// Reference to a generated image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: String,

    /// Remote URL or `data:` URL
    pub url: String,

    /// Name of the provider that produced the image
    pub provider: String,
}

/// Clamp a feasibility score into the 0-10 range; NaN becomes 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return MIN_FEASIBILITY;
    }
    score.clamp(MIN_FEASIBILITY, MAX_FEASIBILITY)
}

fn retain_non_blank(items: &mut Vec<String>) {
    items.retain(|s| !s.trim().is_empty());
    for item in items.iter_mut() {
        *item = item.trim().to_string();
    }
}

/// Models return scores as `7`, `7.5`, `"7"`, or `"7/10"`.
fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let score = match value {
        Value::Number(n) => n.as_f64().unwrap_or(MIN_FEASIBILITY),
        Value::String(s) => s
            .trim()
            .trim_end_matches("/10")
            .trim()
            .parse::<f64>()
            .unwrap_or(MIN_FEASIBILITY),
        _ => MIN_FEASIBILITY,
    };
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pathway_accepts_string_scores() {
        let pathway: Pathway = serde_json::from_value(json!({
            "title": "Clockwork relay",
            "feasibility_score": "7/10",
            "technical_steps": ["Refine escapements"]
        }))
        .unwrap();
        assert_eq!(pathway.feasibility_score, 7.0);
    }

    #[test]
    fn test_pathway_normalize_clamps_and_trims() {
        let mut pathway = Pathway {
            title: "  Telegraph phones ".to_string(),
            feasibility_score: 14.0,
            technical_steps: vec!["".to_string(), " Wire cities ".to_string()],
            ..Default::default()
        };
        pathway.normalize();
        assert_eq!(pathway.title, "Telegraph phones");
        assert_eq!(pathway.feasibility_score, 10.0);
        assert_eq!(pathway.technical_steps, vec!["Wire cities".to_string()]);
    }

    #[test]
    fn test_simulation_usable_requires_steps() {
        let mut simulation = Simulation {
            pathways: vec![Pathway {
                title: "Steam computing".to_string(),
                ..Default::default()
            }],
        };
        simulation.normalize();
        assert!(!simulation.is_usable());

        simulation.pathways[0]
            .technical_steps
            .push("Build a difference engine".to_string());
        assert!(simulation.is_usable());
    }

    #[test]
    fn test_texts_cover_nested_fields() {
        let pathway = Pathway {
            title: "Relay".to_string(),
            technical_steps: vec!["Wind the spring".to_string()],
            societal_impact: "Faster news".to_string(),
            timeline: vec!["1820".to_string()],
            ..Default::default()
        };
        let texts = pathway.texts();
        assert!(texts.contains(&"Wind the spring"));
        assert!(texts.contains(&"Faster news"));
        assert!(texts.contains(&"1820"));

        let decomposition = Decomposition {
            components: vec![Component {
                name: "Coil".to_string(),
                function: "Induction".to_string(),
                ..Default::default()
            }],
            prerequisites: vec![Prerequisite {
                rationale: "Needs copper wire".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let texts = decomposition.texts();
        assert!(texts.contains(&"Induction"));
        assert!(texts.contains(&"Needs copper wire"));
    }

    #[test]
    fn test_clamp_score_nan() {
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(5.5), 5.5);
    }

    #[test]
    fn test_decomposition_missing_fields_default() {
        let decomposition: Decomposition =
            serde_json::from_str(r#"{"invention": "Smartphone"}"#).unwrap();
        assert_eq!(decomposition.invention, "Smartphone");
        assert!(!decomposition.is_usable());
    }
}
