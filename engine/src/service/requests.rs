//! Request bodies and their boundary validation.
//!
//! Every struct is `#[serde(default)]` so a missing field reaches validation
//! and is reported as a 400 with a readable message.

use sdk::errors::EngineError;
use sdk::types::{Decomposition, Pathway};
use serde::Deserialize;

use crate::config::LimitsConfig;
use crate::llm::{AudioClip, ImageSize};

pub const DEFAULT_DEPTH: u8 = 3;
pub const DEFAULT_CREATIVITY: f32 = 0.7;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeconstructRequest {
    pub invention: String,
}

impl DeconstructRequest {
    pub fn new(invention: impl Into<String>) -> Self {
        Self {
            invention: invention.into(),
        }
    }

    /// Returns the trimmed invention name
    pub fn validate(&self, limits: &LimitsConfig) -> Result<String, EngineError> {
        required(&self.invention, "invention", limits.max_subject_chars)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimulateRequest {
    pub invention: String,
    pub era: String,

    /// 0.0 (conservative) to 1.0 (imaginative)
    pub creativity: Option<f64>,

    /// Number of pathways to produce
    pub depth: Option<u32>,

    /// Decomposition from an earlier `/deconstruct` call
    pub decomposition: Option<Decomposition>,
}

/// Validated simulation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub invention: String,
    pub era: String,
    pub depth: u8,
    pub creativity: f32,
}

impl SimulateRequest {
    pub fn validate(&self, limits: &LimitsConfig) -> Result<SimulationParams, EngineError> {
        let invention = required(&self.invention, "invention", limits.max_subject_chars)?;
        let era = required(&self.era, "era", limits.max_era_chars)?;
        if let Some(decomposition) = &self.decomposition {
            bounded_context(&decomposition.texts(), "decomposition", limits.max_context_chars)?;
        }

        let depth = match self.depth {
            None => DEFAULT_DEPTH.min(limits.max_depth),
            Some(d) if d >= 1 && d <= u32::from(limits.max_depth) => d as u8,
            Some(d) => {
                return Err(EngineError::validation(format!(
                    "depth must be between 1 and {}, got {}",
                    limits.max_depth, d
                )))
            }
        };

        let creativity = match self.creativity {
            None => DEFAULT_CREATIVITY,
            Some(c) if (0.0..=1.0).contains(&c) => c as f32,
            Some(c) => {
                return Err(EngineError::validation(format!(
                    "creativity must be between 0 and 1, got {}",
                    c
                )))
            }
        };

        Ok(SimulationParams {
            invention,
            era,
            depth,
            creativity,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    pub style: Option<String>,
    pub size: Option<String>,
    #[serde(rename = "pathwayData")]
    pub pathway_data: Option<Pathway>,
    pub era: Option<String>,
}

/// Validated image parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams {
    pub prompt: String,
    pub style: Option<String>,
    pub size: ImageSize,
    pub era: Option<String>,

    /// Normalized pathway to set the scene, when it has a title
    pub pathway: Option<Pathway>,
}

impl ImageGenerationRequest {
    pub fn validate(&self, limits: &LimitsConfig) -> Result<ImageParams, EngineError> {
        let prompt = required(&self.prompt, "prompt", limits.max_prompt_chars)?;
        let style = optional(self.style.as_deref(), "style", limits.max_style_chars)?;
        let era = optional(self.era.as_deref(), "era", limits.max_era_chars)?;
        let size = match self.size.as_deref().map(str::trim) {
            None | Some("") => ImageSize::default(),
            Some(s) => s.parse().map_err(EngineError::Validation)?,
        };
        let pathway = match &self.pathway_data {
            Some(pathway) => {
                let mut pathway = pathway.clone();
                pathway.normalize();
                bounded_context(&pathway.texts(), "pathwayData", limits.max_context_chars)?;
                (!pathway.title.is_empty()).then_some(pathway)
            }
            None => None,
        };

        Ok(ImageParams {
            prompt,
            style,
            size,
            era,
            pathway,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NarrativeRequest {
    #[serde(rename = "pathwayData")]
    pub pathway_data: Option<Pathway>,
    pub era: String,
}

impl NarrativeRequest {
    /// Returns the normalized pathway and trimmed era
    pub fn validate(&self, limits: &LimitsConfig) -> Result<(Pathway, String), EngineError> {
        let era = required(&self.era, "era", limits.max_era_chars)?;
        let mut pathway = self
            .pathway_data
            .clone()
            .ok_or_else(|| EngineError::validation("pathwayData is required"))?;
        pathway.normalize();
        if pathway.title.is_empty() {
            return Err(EngineError::validation("pathwayData.title is required"));
        }
        bounded_context(&pathway.texts(), "pathwayData", limits.max_context_chars)?;
        Ok((pathway, era))
    }
}

/// Check an uploaded audio clip
pub fn validate_audio(clip: &AudioClip, limits: &LimitsConfig) -> Result<(), EngineError> {
    if clip.bytes.is_empty() {
        return Err(EngineError::validation("audio file is empty"));
    }
    if clip.bytes.len() > limits.max_audio_bytes {
        return Err(EngineError::validation(format!(
            "audio file exceeds {} bytes",
            limits.max_audio_bytes
        )));
    }
    if !clip.mime_type.to_lowercase().starts_with("audio/") {
        return Err(EngineError::validation(format!(
            "unsupported audio type '{}'",
            clip.mime_type
        )));
    }
    Ok(())
}

/// Trimmed, non-empty, at most `max_chars` characters
pub fn required(value: &str, field: &str, max_chars: usize) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max_chars {
        return Err(EngineError::validation(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(trimmed.to_string())
}

/// Total text attached to a request must fit in `max_chars`
fn bounded_context(texts: &[&str], field: &str, max_chars: usize) -> Result<(), EngineError> {
    let total: usize = texts.iter().map(|t| t.chars().count()).sum();
    if total > max_chars {
        return Err(EngineError::validation(format!(
            "{} text must be at most {} characters in total",
            field, max_chars
        )));
    }
    Ok(())
}

/// Like [`required`], but blank means absent
fn optional(value: Option<&str>, field: &str, max_chars: usize) -> Result<Option<String>, EngineError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(v, field, max_chars).map(Some),
    }
}
