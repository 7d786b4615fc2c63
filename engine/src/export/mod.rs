//! Slide deck export
//!
//! Turns the results a client has collected (decomposition, pathways,
//! narratives, images) into a [`Deck`] and packages it as a PowerPoint file.
//! Images are embedded when they arrive as `data:` URLs; remote URLs are
//! listed by address since the exporter never fetches anything.

pub mod pptx;

use base64::Engine as _;
use sdk::errors::EngineError;
use sdk::types::{Decomposition, GeneratedImage, Pathway, Simulation};
use serde::Deserialize;

pub use pptx::{write_pptx, PPTX_CONTENT_TYPE};

/// Bullets kept per slide
const MAX_BULLETS: usize = 10;

/// Characters kept per bullet
const MAX_BULLET_CHARS: usize = 400;

/// Images embedded on the visualization slide
const MAX_EMBEDDED_IMAGES: usize = 4;

/// Export request body; every section is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExportRequest {
    pub title: Option<String>,
    pub invention: Option<String>,
    pub era: Option<String>,
    pub decomposition: Option<Decomposition>,
    pub simulations: Option<SimulationPayload>,
    pub narratives: Vec<NarrativeEntry>,
    pub images: Vec<GeneratedImage>,
}

/// Pathways as returned by `/simulate`, or a bare list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SimulationPayload {
    Wrapped(Simulation),
    Pathways(Vec<Pathway>),
}

impl SimulationPayload {
    pub fn pathways(&self) -> &[Pathway] {
        match self {
            SimulationPayload::Wrapped(simulation) => &simulation.pathways,
            SimulationPayload::Pathways(pathways) => pathways,
        }
    }
}

/// A narrative, with or without the pathway it belongs to
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NarrativeEntry {
    Text(String),
    Titled {
        #[serde(default)]
        title: String,
        #[serde(alias = "text")]
        narrative: String,
    },
}

/// Presentation model
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    pub title: String,
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slide {
    pub title: String,
    pub bullets: Vec<String>,
    pub images: Vec<SlideImage>,
}

/// Decoded image ready to embed
#[derive(Debug, Clone, PartialEq)]
pub struct SlideImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }
}

/// Build the deck model for a request
pub fn build_deck(request: &ExportRequest) -> Deck {
    let invention = non_blank(request.invention.as_deref()).or_else(|| {
        request
            .decomposition
            .as_ref()
            .and_then(|d| non_blank(Some(d.invention.as_str())))
    });
    let era = non_blank(request.era.as_deref());

    let title = non_blank(request.title.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| match (invention, era) {
            (Some(invention), Some(era)) => format!("{} in {}", invention, era),
            (Some(invention), None) => format!("Reimagining {}", invention),
            _ => "Uchronia".to_string(),
        });

    let mut slides = vec![title_slide(&title, invention, era)];

    if let Some(decomposition) = &request.decomposition {
        slides.push(decomposition_slide(decomposition));
    }

    if let Some(simulations) = &request.simulations {
        slides.extend(simulations.pathways().iter().map(pathway_slide));
    }

    for (index, entry) in request.narratives.iter().enumerate() {
        if let Some(slide) = narrative_slide(index, entry) {
            slides.push(slide);
        }
    }

    if !request.images.is_empty() {
        slides.push(image_slide(&request.images));
    }

    Deck { title, slides }
}

/// A packaged deck, ready to save or download
#[derive(Debug, Clone)]
pub struct ExportedDeck {
    pub file_name: String,
    pub slides: usize,
    pub bytes: Vec<u8>,
}

/// Build and package the deck
pub fn export_pptx(request: &ExportRequest) -> Result<ExportedDeck, EngineError> {
    let deck = build_deck(request);
    tracing::info!(operation = "export", slides = deck.slides.len(), "Writing slide deck");
    let bytes = write_pptx(&deck)?;
    Ok(ExportedDeck {
        file_name: file_name(&deck.title),
        slides: deck.slides.len(),
        bytes,
    })
}

/// File name for the download, derived from the deck title
pub fn file_name(deck_title: &str) -> String {
    let slug: String = deck_title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "uchronia.pptx".to_string()
    } else {
        format!("{}.pptx", slug)
    }
}

fn title_slide(title: &str, invention: Option<&str>, era: Option<&str>) -> Slide {
    let mut bullets = Vec::new();
    if let (Some(invention), Some(era)) = (invention, era) {
        bullets.push(format!("What if {} had appeared in {}?", invention, era));
    }
    bullets.push(format!(
        "Generated {}",
        chrono::Utc::now().format("%Y-%m-%d")
    ));
    Slide {
        title: clip(title, 120),
        bullets,
        images: Vec::new(),
    }
}

fn decomposition_slide(decomposition: &Decomposition) -> Slide {
    let mut bullets = Vec::new();
    if !decomposition.summary.trim().is_empty() {
        bullets.push(decomposition.summary.trim().to_string());
    }
    if !decomposition.core_principles.is_empty() {
        bullets.push(format!("Principles: {}", decomposition.core_principles.join(", ")));
    }
    for component in &decomposition.components {
        if component.function.trim().is_empty() {
            bullets.push(component.name.clone());
        } else {
            bullets.push(format!("{}: {}", component.name, component.function));
        }
    }
    for prerequisite in &decomposition.prerequisites {
        if prerequisite.earliest_plausible_era.trim().is_empty() {
            bullets.push(format!("Needs {}", prerequisite.name));
        } else {
            bullets.push(format!(
                "Needs {} (from {})",
                prerequisite.name, prerequisite.earliest_plausible_era
            ));
        }
    }

    let subject = non_blank(Some(decomposition.invention.as_str())).unwrap_or("the invention");
    Slide {
        title: format!("Deconstructing {}", subject),
        bullets: limit(bullets),
        images: Vec::new(),
    }
}

fn pathway_slide(pathway: &Pathway) -> Slide {
    let mut bullets = Vec::new();
    if !pathway.summary.trim().is_empty() {
        bullets.push(pathway.summary.trim().to_string());
    }
    bullets.extend(
        pathway
            .technical_steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("Step {}: {}", i + 1, step)),
    );
    if !pathway.key_obstacles.is_empty() {
        bullets.push(format!("Obstacles: {}", pathway.key_obstacles.join("; ")));
    }
    if !pathway.societal_impact.trim().is_empty() {
        bullets.push(format!("Impact: {}", pathway.societal_impact.trim()));
    }

    let score = sdk::types::clamp_score(pathway.feasibility_score);
    Slide {
        title: format!("{} (feasibility {:.1}/10)", clip(&pathway.title, 90), score),
        bullets: limit(bullets),
        images: Vec::new(),
    }
}

fn narrative_slide(index: usize, entry: &NarrativeEntry) -> Option<Slide> {
    let (title, text) = match entry {
        NarrativeEntry::Text(text) => (String::new(), text.as_str()),
        NarrativeEntry::Titled { title, narrative } => (title.trim().to_string(), narrative.as_str()),
    };
    if text.trim().is_empty() {
        return None;
    }

    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect();

    let title = if title.is_empty() {
        format!("Narrative {}", index + 1)
    } else {
        format!("Narrative: {}", clip(&title, 90))
    };
    Some(Slide {
        title,
        bullets: limit(paragraphs),
        images: Vec::new(),
    })
}

fn image_slide(images: &[GeneratedImage]) -> Slide {
    let mut slide = Slide {
        title: "Visualizations".to_string(),
        ..Default::default()
    };

    for (index, image) in images.iter().enumerate() {
        if image.url.starts_with("data:") {
            if slide.images.len() >= MAX_EMBEDDED_IMAGES {
                continue;
            }
            match decode_data_url(&image.url) {
                Some(decoded) => slide.images.push(decoded),
                None => {
                    tracing::warn!(image = index + 1, "Skipping image with unreadable data URL");
                    slide
                        .bullets
                        .push(format!("Image {} could not be embedded", index + 1));
                }
            }
        } else {
            slide
                .bullets
                .push(format!("Image {} ({}): {}", index + 1, image.provider, image.url));
        }
    }

    slide.bullets = limit(std::mem::take(&mut slide.bullets));
    slide
}

/// Decode a base64 `data:image/png` or `data:image/jpeg` URL
pub fn decode_data_url(url: &str) -> Option<SlideImage> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let format = match mime.to_lowercase().as_str() {
        "image/png" => ImageFormat::Png,
        "image/jpeg" | "image/jpg" => ImageFormat::Jpeg,
        _ => return None,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;
    if bytes.is_empty() {
        return None;
    }
    Some(SlideImage { bytes, format })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn limit(bullets: Vec<String>) -> Vec<String> {
    bullets
        .into_iter()
        .filter(|b| !b.trim().is_empty())
        .take(MAX_BULLETS)
        .map(|b| clip(b.trim(), MAX_BULLET_CHARS))
        .collect()
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars).collect();
    clipped.push('…');
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 1x1 transparent PNG
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn test_empty_request_has_title_slide() {
        let deck = build_deck(&ExportRequest::default());
        assert_eq!(deck.title, "Uchronia");
        assert_eq!(deck.slides.len(), 1);
    }

    #[test]
    fn test_full_request_slide_order() {
        let request: ExportRequest = serde_json::from_value(json!({
            "invention": "Smartphone",
            "era": "1800s",
            "decomposition": { "invention": "Smartphone", "core_principles": ["Radio"] },
            "simulations": { "pathways": [
                { "title": "Telegraph handsets", "feasibility_score": 4, "technical_steps": ["Wire"] },
                { "title": "Clockwork radio", "feasibility_score": 2, "technical_steps": ["Gears"] }
            ]},
            "narratives": ["First paragraph.\n\nSecond paragraph.", { "title": "Clockwork radio", "text": "Tick." }],
            "images": [{ "id": "1", "url": format!("data:image/png;base64,{}", PIXEL), "provider": "stability" }]
        }))
        .unwrap();

        let deck = build_deck(&request);
        assert_eq!(deck.title, "Smartphone in 1800s");
        let titles: Vec<&str> = deck.slides.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Smartphone in 1800s",
                "Deconstructing Smartphone",
                "Telegraph handsets (feasibility 4.0/10)",
                "Clockwork radio (feasibility 2.0/10)",
                "Narrative 1",
                "Narrative: Clockwork radio",
                "Visualizations",
            ]
        );
        assert_eq!(deck.slides[4].bullets.len(), 2);
        assert_eq!(deck.slides[6].images.len(), 1);
        assert_eq!(deck.slides[6].images[0].format, ImageFormat::Png);
    }

    #[test]
    fn test_bare_pathway_list_and_remote_images() {
        let request: ExportRequest = serde_json::from_value(json!({
            "simulations": [{ "title": "Steam phones", "technical_steps": ["Boil"] }],
            "images": [{ "id": "2", "url": "https://images.example/a.png", "provider": "openai" }]
        }))
        .unwrap();
        let deck = build_deck(&request);
        assert_eq!(deck.slides.len(), 3);
        assert!(deck.slides[2].bullets[0].contains("https://images.example/a.png"));
        assert!(deck.slides[2].images.is_empty());
    }

    #[test]
    fn test_decode_data_url() {
        assert!(decode_data_url(&format!("data:image/png;base64,{}", PIXEL)).is_some());
        assert!(decode_data_url("data:image/gif;base64,R0lGOD").is_none());
        assert!(decode_data_url("data:image/png;base64,***").is_none());
        assert!(decode_data_url("https://example.com/a.png").is_none());
    }

    #[test]
    fn test_bullets_are_limited() {
        let pathway = Pathway {
            title: "Many steps".to_string(),
            technical_steps: (0..30).map(|i| format!("step {}", i)).collect(),
            ..Default::default()
        };
        let slide = pathway_slide(&pathway);
        assert_eq!(slide.bullets.len(), MAX_BULLETS);
    }

    #[test]
    fn test_export_pptx_packages_named_deck() {
        let request = ExportRequest {
            invention: Some("Loom".to_string()),
            era: Some("1600s".to_string()),
            ..Default::default()
        };
        let exported = export_pptx(&request).unwrap();
        assert_eq!(exported.file_name, "loom-in-1600s.pptx");
        assert_eq!(exported.slides, 1);
        assert_eq!(&exported.bytes[..2], b"PK");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("Smartphone in 1800s"), "smartphone-in-1800s.pptx");
        assert_eq!(file_name("!!!"), "uchronia.pptx");
    }
}
