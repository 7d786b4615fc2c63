use proptest::prelude::*;
use sdk::types::{Decomposition, Pathway, Simulation};
use std::time::Duration;

use uchronia_engine::cache::{CacheKey, CacheNamespace, TtlCache};
use uchronia_engine::coercion::{coerce, Outcome};
use uchronia_engine::config::LimitsConfig;
use uchronia_engine::service::{DeconstructRequest, SimulateRequest};

fn pathway_strategy() -> impl Strategy<Value = Pathway> {
    (
        "[A-Za-z][A-Za-z ]{0,30}",
        "[A-Za-z .,]{0,60}",
        0u8..=10,
        prop::collection::vec("[A-Za-z][A-Za-z ]{0,20}", 1..5),
    )
        .prop_map(|(title, summary, score, steps)| {
            let mut pathway = Pathway {
                title,
                summary,
                feasibility_score: f64::from(score),
                technical_steps: steps,
                ..Default::default()
            };
            pathway.normalize();
            pathway
        })
}

proptest! {
    // Subjects within the limit pass and come back trimmed; longer ones fail
    #[test]
    fn test_subject_length_boundary(
        subject in "[A-Za-z][A-Za-z ]{0,140}[A-Za-z]",
        padding in " {0,5}",
    ) {
        let limits = LimitsConfig::default();
        let request = DeconstructRequest::new(format!("{}{}{}", padding, subject, padding));
        let result = request.validate(&limits);
        if subject.chars().count() <= limits.max_subject_chars {
            prop_assert_eq!(result.unwrap(), subject);
        } else {
            prop_assert!(result.is_err());
        }
    }

    // Whitespace-only subjects are always rejected
    #[test]
    fn test_blank_subject_rejected(blank in "[ \t\r\n]{0,20}") {
        let request = DeconstructRequest::new(blank);
        prop_assert!(request.validate(&LimitsConfig::default()).is_err());
    }

    // Creativity outside [0, 1] never validates
    #[test]
    fn test_creativity_range(creativity in -5.0..5.0f64) {
        let request = SimulateRequest {
            invention: "Telephone".to_string(),
            era: "1700s".to_string(),
            creativity: Some(creativity),
            ..Default::default()
        };
        let result = request.validate(&LimitsConfig::default());
        prop_assert_eq!(result.is_ok(), (0.0..=1.0).contains(&creativity));
    }

    // Keys ignore case and surrounding whitespace in text parts
    #[test]
    fn test_cache_key_normalization(invention in "[A-Za-z]{1,20}", era in "[0-9]{4}s") {
        let a = CacheKey::new(CacheNamespace::Simulation)
            .part(format!("  {}  ", invention.to_uppercase()))
            .part(&era)
            .build();
        let b = CacheKey::new(CacheNamespace::Simulation)
            .part(invention.to_lowercase())
            .part(&era)
            .build();
        prop_assert_eq!(&a, &b);
        prop_assert!(a.starts_with("simulation:"));
    }

    // A stored value is returned until it expires
    #[test]
    fn test_cache_round_trip(key in "[a-z]{1,12}", value in ".{0,40}") {
        let cache = TtlCache::new(CacheNamespace::Transcription, Duration::from_secs(60));
        prop_assert_eq!(cache.get(&key), None);
        cache.set(key.clone(), value.clone());
        prop_assert_eq!(cache.get(&key), Some(value));
        prop_assert_eq!(cache.stats().count, 1);
    }

    // Well-formed simulations parse strictly and survive a second pass unchanged
    #[test]
    fn test_coercion_idempotent(pathways in prop::collection::vec(pathway_strategy(), 1..4)) {
        let simulation = Simulation { pathways };
        let raw = serde_json::to_string(&simulation).unwrap();

        let first = coerce::<Simulation>(&raw, "Telephone");
        prop_assert_eq!(first.outcome, Outcome::Strict);
        prop_assert_eq!(&first.value, &simulation);

        let again = serde_json::to_string(&first.value).unwrap();
        let second = coerce::<Simulation>(&again, "Telephone");
        prop_assert_eq!(second.value, first.value);
    }

    // Whatever the model says, the result is schema-valid
    #[test]
    fn test_coercion_always_usable(raw in ".{0,200}") {
        let decomposition = coerce::<Decomposition>(&raw, "Telephone");
        prop_assert!(decomposition.value.is_usable());

        let simulation = coerce::<Simulation>(&raw, "Telephone");
        prop_assert!(simulation.value.is_usable());
        for pathway in &simulation.value.pathways {
            prop_assert!((0.0..=10.0).contains(&pathway.feasibility_score));
        }
    }

    // Prose around a JSON object does not prevent extraction
    #[test]
    fn test_coercion_finds_embedded_object(
        prefix in "[A-Za-z ,.!]{0,40}",
        suffix in "[A-Za-z ,.!]{0,40}",
        principle in "[A-Za-z]{3,20}",
    ) {
        let raw = format!(
            "{}{{\"invention\":\"Loom\",\"core_principles\":[\"{}\"]}}{}",
            prefix, principle, suffix
        );
        let coerced = coerce::<Decomposition>(&raw, "Loom");
        prop_assert!(!coerced.is_fallback());
        prop_assert_eq!(coerced.value.core_principles, vec![principle]);
    }
}
