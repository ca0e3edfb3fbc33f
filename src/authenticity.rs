//! Authenticity scoring
//!
//! A quest's authenticity is a pure fixed-point function of its grounding
//! entries, tradition mix, source citations, and historical markers. The
//! same draft scores identically on every platform; the components are kept
//! so the Merkle prover can commit to them.

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed;
use crate::lighthouse::KnowledgeEntry;
use crate::quests::QuestDraft;
use crate::sources::SourceRegistry;

/// Base score before multipliers and bonuses.
pub const BASE_SCORE: Fixed = Fixed::from_micros(850_000);

/// Cap on the Enochian boost.
pub const ENOCHIAN_BOOST_CAP: Fixed = Fixed::from_micros(150_000);

/// Per-source quality contribution and its cap.
pub const SOURCE_QUALITY_STEP: Fixed = Fixed::from_micros(20_000);
/// Cap on total source quality.
pub const SOURCE_QUALITY_CAP: Fixed = Fixed::from_micros(100_000);

/// Per-marker historical bonus and its cap.
pub const HISTORICAL_STEP: Fixed = Fixed::from_micros(10_000);
/// Cap on the historical bonus.
pub const HISTORICAL_CAP: Fixed = Fixed::from_micros(50_000);

// Period markers from the Dee/Kelley working record.
const HISTORICAL_MARKERS: &[&str] = &[
    "16th century",
    "1582",
    "1583",
    "1584",
    "1589",
    "elizabethan",
    "renaissance",
    "john dee",
    "edward kelley",
    "angelic",
    "celestial",
];

/// The committed breakdown of one authenticity computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofComponents {
    /// Base score.
    pub base: Fixed,
    /// Enochian boost from the grounding set.
    pub enochian_boost: Fixed,
    /// Best tradition multiplier across the declared refs.
    pub tradition_multiplier: Fixed,
    /// Source quality from resolved citations.
    pub source_quality: Fixed,
    /// Historical marker bonus.
    pub historical_bonus: Fixed,
    /// Final authenticity score, capped at 1.0.
    pub final_score: Fixed,
}

/// Score a quest draft against its grounding set.
///
/// score = min(1, base · tradition_multiplier + enochian_boost
///             + source_quality + historical_bonus)
pub fn score(
    draft: &QuestDraft,
    grounding: &[&KnowledgeEntry],
    registry: &SourceRegistry,
) -> ProofComponents {
    let text = draft_text(draft);
    let word_count = text.split_whitespace().count() as i64;
    let normalizer = (word_count / 100).max(1);

    // Enochian boost: grounding enochian weight, damped by content length.
    let raw_boost: Fixed = grounding
        .iter()
        .map(|entry| entry.enochian_weight * Fixed::from_micros(100_000))
        .sum();
    let enochian_boost = (raw_boost / Fixed::from_int(normalizer)).min(ENOCHIAN_BOOST_CAP);

    // Best multiplier across the declared traditions; 1.0 when none declared.
    let tradition_multiplier = draft
        .tradition_refs
        .iter()
        .map(|t| t.multiplier())
        .max()
        .unwrap_or(Fixed::ONE);

    // Source quality over the distinct citations behind the grounding set.
    let mut source_ids: Vec<&String> = grounding
        .iter()
        .flat_map(|entry| entry.source_ids.iter())
        .collect();
    source_ids.sort();
    source_ids.dedup();
    let mut source_quality = Fixed::ZERO;
    for source_id in source_ids {
        if let Some(citation) = registry.get(source_id) {
            source_quality += citation.authenticity_weight * SOURCE_QUALITY_STEP;
        }
    }
    let source_quality = source_quality.min(SOURCE_QUALITY_CAP);

    let marker_hits = HISTORICAL_MARKERS
        .iter()
        .filter(|marker| text.contains(*marker))
        .count() as i64;
    let historical_bonus = (HISTORICAL_STEP * Fixed::from_int(marker_hits)).min(HISTORICAL_CAP);

    let final_score = (BASE_SCORE * tradition_multiplier
        + enochian_boost
        + source_quality
        + historical_bonus)
        .min(Fixed::ONE);

    ProofComponents {
        base: BASE_SCORE,
        enochian_boost,
        tradition_multiplier,
        source_quality,
        historical_bonus,
        final_score,
    }
}

fn draft_text(draft: &QuestDraft) -> String {
    let mut text = String::new();
    text.push_str(&draft.title);
    text.push(' ');
    text.push_str(&draft.description);
    text.push(' ');
    text.push_str(&draft.enochian_invocation);
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighthouse::fixtures::entry;
    use crate::sources::{SourceCitation, VerificationClass};
    use crate::traditions::Tradition;

    fn draft(description: &str, refs: Vec<Tradition>) -> QuestDraft {
        QuestDraft {
            title: "The Vigil of the Watchtower".to_string(),
            description: description.to_string(),
            objectives: vec!["Study the tablet".to_string()],
            wisdom_focus: "angelic communication".to_string(),
            tradition_refs: refs,
            enochian_invocation: "OL SONF VORSG".to_string(),
        }
    }

    #[test]
    fn test_no_sources_scores_by_formula() {
        let registry = SourceRegistry::default();
        let components = score(
            &draft("A plain working.", vec![Tradition::Tarot]),
            &[],
            &registry,
        );
        assert_eq!(components.source_quality, Fixed::ZERO);
        assert_eq!(components.enochian_boost, Fixed::ZERO);
        // 0.85 * 1.0 + 0 + 0 + 0
        assert_eq!(components.final_score.micros(), 850_000);
    }

    #[test]
    fn test_enochian_multiplier_saturates_at_one() {
        let registry = SourceRegistry::default();
        let components = score(
            &draft("A plain working.", vec![Tradition::Enochian, Tradition::Tarot]),
            &[],
            &registry,
        );
        assert_eq!(components.tradition_multiplier.micros(), 1_300_000);
        // 0.85 * 1.3 = 1.105, capped at 1.0.
        assert_eq!(components.final_score, Fixed::ONE);
    }

    #[test]
    fn test_historical_markers_count_once_each() {
        let registry = SourceRegistry::default();
        let with_markers = score(
            &draft(
                "Received in 1582 by John Dee at the Elizabethan court.",
                vec![Tradition::Tarot],
            ),
            &[],
            &registry,
        );
        // 1582, john dee, elizabethan = 3 markers.
        assert_eq!(with_markers.historical_bonus.micros(), 30_000);

        let many = "16th century 1582 1583 1584 1589 elizabethan renaissance john dee edward kelley";
        let capped = score(&draft(many, vec![Tradition::Tarot]), &[], &registry);
        assert_eq!(capped.historical_bonus, HISTORICAL_CAP);
    }

    #[test]
    fn test_adding_a_citation_never_decreases_the_score() {
        let citation = SourceCitation::new(
            "dee_diaries",
            "Five Books of Mystery",
            "John Dee",
            Some(1583),
            Fixed::from_micros(950_000),
            VerificationClass::PrimaryMs,
        )
        .unwrap();
        let registry = SourceRegistry::from_citations(vec![citation]).unwrap();

        let bare = entry(Tradition::Tarot, 0);
        let mut cited = entry(Tradition::Tarot, 0);
        cited.source_ids.insert("dee_diaries".to_string());

        let d = draft("A plain working.", vec![Tradition::Tarot]);
        let before = score(&d, &[&bare], &registry);
        let after = score(&d, &[&cited], &registry);
        assert!(after.final_score >= before.final_score);
        assert!(after.source_quality > before.source_quality);
    }

    #[test]
    fn test_grounding_enochian_weight_feeds_the_boost() {
        let registry = SourceRegistry::default();
        let anchor = entry(Tradition::Enochian, 0);
        let d = draft("A short vigil.", vec![Tradition::Tarot]);
        let grounded = score(&d, &[&anchor], &registry);
        // 0.8 enochian weight * 0.1, normalizer 1 (short text).
        assert_eq!(grounded.enochian_boost.micros(), 80_000);

        let five: Vec<&KnowledgeEntry> = vec![&anchor; 5];
        let saturated = score(&d, &five, &registry);
        assert_eq!(saturated.enochian_boost, ENOCHIAN_BOOST_CAP);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let registry = SourceRegistry::default();
        let anchor = entry(Tradition::Enochian, 0);
        let d = draft(
            "Received in 1582 by John Dee.",
            vec![Tradition::Enochian, Tradition::HermeticQabalah],
        );
        let a = score(&d, &[&anchor], &registry);
        let b = score(&d, &[&anchor], &registry);
        assert_eq!(a, b);
    }
}
