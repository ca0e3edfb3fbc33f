//! Quest and questline records
//!
//! Quests are frozen once generated; a questline exclusively owns its quests
//! and moves through Draft → Scoring → Sealed → Inscribed → Anchored.
//! Lighthouse references are lookup-only ids, never owning pointers.

pub mod generator;
pub mod oracle;

pub use generator::{GenerationConfig, GenerationRun, QuestGenerator, RunReport};
pub use oracle::{ContentOracle, Directive, OracleContext, ScriptedOracle};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canonical::{self, Digest, FieldHasher};
use crate::entropy::Seed256;
use crate::fixed::Fixed;
use crate::governors::Domain;
use crate::traditions::Tradition;
use crate::{EnochianError, Result};

/// A draft authored by the Content Oracle. Authenticity is recomputed
/// locally; nothing in the draft is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestDraft {
    /// Quest title.
    pub title: String,
    /// Narrative description.
    pub description: String,
    /// Ordered, structured objectives.
    pub objectives: Vec<String>,
    /// The wisdom the quest teaches.
    pub wisdom_focus: String,
    /// Traditions the draft draws on.
    pub tradition_refs: Vec<Tradition>,
    /// Enochian invocation text.
    pub enochian_invocation: String,
}

/// A sealed quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    /// Deterministic id: H(governor_id ∥ index ∥ block_seed).
    pub quest_id: String,
    /// Quest title.
    pub title: String,
    /// Narrative description.
    pub description: String,
    /// Ordered objectives.
    pub objectives: Vec<String>,
    /// The wisdom the quest teaches.
    pub wisdom_focus: String,
    /// Ordered tradition references; `enochian` always leads.
    pub tradition_refs: Vec<Tradition>,
    /// Grounding entry ids, ordered by retrieval rank.
    pub grounding_entry_ids: Vec<String>,
    /// Difficulty in 1..=30.
    pub difficulty: u8,
    /// Enochian invocation text.
    pub enochian_invocation: String,
    /// Locally computed authenticity.
    pub authenticity_score: Fixed,
    /// Digest of the quest content.
    pub content_digest: Digest,
    /// Set when the score stayed below the threshold after refinement.
    pub low_authenticity: bool,
}

impl Quest {
    /// Deterministic quest id for (governor, index, block seed).
    pub fn deterministic_id(governor_id: u8, index: u32, block_seed: &Seed256) -> String {
        canonical::hash_fields(&[
            &(governor_id as u32).to_le_bytes(),
            &index.to_le_bytes(),
            block_seed.as_bytes(),
        ])
        .to_hex()
    }

    /// Digest over the authored content.
    pub fn content_digest(draft: &QuestDraft) -> Digest {
        let mut hasher = FieldHasher::new();
        hasher
            .field(draft.title.as_bytes())
            .field(draft.description.as_bytes())
            .field(draft.wisdom_focus.as_bytes())
            .field(draft.enochian_invocation.as_bytes());
        for objective in &draft.objectives {
            hasher.field(objective.as_bytes());
        }
        for tradition in &draft.tradition_refs {
            hasher.field(tradition.id().as_bytes());
        }
        hasher.finish()
    }
}

/// Questline lifecycle.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "anchor_id")]
pub enum QuestlineState {
    Draft,
    Scoring,
    Sealed,
    Inscribed,
    Anchored(String),
    Aborted,
}

impl QuestlineState {
    fn name(&self) -> &'static str {
        match self {
            QuestlineState::Draft => "draft",
            QuestlineState::Scoring => "scoring",
            QuestlineState::Sealed => "sealed",
            QuestlineState::Inscribed => "inscribed",
            QuestlineState::Anchored(_) => "anchored",
            QuestlineState::Aborted => "aborted",
        }
    }
}

/// A per-quest failure retained on the questline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestFailure {
    /// 1-based quest index within the questline.
    pub index: u32,
    /// What went wrong.
    pub reason: String,
}

/// The ordered quest collection produced for one governor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questline {
    /// Owning governor id.
    pub governor_id: u8,
    /// Owning governor name.
    pub governor_name: String,
    /// Number of quests the seed called for (75..=125).
    pub planned_quests: u32,
    /// Realized quests in generation order.
    pub quests: Vec<Quest>,
    /// Mean authenticity across realized quests.
    pub avg_authenticity: Fixed,
    /// Enochian fraction of the lighthouse references.
    pub enochian_fraction: Fixed,
    /// Quests touching each domain.
    pub domain_coverage: BTreeMap<Domain, u32>,
    /// Union of grounding entry ids, in retrieval-rank order.
    pub lighthouse_refs: Vec<String>,
    /// Per-quest failures retained for the run report.
    pub failures: Vec<QuestFailure>,
    /// Lifecycle state.
    pub state: QuestlineState,
}

impl Questline {
    /// Advance Sealed → Inscribed.
    pub fn mark_inscribed(&mut self) -> Result<()> {
        self.transition(QuestlineState::Inscribed, QuestlineState::Sealed)
    }

    /// Advance Inscribed → Anchored against an external anchor id.
    pub fn anchor(&mut self, anchor_id: String) -> Result<()> {
        self.transition(QuestlineState::Anchored(anchor_id), QuestlineState::Inscribed)
    }

    fn transition(&mut self, to: QuestlineState, expected: QuestlineState) -> Result<()> {
        if self.state != expected {
            return Err(EnochianError::InvalidTransition {
                from: self.state.name().to_string(),
                to: to.name().to_string(),
            });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quest_id_depends_on_all_inputs() {
        let seed_a = Seed256::from_bytes([1u8; 32]);
        let seed_b = Seed256::from_bytes([2u8; 32]);
        let id = Quest::deterministic_id(7, 3, &seed_a);
        assert_eq!(id, Quest::deterministic_id(7, 3, &seed_a));
        assert_ne!(id, Quest::deterministic_id(8, 3, &seed_a));
        assert_ne!(id, Quest::deterministic_id(7, 4, &seed_a));
        assert_ne!(id, Quest::deterministic_id(7, 3, &seed_b));
    }

    #[test]
    fn test_state_transitions_enforce_order() {
        let mut questline = Questline {
            governor_id: 1,
            governor_name: "ABRIOND".to_string(),
            planned_quests: 0,
            quests: Vec::new(),
            avg_authenticity: Fixed::ZERO,
            enochian_fraction: Fixed::ZERO,
            domain_coverage: BTreeMap::new(),
            lighthouse_refs: Vec::new(),
            failures: Vec::new(),
            state: QuestlineState::Sealed,
        };
        // Anchoring before inscription is illegal.
        assert!(questline.anchor("anchor-1".to_string()).is_err());
        questline.mark_inscribed().unwrap();
        questline.anchor("anchor-1".to_string()).unwrap();
        assert_eq!(
            questline.state,
            QuestlineState::Anchored("anchor-1".to_string())
        );
        // Terminal.
        assert!(questline.mark_inscribed().is_err());
    }
}
