//! Authenticity proofs and Merkle commitment
//!
//! Each quest's scoring inputs commit to a proof digest; a per-batch binary
//! Merkle tree (Bitcoin-style, odd levels duplicate the last node) lets a
//! verifier check any single quest against the batch root from its sibling
//! path and direction bits alone.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canonical::{hash_fields, Digest, FieldHasher};
use crate::context::CoreContext;
use crate::fixed::Fixed;
use crate::quests::{Quest, Questline, QuestlineState};
use crate::traditions::Tradition;
use crate::Result;

/// Authenticity threshold counted as "high" in batch metrics.
pub const HIGH_AUTHENTICITY: Fixed = Fixed::from_micros(950_000);

/// The on-chain proof for one quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityProof {
    /// Quest id.
    pub quest_id: String,
    /// The committed authenticity score.
    pub authenticity_score: Fixed,
    /// Digest of the quest content.
    pub content_digest: Digest,
    /// Digests of the resolved citations, sorted.
    pub source_digests: Vec<Digest>,
    /// Multipliers of the declared traditions.
    pub tradition_weights: BTreeMap<Tradition, Fixed>,
    /// Mean Enochian weight of the grounding set.
    pub enochian_weight: Fixed,
    /// Commitment over all scoring inputs.
    pub proof_digest: Digest,
    /// Sibling digests from leaf to root.
    pub merkle_path: Vec<Digest>,
    /// Direction bits: true when the sibling sits to the right.
    pub path_directions: Vec<bool>,
    /// Owning batch id.
    pub batch_id: String,
}

/// A governor's proof batch with its Merkle root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityBatch {
    /// Batch id, derived from the governor and root.
    pub batch_id: String,
    /// Owning governor.
    pub governor_id: u8,
    /// Merkle root over the proof leaves.
    pub merkle_root: Digest,
    /// Proofs in quest order.
    pub proofs: Vec<AuthenticityProof>,
    /// Mean authenticity across the batch.
    pub avg_authenticity: Fixed,
    /// Proofs at or above the high-authenticity threshold.
    pub high_auth_count: u32,
    /// Emission counter within the run (opaque, never wall-clock).
    pub created_at: u64,
}

/// Binary Merkle tree retained level by level.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build from leaf digests, duplicating the last node on odd levels.
    pub fn build(leaves: &[Digest]) -> MerkleTree {
        let mut levels = vec![leaves.to_vec()];
        while levels.last().map(Vec::len).unwrap_or(0) > 1 {
            let current = levels.last().expect("at least one level");
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                next.push(hash_fields(&[left.as_bytes(), right.as_bytes()]));
            }
            levels.push(next);
        }
        MerkleTree { levels }
    }

    /// Root digest (zero digest for an empty tree).
    pub fn root(&self) -> Digest {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Digest([0u8; 32]))
    }

    /// Sibling path and direction bits for one leaf.
    pub fn path(&self, leaf_index: usize) -> (Vec<Digest>, Vec<bool>) {
        let mut path = Vec::new();
        let mut directions = Vec::new();
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let sibling_right = index % 2 == 0;
            let sibling_index = if sibling_right { index + 1 } else { index - 1 };
            // An unpaired rightmost node is its own sibling.
            let sibling = level
                .get(sibling_index)
                .copied()
                .unwrap_or(level[index]);
            path.push(sibling);
            directions.push(sibling_right);
            index /= 2;
        }
        (path, directions)
    }
}

/// Recompute a root from one leaf and its path. Pure function.
pub fn verify(leaf: Digest, path: &[Digest], directions: &[bool], root: Digest) -> bool {
    if path.len() != directions.len() {
        return false;
    }
    let mut current = leaf;
    for (sibling, &sibling_right) in path.iter().zip(directions) {
        current = if sibling_right {
            hash_fields(&[current.as_bytes(), sibling.as_bytes()])
        } else {
            hash_fields(&[sibling.as_bytes(), current.as_bytes()])
        };
    }
    current == root
}

/// Leaf digest for one proof: H(quest_id ∥ score ∥ proof_digest).
pub fn leaf_digest(quest_id: &str, authenticity_score: Fixed, proof_digest: &Digest) -> Digest {
    hash_fields(&[
        quest_id.as_bytes(),
        &authenticity_score.micros().to_be_bytes(),
        proof_digest.as_bytes(),
    ])
}

/// Build proof batches for a run's questlines, in emission order.
/// Aborted questlines carry no proofs and are skipped.
pub fn prove_questlines(
    questlines: &[Questline],
    ctx: &CoreContext,
) -> Result<Vec<AuthenticityBatch>> {
    let mut batches = Vec::new();
    for questline in questlines {
        if questline.state != QuestlineState::Sealed {
            log::debug!(
                "Skipping proofs for governor {} in state {:?}",
                questline.governor_id,
                questline.state
            );
            continue;
        }
        let created_at = batches.len() as u64;
        batches.push(prove_questline(questline, ctx, created_at)?);
    }
    Ok(batches)
}

fn prove_questline(
    questline: &Questline,
    ctx: &CoreContext,
    created_at: u64,
) -> Result<AuthenticityBatch> {
    let mut proofs: Vec<AuthenticityProof> = questline
        .quests
        .iter()
        .map(|quest| build_proof(quest, ctx))
        .collect::<Result<_>>()?;

    let leaves: Vec<Digest> = questline
        .quests
        .iter()
        .zip(&proofs)
        .map(|(quest, proof)| leaf_digest(&quest.quest_id, quest.authenticity_score, &proof.proof_digest))
        .collect();
    let tree = MerkleTree::build(&leaves);
    let merkle_root = tree.root();

    let batch_id = format!(
        "auth-{:03}-{}",
        questline.governor_id,
        &merkle_root.to_hex()[..16]
    );
    for (index, proof) in proofs.iter_mut().enumerate() {
        let (path, directions) = tree.path(index);
        proof.merkle_path = path;
        proof.path_directions = directions;
        proof.batch_id = batch_id.clone();
    }

    let avg_authenticity = if questline.quests.is_empty() {
        Fixed::ZERO
    } else {
        questline
            .quests
            .iter()
            .map(|q| q.authenticity_score)
            .sum::<Fixed>()
            / Fixed::from_int(questline.quests.len() as i64)
    };
    let high_auth_count = questline
        .quests
        .iter()
        .filter(|q| q.authenticity_score >= HIGH_AUTHENTICITY)
        .count() as u32;

    log::info!(
        "Proved batch {} ({} proofs, avg authenticity {})",
        batch_id,
        proofs.len(),
        avg_authenticity
    );

    Ok(AuthenticityBatch {
        batch_id,
        governor_id: questline.governor_id,
        merkle_root,
        proofs,
        avg_authenticity,
        high_auth_count,
        created_at,
    })
}

fn build_proof(quest: &Quest, ctx: &CoreContext) -> Result<AuthenticityProof> {
    let mut source_digests: Vec<Digest> = Vec::new();
    let mut enochian_total = Fixed::ZERO;
    for entry_id in &quest.grounding_entry_ids {
        if let Some(entry) = ctx.lighthouse.get(entry_id) {
            enochian_total += entry.enochian_weight;
            for source_id in &entry.source_ids {
                if let Some(citation) = ctx.sources.get(source_id) {
                    source_digests.push(citation.digest);
                }
            }
        }
    }
    source_digests.sort();
    source_digests.dedup();

    let enochian_weight = if quest.grounding_entry_ids.is_empty() {
        Fixed::ZERO
    } else {
        enochian_total / Fixed::from_int(quest.grounding_entry_ids.len() as i64)
    };

    let tradition_weights: BTreeMap<Tradition, Fixed> = quest
        .tradition_refs
        .iter()
        .map(|t| (*t, t.multiplier()))
        .collect();

    let mut hasher = FieldHasher::new();
    hasher
        .field(quest.quest_id.as_bytes())
        .field(&quest.authenticity_score.micros().to_be_bytes())
        .field(quest.content_digest.as_bytes());
    for digest in &source_digests {
        hasher.field(digest.as_bytes());
    }
    for (tradition, weight) in &tradition_weights {
        hasher
            .field(tradition.id().as_bytes())
            .field(&weight.micros().to_be_bytes());
    }
    hasher.field(&enochian_weight.micros().to_be_bytes());
    let proof_digest = hasher.finish();

    Ok(AuthenticityProof {
        quest_id: quest.quest_id.clone(),
        authenticity_score: quest.authenticity_score,
        content_digest: quest.content_digest,
        source_digests,
        tradition_weights,
        enochian_weight,
        proof_digest,
        merkle_path: Vec::new(),
        path_directions: Vec::new(),
        batch_id: String::new(),
    })
}

/// Self-check a batch: every proof must verify against the recorded root.
pub fn verify_batch(batch: &AuthenticityBatch) -> bool {
    batch.proofs.iter().all(|proof| {
        let leaf = leaf_digest(&proof.quest_id, proof.authenticity_score, &proof.proof_digest);
        verify(leaf, &proof.merkle_path, &proof.path_directions, batch.merkle_root)
    })
}
