//! Content Oracle seam
//!
//! The oracle authors quest drafts from a grounding set. The core treats it
//! as opaque: no idempotency assumed, authenticity recomputed locally,
//! transient failures retried by the generator. `ScriptedOracle` is the
//! deterministic in-tree author used for offline runs and tests.

use async_trait::async_trait;

use crate::entropy::Seed256;
use crate::governors::Governor;
use crate::lighthouse::KnowledgeEntry;
use crate::traditions::Tradition;
use crate::Result;

use super::QuestDraft;

/// Authoring directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// First authoring pass.
    Create,
    /// Deepen a draft whose authenticity fell short.
    Refine,
}

/// Everything the oracle may see for one quest.
pub struct OracleContext<'a> {
    /// The governor the quest belongs to.
    pub governor: &'a Governor,
    /// Grounding entries, in retrieval-rank order.
    pub grounding: Vec<&'a KnowledgeEntry>,
    /// Requested difficulty.
    pub difficulty: u8,
    /// The quest's seed; deterministic oracles derive all choices from it.
    pub seed: Seed256,
}

/// External collaborator that authors quest drafts.
#[async_trait]
pub trait ContentOracle: Send + Sync {
    /// Author or refine one draft.
    async fn author(&self, ctx: &OracleContext<'_>, directive: Directive) -> Result<QuestDraft>;
}

// Invocation openings from the received keys.
const INVOCATIONS: &[&str] = &[
    "OL SONF VORSG GOHO IAD BALT",
    "ZACARE CA OD ZAMRAN",
    "ODO CICLE QAA",
    "MADRIAX DS PRAF",
    "OLANI OD OBZA",
    "BAGLE MADRIIAX DS PERIPSOL",
];

const OBJECTIVE_VERBS: &[&str] = &["Contemplate", "Transcribe", "Practice", "Scry", "Recite"];

/// Deterministic oracle that scripts drafts from the grounding set alone.
///
/// Every choice derives from the quest seed, so two runs with the same
/// inputs author byte-identical drafts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle;

impl ScriptedOracle {
    /// New scripted oracle.
    pub fn new() -> Self {
        ScriptedOracle
    }
}

#[async_trait]
impl ContentOracle for ScriptedOracle {
    async fn author(&self, ctx: &OracleContext<'_>, directive: Directive) -> Result<QuestDraft> {
        let lead = ctx
            .grounding
            .first()
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| "the unnamed mystery".to_string());

        let invocation = *ctx.seed.subseed(b"invocation").choice(INVOCATIONS);
        let title = format!(
            "The {} Vigil of {}",
            ctx.governor.domain,
            ctx.governor.name
        );

        let mut tradition_refs = vec![Tradition::Enochian];
        for entry in &ctx.grounding {
            if !tradition_refs.contains(&entry.tradition) {
                tradition_refs.push(entry.tradition);
            }
        }

        let verbs = ctx.seed.subseed(b"objectives").sequence(ctx.grounding.len());
        let mut objectives: Vec<String> = ctx
            .grounding
            .iter()
            .zip(verbs)
            .map(|(entry, v)| {
                format!(
                    "{} {} as {} preserves it",
                    OBJECTIVE_VERBS[v as usize % OBJECTIVE_VERBS.len()],
                    entry.name,
                    entry.tradition
                )
            })
            .collect();

        let mut description = format!(
            "Governor {} of the {} current sets a working of difficulty {} upon {}, \
             grounded in {} preserved teachings.",
            ctx.governor.name,
            ctx.governor.domain,
            ctx.difficulty,
            lead,
            ctx.grounding.len()
        );

        if directive == Directive::Refine {
            // Deepen with period grounding, the refinement the scorer rewards.
            description.push_str(
                " The working follows the angelic record of John Dee and Edward Kelley, \
                 received in 1582 and renewed under the Elizabethan court.",
            );
            objectives.push(format!(
                "Compare the vision against the celestial record of {}",
                lead
            ));
        }

        Ok(QuestDraft {
            title,
            description,
            objectives,
            wisdom_focus: format!("{} mastery through {}", ctx.governor.domain, lead),
            tradition_refs,
            enochian_invocation: invocation.to_string(),
        })
    }
}
