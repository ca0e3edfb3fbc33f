//! Enochian Cyphers core
//!
//! Deterministic content preservation and quest generation for a Bitcoin
//! L1 inscription channel: a weighted knowledge index over the 26 sacred
//! traditions, 91 Governor Angels across 30 Aethyrs, block-seeded quest
//! generation, Merkle-committed authenticity proofs, size-capped inscription
//! batches, and an autonomous pricing engine.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Include build metadata
include!(concat!(env!("OUT_DIR"), "/build_metadata.rs"));

pub mod aethyrs;
pub mod authenticity;
pub mod canonical;
pub mod context;
pub mod economics;
pub mod entropy;
pub mod fixed;
pub mod governors;
pub mod inscriptions;
pub mod lighthouse;
pub mod proofs;
pub mod quests;
pub mod sources;
pub mod traditions;

// Re-exports for convenience
pub use context::{build_lighthouse, load_registries, CoreContext, RegistryPaths};
pub use entropy::{BlockMetadata, BlockSource, FixedBlockSource, Seed256};
pub use fixed::Fixed;
pub use governors::{Domain, Governor, GovernorRegistry};
pub use lighthouse::{KnowledgeEntry, Lighthouse, RetrievalQuery};
pub use proofs::{prove_questlines, verify_batch, AuthenticityBatch, AuthenticityProof};
pub use quests::{
    ContentOracle, GenerationConfig, Quest, QuestGenerator, Questline, ScriptedOracle,
};
pub use sources::{SourceCitation, SourceRegistry};
pub use traditions::Tradition;

/// Sacred architecture constants
pub mod constants {
    use crate::fixed::Fixed;

    /// Number of sacred traditions
    pub const TRADITION_COUNT: usize = crate::traditions::TRADITION_COUNT;

    /// Number of Governor Angels
    pub const GOVERNOR_COUNT: usize = crate::aethyrs::GOVERNOR_COUNT;

    /// Number of Aethyr levels
    pub const AETHYR_COUNT: usize = crate::aethyrs::AETHYR_COUNT;

    /// High-authenticity threshold
    pub const AUTHENTICITY_THRESHOLD: Fixed = Fixed::from_micros(950_000);

    /// Maximum Ordinals inscription size (1MB)
    pub const MAX_ORDINALS_SIZE: usize = crate::inscriptions::MAX_INSCRIPTION_SIZE;

    /// Enochian retrieval bias β
    pub const ENOCHIAN_WEIGHTING: Fixed = Fixed::from_micros(600_000);

    /// Sacred architecture version
    pub const ARCHITECTURE_VERSION: &str = crate::SACRED_ARCHITECTURE_VERSION;
}

/// Error taxonomy for the core. No exceptions-for-flow: every failure is a
/// typed variant with explicit propagation.
#[derive(thiserror::Error, Debug)]
pub enum EnochianError {
    /// The Enochian candidate pool cannot satisfy ⌈β·k⌉.
    #[error("insufficient enochian pool for domain {domain}: need {required}, have {available}")]
    InsufficientEnochianPool {
        /// Queried domain.
        domain: governors::Domain,
        /// Entries required.
        required: usize,
        /// Entries available.
        available: usize,
    },

    /// The non-Enochian candidate pool cannot fill the remainder.
    #[error("insufficient pool for domain {domain}: need {required}, have {available}")]
    InsufficientPool {
        /// Queried domain.
        domain: governors::Domain,
        /// Entries required.
        required: usize,
        /// Entries available.
        available: usize,
    },

    /// A quest stayed below the authenticity floor after refinement.
    #[error("low authenticity for quest {quest_id}: {score}")]
    LowAuthenticity {
        /// Quest id.
        quest_id: String,
        /// The final score.
        score: fixed::Fixed,
    },

    /// A single tradition cannot fit the inscription ceiling even alone.
    #[error("tradition {tradition_id} cannot fit an inscription batch")]
    IrreducibleOversizeTradition {
        /// Offending tradition or segment label.
        tradition_id: String,
    },

    /// The sacred distribution (TEX=4, others=3, 91 total) does not hold.
    #[error("distribution invariant violated: {details}")]
    DistributionInvariantViolated {
        /// What deviated.
        details: String,
    },

    /// Transient oracle failure; retried with backoff.
    #[error("oracle transient failure: {message}")]
    OracleTransient {
        /// Provider message.
        message: String,
    },

    /// Permanent oracle failure for one quest.
    #[error("oracle permanent failure: {message}")]
    OraclePermanent {
        /// Provider message.
        message: String,
    },

    /// A persisted record is not in canonical encoding.
    #[error("canonical encoding mismatch in {origin}")]
    CanonicalEncodingMismatch {
        /// File or artifact that failed the round trip.
        origin: String,
    },

    /// Block metadata is unavailable; wall-clock is never substituted.
    #[error("block {height} unavailable")]
    BlockUnavailable {
        /// Requested height.
        height: u64,
    },

    /// Governor id not registered.
    #[error("governor {governor_id} not found")]
    GovernorNotFound {
        /// Requested id.
        governor_id: u8,
    },

    /// Tradition identifier outside the closed 26-variant enum.
    #[error("unknown tradition {value}")]
    TraditionUnknown {
        /// The rejected identifier.
        value: String,
    },

    /// A record failed shape validation at load time.
    #[error("invalid record {id}: {reason}")]
    InvalidRecord {
        /// Record identifier.
        id: String,
        /// What was wrong.
        reason: String,
    },

    /// Illegal lifecycle transition.
    #[error("illegal state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// A required on-disk artifact is missing.
    #[error("missing artifact: {path}")]
    MissingArtifact {
        /// Expected path.
        path: String,
    },

    /// The run was cancelled before completion.
    #[error("generation cancelled")]
    Cancelled,

    /// Worker-pool failure during generation.
    #[error("generation failed: {reason}")]
    Generation {
        /// What failed.
        reason: String,
    },

    /// Hex digest parse failure.
    #[error("invalid digest: {value}")]
    InvalidDigest {
        /// The rejected value.
        value: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Enochian Cyphers operations
pub type Result<T> = std::result::Result<T, EnochianError>;

/// Initialize logging for host binaries and tests. Safe to call twice.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env().try_init();
    log::debug!(
        "enochian-cyphers {} ({}, built {})",
        VERSION,
        GIT_HASH,
        BUILD_TIME
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(constants::TRADITION_COUNT, 26);
        assert_eq!(constants::GOVERNOR_COUNT, 91);
        assert_eq!(constants::AETHYR_COUNT, 30);
        assert_eq!(constants::AUTHENTICITY_THRESHOLD.micros(), 950_000);
        assert_eq!(constants::MAX_ORDINALS_SIZE, 1_048_576);
        assert_eq!(constants::ENOCHIAN_WEIGHTING.micros(), 600_000);
    }

    #[test]
    fn test_errors_render_their_context() {
        let err = EnochianError::InsufficientEnochianPool {
            domain: governors::Domain::Knowledge,
            required: 12,
            available: 3,
        };
        assert!(err.to_string().contains("knowledge"));
        assert!(err.to_string().contains("12"));
    }
}
