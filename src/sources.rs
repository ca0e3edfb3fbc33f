//! Source registry - the immutable catalog of primary-source citations
//!
//! Every knowledge entry grounds itself in citations from this registry;
//! authenticity scoring weighs quests by the verification class and weight
//! of the sources behind them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::canonical::{self, Digest, FieldHasher};
use crate::fixed::Fixed;
use crate::{EnochianError, Result};

/// How a citation was verified against the historical record.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationClass {
    PrimaryMs,
    ScholarlyTranslation,
    DocumentedTradition,
    HistoricalPublication,
    ManuscriptComparison,
}

/// A primary-source citation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    /// Stable identifier.
    pub source_id: String,
    /// Work title.
    pub title: String,
    /// Author or transcriber.
    pub author: String,
    /// Publication or composition year, when known.
    pub year: Option<i32>,
    /// Authenticity weight in [0, 1].
    pub authenticity_weight: Fixed,
    /// Verification class.
    pub verification_class: VerificationClass,
    /// Digest of the citation record.
    pub digest: Digest,
}

impl SourceCitation {
    /// Build a citation, computing its digest from the other fields.
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        year: Option<i32>,
        authenticity_weight: Fixed,
        verification_class: VerificationClass,
    ) -> Result<Self> {
        let mut citation = SourceCitation {
            source_id: source_id.into(),
            title: title.into(),
            author: author.into(),
            year,
            authenticity_weight,
            verification_class,
            digest: Digest([0u8; 32]),
        };
        citation.digest = citation.compute_digest()?;
        Ok(citation)
    }

    /// Stable hash of the citation record.
    pub fn compute_digest(&self) -> Result<Digest> {
        let class = canonical::to_canonical_json(&self.verification_class)?;
        let mut hasher = FieldHasher::new();
        hasher
            .field(self.source_id.as_bytes())
            .field(self.title.as_bytes())
            .field(self.author.as_bytes())
            .field(&self.year.unwrap_or(0).to_be_bytes())
            .field(&self.authenticity_weight.micros().to_be_bytes())
            .field(&class);
        Ok(hasher.finish())
    }
}

/// Outcome of checking a citation list against the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationCheck {
    /// Mean authenticity weight across matched sources (zero when none match).
    pub mean_weight: Fixed,
    /// Number of matched citations.
    pub matched: usize,
    /// Citations that did not resolve.
    pub unresolved: Vec<String>,
}

/// Immutable table of citations indexed by source id.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceCitation>,
}

impl SourceRegistry {
    /// Build a registry, verifying digests and rejecting duplicates.
    pub fn from_citations(citations: Vec<SourceCitation>) -> Result<Self> {
        let mut sources = BTreeMap::new();
        for citation in citations {
            let recomputed = citation.compute_digest()?;
            if recomputed != citation.digest {
                return Err(EnochianError::InvalidRecord {
                    id: citation.source_id.clone(),
                    reason: "citation digest does not match its contents".to_string(),
                });
            }
            if sources
                .insert(citation.source_id.clone(), citation)
                .is_some()
            {
                return Err(EnochianError::InvalidRecord {
                    id: "source registry".to_string(),
                    reason: "duplicate source_id".to_string(),
                });
            }
        }
        Ok(SourceRegistry { sources })
    }

    /// Load from a canonical JSON array of citations.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let citations: Vec<SourceCitation> = canonical::decode_verified(&bytes, path)?;
        let registry = Self::from_citations(citations)?;
        log::info!(
            "Loaded source registry: {} citations from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Look up a citation.
    pub fn get(&self, source_id: &str) -> Option<&SourceCitation> {
        self.sources.get(source_id)
    }

    /// Number of registered citations.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// True when the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate citations in source-id order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceCitation> {
        self.sources.values()
    }

    /// Check a citation list: mean weight over matches plus the unresolved ids.
    pub fn verify_citation_list(&self, citations: &[String]) -> CitationCheck {
        let mut total = Fixed::ZERO;
        let mut matched = 0usize;
        let mut unresolved = Vec::new();
        for id in citations {
            match self.sources.get(id) {
                Some(citation) => {
                    total += citation.authenticity_weight;
                    matched += 1;
                }
                None => unresolved.push(id.clone()),
            }
        }
        let mean_weight = if matched > 0 {
            total / Fixed::from_int(matched as i64)
        } else {
            Fixed::ZERO
        };
        CitationCheck {
            mean_weight,
            matched,
            unresolved,
        }
    }
}
