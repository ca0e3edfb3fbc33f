//! The Lighthouse - knowledge index over the 26 sacred traditions
//!
//! Entries live in a contiguous arena keyed by entry id; the tradition
//! partition and the per-domain inverted index hold arena positions, never
//! owning pointers, so cross-references may cycle freely at the id level.
//! All orderings are stable: by entry id within a tradition, by entry id
//! within a domain posting list.

pub mod retrieval;

pub use retrieval::{Ranked, RetrievalQuery};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::canonical::{self, Digest};
use crate::fixed::Fixed;
use crate::governors::Domain;
use crate::sources::SourceRegistry;
use crate::traditions::{Tradition, ALL_TRADITIONS, TRADITION_COUNT};
use crate::{EnochianError, Result};

/// Kind of knowledge an entry preserves.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Principle,
    Practice,
    Concept,
    Symbol,
    Tool,
}

/// One preserved knowledge record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Stable entry identifier.
    pub entry_id: String,
    /// Owning tradition.
    pub tradition: Tradition,
    /// Display name.
    pub name: String,
    /// Category.
    pub category: Category,
    /// Digest of the preserved content.
    pub content_digest: Digest,
    /// Citations grounding this entry.
    pub source_ids: BTreeSet<String>,
    /// Cross-references to other entries (ids only; cycles permitted).
    #[serde(default)]
    pub cross_refs: BTreeSet<String>,
    /// Relevance per governor domain, values in [0, 1].
    pub domain_relevance: BTreeMap<Domain, Fixed>,
    /// Weight of the entry within its tradition.
    pub tradition_weight: Fixed,
    /// Enochian weighting; positive only for Enochian entries or entries
    /// carrying an Enochian cross-reference.
    pub enochian_weight: Fixed,
    /// Authenticity score in [0, 1].
    pub authenticity_score: Fixed,
}

impl KnowledgeEntry {
    /// True when the entry counts toward the Enochian retrieval quota.
    pub fn is_enochian(&self) -> bool {
        self.tradition.is_enochian() || self.enochian_weight.is_positive()
    }

    /// Relevance for one domain (zero when unmapped).
    pub fn relevance(&self, domain: Domain) -> Fixed {
        self.domain_relevance.get(&domain).copied().unwrap_or(Fixed::ZERO)
    }
}

/// On-disk shape of `lighthouse/traditions/<tradition_id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraditionFile {
    /// Tradition identifier; must match the file stem.
    pub tradition_id: String,
    /// Entries of this tradition.
    pub entries: Vec<KnowledgeEntry>,
}

/// Per-tradition citation coverage (supplemental verification sweep).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationCoverage {
    /// Entries in the tradition.
    pub entries: usize,
    /// Entries whose citations all resolve in the source registry.
    pub fully_cited: usize,
    /// Distinct unresolved citation ids.
    pub unresolved: BTreeSet<String>,
}

/// The knowledge index.
#[derive(Debug, Clone)]
pub struct Lighthouse {
    entries: Vec<KnowledgeEntry>,
    by_id: BTreeMap<String, usize>,
    by_tradition: BTreeMap<Tradition, Vec<usize>>,
    domain_index: BTreeMap<Domain, Vec<usize>>,
}

impl Lighthouse {
    /// Build the index from a flat entry set, validating shape invariants.
    pub fn from_entries(mut entries: Vec<KnowledgeEntry>) -> Result<Self> {
        entries.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));

        let mut by_id = BTreeMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if by_id.insert(entry.entry_id.clone(), index).is_some() {
                return Err(EnochianError::InvalidRecord {
                    id: entry.entry_id.clone(),
                    reason: "duplicate entry_id".to_string(),
                });
            }
        }

        // Enochian weighting is earned, not asserted: a positive weight
        // requires the Enochian tradition or an Enochian cross-reference.
        for entry in &entries {
            if entry.tradition.is_enochian() {
                if !entry.enochian_weight.is_positive() {
                    return Err(EnochianError::InvalidRecord {
                        id: entry.entry_id.clone(),
                        reason: "enochian entry with zero enochian_weight".to_string(),
                    });
                }
                continue;
            }
            let has_enochian_ref = entry.cross_refs.iter().any(|ref_id| {
                by_id
                    .get(ref_id)
                    .map(|&i| entries[i].tradition.is_enochian())
                    .unwrap_or(false)
            });
            if entry.enochian_weight.is_positive() && !has_enochian_ref {
                return Err(EnochianError::InvalidRecord {
                    id: entry.entry_id.clone(),
                    reason: "positive enochian_weight without an enochian cross-reference"
                        .to_string(),
                });
            }
        }

        let mut by_tradition: BTreeMap<Tradition, Vec<usize>> = BTreeMap::new();
        let mut domain_index: BTreeMap<Domain, Vec<usize>> = BTreeMap::new();
        for (index, entry) in entries.iter().enumerate() {
            by_tradition.entry(entry.tradition).or_default().push(index);
            for (&domain, relevance) in &entry.domain_relevance {
                if relevance.is_positive() {
                    domain_index.entry(domain).or_default().push(index);
                }
            }
        }

        Ok(Lighthouse {
            entries,
            by_id,
            by_tradition,
            domain_index,
        })
    }

    /// Load the complete 26-tradition partition from
    /// `<dir>/traditions/<tradition_id>.json`.
    pub fn load(dir: &Path) -> Result<Self> {
        let traditions_dir = dir.join("traditions");
        let mut entries = Vec::new();
        let mut seen = BTreeSet::new();

        for tradition in ALL_TRADITIONS {
            let path = traditions_dir.join(format!("{}.json", tradition.id()));
            let bytes = std::fs::read(&path).map_err(|_| EnochianError::MissingArtifact {
                path: path.display().to_string(),
            })?;
            let file: TraditionFile = canonical::decode_verified(&bytes, &path)?;
            if Tradition::from_id(&file.tradition_id)? != tradition {
                return Err(EnochianError::InvalidRecord {
                    id: file.tradition_id,
                    reason: format!("tradition file mismatch at {}", path.display()),
                });
            }
            for entry in &file.entries {
                if entry.tradition != tradition {
                    return Err(EnochianError::InvalidRecord {
                        id: entry.entry_id.clone(),
                        reason: format!("entry tradition does not match file {}", path.display()),
                    });
                }
            }
            seen.insert(tradition);
            entries.extend(file.entries);
        }

        if seen.len() != TRADITION_COUNT {
            return Err(EnochianError::DistributionInvariantViolated {
                details: format!("lighthouse holds {} traditions, expected 26", seen.len()),
            });
        }

        let lighthouse = Self::from_entries(entries)?;
        log::info!(
            "Lighthouse loaded: {} entries across {} traditions",
            lighthouse.len(),
            TRADITION_COUNT
        );
        Ok(lighthouse)
    }

    /// Entry by id.
    pub fn get(&self, entry_id: &str) -> Option<&KnowledgeEntry> {
        self.by_id.get(entry_id).map(|&i| &self.entries[i])
    }

    /// All entries, sorted by entry id.
    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one tradition, in entry-id order.
    pub fn tradition_entries(&self, tradition: Tradition) -> Vec<&KnowledgeEntry> {
        self.by_tradition
            .get(&tradition)
            .map(|ids| ids.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    /// Serialize one tradition back to its canonical file form.
    pub fn tradition_file(&self, tradition: Tradition) -> TraditionFile {
        TraditionFile {
            tradition_id: tradition.id().to_string(),
            entries: self
                .tradition_entries(tradition)
                .into_iter()
                .cloned()
                .collect(),
        }
    }

    /// Posting list for a domain (arena positions, entry-id order).
    pub(crate) fn domain_postings(&self, domain: Domain) -> &[usize] {
        self.domain_index
            .get(&domain)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn entry_at(&self, index: usize) -> &KnowledgeEntry {
        &self.entries[index]
    }

    /// Sweep the whole index against the source registry.
    pub fn citation_coverage(&self, registry: &SourceRegistry) -> BTreeMap<Tradition, CitationCoverage> {
        let mut report = BTreeMap::new();
        for tradition in ALL_TRADITIONS {
            let entries = self.tradition_entries(tradition);
            let mut fully_cited = 0;
            let mut unresolved = BTreeSet::new();
            for entry in &entries {
                let missing: Vec<&String> = entry
                    .source_ids
                    .iter()
                    .filter(|id| registry.get(id).is_none())
                    .collect();
                if missing.is_empty() {
                    fully_cited += 1;
                } else {
                    unresolved.extend(missing.into_iter().cloned());
                }
            }
            report.insert(
                tradition,
                CitationCoverage {
                    entries: entries.len(),
                    fully_cited,
                    unresolved,
                },
            );
        }
        report
    }
}
