//! Weighted knowledge retrieval under the Enochian-primacy constraint
//!
//! The composite weight is a fixed linear blend; the α constants below are
//! protocol constants. Retrieval takes exactly ⌈β·k⌉ Enochian entries and
//! fails loudly when the pool cannot supply them - the bias is never
//! silently relaxed.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed;
use crate::governors::Domain;
use crate::traditions::Tradition;
use crate::{EnochianError, Result};

use super::{KnowledgeEntry, Lighthouse};

// Composite-weight coefficients. Changing any of these is a protocol change.
const ALPHA_AUTHENTICITY: Fixed = Fixed::from_micros(350_000);
const ALPHA_DOMAIN: Fixed = Fixed::from_micros(300_000);
const ALPHA_AFFINITY: Fixed = Fixed::from_micros(200_000);
const ALPHA_ENOCHIAN: Fixed = Fixed::from_micros(150_000);

// Candidates need at least this much domain relevance.
const MIN_DOMAIN_RELEVANCE: Fixed = Fixed::from_micros(100_000);

/// A retrieval request for one governor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalQuery {
    /// The governor's primary domain.
    pub domain: Domain,
    /// The governor's affinity vector.
    pub affinity: BTreeMap<Tradition, Fixed>,
    /// Enochian bias β in [0, 1].
    pub enochian_bias: Fixed,
    /// Minimum entry authenticity.
    pub min_authenticity: Fixed,
}

impl RetrievalQuery {
    /// Query with the canonical defaults (β = 0.6, min authenticity 0.80).
    pub fn new(domain: Domain, affinity: BTreeMap<Tradition, Fixed>) -> Self {
        RetrievalQuery {
            domain,
            affinity,
            enochian_bias: Fixed::from_micros(600_000),
            min_authenticity: Fixed::from_micros(800_000),
        }
    }
}

/// One retrieved entry with its composite weight, in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranked {
    /// Entry id.
    pub entry_id: String,
    /// Composite weight.
    pub weight: Fixed,
    /// Whether the entry counts toward the Enochian quota.
    pub enochian: bool,
}

// Heap key ordered so that greater = better: weight descending, then
// entry id ascending on ties.
#[derive(PartialEq, Eq)]
struct Key {
    weight: Fixed,
    entry_id: String,
    index: usize,
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .cmp(&other.weight)
            .then_with(|| other.entry_id.cmp(&self.entry_id))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Lighthouse {
    /// Retrieve the top `k` entries for a query.
    ///
    /// Exactly ⌈β·k⌉ of the result are Enochian; the remainder come from the
    /// non-Enochian pool. The result is sorted by weight descending with a
    /// stable entry-id tie-break and is a pure function of the query and the
    /// index snapshot.
    pub fn weighted_retrieve(&self, query: &RetrievalQuery, k: usize) -> Result<Vec<Ranked>> {
        let required_enochian = query.enochian_bias.ceil_mul(k);
        let required_other = k - required_enochian;

        // Bounded min-heaps: O(|candidates| log k).
        let mut enochian_heap: BinaryHeap<std::cmp::Reverse<Key>> =
            BinaryHeap::with_capacity(required_enochian + 1);
        let mut other_heap: BinaryHeap<std::cmp::Reverse<Key>> =
            BinaryHeap::with_capacity(required_other + 1);
        let mut enochian_pool = 0usize;
        let mut other_pool = 0usize;

        for &index in self.domain_postings(query.domain) {
            let entry = self.entry_at(index);
            if entry.authenticity_score < query.min_authenticity {
                continue;
            }
            if entry.relevance(query.domain) < MIN_DOMAIN_RELEVANCE {
                continue;
            }
            let key = Key {
                weight: composite_weight(entry, query),
                entry_id: entry.entry_id.clone(),
                index,
            };
            if entry.is_enochian() {
                enochian_pool += 1;
                push_bounded(&mut enochian_heap, key, required_enochian);
            } else {
                other_pool += 1;
                push_bounded(&mut other_heap, key, required_other);
            }
        }

        if enochian_pool < required_enochian {
            return Err(EnochianError::InsufficientEnochianPool {
                domain: query.domain,
                required: required_enochian,
                available: enochian_pool,
            });
        }
        if other_pool < required_other {
            return Err(EnochianError::InsufficientPool {
                domain: query.domain,
                required: required_other,
                available: other_pool,
            });
        }

        let mut selected: Vec<Key> = enochian_heap
            .into_iter()
            .chain(other_heap)
            .map(|r| r.0)
            .collect();
        // Interleave both pools in descending weight with stable tie-break.
        selected.sort_by(|a, b| b.cmp(a));

        Ok(selected
            .into_iter()
            .map(|key| Ranked {
                enochian: self.entry_at(key.index).is_enochian(),
                entry_id: key.entry_id,
                weight: key.weight,
            })
            .collect())
    }
}

fn composite_weight(entry: &KnowledgeEntry, query: &RetrievalQuery) -> Fixed {
    let affinity = query
        .affinity
        .get(&entry.tradition)
        .copied()
        .unwrap_or(Fixed::ZERO);
    ALPHA_AUTHENTICITY * entry.authenticity_score
        + ALPHA_DOMAIN * entry.relevance(query.domain)
        + ALPHA_AFFINITY * affinity
        + ALPHA_ENOCHIAN * entry.enochian_weight
}

fn push_bounded(heap: &mut BinaryHeap<std::cmp::Reverse<Key>>, key: Key, bound: usize) {
    if bound == 0 {
        return;
    }
    if heap.len() < bound {
        heap.push(std::cmp::Reverse(key));
    } else if let Some(worst) = heap.peek() {
        if key > worst.0 {
            heap.pop();
            heap.push(std::cmp::Reverse(key));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighthouse::fixtures::small_lighthouse;

    fn query() -> RetrievalQuery {
        let mut affinity = BTreeMap::new();
        affinity.insert(Tradition::Enochian, Fixed::from_micros(900_000));
        affinity.insert(Tradition::HermeticQabalah, Fixed::from_micros(700_000));
        RetrievalQuery::new(Domain::Knowledge, affinity)
    }

    #[test]
    fn test_enochian_quota_is_exact() {
        let lighthouse = small_lighthouse(5);
        let result = lighthouse.weighted_retrieve(&query(), 20).unwrap();
        assert_eq!(result.len(), 20);
        let enochian = result.iter().filter(|r| r.enochian).count();
        // ⌈0.6 * 20⌉ = 12, never more, never fewer.
        assert_eq!(enochian, 12);
    }

    #[test]
    fn test_bias_boundaries() {
        let lighthouse = small_lighthouse(5);

        let mut pure = query();
        pure.enochian_bias = Fixed::ONE;
        let result = lighthouse.weighted_retrieve(&pure, 5).unwrap();
        assert!(result.iter().all(|r| r.enochian));

        let mut none = query();
        none.enochian_bias = Fixed::ZERO;
        let result = lighthouse.weighted_retrieve(&none, 5).unwrap();
        assert!(result.iter().all(|r| !r.enochian));
    }

    #[test]
    fn test_result_is_sorted_and_stable() {
        let lighthouse = small_lighthouse(5);
        let a = lighthouse.weighted_retrieve(&query(), 10).unwrap();
        let b = lighthouse.weighted_retrieve(&query(), 10).unwrap();
        assert_eq!(a, b);
        for pair in a.windows(2) {
            let ordered = pair[0].weight > pair[1].weight
                || (pair[0].weight == pair[1].weight && pair[0].entry_id < pair[1].entry_id);
            assert!(ordered, "ranking must be weight desc, id asc");
        }
    }

    #[test]
    fn test_insufficient_enochian_pool_is_not_relaxed() {
        // Only 2 Enochian entries per domain but β = 0.6, k = 20 needs 12.
        let lighthouse = small_lighthouse(2);
        let err = lighthouse.weighted_retrieve(&query(), 20).unwrap_err();
        match err {
            EnochianError::InsufficientEnochianPool {
                required,
                available,
                ..
            } => {
                assert_eq!(required, 12);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_min_authenticity_filters_candidates() {
        let lighthouse = small_lighthouse(5);
        let mut strict = query();
        strict.min_authenticity = Fixed::from_micros(990_000);
        assert!(lighthouse.weighted_retrieve(&strict, 5).is_err());
    }

    #[test]
    fn test_enochian_affinity_dominates_weighting() {
        let lighthouse = small_lighthouse(5);
        let result = lighthouse.weighted_retrieve(&query(), 10).unwrap();
        // With equal relevance everywhere, the enochian_weight term pushes
        // Enochian entries to the top of the interleaved ranking.
        assert!(result[0].enochian);
    }
}
