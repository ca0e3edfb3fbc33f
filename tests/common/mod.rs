//! Shared fixtures for the integration suites
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use enochian_cyphers::aethyrs::{traditional_names, AethyrMap, GOVERNOR_COUNT};
use enochian_cyphers::canonical::hash_fields;
use enochian_cyphers::fixed::Fixed;
use enochian_cyphers::governors::{GovernorProfile, GovernorRegistry, ALL_DOMAINS};
use enochian_cyphers::lighthouse::{Category, KnowledgeEntry, Lighthouse};
use enochian_cyphers::sources::{SourceCitation, SourceRegistry, VerificationClass};
use enochian_cyphers::traditions::{Tradition, ALL_TRADITIONS};
use enochian_cyphers::CoreContext;

/// A citation catalog in the Dee/Kelley record.
pub fn fixture_sources() -> SourceRegistry {
    let citations = vec![
        citation("dee_spiritual_diaries", "The Spiritual Diaries", 980_000),
        citation("liber_loagaeth", "Liber Loagaeth", 950_000),
        citation("five_books_mystery", "Five Books of Mystery", 940_000),
        citation("casaubon_true_relation", "A True and Faithful Relation", 890_000),
    ];
    SourceRegistry::from_citations(citations).unwrap()
}

fn citation(id: &str, title: &str, weight: i64) -> SourceCitation {
    SourceCitation::new(
        id,
        title,
        "John Dee",
        Some(1583),
        Fixed::from_micros(weight),
        VerificationClass::PrimaryMs,
    )
    .unwrap()
}

/// A deterministic lighthouse: `per_tradition` entries per tradition with
/// seeded variety in relevance and authenticity.
pub fn fixture_lighthouse(per_tradition: usize, seed: u64) -> Lighthouse {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut entries = Vec::new();
    for tradition in ALL_TRADITIONS {
        for i in 0..per_tradition {
            let entry_id = format!("{}_{:03}", tradition.id(), i);
            let mut domain_relevance = BTreeMap::new();
            for domain in ALL_DOMAINS {
                let micros = 300_000 + rng.gen_range(0..700) * 1000;
                domain_relevance.insert(domain, Fixed::from_micros(micros));
            }
            let mut source_ids = BTreeSet::new();
            if i % 2 == 0 {
                source_ids.insert("dee_spiritual_diaries".to_string());
            }
            if i % 3 == 0 {
                source_ids.insert("liber_loagaeth".to_string());
            }
            let enochian_weight = if tradition == Tradition::Enochian {
                Fixed::from_micros(700_000 + (i as i64 % 4) * 50_000)
            } else {
                Fixed::ZERO
            };
            entries.push(KnowledgeEntry {
                entry_id: entry_id.clone(),
                tradition,
                name: format!("{} teaching {}", tradition.id(), i),
                category: Category::Principle,
                content_digest: hash_fields(&[entry_id.as_bytes()]),
                source_ids,
                cross_refs: BTreeSet::new(),
                domain_relevance,
                tradition_weight: Fixed::from_micros(900_000),
                enochian_weight,
                authenticity_score: Fixed::from_micros(820_000 + (i as i64 % 6) * 30_000),
            });
        }
    }
    Lighthouse::from_entries(entries).unwrap()
}

/// 91 governor profiles with canonical-sortable names.
pub fn fixture_profiles() -> Vec<GovernorProfile> {
    (0..GOVERNOR_COUNT)
        .map(|i| {
            let mut affinity = BTreeMap::new();
            affinity.insert(Tradition::Enochian, Fixed::from_micros(900_000));
            affinity.insert(
                ALL_TRADITIONS[1 + i % (ALL_TRADITIONS.len() - 1)],
                Fixed::from_micros(500_000 + (i as i64 % 4) * 100_000),
            );
            GovernorProfile {
                name: format!("GOV{:03}", i),
                domain: ALL_DOMAINS[i % ALL_DOMAINS.len()],
                affinity,
            }
        })
        .collect()
}

/// A full validated context over the fixtures.
pub fn fixture_context() -> Arc<CoreContext> {
    let aethyrs = AethyrMap::from_names(traditional_names()).unwrap();
    let governors = GovernorRegistry::assign(fixture_profiles(), &aethyrs).unwrap();
    CoreContext::initialize(
        fixture_lighthouse(20, 0xD_EE),
        fixture_sources(),
        aethyrs,
        governors,
    )
    .unwrap()
}
