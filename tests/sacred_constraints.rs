//! Sacred architecture constraints
//!
//! The structural invariants of the system: 26 traditions, 91 governors in
//! the (4, 3 x 29) aethyr pattern, the exact Enochian retrieval quota, and
//! the emission ordering of a run.

mod common;

use enochian_cyphers::aethyrs::{traditional_names, AethyrMap};
use enochian_cyphers::entropy::FixedBlockSource;
use enochian_cyphers::fixed::Fixed;
use enochian_cyphers::governors::{Domain, GovernorRegistry};
use enochian_cyphers::lighthouse::RetrievalQuery;
use enochian_cyphers::quests::{GenerationConfig, QuestGenerator, ScriptedOracle};
use enochian_cyphers::traditions::{Tradition, ALL_TRADITIONS};
use enochian_cyphers::EnochianError;
use std::collections::BTreeMap;
use std::sync::Arc;

#[test]
fn test_tradition_partition_is_closed_at_26() {
    assert_eq!(ALL_TRADITIONS.len(), 26);
    assert!(Tradition::from_id("enochian").is_ok());
    assert!(Tradition::from_id("voodoo").is_err());
    // astrology and natal_astrology are distinct traditions.
    assert_ne!(
        Tradition::from_id("astrology").unwrap(),
        Tradition::from_id("natal_astrology").unwrap()
    );
}

#[test]
fn test_sacred_distribution_4_3x29() {
    let ctx = common::fixture_context();
    assert_eq!(ctx.governors.len(), 91);
    assert_eq!(ctx.governors.governors_in(1).len(), 4);
    for aethyr_id in 2..=30 {
        assert_eq!(ctx.governors.governors_in(aethyr_id).len(), 3, "aethyr {}", aethyr_id);
    }
    let total: usize = (1..=30).map(|a| ctx.governors.governors_in(a).len()).sum();
    assert_eq!(total, 91);
    assert!(ctx.governors.validate_distribution().is_ok());
}

#[test]
fn test_assignment_rule_is_reconstructible() {
    // The same profiles always land in the same aethyrs, however the input
    // was ordered.
    let aethyrs = AethyrMap::from_names(traditional_names()).unwrap();
    let mut shuffled = common::fixture_profiles();
    shuffled.rotate_left(37);
    shuffled.reverse();

    let a = GovernorRegistry::assign(common::fixture_profiles(), &aethyrs).unwrap();
    let b = GovernorRegistry::assign(shuffled, &aethyrs).unwrap();
    for id in 1..=91u8 {
        assert_eq!(a.get(id).unwrap(), b.get(id).unwrap());
    }
    // TEX holds the first four names in case-insensitive order.
    let tex: Vec<&str> = a.governors_in(1).iter().map(|g| g.name.as_str()).collect();
    assert_eq!(tex, vec!["GOV000", "GOV001", "GOV002", "GOV003"]);
}

#[test]
fn test_retrieval_quota_is_exactly_ceil_beta_k() {
    let ctx = common::fixture_context();
    let mut affinity = BTreeMap::new();
    affinity.insert(Tradition::Enochian, Fixed::from_micros(900_000));

    for (beta_micros, k, expected) in [
        (600_000i64, 20usize, 12usize),
        (600_000, 5, 3),
        (500_000, 7, 4),
        (1_000_000, 6, 6),
        (0, 6, 0),
    ] {
        let mut query = RetrievalQuery::new(Domain::Knowledge, affinity.clone());
        query.enochian_bias = Fixed::from_micros(beta_micros);
        let result = ctx.lighthouse.weighted_retrieve(&query, k).unwrap();
        assert_eq!(result.len(), k);
        let enochian = result.iter().filter(|r| r.enochian).count();
        assert_eq!(enochian, expected, "beta={} k={}", beta_micros, k);
    }
}

#[test]
fn test_starved_pool_is_a_typed_failure() {
    // Two Enochian entries per domain cannot satisfy ⌈0.6·20⌉ = 12.
    let lighthouse = common::fixture_lighthouse(2, 7);
    let mut affinity = BTreeMap::new();
    affinity.insert(Tradition::Enochian, Fixed::from_micros(900_000));
    let query = RetrievalQuery::new(Domain::Healing, affinity);
    let err = lighthouse.weighted_retrieve(&query, 20).unwrap_err();
    assert!(matches!(err, EnochianError::InsufficientEnochianPool { .. }));
}

#[tokio::test]
async fn test_questline_emission_order_and_bounds() {
    let ctx = common::fixture_context();
    let config = GenerationConfig {
        governor_filter: Some(vec![23, 4, 88, 61, 7]),
        ..GenerationConfig::default()
    };
    let generator = QuestGenerator::new(ctx, Arc::new(ScriptedOracle::new()), config);
    let blocks = FixedBlockSource::with_reference_blocks();
    let run = generator.run(&blocks, 850_000).await.unwrap();

    let ids: Vec<u8> = run.questlines.iter().map(|q| q.governor_id).collect();
    assert_eq!(ids, vec![4, 7, 23, 61, 88]);

    for questline in &run.questlines {
        let n = questline.quests.len() as u32;
        assert!((75..=125).contains(&n), "questline size {}", n);
        for quest in &questline.quests {
            assert_eq!(quest.tradition_refs[0], Tradition::Enochian);
            assert!((1..=30).contains(&quest.difficulty));
        }
    }
}

#[tokio::test]
async fn test_enochian_fraction_holds_across_governors() {
    let ctx = common::fixture_context();
    let config = GenerationConfig {
        governor_filter: Some(vec![1, 2, 3]),
        ..GenerationConfig::default()
    };
    let generator = QuestGenerator::new(ctx, Arc::new(ScriptedOracle::new()), config);
    let blocks = FixedBlockSource::with_reference_blocks();
    let run = generator.run(&blocks, 850_001).await.unwrap();

    // ≥ 0.6 − 1/k' with k' = 5.
    let floor = Fixed::from_micros(600_000) - Fixed::from_micros(200_000);
    for questline in &run.questlines {
        assert!(
            questline.enochian_fraction >= floor,
            "governor {} fraction {}",
            questline.governor_id,
            questline.enochian_fraction
        );
    }
}
