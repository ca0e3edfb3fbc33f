//! Authenticity validation
//!
//! The scoring formula, its monotonicity, and the proof chain that commits
//! scores to a per-governor Merkle root.

mod common;

use enochian_cyphers::authenticity::{self, BASE_SCORE};
use enochian_cyphers::entropy::FixedBlockSource;
use enochian_cyphers::fixed::Fixed;
use enochian_cyphers::proofs::{self, leaf_digest, verify_batch};
use enochian_cyphers::quests::{GenerationConfig, QuestDraft, QuestGenerator, ScriptedOracle};
use enochian_cyphers::traditions::Tradition;
use std::sync::Arc;

fn draft(description: &str, refs: Vec<Tradition>) -> QuestDraft {
    QuestDraft {
        title: "A Working".to_string(),
        description: description.to_string(),
        objectives: vec!["Observe".to_string()],
        wisdom_focus: "balance".to_string(),
        tradition_refs: refs,
        enochian_invocation: "ZACARE CA OD ZAMRAN".to_string(),
    }
}

#[test]
fn test_formula_components_compose() {
    let ctx = common::fixture_context();
    let anchor = ctx.lighthouse.get("enochian_000").unwrap();

    let components = authenticity::score(
        &draft(
            "Received in 1582 by John Dee.",
            vec![Tradition::HermeticQabalah],
        ),
        &[anchor],
        &ctx.sources,
    );
    assert_eq!(components.base, BASE_SCORE);
    assert_eq!(components.tradition_multiplier.micros(), 1_200_000);
    // 2 markers: 1582, john dee.
    assert_eq!(components.historical_bonus.micros(), 20_000);
    assert!(components.enochian_boost.is_positive());
    assert!(components.source_quality.is_positive());
    assert_eq!(
        components.final_score,
        (BASE_SCORE * components.tradition_multiplier
            + components.enochian_boost
            + components.source_quality
            + components.historical_bonus)
            .min(Fixed::ONE)
    );
}

#[test]
fn test_score_never_exceeds_one() {
    let ctx = common::fixture_context();
    let grounding: Vec<_> = (0..5)
        .map(|i| ctx.lighthouse.get(&format!("enochian_{:03}", i)).unwrap())
        .collect();
    let many_markers =
        "16th century 1582 1583 1584 1589 elizabethan renaissance john dee edward kelley angelic celestial";
    let components = authenticity::score(
        &draft(many_markers, vec![Tradition::Enochian]),
        &grounding,
        &ctx.sources,
    );
    assert_eq!(components.final_score, Fixed::ONE);
}

#[test]
fn test_citations_are_monotone() {
    let ctx = common::fixture_context();
    // enochian_001 has no citations in the fixture; enochian_000 carries two.
    let uncited = ctx.lighthouse.get("enochian_001").unwrap();
    let cited = ctx.lighthouse.get("enochian_000").unwrap();
    let d = draft("A working.", vec![Tradition::Tarot]);

    let base = authenticity::score(&d, &[uncited], &ctx.sources);
    let better = authenticity::score(&d, &[uncited, cited], &ctx.sources);
    assert!(better.source_quality >= base.source_quality);
    assert!(better.final_score >= base.final_score);
}

#[tokio::test]
async fn test_proof_batches_verify_to_their_roots() {
    let ctx = common::fixture_context();
    let config = GenerationConfig {
        governor_filter: Some(vec![5, 6]),
        ..GenerationConfig::default()
    };
    let generator = QuestGenerator::new(Arc::clone(&ctx), Arc::new(ScriptedOracle::new()), config);
    let blocks = FixedBlockSource::with_reference_blocks();
    let run = generator.run(&blocks, 850_002).await.unwrap();

    let batches = proofs::prove_questlines(&run.questlines, &ctx).unwrap();
    assert_eq!(batches.len(), 2);

    for (position, batch) in batches.iter().enumerate() {
        assert_eq!(batch.created_at, position as u64);
        assert!(verify_batch(batch), "batch {} failed verification", batch.batch_id);

        // Every proof independently reconstructs the root from its path.
        for proof in &batch.proofs {
            let leaf = leaf_digest(&proof.quest_id, proof.authenticity_score, &proof.proof_digest);
            assert!(proofs::verify(
                leaf,
                &proof.merkle_path,
                &proof.path_directions,
                batch.merkle_root
            ));
            assert_eq!(proof.batch_id, batch.batch_id);
            assert_eq!(proof.tradition_weights[&Tradition::Enochian].micros(), 1_300_000);
        }
    }
}

#[tokio::test]
async fn test_tampered_proof_fails_verification() {
    let ctx = common::fixture_context();
    let config = GenerationConfig {
        governor_filter: Some(vec![11]),
        ..GenerationConfig::default()
    };
    let generator = QuestGenerator::new(Arc::clone(&ctx), Arc::new(ScriptedOracle::new()), config);
    let blocks = FixedBlockSource::with_reference_blocks();
    let run = generator.run(&blocks, 850_000).await.unwrap();

    let mut batches = proofs::prove_questlines(&run.questlines, &ctx).unwrap();
    // Inflate one committed score: the leaf no longer matches its path.
    batches[0].proofs[0].authenticity_score = Fixed::ONE;
    assert!(!verify_batch(&batches[0]));
}
