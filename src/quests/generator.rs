//! Batch quest generation
//!
//! One worker task per governor, bounded by a semaphore; the per-quest loop
//! inside a questline stays sequential so the seed chain is reproducible.
//! Worker concurrency affects throughput only - emitted questlines are
//! sorted by governor id and are a pure function of the inputs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use serde::{Deserialize, Serialize};

use crate::authenticity;
use crate::context::CoreContext;
use crate::entropy::{BlockSource, Seed256};
use crate::fixed::Fixed;
use crate::governors::Governor;
use crate::lighthouse::{KnowledgeEntry, RetrievalQuery};
use crate::quests::oracle::{ContentOracle, Directive, OracleContext};
use crate::quests::{Quest, QuestDraft, QuestFailure, Questline, QuestlineState};
use crate::{EnochianError, Result};

/// Generation parameters. Defaults match the protocol constants.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Minimum quests per questline.
    pub min_quests: u32,
    /// Maximum quests per questline.
    pub max_quests: u32,
    /// Size of the per-governor working set retrieved from the lighthouse.
    pub working_set_size: usize,
    /// Grounding entries sampled per quest.
    pub grounding_per_quest: usize,
    /// Enochian bias β for retrieval.
    pub enochian_bias: Fixed,
    /// Authenticity floor below which a quest is refined, then flagged.
    pub min_authenticity: Fixed,
    /// Refine attempts per quest, and transient oracle retries per call.
    pub retry_budget: u32,
    /// Bounded worker concurrency P.
    pub worker_concurrency: usize,
    /// Oracle semaphore capacity (≤ provider limit).
    pub oracle_concurrency: usize,
    /// Per-call oracle timeout.
    pub oracle_timeout: Duration,
    /// Aborts a questline when failed quests exceed this fraction.
    pub failure_threshold: Fixed,
    /// Keep partially generated questlines on cancellation.
    pub partial_ok: bool,
    /// Restrict a run to these governor ids (testing and reruns).
    pub governor_filter: Option<Vec<u8>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            min_quests: 75,
            max_quests: 125,
            working_set_size: 20,
            grounding_per_quest: 5,
            enochian_bias: Fixed::from_micros(600_000),
            min_authenticity: Fixed::from_micros(800_000),
            retry_budget: 2,
            worker_concurrency: 10,
            oracle_concurrency: 4,
            oracle_timeout: Duration::from_secs(30),
            failure_threshold: Fixed::from_micros(200_000),
            partial_ok: false,
            governor_filter: None,
        }
    }
}

/// A governor whose questline could not be generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedGovernor {
    /// Governor id.
    pub governor_id: u8,
    /// Governor name.
    pub name: String,
    /// Why the questline was skipped.
    pub reason: String,
}

/// Typed diagnostic report for one run. Timestamps live here and only here;
/// the report is not part of the deterministic output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Block height the run was seeded from.
    pub block_height: u64,
    /// Wall-clock start (diagnostics only).
    pub started_at: String,
    /// Wall-clock finish (diagnostics only).
    pub finished_at: String,
    /// Governors considered.
    pub governors_total: usize,
    /// Questlines sealed.
    pub questlines_sealed: usize,
    /// Questlines aborted by the failure threshold.
    pub questlines_aborted: usize,
    /// Governors skipped with their reasons.
    pub governors_skipped: Vec<SkippedGovernor>,
    /// Total quests generated.
    pub quests_generated: u64,
    /// Quests flagged low-authenticity.
    pub low_authenticity_quests: u64,
    /// Quests lost to permanent oracle failures.
    pub oracle_failures: u64,
    /// Mean authenticity across sealed questlines.
    pub mean_authenticity: Fixed,
}

/// Everything a run produces.
#[derive(Debug)]
pub struct GenerationRun {
    /// Sealed and aborted questlines, sorted by governor id.
    pub questlines: Vec<Questline>,
    /// The diagnostic report.
    pub report: RunReport,
}

#[derive(Debug, Default)]
struct Progress {
    governors_completed: AtomicU64,
    quests_completed: AtomicU64,
}

/// The batch generation engine.
#[derive(Clone)]
pub struct QuestGenerator {
    ctx: Arc<CoreContext>,
    oracle: Arc<dyn ContentOracle>,
    config: Arc<GenerationConfig>,
    oracle_gate: Arc<Semaphore>,
    cancel: Arc<AtomicBool>,
    progress: Arc<Progress>,
}

impl QuestGenerator {
    /// Build a generator over a shared context and oracle.
    pub fn new(
        ctx: Arc<CoreContext>,
        oracle: Arc<dyn ContentOracle>,
        config: GenerationConfig,
    ) -> Self {
        let oracle_gate = Arc::new(Semaphore::new(config.oracle_concurrency.max(1)));
        QuestGenerator {
            ctx,
            oracle,
            config: Arc::new(config),
            oracle_gate,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(Progress::default()),
        }
    }

    /// Request cooperative cancellation. Workers stop at the next quest
    /// boundary; partial questlines are discarded unless `partial_ok`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Progress counters: (governors completed, quests completed).
    /// Advisory only; never part of the deterministic output.
    pub fn progress(&self) -> (u64, u64) {
        (
            self.progress.governors_completed.load(Ordering::Relaxed),
            self.progress.quests_completed.load(Ordering::Relaxed),
        )
    }

    /// Generate questlines for every governor at one block height.
    pub async fn run(&self, blocks: &dyn BlockSource, height: u64) -> Result<GenerationRun> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let block = blocks.get_block(height).await?;
        let block_seed = Seed256::for_block(&block);
        log::info!("Generation run seeded from block {} ({})", height, block_seed);

        let governor_ids: Vec<u8> = match &self.config.governor_filter {
            Some(filter) => filter.clone(),
            None => self.ctx.governors.iter().map(|g| g.governor_id).collect(),
        };

        let worker_gate = Arc::new(Semaphore::new(self.config.worker_concurrency.max(1)));
        let mut tasks: JoinSet<(u8, Result<Questline>)> = JoinSet::new();
        for governor_id in governor_ids.iter().copied() {
            let generator = self.clone();
            let worker_gate = Arc::clone(&worker_gate);
            tasks.spawn(async move {
                let _permit = worker_gate.acquire_owned().await.expect("pool closed");
                let outcome = generator.generate_questline(governor_id, block_seed).await;
                generator
                    .progress
                    .governors_completed
                    .fetch_add(1, Ordering::Relaxed);
                (governor_id, outcome)
            });
        }

        let mut questlines = Vec::new();
        let mut skipped = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (governor_id, outcome) = joined.map_err(|e| EnochianError::Generation {
                reason: format!("questline worker panicked: {}", e),
            })?;
            match outcome {
                Ok(questline) => questlines.push(questline),
                Err(error) => {
                    let name = self
                        .ctx
                        .governors
                        .get(governor_id)
                        .map(|g| g.name.clone())
                        .unwrap_or_default();
                    log::warn!("Skipping governor {} ({}): {}", governor_id, name, error);
                    skipped.push(SkippedGovernor {
                        governor_id,
                        name,
                        reason: error.to_string(),
                    });
                }
            }
        }

        // Emission order is by governor id, regardless of completion order.
        questlines.sort_by_key(|q| q.governor_id);
        skipped.sort_by_key(|s| s.governor_id);

        let sealed: Vec<&Questline> = questlines
            .iter()
            .filter(|q| q.state == QuestlineState::Sealed)
            .collect();
        let mean_authenticity = if sealed.is_empty() {
            Fixed::ZERO
        } else {
            sealed.iter().map(|q| q.avg_authenticity).sum::<Fixed>()
                / Fixed::from_int(sealed.len() as i64)
        };

        let report = RunReport {
            block_height: height,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            governors_total: governor_ids.len(),
            questlines_sealed: sealed.len(),
            questlines_aborted: questlines
                .iter()
                .filter(|q| q.state == QuestlineState::Aborted)
                .count(),
            governors_skipped: skipped,
            quests_generated: questlines.iter().map(|q| q.quests.len() as u64).sum(),
            low_authenticity_quests: questlines
                .iter()
                .flat_map(|q| &q.quests)
                .filter(|q| q.low_authenticity)
                .count() as u64,
            oracle_failures: questlines.iter().map(|q| q.failures.len() as u64).sum(),
            mean_authenticity,
        };
        log::info!(
            "Run complete: {} sealed, {} aborted, {} skipped, {} quests",
            report.questlines_sealed,
            report.questlines_aborted,
            report.governors_skipped.len(),
            report.quests_generated
        );

        Ok(GenerationRun { questlines, report })
    }

    /// Generate one governor's questline from the block seed.
    pub async fn generate_questline(
        &self,
        governor_id: u8,
        block_seed: Seed256,
    ) -> Result<Questline> {
        let governor = self
            .ctx
            .governors
            .get(governor_id)
            .ok_or(EnochianError::GovernorNotFound { governor_id })?;

        let seed0 = block_seed.subseed(&(governor_id as u32).to_le_bytes());
        let planned =
            seed0.range(self.config.min_quests as u64, self.config.max_quests as u64) as u32;

        let query = RetrievalQuery {
            domain: governor.domain,
            affinity: governor.affinity.clone(),
            enochian_bias: self.config.enochian_bias,
            min_authenticity: self.config.min_authenticity,
        };
        let ranked = self
            .ctx
            .lighthouse
            .weighted_retrieve(&query, self.config.working_set_size)?;
        let working_set: Vec<&KnowledgeEntry> = ranked
            .iter()
            .map(|r| {
                self.ctx
                    .lighthouse
                    .get(&r.entry_id)
                    .expect("retrieved entry exists in the index")
            })
            .collect();

        log::debug!(
            "Governor {} ({}): {} quests planned over a working set of {}",
            governor.name,
            governor.domain,
            planned,
            working_set.len()
        );

        let mut quests = Vec::with_capacity(planned as usize);
        let mut failures = Vec::new();
        let mut used_refs: Vec<bool> = vec![false; working_set.len()];

        for index in 1..=planned {
            if self.cancel.load(Ordering::SeqCst) {
                if self.config.partial_ok {
                    log::warn!(
                        "Cancelled during governor {}; keeping {} partial quests",
                        governor.name,
                        quests.len()
                    );
                    break;
                }
                return Err(EnochianError::Cancelled);
            }

            let seed = seed0.subseed(&index.to_le_bytes());
            let sample = sample_without_replacement(
                &seed,
                working_set.len(),
                self.config.grounding_per_quest,
            );
            let grounding: Vec<&KnowledgeEntry> =
                sample.iter().map(|&i| working_set[i]).collect();
            let difficulty = seed.range(3, 8) as u8;

            match self
                .author_quest(governor, &grounding, difficulty, seed)
                .await
            {
                Ok((draft, score, low_authenticity)) => {
                    for &i in &sample {
                        used_refs[i] = true;
                    }
                    let quest = assemble_quest(
                        governor_id,
                        index,
                        &block_seed,
                        draft,
                        &grounding,
                        difficulty,
                        score,
                        low_authenticity,
                    );
                    if low_authenticity {
                        // Retained with the flag; surfaced through the report.
                        log::warn!(
                            "{}",
                            EnochianError::LowAuthenticity {
                                quest_id: quest.quest_id.clone(),
                                score,
                            }
                        );
                    }
                    quests.push(quest);
                    self.progress
                        .quests_completed
                        .fetch_add(1, Ordering::Relaxed);
                }
                Err(error @ EnochianError::OraclePermanent { .. }) => {
                    log::warn!(
                        "Quest {} of governor {} lost to the oracle: {}",
                        index,
                        governor.name,
                        error
                    );
                    failures.push(QuestFailure {
                        index,
                        reason: error.to_string(),
                    });
                }
                Err(other) => return Err(other),
            }
        }

        Ok(assemble_questline(
            governor,
            planned,
            quests,
            failures,
            &ranked,
            &working_set,
            &used_refs,
            self.config.failure_threshold,
        ))
    }

    /// Author one quest: oracle call with transient retries, then the
    /// score-refine loop. Retries never alter seed derivation.
    async fn author_quest(
        &self,
        governor: &Governor,
        grounding: &[&KnowledgeEntry],
        difficulty: u8,
        seed: Seed256,
    ) -> Result<(QuestDraft, Fixed, bool)> {
        let ctx = OracleContext {
            governor,
            grounding: grounding.to_vec(),
            difficulty,
            seed,
        };

        let mut draft = self.call_oracle(&ctx, Directive::Create).await?;
        let mut components = authenticity::score(&draft, grounding, &self.ctx.sources);
        let mut refinements = 0u32;
        while components.final_score < self.config.min_authenticity
            && refinements < self.config.retry_budget
        {
            refinements += 1;
            draft = self.call_oracle(&ctx, Directive::Refine).await?;
            components = authenticity::score(&draft, grounding, &self.ctx.sources);
        }

        let low_authenticity = components.final_score < self.config.min_authenticity;
        Ok((draft, components.final_score, low_authenticity))
    }

    async fn call_oracle(
        &self,
        ctx: &OracleContext<'_>,
        directive: Directive,
    ) -> Result<QuestDraft> {
        let mut attempt = 0u32;
        loop {
            let _permit = self
                .oracle_gate
                .acquire()
                .await
                .expect("oracle gate closed");
            let outcome =
                tokio::time::timeout(self.config.oracle_timeout, self.oracle.author(ctx, directive))
                    .await;
            drop(_permit);

            let error = match outcome {
                Ok(Ok(draft)) => return Ok(draft),
                Ok(Err(error @ EnochianError::OracleTransient { .. })) => error,
                Ok(Err(other)) => return Err(other),
                Err(_elapsed) => EnochianError::OracleTransient {
                    message: format!("oracle timed out after {:?}", self.config.oracle_timeout),
                },
            };

            if attempt >= self.config.retry_budget {
                return Err(EnochianError::OraclePermanent {
                    message: format!("retry budget exhausted: {}", error),
                });
            }
            // Exponential backoff; jitter derives from the quest seed so the
            // schedule is reproducible modulo wall-clock.
            let jitter_seed = ctx.seed.subseed(&[b'b', b'o', attempt as u8]);
            let delay = Duration::from_millis(50u64 << attempt)
                + Duration::from_millis(jitter_seed.range(0, 25));
            log::debug!("Oracle transient ({}); retrying in {:?}", error, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

// Partial Fisher-Yates over the working set, driven by the LCG stream.
fn sample_without_replacement(seed: &Seed256, pool: usize, k: usize) -> Vec<usize> {
    let k = k.min(pool);
    let mut indices: Vec<usize> = (0..pool).collect();
    let stream = seed.subseed(b"grounding").sequence(k);
    for (step, draw) in stream.into_iter().enumerate() {
        let j = step + (draw as usize) % (pool - step);
        indices.swap(step, j);
    }
    let mut sample = indices[..k].to_vec();
    // Grounding is ordered by retrieval rank, not by draw order.
    sample.sort_unstable();
    sample
}

#[allow(clippy::too_many_arguments)]
fn assemble_quest(
    governor_id: u8,
    index: u32,
    block_seed: &Seed256,
    draft: QuestDraft,
    grounding: &[&KnowledgeEntry],
    difficulty: u8,
    authenticity_score: Fixed,
    low_authenticity: bool,
) -> Quest {
    // Enochian primacy: `enochian` leads the ordered refs.
    let mut tradition_refs = vec![crate::traditions::Tradition::Enochian];
    for tradition in &draft.tradition_refs {
        if !tradition_refs.contains(tradition) {
            tradition_refs.push(*tradition);
        }
    }

    let content_digest = Quest::content_digest(&draft);
    Quest {
        quest_id: Quest::deterministic_id(governor_id, index, block_seed),
        title: draft.title,
        description: draft.description,
        objectives: draft.objectives,
        wisdom_focus: draft.wisdom_focus,
        tradition_refs,
        grounding_entry_ids: grounding.iter().map(|e| e.entry_id.clone()).collect(),
        difficulty,
        enochian_invocation: draft.enochian_invocation,
        authenticity_score,
        content_digest,
        low_authenticity,
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_questline(
    governor: &Governor,
    planned: u32,
    quests: Vec<Quest>,
    failures: Vec<QuestFailure>,
    ranked: &[crate::lighthouse::Ranked],
    working_set: &[&KnowledgeEntry],
    used_refs: &[bool],
    failure_threshold: Fixed,
) -> Questline {
    let avg_authenticity = if quests.is_empty() {
        Fixed::ZERO
    } else {
        quests.iter().map(|q| q.authenticity_score).sum::<Fixed>()
            / Fixed::from_int(quests.len() as i64)
    };

    // Union of grounding ids in retrieval-rank order.
    let mut lighthouse_refs = Vec::new();
    let mut enochian_refs = 0usize;
    for (position, ranked_entry) in ranked.iter().enumerate() {
        if used_refs[position] {
            if ranked_entry.enochian {
                enochian_refs += 1;
            }
            lighthouse_refs.push(ranked_entry.entry_id.clone());
        }
    }
    let enochian_fraction = if lighthouse_refs.is_empty() {
        Fixed::ZERO
    } else {
        Fixed::from_ratio(enochian_refs as i64, lighthouse_refs.len() as i64)
    };

    let coverage_floor = Fixed::from_micros(200_000);
    let mut domain_coverage = std::collections::BTreeMap::new();
    for quest in &quests {
        let grounding: Vec<&&KnowledgeEntry> = working_set
            .iter()
            .filter(|e| quest.grounding_entry_ids.contains(&e.entry_id))
            .collect();
        for domain in crate::governors::ALL_DOMAINS {
            let touched = grounding
                .iter()
                .any(|entry| entry.relevance(domain) >= coverage_floor);
            if touched {
                *domain_coverage.entry(domain).or_insert(0u32) += 1;
            }
        }
    }

    let failure_rate = Fixed::from_ratio(failures.len() as i64, planned.max(1) as i64);
    let state = if failure_rate > failure_threshold {
        log::warn!(
            "Questline for governor {} aborted: failure rate {}",
            governor.name,
            failure_rate
        );
        QuestlineState::Aborted
    } else {
        QuestlineState::Sealed
    };

    Questline {
        governor_id: governor.governor_id,
        governor_name: governor.name.clone(),
        planned_quests: planned,
        quests,
        avg_authenticity,
        enochian_fraction,
        domain_coverage,
        lighthouse_refs,
        failures,
        state,
    }
}
