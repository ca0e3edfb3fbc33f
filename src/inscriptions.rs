//! Inscription batching under the 1 MiB Ordinals ceiling
//!
//! Payloads are partitioned into segments (one per tradition, or one per
//! questline), packed largest-first against an uncompressed target, then
//! compressed with pinned deflate parameters. A batch whose compressed size
//! still exceeds the ceiling splits its largest segment off and retries;
//! a single segment that cannot fit is reported, never silently dropped.

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use crate::canonical::{self, hash_fields, Digest};
use crate::lighthouse::Lighthouse;
use crate::quests::{Questline, QuestlineState};
use crate::traditions::ALL_TRADITIONS;
use crate::{EnochianError, Result};

/// Hard ceiling on a compressed inscription payload.
pub const MAX_INSCRIPTION_SIZE: usize = 1_048_576;

/// Uncompressed packing target, a safety margin under the ceiling assuming
/// at least 3x compression. Post-compression size is always verified.
pub const TARGET_UNCOMPRESSED: usize = 950_000;

// Pinned compressor parameters; the payload digest depends on them.
const COMPRESSION_LEVEL: u32 = 9;

/// What is being inscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// The knowledge base, one segment per tradition.
    Lighthouse,
    /// Sealed questlines, one segment per governor.
    Questlines,
}

/// One atomic unit of payload (a tradition or a questline).
#[derive(Debug, Clone)]
pub struct Segment {
    /// Stable label (tradition id or governor name).
    pub label: String,
    /// Records inside the segment.
    pub entry_count: u32,
    /// Canonical JSON value of the segment contents.
    pub value: serde_json::Value,
    /// Canonical serialized size in bytes.
    pub size: usize,
}

/// Lifecycle of a batch on its way out.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Assembling,
    Compressed,
    Verified,
    Emitted,
}

/// A sealed, compressed inscription batch.
#[derive(Debug, Clone)]
pub struct InscriptionBatch {
    /// Inscription id, derived from the payload digest.
    pub inscription_id: String,
    /// 1-based position in the run.
    pub sequence_no: u32,
    /// Total batches in the run.
    pub total: u32,
    /// Segment labels inside this batch.
    pub traditions_in_batch: Vec<String>,
    /// Records inside this batch.
    pub entry_count: u32,
    /// Canonical payload size before compression.
    pub uncompressed_size: u64,
    /// Payload size after compression.
    pub compressed_size: u64,
    /// Digest of the compressed payload.
    pub payload_digest: Digest,
    /// Ids of the sibling batches in the same run.
    pub cross_batch_refs: Vec<String>,
    /// Lifecycle state.
    pub state: BatchState,
    /// The compressed payload bytes (exclusively owned).
    pub payload: Vec<u8>,
}

/// Sidecar metadata written next to each payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InscriptionMeta {
    /// Inscription id.
    pub inscription_id: String,
    /// 1-based position in the run.
    pub sequence_no: u32,
    /// Total batches in the run.
    pub total: u32,
    /// Segment labels.
    pub traditions_in_batch: Vec<String>,
    /// Records inside the batch.
    pub entry_count: u32,
    /// Size before compression.
    pub uncompressed_size: u64,
    /// Size after compression.
    pub compressed_size: u64,
    /// Hex digest of the payload.
    pub payload_digest: Digest,
    /// Sibling batch ids.
    pub cross_batch_refs: Vec<String>,
}

/// Outcome of an inscription run: the sealed batches plus any segments that
/// could not fit the ceiling even alone.
#[derive(Debug)]
pub struct InscriptionRun {
    /// Sealed batches in sequence order.
    pub batches: Vec<InscriptionBatch>,
    /// Labels of irreducibly oversize segments.
    pub oversize: Vec<String>,
}

impl InscriptionRun {
    /// The typed failures for the oversize segments (one per label).
    pub fn oversize_errors(&self) -> Vec<EnochianError> {
        self.oversize
            .iter()
            .map(|label| EnochianError::IrreducibleOversizeTradition {
                tradition_id: label.clone(),
            })
            .collect()
    }
}

// Canonical shape of a batch payload before compression.
#[derive(Debug, Serialize, Deserialize)]
struct BatchPayload {
    segments: BTreeMap<String, serde_json::Value>,
}

/// Build the lighthouse segments (one per tradition).
pub fn lighthouse_segments(lighthouse: &Lighthouse) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for tradition in ALL_TRADITIONS {
        let file = lighthouse.tradition_file(tradition);
        let value = serde_json::to_value(&file)?;
        let size = canonical::to_canonical_json(&value)?.len();
        segments.push(Segment {
            label: tradition.id().to_string(),
            entry_count: file.entries.len() as u32,
            value,
            size,
        });
    }
    Ok(segments)
}

/// Build the questline segments (one per sealed questline).
pub fn questline_segments(questlines: &[Questline]) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for questline in questlines {
        if questline.state != QuestlineState::Sealed {
            continue;
        }
        let value = serde_json::to_value(questline)?;
        let size = canonical::to_canonical_json(&value)?.len();
        segments.push(Segment {
            label: questline.governor_name.clone(),
            entry_count: questline.quests.len() as u32,
            value,
            size,
        });
    }
    Ok(segments)
}

/// Inscribe the knowledge base, one segment per tradition.
pub fn inscribe_lighthouse(lighthouse: &Lighthouse) -> Result<InscriptionRun> {
    inscribe(lighthouse_segments(lighthouse)?, PayloadKind::Lighthouse)
}

/// Inscribe sealed questlines, one segment per governor.
pub fn inscribe_questlines(questlines: &[Questline]) -> Result<InscriptionRun> {
    inscribe(questline_segments(questlines)?, PayloadKind::Questlines)
}

/// Partition segments into compressed batches within the ceiling.
pub fn inscribe(mut segments: Vec<Segment>, kind: PayloadKind) -> Result<InscriptionRun> {
    log::info!(
        "Inscribing {} segments ({:?}), {} bytes uncompressed",
        segments.len(),
        kind,
        segments.iter().map(|s| s.size).sum::<usize>()
    );

    // Largest first, stable on label for equal sizes.
    segments.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.label.cmp(&b.label)));

    // Pack against the uncompressed target.
    let mut groups: Vec<Vec<Segment>> = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut current_size = 0usize;
    for segment in segments {
        if !current.is_empty() && current_size + segment.size > TARGET_UNCOMPRESSED {
            groups.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += segment.size;
        current.push(segment);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    // Seal each group, re-splitting while the compressed invariant fails.
    let mut sealed: Vec<SealedGroup> = Vec::new();
    let mut oversize: Vec<String> = Vec::new();
    let mut queue: Vec<Vec<Segment>> = groups;
    while let Some(group) = queue.pop() {
        let candidate = seal_group(&group)?;
        if candidate.compressed.len() <= MAX_INSCRIPTION_SIZE {
            sealed.push(candidate);
            continue;
        }
        if group.len() == 1 {
            let label = group[0].label.clone();
            log::error!(
                "Segment {} is irreducibly oversize: {} bytes compressed",
                label,
                candidate.compressed.len()
            );
            oversize.push(label);
            continue;
        }
        // Split the largest segment into its own batch and retry the rest.
        let mut rest = group;
        let largest = rest
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.size.cmp(&b.size).then_with(|| b.label.cmp(&a.label)))
            .map(|(i, _)| i)
            .expect("group is non-empty");
        let split = rest.remove(largest);
        log::warn!(
            "Batch over ceiling after compression; splitting off segment {}",
            split.label
        );
        queue.push(vec![split]);
        queue.push(rest);
    }

    // Deterministic emission order regardless of the re-split order.
    sealed.sort_by(|a, b| a.labels.cmp(&b.labels));
    oversize.sort();

    let total = sealed.len() as u32;
    let ids: Vec<String> = sealed
        .iter()
        .enumerate()
        .map(|(i, group)| {
            format!(
                "insc-{:04}-{}",
                i as u32 + 1,
                &group.payload_digest.to_hex()[..16]
            )
        })
        .collect();

    let batches = sealed
        .into_iter()
        .enumerate()
        .map(|(i, group)| {
            let cross_batch_refs = ids
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, id)| id.clone())
                .collect();
            InscriptionBatch {
                inscription_id: ids[i].clone(),
                sequence_no: i as u32 + 1,
                total,
                traditions_in_batch: group.labels,
                entry_count: group.entry_count,
                uncompressed_size: group.uncompressed_size as u64,
                compressed_size: group.compressed.len() as u64,
                payload_digest: group.payload_digest,
                cross_batch_refs,
                state: BatchState::Emitted,
                payload: group.compressed,
            }
        })
        .collect();

    Ok(InscriptionRun { batches, oversize })
}

struct SealedGroup {
    labels: Vec<String>,
    entry_count: u32,
    uncompressed_size: usize,
    payload_digest: Digest,
    compressed: Vec<u8>,
}

fn seal_group(group: &[Segment]) -> Result<SealedGroup> {
    let mut labels: Vec<String> = group.iter().map(|s| s.label.clone()).collect();
    labels.sort();
    let payload = BatchPayload {
        segments: group
            .iter()
            .map(|s| (s.label.clone(), s.value.clone()))
            .collect(),
    };
    let canonical_bytes = canonical::to_canonical_json(&payload)?;
    let compressed = compress(&canonical_bytes)?;
    let payload_digest = hash_fields(&[&compressed]);
    Ok(SealedGroup {
        labels,
        entry_count: group.iter().map(|s| s.entry_count).sum(),
        uncompressed_size: canonical_bytes.len(),
        payload_digest,
        compressed,
    })
}

/// Compress with the pinned deterministic parameters.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(COMPRESSION_LEVEL));
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Decompress a payload.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

impl InscriptionBatch {
    /// Sidecar metadata record.
    pub fn meta(&self) -> InscriptionMeta {
        InscriptionMeta {
            inscription_id: self.inscription_id.clone(),
            sequence_no: self.sequence_no,
            total: self.total,
            traditions_in_batch: self.traditions_in_batch.clone(),
            entry_count: self.entry_count,
            uncompressed_size: self.uncompressed_size,
            compressed_size: self.compressed_size,
            payload_digest: self.payload_digest,
            cross_batch_refs: self.cross_batch_refs.clone(),
        }
    }

    /// Write `<seq>-<digest>.bin` and its `.meta.json` sidecar.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let stem = format!("{}-{}", self.sequence_no, self.payload_digest.to_hex());
        std::fs::write(dir.join(format!("{}.bin", stem)), &self.payload)?;
        std::fs::write(
            dir.join(format!("{}.meta.json", stem)),
            canonical::to_canonical_json(&self.meta())?,
        )?;
        Ok(())
    }

    /// Decompress, re-canonicalize, recompress, and compare digests.
    pub fn verify_round_trip(&self) -> Result<()> {
        let decompressed = decompress(&self.payload)?;
        let payload: BatchPayload = canonical::from_canonical_json(&decompressed)?;
        let recompressed = compress(&canonical::to_canonical_json(&payload)?)?;
        let digest = hash_fields(&[&recompressed]);
        if digest != self.payload_digest {
            return Err(EnochianError::CanonicalEncodingMismatch {
                origin: self.inscription_id.clone(),
            });
        }
        Ok(())
    }
}
