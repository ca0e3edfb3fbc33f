//! Bitcoin-derived deterministic entropy
//!
//! Every random-looking choice in the core is a pure function of a block's
//! metadata. Seeds derive from H(block_hash ∥ merkle_root ∥ nonce ∥ timestamp)
//! and chain through labeled subseeds, so a fixed block reproduces the same
//! questlines on every node.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::canonical::{hash_fields, Digest};
use crate::fixed::Fixed;
use crate::{EnochianError, Result};

// LCG parameters shared across platforms (Numerical Recipes constants).
const LCG_A: u32 = 1_664_525;
const LCG_C: u32 = 1_013_904_223;

/// Block metadata consumed by the entropy source.
///
/// The provider behind this record is an external collaborator; the core
/// never talks to a Bitcoin node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Block height.
    pub height: u64,
    /// Block hash.
    pub hash: [u8; 32],
    /// Transaction merkle root.
    pub merkle_root: [u8; 32],
    /// Block nonce.
    pub nonce: u32,
    /// Block timestamp (consensus time, not wall-clock).
    pub timestamp: u32,
}

/// 256-bit deterministic seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed256([u8; 32]);

impl Seed256 {
    /// Wrap raw seed bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Seed256(bytes)
    }

    /// Raw seed bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the seed for a block: H(hash ∥ merkle_root ∥ nonce_be ∥ timestamp_be).
    pub fn for_block(block: &BlockMetadata) -> Self {
        let digest = hash_fields(&[
            &block.hash,
            &block.merkle_root,
            &block.nonce.to_be_bytes(),
            &block.timestamp.to_be_bytes(),
        ]);
        Seed256(*digest.as_bytes())
    }

    /// Derive a labeled child seed: H(seed ∥ label).
    pub fn subseed(&self, label: &[u8]) -> Seed256 {
        let digest = hash_fields(&[&self.0, label]);
        Seed256(*digest.as_bytes())
    }

    /// Uniform integer in `[lo, hi]` (both bounds inclusive).
    pub fn range(&self, lo: u64, hi: u64) -> u64 {
        debug_assert!(lo <= hi);
        let span = hi - lo + 1;
        lo + self.lead_u64() % span
    }

    /// Pick one element of a non-empty slice.
    pub fn choice<'a, T>(&self, items: &'a [T]) -> &'a T {
        debug_assert!(!items.is_empty());
        &items[self.range(0, items.len() as u64 - 1) as usize]
    }

    /// Uniform value in `[0, 1)` as a fixed-point rational.
    ///
    /// Derived as uint64 / 2^64 in integer math; IEEE-754 never participates.
    pub fn float01(&self) -> Fixed {
        let scaled = (self.lead_u64() as u128 * crate::fixed::SCALE as u128) >> 64;
        Fixed::from_micros(scaled as i64)
    }

    /// Deterministic LCG stream (a=1664525, c=1013904223, m=2^32) fed by the
    /// lower 32 bits of the seed. Reproducible across platforms.
    pub fn sequence(&self, n: usize) -> Vec<u32> {
        let mut state = u32::from_be_bytes([self.0[28], self.0[29], self.0[30], self.0[31]]);
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            state = state.wrapping_mul(LCG_A).wrapping_add(LCG_C);
            out.push(state);
        }
        out
    }

    /// Digest view of the seed (for logging and ids).
    pub fn digest(&self) -> Digest {
        Digest(self.0)
    }

    fn lead_u64(&self) -> u64 {
        u64::from_be_bytes(self.0[..8].try_into().expect("seed is 32 bytes"))
    }
}

impl fmt::Display for Seed256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Collaborator interface for block metadata.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch metadata for one block. Absent metadata is a typed failure;
    /// the core never substitutes wall-clock entropy.
    async fn get_block(&self, height: u64) -> Result<BlockMetadata>;
}

/// Block source backed by a fixed table of reference blocks.
///
/// Ships with the pinned mainnet reference blocks used for offline
/// deterministic generation; production deployments swap in an RPC-backed
/// provider behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct FixedBlockSource {
    blocks: BTreeMap<u64, BlockMetadata>,
}

impl FixedBlockSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source preloaded with the reference blocks 850000..850002.
    pub fn with_reference_blocks() -> Self {
        let mut source = Self::new();
        source.insert(reference_block(
            850_000,
            "00000000000000000002a7c4c1e48d76c5a37902165a270156b7a8d72728a054",
            "a1b2c3d4e5f6789012345678901234567890abcdef1234567890abcdef123456",
            1_234_567_890,
            1_718_841_600,
        ));
        source.insert(reference_block(
            850_001,
            "00000000000000000003b8d5d2f59e87d6b48a03276b381267c8b9e83839b165",
            "b2c3d4e5f6789012345678901234567890abcdef1234567890abcdef12345670",
            2_345_678_901,
            1_718_842_200,
        ));
        source.insert(reference_block(
            850_002,
            "00000000000000000004c9e6e3f6af98e7c59b14387c492378d9caf94949c276",
            "c3d4e5f6789012345678901234567890abcdef1234567890abcdef1234567800",
            3_456_789_012,
            1_718_842_800,
        ));
        source
    }

    /// Register a block.
    pub fn insert(&mut self, block: BlockMetadata) {
        self.blocks.insert(block.height, block);
    }
}

#[async_trait]
impl BlockSource for FixedBlockSource {
    async fn get_block(&self, height: u64) -> Result<BlockMetadata> {
        self.blocks
            .get(&height)
            .copied()
            .ok_or(EnochianError::BlockUnavailable { height })
    }
}

fn reference_block(
    height: u64,
    hash_hex: &str,
    merkle_hex: &str,
    nonce: u32,
    timestamp: u32,
) -> BlockMetadata {
    let mut hash = [0u8; 32];
    let mut merkle_root = [0u8; 32];
    hash.copy_from_slice(&hex::decode(hash_hex).expect("reference block hash"));
    merkle_root.copy_from_slice(&hex::decode(merkle_hex).expect("reference merkle root"));
    BlockMetadata {
        height,
        hash,
        merkle_root,
        nonce,
        timestamp,
    }
}
