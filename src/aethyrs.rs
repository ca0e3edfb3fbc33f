//! The 30 Aethyrs
//!
//! Aethyr names come from `aethyrs.json` rather than a hardcoded table; the
//! historical lists disagree on spellings, so the canonical file is the one
//! authority. TEX is always tier 1 and uniquely holds four governors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::canonical;
use crate::{EnochianError, Result};

/// Number of Aethyrs.
pub const AETHYR_COUNT: usize = 30;

/// Number of Governor Angels across all Aethyrs: 4 in TEX, 3 in each other.
pub const GOVERNOR_COUNT: usize = 91;

/// One Aethyr. The tier equals the id: TEX is 1, the lowest is 30.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aethyr {
    /// Aethyr id in 1..=30.
    pub aethyr_id: u8,
    /// Canonical name.
    pub name: String,
    /// Tier (equal to the id).
    pub tier: u8,
}

impl Aethyr {
    /// How many governors this Aethyr holds.
    pub fn capacity(&self) -> usize {
        if self.aethyr_id == 1 {
            4
        } else {
            3
        }
    }
}

/// Ordered map of the 30 Aethyrs.
#[derive(Debug, Clone)]
pub struct AethyrMap {
    aethyrs: Vec<Aethyr>,
}

impl AethyrMap {
    /// Build from the canonical 30-name list (tier order, TEX first).
    pub fn from_names(names: Vec<String>) -> Result<Self> {
        if names.len() != AETHYR_COUNT {
            return Err(EnochianError::DistributionInvariantViolated {
                details: format!("expected {} aethyr names, found {}", AETHYR_COUNT, names.len()),
            });
        }
        if names[0] != "TEX" {
            return Err(EnochianError::DistributionInvariantViolated {
                details: format!("aethyr 1 must be TEX, found {}", names[0]),
            });
        }
        let distinct: BTreeSet<&String> = names.iter().collect();
        if distinct.len() != names.len() {
            return Err(EnochianError::DistributionInvariantViolated {
                details: "duplicate aethyr names".to_string(),
            });
        }
        let aethyrs = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Aethyr {
                aethyr_id: (i + 1) as u8,
                name,
                tier: (i + 1) as u8,
            })
            .collect();
        Ok(AethyrMap { aethyrs })
    }

    /// Load the canonical `aethyrs.json` (a JSON array of 30 names).
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let names: Vec<String> = canonical::decode_verified(&bytes, path)?;
        let map = Self::from_names(names)?;
        log::info!("Loaded {} aethyrs from {}", map.aethyrs.len(), path.display());
        Ok(map)
    }

    /// Look up by id (1..=30).
    pub fn get(&self, aethyr_id: u8) -> Option<&Aethyr> {
        if (1..=AETHYR_COUNT as u8).contains(&aethyr_id) {
            self.aethyrs.get(aethyr_id as usize - 1)
        } else {
            None
        }
    }

    /// All Aethyrs in tier order.
    pub fn iter(&self) -> impl Iterator<Item = &Aethyr> {
        self.aethyrs.iter()
    }

    /// Total governor capacity: 4 + 29 * 3 = 91.
    pub fn total_capacity(&self) -> usize {
        self.aethyrs.iter().map(Aethyr::capacity).sum()
    }
}

/// The traditional 30 names, TEX first. Test and fixture use; deployments
/// load `aethyrs.json`.
pub fn traditional_names() -> Vec<String> {
    [
        "TEX", "RII", "BAG", "ZAA", "DES", "VTI", "NIA", "TOR", "LIN", "ASP", "CHR", "POP", "ZEN",
        "TAN", "LEA", "OXO", "UTA", "ZIM", "LOE", "ICH", "ZAX", "ZIP", "ZID", "DEO", "MAZ", "LIT",
        "PAZ", "ZOM", "ARN", "LIL",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
