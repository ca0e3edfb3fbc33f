//! Governor Angel registry for the 91 sacred governors
//!
//! Profiles are loaded from `governors/<NAME>.json`; the registry assigns
//! them to Aethyrs with one deterministic rule applied everywhere the
//! assignment is reconstructed: governors sort by canonical name
//! (case-insensitive), TEX takes the first four, then each lower Aethyr
//! takes the next three.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::aethyrs::{AethyrMap, AETHYR_COUNT, GOVERNOR_COUNT};
use crate::canonical;
use crate::fixed::Fixed;
use crate::traditions::Tradition;
use crate::{EnochianError, Result};

/// A governor's primary domain of expertise.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Knowledge,
    Protection,
    Transformation,
    Divination,
    Healing,
    Creation,
    Destruction,
    Communication,
}

/// All domains in canonical order.
pub const ALL_DOMAINS: [Domain; 8] = [
    Domain::Knowledge,
    Domain::Protection,
    Domain::Transformation,
    Domain::Divination,
    Domain::Healing,
    Domain::Creation,
    Domain::Destruction,
    Domain::Communication,
];

impl Domain {
    /// Stable snake_case identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Domain::Knowledge => "knowledge",
            Domain::Protection => "protection",
            Domain::Transformation => "transformation",
            Domain::Divination => "divination",
            Domain::Healing => "healing",
            Domain::Creation => "creation",
            Domain::Destruction => "destruction",
            Domain::Communication => "communication",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// On-disk governor profile (`governors/<NAME>.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorProfile {
    /// Canonical governor name.
    pub name: String,
    /// Primary domain.
    pub domain: Domain,
    /// Affinity vector over traditions, values in [0, 1].
    pub affinity: BTreeMap<Tradition, Fixed>,
}

/// A registered Governor Angel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Governor {
    /// Governor id in 1..=91, assigned in name order.
    pub governor_id: u8,
    /// Canonical name.
    pub name: String,
    /// Assigned Aethyr id.
    pub aethyr_id: u8,
    /// Primary domain.
    pub domain: Domain,
    /// Affinity vector over traditions.
    pub affinity: BTreeMap<Tradition, Fixed>,
}

/// The 91-entry governor table with its Aethyr partition.
#[derive(Debug, Clone)]
pub struct GovernorRegistry {
    governors: Vec<Governor>,
    by_name: BTreeMap<String, u8>,
    by_aethyr: BTreeMap<u8, Vec<u8>>,
}

impl GovernorRegistry {
    /// Assign profiles to Aethyrs with the deterministic distribution rule.
    pub fn assign(mut profiles: Vec<GovernorProfile>, aethyrs: &AethyrMap) -> Result<Self> {
        if profiles.len() != GOVERNOR_COUNT {
            return Err(EnochianError::DistributionInvariantViolated {
                details: format!(
                    "expected {} governor profiles, found {}",
                    GOVERNOR_COUNT,
                    profiles.len()
                ),
            });
        }

        profiles.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        for pair in profiles.windows(2) {
            if pair[0].name.eq_ignore_ascii_case(&pair[1].name) {
                return Err(EnochianError::DistributionInvariantViolated {
                    details: format!("duplicate governor name {}", pair[1].name),
                });
            }
        }

        let mut governors = Vec::with_capacity(GOVERNOR_COUNT);
        let mut by_name = BTreeMap::new();
        let mut by_aethyr: BTreeMap<u8, Vec<u8>> = BTreeMap::new();
        let mut next = profiles.into_iter();

        for aethyr in aethyrs.iter() {
            for _ in 0..aethyr.capacity() {
                let profile = next.next().ok_or_else(|| {
                    EnochianError::DistributionInvariantViolated {
                        details: "governor profiles exhausted during assignment".to_string(),
                    }
                })?;
                let governor_id = (governors.len() + 1) as u8;
                by_name.insert(profile.name.clone(), governor_id);
                by_aethyr
                    .entry(aethyr.aethyr_id)
                    .or_default()
                    .push(governor_id);
                governors.push(Governor {
                    governor_id,
                    name: profile.name,
                    aethyr_id: aethyr.aethyr_id,
                    domain: profile.domain,
                    affinity: profile.affinity,
                });
            }
        }

        let registry = GovernorRegistry {
            governors,
            by_name,
            by_aethyr,
        };
        registry.validate_distribution()?;
        Ok(registry)
    }

    /// Load all `*.json` profiles in a directory and assign them.
    pub fn load_dir(dir: &Path, aethyrs: &AethyrMap) -> Result<Self> {
        let mut profiles = Vec::new();
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|x| x == "json").unwrap_or(false))
            .collect();
        paths.sort();
        for path in paths {
            let bytes = std::fs::read(&path)?;
            let profile: GovernorProfile = canonical::decode_verified(&bytes, &path)?;
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if stem != profile.name {
                return Err(EnochianError::InvalidRecord {
                    id: profile.name,
                    reason: format!("profile file name {} does not match", path.display()),
                });
            }
            profiles.push(profile);
        }
        let registry = Self::assign(profiles, aethyrs)?;
        log::info!(
            "Loaded {} governor profiles from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }

    /// Check the (4, 3 x 29) partition and total count.
    pub fn validate_distribution(&self) -> Result<()> {
        let mut deviations = Vec::new();
        if self.governors.len() != GOVERNOR_COUNT {
            deviations.push(format!(
                "total governors {} != {}",
                self.governors.len(),
                GOVERNOR_COUNT
            ));
        }
        for aethyr_id in 1..=AETHYR_COUNT as u8 {
            let expected = if aethyr_id == 1 { 4 } else { 3 };
            let actual = self.by_aethyr.get(&aethyr_id).map(Vec::len).unwrap_or(0);
            if actual != expected {
                deviations.push(format!(
                    "aethyr {} holds {} governors, expected {}",
                    aethyr_id, actual, expected
                ));
            }
        }
        if deviations.is_empty() {
            Ok(())
        } else {
            Err(EnochianError::DistributionInvariantViolated {
                details: deviations.join("; "),
            })
        }
    }

    /// Governor by id (1..=91).
    pub fn get(&self, governor_id: u8) -> Option<&Governor> {
        if (1..=GOVERNOR_COUNT as u8).contains(&governor_id) {
            self.governors.get(governor_id as usize - 1)
        } else {
            None
        }
    }

    /// Governor by canonical name.
    pub fn get_by_name(&self, name: &str) -> Option<&Governor> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// The fixed governor set of one Aethyr, in id order.
    pub fn governors_in(&self, aethyr_id: u8) -> Vec<&Governor> {
        self.by_aethyr
            .get(&aethyr_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// All governors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Governor> {
        self.governors.iter()
    }

    /// Number of governors.
    pub fn len(&self) -> usize {
        self.governors.len()
    }

    /// True when no governors are registered.
    pub fn is_empty(&self) -> bool {
        self.governors.is_empty()
    }
}
