//! Core context - the explicit handle replacing process-wide singletons
//!
//! Registries are constructed once from immutable source files, validated,
//! and shared by immutable reference for the lifetime of a run. Nothing in
//! the core reaches for module-level mutable state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::aethyrs::AethyrMap;
use crate::canonical;
use crate::governors::GovernorRegistry;
use crate::lighthouse::Lighthouse;
use crate::proofs::AuthenticityBatch;
use crate::quests::Questline;
use crate::sources::SourceRegistry;
use crate::Result;

/// Locations of the immutable registry files.
#[derive(Debug, Clone)]
pub struct RegistryPaths {
    /// `sources.json` - the citation catalog.
    pub sources: PathBuf,
    /// `aethyrs.json` - the canonical 30-name list.
    pub aethyrs: PathBuf,
    /// `governors/` - one profile per governor.
    pub governors_dir: PathBuf,
}

/// Immutable shared state for one run.
#[derive(Debug)]
pub struct CoreContext {
    /// The knowledge index.
    pub lighthouse: Lighthouse,
    /// The citation catalog.
    pub sources: SourceRegistry,
    /// The 30 Aethyrs.
    pub aethyrs: AethyrMap,
    /// The 91 governors.
    pub governors: GovernorRegistry,
}

impl CoreContext {
    /// Assemble and validate a context. Validation failures are fatal;
    /// the core refuses to run on a malformed knowledge base.
    pub fn initialize(
        lighthouse: Lighthouse,
        sources: SourceRegistry,
        aethyrs: AethyrMap,
        governors: GovernorRegistry,
    ) -> Result<Arc<Self>> {
        governors.validate_distribution()?;
        log::info!(
            "Core context initialized: {} entries, {} citations, {} governors across {} aethyrs",
            lighthouse.len(),
            sources.len(),
            governors.len(),
            aethyrs.iter().count(),
        );
        Ok(Arc::new(CoreContext {
            lighthouse,
            sources,
            aethyrs,
            governors,
        }))
    }

    /// Load everything from disk and initialize.
    pub fn load(lighthouse_dir: &Path, registries: &RegistryPaths) -> Result<Arc<Self>> {
        let lighthouse = build_lighthouse(lighthouse_dir)?;
        let (sources, aethyrs, governors) = load_registries(registries)?;
        Self::initialize(lighthouse, sources, aethyrs, governors)
    }
}

/// Build the knowledge index from `<dir>/traditions/*.json`.
pub fn build_lighthouse(dir: &Path) -> Result<Lighthouse> {
    Lighthouse::load(dir)
}

/// Load the source, aethyr, and governor registries.
pub fn load_registries(paths: &RegistryPaths) -> Result<(SourceRegistry, AethyrMap, GovernorRegistry)> {
    let sources = SourceRegistry::load(&paths.sources)?;
    let aethyrs = AethyrMap::load(&paths.aethyrs)?;
    let governors = GovernorRegistry::load_dir(&paths.governors_dir, &aethyrs)?;
    Ok((sources, aethyrs, governors))
}

/// Export questlines as one canonical JSON artifact (emission order).
pub fn write_questlines(path: &Path, questlines: &[Questline]) -> Result<()> {
    debug_assert!(questlines.windows(2).all(|w| w[0].governor_id < w[1].governor_id));
    std::fs::write(path, canonical::to_canonical_json(&questlines)?)?;
    log::info!("Wrote {} questlines to {}", questlines.len(), path.display());
    Ok(())
}

/// Export authenticity batches as one canonical JSON artifact.
pub fn write_batches(path: &Path, batches: &[AuthenticityBatch]) -> Result<()> {
    std::fs::write(path, canonical::to_canonical_json(&batches)?)?;
    log::info!("Wrote {} authenticity batches to {}", batches.len(), path.display());
    Ok(())
}
