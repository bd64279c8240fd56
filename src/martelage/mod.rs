//! Stand-level marking (martelage) statistics
//!
//! - `stats`: immutable result model
//! - `aggregator`: per-species fan-out and stand aggregation

pub mod aggregator;
pub mod stats;

pub use aggregator::{compute_martelage_stats, synthesize_species, StandInput};
pub use stats::{
    ClassDistributionRow, MartelageStats, MissingHeight, QualityDistribution, QualityShare,
    SpecialTreeCount, SpeciesBreakdown, SpeciesFailure, SpeciesOutcome,
};

use crate::config::{InventorySnapshot, PreparedConfig};

/// Full pass over an inventory snapshot: merge overrides for its location,
/// then aggregate
pub fn compute_for_snapshot(
    config: &PreparedConfig,
    snapshot: &InventorySnapshot,
) -> Option<MartelageStats> {
    let overrides = snapshot.effective_overrides(&config.overrides);
    let catalog = snapshot.catalog();
    let input = StandInput {
        stems: &snapshot.stems,
        surface_m2: snapshot.surface_m2,
        selected_species: &snapshot.selected_species,
        catalog: &catalog,
        plausibility: &config.plausibility,
    };
    compute_martelage_stats(&input, &config.params(&overrides))
}
