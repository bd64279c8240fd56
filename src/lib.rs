//! Forestry Synthesis & Cubage Engine
//!
//! Turns raw stem measurements into per-diameter-class, per-species and
//! stand-level dendrometric and economic statistics.
//!
//! - `model/`: stems (tiges) and species (essences)
//! - `classes`: diameter class grid
//! - `cubage/`: basal area, tariff selection, volume models
//! - `heights/`: scoped height overrides and height resolution
//! - `pricing`: price table lookup
//! - `synthesis`: per-species synthesis
//! - `martelage/`: stand aggregation and its result model
//! - `plausibility`: measurement sanity warnings
//! - `config`: JSON configuration and inventory snapshots
//!
//! Every pass is a pure function of its input snapshot.

pub mod classes;
pub mod config;
pub mod cubage;
pub mod error;
pub mod heights;
pub mod martelage;
pub mod model;
pub mod plausibility;
pub mod pricing;
pub mod synthesis;

// Re-export commonly used types
pub use classes::{diameter_class_for, DiameterClassGrid};
pub use config::{EngineConfig, InventorySnapshot, PreparedConfig};
pub use cubage::{
    available_tarif_numbers, compute_g, volume_for_tige, StandardTariffs, TariffMethod,
    TariffSelection, VolumeModel,
};
pub use error::{EngineError, EngineResult};
pub use heights::{merge_overrides, ConfigScope, HeightOverrideMap, HeightResolver};
pub use martelage::{compute_for_snapshot, compute_martelage_stats, MartelageStats, StandInput};
pub use model::{Essence, SpeciesCatalog, SpeciesCode, Tige};
pub use pricing::{PriceLookup, PriceTable};
pub use synthesis::{synthesis_for_essence, EssenceSynthesis, SynthesisParams};
