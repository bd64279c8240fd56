//! Price table lookup (€/m³)
//!
//! Prices are keyed by species and either a diameter-class range or a per-stem
//! volume range. Entries for a species are tried in declaration order, then the
//! wildcard (`*`) entries.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::model::SpeciesCode;

pub const ANY_SPECIES: &str = "*";

/// Price source consumed by the synthesizer
pub trait PriceLookup: Send + Sync {
    /// €/m³ for one stem, `None` when no entry matches
    fn price_per_m3(&self, species: &SpeciesCode, class: u32, stem_volume_m3: f64) -> Option<f64>;
}

/// What a price entry ranges over; upper bounds are inclusive, `None` is open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum PriceBasis {
    DiameterClass { min: u32, max: Option<u32> },
    UnitVolume { min_m3: f64, max_m3: Option<f64> },
}

impl PriceBasis {
    fn matches(&self, class: u32, stem_volume_m3: f64) -> bool {
        match self {
            PriceBasis::DiameterClass { min, max } => {
                class >= *min && max.map_or(true, |m| class <= m)
            }
            PriceBasis::UnitVolume { min_m3, max_m3 } => {
                stem_volume_m3 >= *min_m3 && max_m3.map_or(true, |m| stem_volume_m3 <= m)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub species: SpeciesCode,
    #[serde(flatten)]
    pub basis: PriceBasis,
    pub eur_per_m3: f64,
}

/// In-memory price table
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    by_species: FxHashMap<SpeciesCode, Vec<PriceEntry>>,
}

impl PriceTable {
    pub fn new(entries: impl IntoIterator<Item = PriceEntry>) -> Self {
        let mut by_species: FxHashMap<SpeciesCode, Vec<PriceEntry>> = FxHashMap::default();
        for entry in entries {
            if !(entry.eur_per_m3.is_finite() && entry.eur_per_m3 >= 0.0) {
                tracing::warn!(
                    "Skipping price entry for {} with invalid price {}",
                    entry.species,
                    entry.eur_per_m3
                );
                continue;
            }
            by_species.entry(entry.species.clone()).or_default().push(entry);
        }
        Self { by_species }
    }

    pub fn is_empty(&self) -> bool {
        self.by_species.is_empty()
    }

    fn first_match(&self, species: &SpeciesCode, class: u32, stem_volume_m3: f64) -> Option<f64> {
        self.by_species
            .get(species)?
            .iter()
            .find(|entry| entry.basis.matches(class, stem_volume_m3))
            .map(|entry| entry.eur_per_m3)
    }
}

impl PriceLookup for PriceTable {
    fn price_per_m3(&self, species: &SpeciesCode, class: u32, stem_volume_m3: f64) -> Option<f64> {
        self.first_match(species, class, stem_volume_m3).or_else(|| {
            self.first_match(&SpeciesCode::new(ANY_SPECIES), class, stem_volume_m3)
        })
    }
}
