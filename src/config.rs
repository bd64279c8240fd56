//! Engine configuration and inventory snapshots
//!
//! Both are JSON documents. `EngineConfig::prepare` validates the configuration
//! into typed values once, before any aggregation pass runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::classes::DiameterClassGrid;
use crate::cubage::{StandardTariffs, TariffMethod, TariffSelection, DEFAULT_FORM_COEFFICIENT};
use crate::heights::{
    ConfigScope, HeightModeEntry, HeightModes, HeightOverrideMap, ScopedHeightOverrides,
};
use crate::model::{Essence, SpeciesCatalog, SpeciesCode, Tige};
use crate::plausibility::PlausibilityThresholds;
use crate::pricing::{PriceEntry, PriceTable};
use crate::synthesis::SynthesisParams;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffConfig {
    pub method: TariffMethod,
    #[serde(default)]
    pub numero: Option<u8>,
    #[serde(default)]
    pub species_numeros: BTreeMap<SpeciesCode, u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedOverrideConfig {
    pub scope: ConfigScope,
    pub heights: HeightOverrideMap,
}

/// Range the class grid is extended to cover, in cm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassGridExtent {
    pub min_cm: u32,
    pub max_cm: u32,
}

fn default_form_coefficient() -> f64 {
    DEFAULT_FORM_COEFFICIENT
}

/// Engine configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub class_grid: DiameterClassGrid,
    /// Extends `class_grid` at either edge, keeping the edge steps
    #[serde(default)]
    pub class_grid_extent: Option<ClassGridExtent>,
    pub tariff: TariffConfig,
    #[serde(default = "default_form_coefficient")]
    pub default_form_coefficient: f64,
    #[serde(default)]
    pub height_modes: Vec<HeightModeEntry>,
    #[serde(default)]
    pub height_overrides: Vec<ScopedOverrideConfig>,
    #[serde(default)]
    pub prices: Vec<PriceEntry>,
    #[serde(default)]
    pub plausibility: PlausibilityThresholds,
}

/// Validated configuration, ready to drive aggregation passes
#[derive(Debug, Clone)]
pub struct PreparedConfig {
    pub class_grid: DiameterClassGrid,
    pub tariff: TariffSelection,
    pub volumes: StandardTariffs,
    pub modes: HeightModes,
    pub overrides: ScopedHeightOverrides,
    pub prices: PriceTable,
    pub plausibility: PlausibilityThresholds,
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config: {:?}", path))?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).with_context(|| "Failed to parse engine config JSON")
    }

    pub fn tariff_selection(&self) -> Result<TariffSelection> {
        let mut selection = TariffSelection::new(self.tariff.method, self.tariff.numero)
            .with_context(|| "Invalid tariff selection")?;
        for (species, numero) in &self.tariff.species_numeros {
            selection = selection
                .with_species_numero(species.clone(), *numero)
                .with_context(|| format!("Invalid tariff numero for species {}", species))?;
        }
        Ok(selection)
    }

    pub fn scoped_overrides(&self) -> ScopedHeightOverrides {
        let mut store = ScopedHeightOverrides::new();
        for entry in &self.height_overrides {
            store.register(entry.scope.clone(), entry.heights.clone());
        }
        store
    }

    pub fn effective_class_grid(&self) -> DiameterClassGrid {
        match self.class_grid_extent {
            Some(extent) => self.class_grid.extended_to(extent.min_cm, extent.max_cm),
            None => self.class_grid.clone(),
        }
    }

    /// Validate into typed values
    pub fn prepare(&self) -> Result<PreparedConfig> {
        let tariff = self.tariff_selection()?;
        let volumes = StandardTariffs::new(self.default_form_coefficient)
            .with_context(|| "Invalid default form coefficient")?;

        Ok(PreparedConfig {
            class_grid: self.effective_class_grid(),
            tariff,
            volumes,
            modes: self.height_modes.iter().cloned().collect(),
            overrides: self.scoped_overrides(),
            prices: PriceTable::new(self.prices.iter().cloned()),
            plausibility: self.plausibility,
        })
    }
}

impl PreparedConfig {
    /// Synthesis parameters for one pass, given the merged override map
    pub fn params<'a>(&'a self, effective_overrides: &'a HeightOverrideMap) -> SynthesisParams<'a> {
        SynthesisParams {
            class_grid: &self.class_grid,
            tariff: &self.tariff,
            volumes: &self.volumes,
            prices: &self.prices,
            overrides: effective_overrides,
            modes: &self.modes,
            require_heights: self.tariff.method().requires_height(),
        }
    }
}

/// Stems and species of one stand, as read from the stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub surface_m2: f64,
    #[serde(default)]
    pub forest_id: Option<String>,
    #[serde(default)]
    pub parcel_id: Option<String>,
    #[serde(default)]
    pub plot_id: Option<String>,
    #[serde(default)]
    pub species: Vec<Essence>,
    pub stems: Vec<Tige>,
    #[serde(default)]
    pub selected_species: Vec<SpeciesCode>,
}

impl InventorySnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read inventory snapshot: {:?}", path))?;
        serde_json::from_str(&contents).with_context(|| "Failed to parse inventory snapshot JSON")
    }

    pub fn catalog(&self) -> SpeciesCatalog {
        SpeciesCatalog::new(self.species.iter().cloned())
    }

    /// Overrides in effect at this snapshot's forest/parcel/plot
    pub fn effective_overrides(&self, store: &ScopedHeightOverrides) -> HeightOverrideMap {
        store.effective_for(
            self.forest_id.as_deref(),
            self.parcel_id.as_deref(),
            self.plot_id.as_deref(),
        )
    }
}
