//! Override Scope Merger
//!
//! Manual height overrides are registered per configuration scope. The
//! effective map for a stand is rebuilt on each merge, key by key: for every
//! (species, class) the most specific scope defining it wins, and a class only
//! defined at a broader scope stays visible.
//!
//! Precedence: PLOT > PARCEL > FOREST > GLOBAL

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::SpeciesCode;

/// Configuration scope a height override map is registered under
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfigScope {
    Global,
    Forest(String),
    Parcel(String),
    Plot(String),
}

impl ConfigScope {
    /// Higher is more specific
    pub fn specificity(&self) -> u8 {
        match self {
            ConfigScope::Global => 0,
            ConfigScope::Forest(_) => 1,
            ConfigScope::Parcel(_) => 2,
            ConfigScope::Plot(_) => 3,
        }
    }
}

/// species → (diameter class → height m)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeightOverrideMap {
    entries: BTreeMap<SpeciesCode, BTreeMap<u32, f64>>,
}

impl HeightOverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, species: impl Into<SpeciesCode>, class: u32, height_m: f64) {
        self.entries
            .entry(species.into())
            .or_default()
            .insert(class, height_m);
    }

    pub fn with(mut self, species: &str, class: u32, height_m: f64) -> Self {
        self.insert(species, class, height_m);
        self
    }

    pub fn get(&self, species: &SpeciesCode, class: u32) -> Option<f64> {
        self.entries.get(species).and_then(|classes| classes.get(&class)).copied()
    }

    pub fn classes_for(&self, species: &SpeciesCode) -> Option<&BTreeMap<u32, f64>> {
        self.entries.get(species)
    }

    pub fn species(&self) -> impl Iterator<Item = &SpeciesCode> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn layer(&mut self, narrower: &HeightOverrideMap) {
        for (species, classes) in &narrower.entries {
            let target = self.entries.entry(species.clone()).or_default();
            for (class, height) in classes {
                target.insert(*class, *height);
            }
        }
    }
}

/// Merge override layers ordered broadest first
///
/// Later layers win per (species, class) key.
pub fn merge_overrides<'a>(
    layers: impl IntoIterator<Item = &'a HeightOverrideMap>,
) -> HeightOverrideMap {
    let mut merged = HeightOverrideMap::new();
    for layer in layers {
        merged.layer(layer);
    }
    merged
}

/// Override maps registered per scope, as held by the override store
#[derive(Debug, Clone, Default)]
pub struct ScopedHeightOverrides {
    scopes: BTreeMap<ConfigScope, HeightOverrideMap>,
}

impl ScopedHeightOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a map for a scope, merging into any map already there
    pub fn register(&mut self, scope: ConfigScope, map: HeightOverrideMap) {
        self.scopes.entry(scope).or_default().layer(&map);
    }

    pub fn get(&self, scope: &ConfigScope) -> Option<&HeightOverrideMap> {
        self.scopes.get(scope)
    }

    /// Effective map for a stand location
    pub fn effective_for(
        &self,
        forest_id: Option<&str>,
        parcel_id: Option<&str>,
        plot_id: Option<&str>,
    ) -> HeightOverrideMap {
        let chain = [
            Some(ConfigScope::Global),
            forest_id.map(|id| ConfigScope::Forest(id.to_string())),
            parcel_id.map(|id| ConfigScope::Parcel(id.to_string())),
            plot_id.map(|id| ConfigScope::Plot(id.to_string())),
        ];

        let layers: Vec<&HeightOverrideMap> = chain
            .iter()
            .flatten()
            .filter_map(|scope| self.scopes.get(scope))
            .collect();

        tracing::debug!("Merging {} height override layers", layers.len());
        merge_overrides(layers)
    }
}
