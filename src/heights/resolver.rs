//! Height Resolver
//!
//! Picks an effective height for stems without a direct measurement.
//! Priority, first match wins:
//!   1. manual override for (species, class)
//!   2. FIXED height mode for (species, class) with a positive value
//!   3. mean of measured heights in the same (species, class)
//!   4. unresolved
//! A stem's own measurement is never replaced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classes::DiameterClassGrid;
use crate::error::{EngineError, EngineResult};
use crate::heights::overrides::HeightOverrideMap;
use crate::model::{SpeciesCode, Tige};

/// Height mode configured for a (species, class)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeightMode {
    Fixed { height_m: f64 },
    Samples,
}

/// One configured height mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightModeEntry {
    pub species: SpeciesCode,
    pub class: u32,
    #[serde(flatten)]
    pub mode: HeightMode,
}

/// (species, class) → height mode
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeightModes {
    entries: BTreeMap<(SpeciesCode, u32), HeightMode>,
}

impl HeightModes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, species: impl Into<SpeciesCode>, class: u32, mode: HeightMode) {
        self.entries.insert((species.into(), class), mode);
    }

    pub fn get(&self, species: &SpeciesCode, class: u32) -> Option<HeightMode> {
        self.entries.get(&(species.clone(), class)).copied()
    }

    /// Positive fixed height for (species, class), if one is configured
    pub fn fixed_height(&self, species: &SpeciesCode, class: u32) -> Option<f64> {
        match self.get(species, class) {
            Some(HeightMode::Fixed { height_m }) if height_m.is_finite() && height_m > 0.0 => {
                Some(height_m)
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<HeightModeEntry> for HeightModes {
    fn from_iter<I: IntoIterator<Item = HeightModeEntry>>(iter: I) -> Self {
        let mut modes = HeightModes::new();
        for entry in iter {
            modes.set(entry.species, entry.class, entry.mode);
        }
        modes
    }
}

/// Where a stem's effective height came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightSource {
    Measured,
    Override,
    Fixed,
    SampleMean,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedHeight {
    pub height_m: f64,
    pub source: HeightSource,
}

/// Height resolution for the stems of one species
///
/// Sample means are computed once at construction from the measured stems.
#[derive(Debug)]
pub struct HeightResolver<'a> {
    species: &'a SpeciesCode,
    overrides: &'a HeightOverrideMap,
    modes: &'a HeightModes,
    sample_means: BTreeMap<u32, f64>,
}

impl<'a> HeightResolver<'a> {
    pub fn new(
        species: &'a SpeciesCode,
        grid: &DiameterClassGrid,
        stems: &[&Tige],
        overrides: &'a HeightOverrideMap,
        modes: &'a HeightModes,
    ) -> Self {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for stem in stems {
            if let Some(h) = stem.measured_height() {
                let slot = sums.entry(grid.class_for(stem.diameter_cm)).or_insert((0.0, 0));
                slot.0 += h;
                slot.1 += 1;
            }
        }
        let sample_means = sums
            .into_iter()
            .map(|(class, (sum, n))| (class, sum / n as f64))
            .collect();

        Self {
            species,
            overrides,
            modes,
            sample_means,
        }
    }

    /// Mean measured height for a class, if any stem there was measured
    pub fn sample_mean(&self, class: u32) -> Option<f64> {
        self.sample_means.get(&class).copied()
    }

    /// Effective height for a stem in `class`
    ///
    /// `Ok(None)` means unresolved. A malformed override is an error.
    pub fn resolve(&self, stem: &Tige, class: u32) -> EngineResult<Option<ResolvedHeight>> {
        if let Some(h) = stem.measured_height() {
            return Ok(Some(ResolvedHeight {
                height_m: h,
                source: HeightSource::Measured,
            }));
        }

        if let Some(h) = self.overrides.get(self.species, class) {
            if !(h.is_finite() && h > 0.0) {
                return Err(EngineError::InvalidHeight {
                    species: self.species.clone(),
                    class,
                    height: h,
                });
            }
            return Ok(Some(ResolvedHeight {
                height_m: h,
                source: HeightSource::Override,
            }));
        }

        if let Some(h) = self.modes.fixed_height(self.species, class) {
            return Ok(Some(ResolvedHeight {
                height_m: h,
                source: HeightSource::Fixed,
            }));
        }

        Ok(self.sample_mean(class).map(|h| ResolvedHeight {
            height_m: h,
            source: HeightSource::SampleMean,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stems() -> Vec<Tige> {
        vec![
            Tige::new("1", "p", "HET", 31.0).with_height(20.0),
            Tige::new("2", "p", "HET", 33.0).with_height(24.0),
            Tige::new("3", "p", "HET", 32.0),
            Tige::new("4", "p", "HET", 52.0),
        ]
    }

    #[test]
    fn test_priority_chain() {
        let grid = DiameterClassGrid::default();
        let het = SpeciesCode::new("HET");
        let stems = stems();
        let refs: Vec<&Tige> = stems.iter().collect();

        let no_overrides = HeightOverrideMap::new();
        let no_modes = HeightModes::new();
        let resolver = HeightResolver::new(&het, &grid, &refs, &no_overrides, &no_modes);

        // Measured stays measured
        let r = resolver.resolve(&stems[0], 30).unwrap().unwrap();
        assert_eq!(r.source, HeightSource::Measured);
        assert_eq!(r.height_m, 20.0);

        // Sample mean of class 30
        let r = resolver.resolve(&stems[2], 30).unwrap().unwrap();
        assert_eq!(r.source, HeightSource::SampleMean);
        assert_relative_eq!(r.height_m, 22.0);

        // Nothing measured in class 50
        assert_eq!(resolver.resolve(&stems[3], 50).unwrap(), None);

        // Fixed mode beats samples
        let mut modes = HeightModes::new();
        modes.set("het", 30, HeightMode::Fixed { height_m: 19.0 });
        let resolver = HeightResolver::new(&het, &grid, &refs, &no_overrides, &modes);
        let r = resolver.resolve(&stems[2], 30).unwrap().unwrap();
        assert_eq!(r.source, HeightSource::Fixed);
        assert_eq!(r.height_m, 19.0);

        // Override beats fixed, but never a measurement
        let overrides = HeightOverrideMap::new().with("HET", 30, 26.0);
        let resolver = HeightResolver::new(&het, &grid, &refs, &overrides, &modes);
        let r = resolver.resolve(&stems[2], 30).unwrap().unwrap();
        assert_eq!(r.source, HeightSource::Override);
        assert_eq!(r.height_m, 26.0);
        assert_eq!(resolver.resolve(&stems[1], 30).unwrap().unwrap().height_m, 24.0);
    }

    #[test]
    fn test_non_positive_fixed_falls_through() {
        let grid = DiameterClassGrid::default();
        let het = SpeciesCode::new("HET");
        let stems = stems();
        let refs: Vec<&Tige> = stems.iter().collect();

        let mut modes = HeightModes::new();
        modes.set("HET", 30, HeightMode::Fixed { height_m: 0.0 });
        modes.set("HET", 50, HeightMode::Samples);
        let overrides = HeightOverrideMap::new();
        let resolver = HeightResolver::new(&het, &grid, &refs, &overrides, &modes);

        let r = resolver.resolve(&stems[2], 30).unwrap().unwrap();
        assert_eq!(r.source, HeightSource::SampleMean);
        assert_eq!(resolver.resolve(&stems[3], 50).unwrap(), None);
    }

    #[test]
    fn test_malformed_override_is_error() {
        let grid = DiameterClassGrid::default();
        let het = SpeciesCode::new("HET");
        let stems = stems();
        let refs: Vec<&Tige> = stems.iter().collect();

        let overrides = HeightOverrideMap::new().with("HET", 50, -3.0);
        let modes = HeightModes::new();
        let resolver = HeightResolver::new(&het, &grid, &refs, &overrides, &modes);
        assert!(matches!(
            resolver.resolve(&stems[3], 50),
            Err(EngineError::InvalidHeight { class: 50, .. })
        ));
    }

    #[test]
    fn test_mode_entries_from_json() {
        let json = r#"[
            {"species": "che", "class": 40, "mode": "FIXED", "height_m": 23.5},
            {"species": "CHE", "class": 45, "mode": "SAMPLES"}
        ]"#;
        let entries: Vec<HeightModeEntry> = serde_json::from_str(json).unwrap();
        let modes: HeightModes = entries.into_iter().collect();
        let che = SpeciesCode::new("CHE");
        assert_eq!(modes.fixed_height(&che, 40), Some(23.5));
        assert_eq!(modes.get(&che, 45), Some(HeightMode::Samples));
        assert_eq!(modes.fixed_height(&che, 45), None);
    }
}
