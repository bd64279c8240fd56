//! Per-Species Synthesizer
//!
//! Aggregates the stems of one species into per-diameter-class rows and
//! species totals. Heights are resolved per stem. A class keeping an
//! unresolved stem always flags the species height-incomplete; its volume is
//! withheld only when the tariff needs heights.
//!
//! Special-category stems never enter the synthesis.

use serde::Serialize;
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::classes::DiameterClassGrid;
use crate::cubage::{
    compute_g, quadratic_mean_diameter, volume_for_tige_with_height, TariffSelection, VolumeModel,
};
use crate::error::EngineResult;
use crate::heights::{HeightModes, HeightOverrideMap, HeightResolver, ResolvedHeight};
use crate::model::{QualityGrade, SpeciesCode, Tige};
use crate::pricing::PriceLookup;

/// Everything the synthesizer needs besides the stems
#[derive(Clone, Copy)]
pub struct SynthesisParams<'a> {
    pub class_grid: &'a DiameterClassGrid,
    pub tariff: &'a TariffSelection,
    pub volumes: &'a dyn VolumeModel,
    pub prices: &'a dyn PriceLookup,
    /// Effective (already merged) manual overrides
    pub overrides: &'a HeightOverrideMap,
    pub modes: &'a HeightModes,
    /// Withhold a class volume while any of its stems has no height
    pub require_heights: bool,
}

/// Cubage of one stem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StemCubage {
    pub id: String,
    pub class: u32,
    pub diameter_cm: f64,
    pub basal_area_m2: f64,
    pub height: Option<ResolvedHeight>,
    pub volume_m3: Option<f64>,
    pub price_eur_per_m3: Option<f64>,
    pub quality: Option<QualityGrade>,
}

/// One diameter class of one species
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSynthesisRow {
    pub class: u32,
    pub count: usize,
    pub basal_area_m2: f64,
    /// `None` while any stem of the class is unresolved
    pub mean_height_m: Option<f64>,
    pub missing_height_count: usize,
    /// `None` when withheld for missing heights
    pub volume_m3: Option<f64>,
    /// `None` when the volume is withheld or no stem found a price
    pub value_eur: Option<f64>,
    pub unpriced_volume_m3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesTotals {
    pub count: usize,
    pub basal_area_m2: f64,
    /// `None` if any class volume is withheld
    pub volume_m3: Option<f64>,
    pub value_eur: Option<f64>,
    pub unpriced_volume_m3: f64,
    /// Basal-area-weighted mean diameter
    pub mean_diameter_cm: Option<f64>,
    pub dg_cm: Option<f64>,
    /// Count-weighted; `None` when height-incomplete
    pub mean_height_m: Option<f64>,
    /// `None` when height-incomplete
    pub lorey_height_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EssenceSynthesis {
    pub species: SpeciesCode,
    pub rows: Vec<ClassSynthesisRow>,
    pub totals: SpeciesTotals,
    /// Some stem is left without a height by every resolution step
    pub height_incomplete: bool,
    pub missing_height_classes: Vec<u32>,
    pub stems: Vec<StemCubage>,
}

impl EssenceSynthesis {
    fn empty(species: SpeciesCode) -> Self {
        Self {
            species,
            rows: Vec::new(),
            totals: SpeciesTotals {
                count: 0,
                basal_area_m2: 0.0,
                volume_m3: Some(0.0),
                value_eur: None,
                unpriced_volume_m3: 0.0,
                mean_diameter_cm: None,
                dg_cm: None,
                mean_height_m: None,
                lorey_height_m: None,
            },
            height_incomplete: false,
            missing_height_classes: Vec::new(),
            stems: Vec::new(),
        }
    }
}

fn mean(sum: f64, n: usize) -> Option<f64> {
    (n > 0).then(|| sum / n as f64)
}

/// Synthesize one species from the stems in scope
///
/// Stems of other species and special-category stems are ignored.
pub fn synthesis_for_essence(
    species: &SpeciesCode,
    stems: &[Tige],
    params: &SynthesisParams<'_>,
) -> EngineResult<EssenceSynthesis> {
    let species_stems: Vec<&Tige> = stems
        .iter()
        .filter(|s| &s.species == species && !s.is_special())
        .collect();

    if species_stems.is_empty() {
        return Ok(EssenceSynthesis::empty(species.clone()));
    }

    let grid = params.class_grid;
    let resolver = HeightResolver::new(species, grid, &species_stems, params.overrides, params.modes);

    // Most classes hold a handful of stems on a plot
    let mut by_class: BTreeMap<u32, SmallVec<[&Tige; 16]>> = BTreeMap::new();
    for stem in species_stems.iter().copied() {
        by_class.entry(grid.class_for(stem.diameter_cm)).or_default().push(stem);
    }

    let mut rows = Vec::with_capacity(by_class.len());
    let mut cubed = Vec::with_capacity(species_stems.len());
    let mut missing_height_classes = Vec::new();

    for (class, class_stems) in by_class {
        let mut row_stems = Vec::with_capacity(class_stems.len());
        for stem in class_stems {
            let height = resolver.resolve(stem, class)?;
            let volume = volume_for_tige_with_height(
                stem,
                height.map(|h| h.height_m),
                params.tariff,
                params.volumes,
            )?;
            row_stems.push(StemCubage {
                id: stem.id.clone(),
                class,
                diameter_cm: stem.diameter_cm,
                basal_area_m2: compute_g(stem.diameter_cm),
                height,
                volume_m3: volume,
                price_eur_per_m3: None,
                quality: stem.quality,
            });
        }

        let missing = row_stems.iter().filter(|s| s.height.is_none()).count();
        let withheld = (params.require_heights && missing > 0)
            || row_stems.iter().any(|s| s.volume_m3.is_none());
        if missing > 0 {
            missing_height_classes.push(class);
        }

        let (height_sum, height_n) = row_stems
            .iter()
            .filter_map(|s| s.height.map(|h| h.height_m))
            .fold((0.0, 0usize), |(sum, n), h| (sum + h, n + 1));

        let mut volume_m3 = None;
        let mut value_eur = None;
        let mut unpriced_volume_m3 = 0.0;
        if !withheld {
            let mut volume_sum = 0.0;
            for stem in row_stems.iter_mut() {
                let v = stem.volume_m3.unwrap_or(0.0);
                volume_sum += v;
                match params.prices.price_per_m3(species, class, v) {
                    Some(price) => {
                        stem.price_eur_per_m3 = Some(price);
                        *value_eur.get_or_insert(0.0) += v * price;
                    }
                    None => unpriced_volume_m3 += v,
                }
            }
            volume_m3 = Some(volume_sum);
        }

        rows.push(ClassSynthesisRow {
            class,
            count: row_stems.len(),
            basal_area_m2: row_stems.iter().map(|s| s.basal_area_m2).sum(),
            mean_height_m: if missing > 0 { None } else { mean(height_sum, height_n) },
            missing_height_count: missing,
            volume_m3,
            value_eur,
            unpriced_volume_m3,
        });
        cubed.extend(row_stems);
    }

    let height_incomplete = !missing_height_classes.is_empty();
    let totals = species_totals(&rows, &cubed, height_incomplete);
    if totals.unpriced_volume_m3 > 0.0 {
        tracing::warn!(
            "No price for {:.3} m³ of {}",
            totals.unpriced_volume_m3,
            species
        );
    }

    tracing::debug!(
        "Synthesized {}: {} stems in {} classes, height incomplete: {}",
        species,
        totals.count,
        rows.len(),
        height_incomplete
    );

    Ok(EssenceSynthesis {
        species: species.clone(),
        rows,
        totals,
        height_incomplete,
        missing_height_classes,
        stems: cubed,
    })
}

/// Mean and Lorey's height stay unknown while any stem of the species is unresolved
fn species_totals(
    rows: &[ClassSynthesisRow],
    stems: &[StemCubage],
    height_incomplete: bool,
) -> SpeciesTotals {
    let count = stems.len();
    let basal_area_m2: f64 = stems.iter().map(|s| s.basal_area_m2).sum();

    let volume_m3 = rows
        .iter()
        .map(|r| r.volume_m3)
        .sum::<Option<f64>>();
    let value_eur = match volume_m3 {
        Some(_) => rows
            .iter()
            .filter_map(|r| r.value_eur)
            .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v)),
        None => None,
    };
    let unpriced_volume_m3 = rows.iter().map(|r| r.unpriced_volume_m3).sum();

    let mean_diameter_cm = (basal_area_m2 > 0.0).then(|| {
        stems.iter().map(|s| s.basal_area_m2 * s.diameter_cm).sum::<f64>() / basal_area_m2
    });

    let (height_sum, height_n, gh_sum, g_with_height) = stems
        .iter()
        .filter_map(|s| s.height.map(|h| (s.basal_area_m2, h.height_m)))
        .fold((0.0, 0usize, 0.0, 0.0), |(hs, n, gh, g), (sg, h)| {
            (hs + h, n + 1, gh + sg * h, g + sg)
        });

    SpeciesTotals {
        count,
        basal_area_m2,
        volume_m3,
        value_eur,
        unpriced_volume_m3,
        mean_diameter_cm,
        dg_cm: quadratic_mean_diameter(basal_area_m2, count),
        mean_height_m: if height_incomplete { None } else { mean(height_sum, height_n) },
        lorey_height_m: (!height_incomplete && g_with_height > 0.0).then(|| gh_sum / g_with_height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubage::{StandardTariffs, TariffMethod};
    use crate::error::EngineError;
    use crate::heights::HeightMode;
    use crate::model::SpecialCategory;
    use crate::pricing::{PriceBasis, PriceEntry, PriceTable};
    use approx::assert_relative_eq;

    struct Fixture {
        grid: DiameterClassGrid,
        tariff: TariffSelection,
        volumes: StandardTariffs,
        prices: PriceTable,
        overrides: HeightOverrideMap,
        modes: HeightModes,
    }

    impl Fixture {
        fn new(method: TariffMethod, numero: Option<u8>) -> Self {
            Self {
                grid: DiameterClassGrid::default(),
                tariff: TariffSelection::new(method, numero).unwrap(),
                volumes: StandardTariffs::default(),
                prices: PriceTable::new(vec![PriceEntry {
                    species: SpeciesCode::new("CHE"),
                    basis: PriceBasis::DiameterClass { min: 35, max: None },
                    eur_per_m3: 100.0,
                }]),
                overrides: HeightOverrideMap::new(),
                modes: HeightModes::new(),
            }
        }

        fn params(&self) -> SynthesisParams<'_> {
            SynthesisParams {
                class_grid: &self.grid,
                tariff: &self.tariff,
                volumes: &self.volumes,
                prices: &self.prices,
                overrides: &self.overrides,
                modes: &self.modes,
                require_heights: self.tariff.method().requires_height(),
            }
        }
    }

    fn oak_stems() -> Vec<Tige> {
        vec![
            Tige::new("1", "p", "CHE", 32.0).with_height(22.0),
            Tige::new("2", "p", "CHE", 34.0),
            Tige::new("3", "p", "CHE", 41.0).with_height(25.0),
            Tige::new("4", "p", "CHE", 44.0),
            Tige::new("5", "p", "HET", 44.0).with_height(28.0),
            Tige::new("6", "p", "CHE", 60.0).with_category(SpecialCategory::BioHeritage),
        ]
    }

    #[test]
    fn test_partition_and_counts() {
        let fx = Fixture::new(TariffMethod::Schaeffer1E, Some(10));
        let che = SpeciesCode::new("CHE");
        let result = synthesis_for_essence(&che, &oak_stems(), &fx.params()).unwrap();

        let classes: Vec<(u32, usize)> = result.rows.iter().map(|r| (r.class, r.count)).collect();
        assert_eq!(classes, vec![(30, 2), (40, 2)]);
        assert_eq!(result.totals.count, 4);
        assert!(!result.height_incomplete);
        assert_eq!(result.stems.len(), 4);
    }

    #[test]
    fn test_one_entry_volumes_and_pricing() {
        let fx = Fixture::new(TariffMethod::Schaeffer1E, Some(10));
        let che = SpeciesCode::new("CHE");
        let result = synthesis_for_essence(&che, &oak_stems(), &fx.params()).unwrap();

        let v = |d: f64| 10.0 * (d - 5.0) * (d - 10.0) / 14_000.0;
        let row30 = &result.rows[0];
        let row40 = &result.rows[1];
        assert_relative_eq!(row30.volume_m3.unwrap(), v(32.0) + v(34.0), epsilon = 1e-12);
        assert_relative_eq!(row40.volume_m3.unwrap(), v(41.0) + v(44.0), epsilon = 1e-12);

        // Class 30 has no price entry: all of it is unpriced, value stays unknown
        assert_eq!(row30.value_eur, None);
        assert_relative_eq!(row30.unpriced_volume_m3, v(32.0) + v(34.0), epsilon = 1e-12);
        assert_relative_eq!(row40.value_eur.unwrap(), (v(41.0) + v(44.0)) * 100.0, epsilon = 1e-9);

        assert_relative_eq!(
            result.totals.volume_m3.unwrap(),
            v(32.0) + v(34.0) + v(41.0) + v(44.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(result.totals.value_eur.unwrap(), row40.value_eur.unwrap());
    }

    #[test]
    fn test_missing_height_withholds_class_volume() {
        let fx = Fixture::new(TariffMethod::Algan, None);
        let che = SpeciesCode::new("CHE");
        let stems = vec![
            Tige::new("1", "p", "CHE", 32.0).with_height(22.0),
            Tige::new("2", "p", "CHE", 34.0),
            Tige::new("3", "p", "CHE", 52.0),
        ];
        let result = synthesis_for_essence(&che, &stems, &fx.params()).unwrap();

        // Class 30 resolves stem 2 from its measured peer; class 50 cannot
        let row30 = &result.rows[0];
        let row50 = &result.rows[1];
        assert_eq!(row30.missing_height_count, 0);
        assert!(row30.volume_m3.is_some());
        assert_eq!(row50.missing_height_count, 1);
        assert_eq!(row50.volume_m3, None);
        assert_eq!(row50.value_eur, None);

        assert!(result.height_incomplete);
        assert_eq!(result.missing_height_classes, vec![50]);
        assert_eq!(result.totals.volume_m3, None);
        assert_eq!(result.totals.value_eur, None);
        // Geometry is unaffected
        assert_relative_eq!(
            result.totals.basal_area_m2,
            compute_g(32.0) + compute_g(34.0) + compute_g(52.0)
        );
    }

    #[test]
    fn test_fixed_mode_completes_class() {
        let mut fx = Fixture::new(TariffMethod::Algan, None);
        fx.modes.set("CHE", 50, HeightMode::Fixed { height_m: 27.0 });
        let che = SpeciesCode::new("CHE");
        let stems = vec![Tige::new("3", "p", "CHE", 52.0)];

        let result = synthesis_for_essence(&che, &stems, &fx.params()).unwrap();
        assert!(!result.height_incomplete);
        assert_relative_eq!(
            result.totals.volume_m3.unwrap(),
            47.0 * 44.5 * 27.0 / 30_000.0,
            epsilon = 1e-12
        );
        assert_eq!(result.rows[0].mean_height_m, Some(27.0));
    }

    #[test]
    fn test_weighted_diameter_and_heights() {
        let fx = Fixture::new(TariffMethod::Schaeffer1E, Some(10));
        let het = SpeciesCode::new("HET");
        let stems = vec![
            Tige::new("1", "p", "HET", 20.0).with_height(16.0),
            Tige::new("2", "p", "HET", 40.0).with_height(26.0),
        ];
        let result = synthesis_for_essence(&het, &stems, &fx.params()).unwrap();
        let (g1, g2) = (compute_g(20.0), compute_g(40.0));

        let totals = &result.totals;
        assert_relative_eq!(totals.mean_diameter_cm.unwrap(), (g1 * 20.0 + g2 * 40.0) / (g1 + g2));
        assert_relative_eq!(totals.mean_height_m.unwrap(), 21.0);
        assert_relative_eq!(totals.lorey_height_m.unwrap(), (g1 * 16.0 + g2 * 26.0) / (g1 + g2));
        assert_relative_eq!(totals.dg_cm.unwrap(), 1000f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_empty_species() {
        let fx = Fixture::new(TariffMethod::Schaeffer1E, Some(10));
        let result = synthesis_for_essence(&SpeciesCode::new("ERA"), &oak_stems(), &fx.params()).unwrap();
        assert_eq!(result.totals.count, 0);
        assert!(result.rows.is_empty());
        assert_eq!(result.totals.dg_cm, None);
    }

    #[test]
    fn test_one_entry_tariff_flags_unresolved_heights() {
        let fx = Fixture::new(TariffMethod::Schaeffer1E, Some(10));
        let che = SpeciesCode::new("CHE");
        let stems = vec![
            Tige::new("1", "p", "CHE", 30.0).with_height(20.0),
            Tige::new("2", "p", "CHE", 70.0),
        ];
        let result = synthesis_for_essence(&che, &stems, &fx.params()).unwrap();

        // Volume needs no height here, so it is kept
        let v = |d: f64| 10.0 * (d - 5.0) * (d - 10.0) / 14_000.0;
        assert_relative_eq!(result.totals.volume_m3.unwrap(), v(30.0) + v(70.0), epsilon = 1e-12);

        // The unresolved 70 cm stem is still reported, and heights are not approximated
        assert!(result.height_incomplete);
        assert_eq!(result.missing_height_classes, vec![70]);
        assert_eq!(result.rows[1].missing_height_count, 1);
        assert_eq!(result.rows[1].mean_height_m, None);
        assert_eq!(result.rows[0].mean_height_m, Some(20.0));
        assert_eq!(result.totals.mean_height_m, None);
        assert_eq!(result.totals.lorey_height_m, None);
    }

    #[test]
    fn test_partially_priced_class() {
        let mut fx = Fixture::new(TariffMethod::Schaeffer1E, Some(10));
        fx.prices = PriceTable::new(vec![PriceEntry {
            species: SpeciesCode::new("CHE"),
            basis: PriceBasis::UnitVolume { min_m3: 0.0, max_m3: Some(0.85) },
            eur_per_m3: 80.0,
        }]);
        let che = SpeciesCode::new("CHE");
        let stems = vec![
            Tige::new("1", "p", "CHE", 41.0).with_height(24.0),
            Tige::new("2", "p", "CHE", 44.0).with_height(25.0),
        ];
        let result = synthesis_for_essence(&che, &stems, &fx.params()).unwrap();

        // Both stems share class 40; only the smaller one falls in the volume range
        let v = |d: f64| 10.0 * (d - 5.0) * (d - 10.0) / 14_000.0;
        assert!(v(41.0) <= 0.85 && v(44.0) > 0.85);
        assert_eq!(result.rows.len(), 1);
        let row = &result.rows[0];
        assert_relative_eq!(row.volume_m3.unwrap(), v(41.0) + v(44.0), epsilon = 1e-12);
        assert_relative_eq!(row.value_eur.unwrap(), v(41.0) * 80.0, epsilon = 1e-9);
        assert_relative_eq!(row.unpriced_volume_m3, v(44.0), epsilon = 1e-12);

        assert_eq!(result.stems[0].price_eur_per_m3, Some(80.0));
        assert_eq!(result.stems[1].price_eur_per_m3, None);
        assert_relative_eq!(result.totals.value_eur.unwrap(), v(41.0) * 80.0, epsilon = 1e-9);
        assert_relative_eq!(result.totals.unpriced_volume_m3, v(44.0), epsilon = 1e-12);
    }

    #[test]
    fn test_malformed_override_fails_species() {
        let mut fx = Fixture::new(TariffMethod::Algan, None);
        fx.overrides.insert("CHE", 50, f64::NAN);
        let stems = vec![Tige::new("3", "p", "CHE", 52.0)];
        let result = synthesis_for_essence(&SpeciesCode::new("CHE"), &stems, &fx.params());
        assert!(matches!(result, Err(EngineError::InvalidHeight { .. })));
    }
}
