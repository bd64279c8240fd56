//! Stand Aggregator
//!
//! Combines the per-species syntheses of the current selection into plot- and
//! hectare-normalized stand statistics.
//!
//! Basal area and stem counts come from geometry alone. Volume, revenue, mean
//! height and Lorey's height sit behind the stand-wide `volume_available` flag
//! and are reported as unavailable rather than approximated.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use crate::cubage::quadratic_mean_diameter;
use crate::martelage::stats::*;
use crate::model::{QualityGrade, SpecialCategory, SpeciesCatalog, SpeciesCode, Tige};
use crate::plausibility::{check_stems, PlausibilityThresholds};
use crate::synthesis::{synthesis_for_essence, EssenceSynthesis, StemCubage, SynthesisParams};

/// Stand snapshot for one aggregation pass
#[derive(Debug, Clone, Copy)]
pub struct StandInput<'a> {
    pub stems: &'a [Tige],
    pub surface_m2: f64,
    /// Species to include; empty means every species present
    pub selected_species: &'a [SpeciesCode],
    pub catalog: &'a SpeciesCatalog,
    pub plausibility: &'a PlausibilityThresholds,
}

/// Per-species syntheses for the selection, in species-code order
///
/// A species whose synthesis fails is reported as `Failed` and the pass
/// carries on.
pub fn synthesize_species(
    stems: &[Tige],
    species: &[SpeciesCode],
    params: &SynthesisParams<'_>,
) -> Vec<SpeciesOutcome> {
    species
        .par_iter()
        .map(|code| match synthesis_for_essence(code, stems, params) {
            Ok(synthesis) => SpeciesOutcome::Computed(synthesis),
            Err(e) => {
                tracing::warn!("Synthesis failed for {}: {}", code, e);
                SpeciesOutcome::Failed {
                    species: code.clone(),
                    reason: e.to_string(),
                }
            }
        })
        .collect()
}

fn is_selected(code: &SpeciesCode, selected: &[SpeciesCode]) -> bool {
    selected.is_empty() || selected.contains(code)
}

/// Selected species holding at least one regular stem, in code order
fn selected_codes(stems: &[Tige], selected: &[SpeciesCode]) -> Vec<SpeciesCode> {
    let present: BTreeSet<&SpeciesCode> = stems
        .iter()
        .filter(|s| !s.is_special())
        .map(|s| &s.species)
        .collect();
    present
        .into_iter()
        .filter(|code| is_selected(code, selected))
        .cloned()
        .collect()
}

/// Stand statistics, or `None` when there is nothing to aggregate
///
/// `None` when the stem snapshot is empty, when the surface is not positive,
/// or when no stem belongs to a selected species. A selection holding only
/// special stems still yields statistics, with zero regular stems.
pub fn compute_martelage_stats(
    input: &StandInput<'_>,
    params: &SynthesisParams<'_>,
) -> Option<MartelageStats> {
    if input.stems.is_empty() || !(input.surface_m2 > 0.0) {
        return None;
    }
    let surface_ha = input.surface_m2 / 10_000.0;
    if !(surface_ha > 0.0) {
        return None;
    }

    let in_selection: Vec<&Tige> = input
        .stems
        .iter()
        .filter(|s| is_selected(&s.species, input.selected_species))
        .collect();
    if in_selection.is_empty() {
        return None;
    }
    let codes = selected_codes(input.stems, input.selected_species);

    tracing::debug!(
        "Aggregating {} stems of {} species over {:.4} ha",
        in_selection.len(),
        codes.len(),
        surface_ha
    );

    let outcomes = synthesize_species(input.stems, &codes, params);
    let computed: Vec<_> = outcomes.iter().filter_map(SpeciesOutcome::computed).collect();
    let stems: Vec<&StemCubage> = computed.iter().flat_map(|s| s.stems.iter()).collect();

    let per_ha = |value: f64| value / surface_ha;

    // Geometry
    let n_total = stems.len();
    let g_total_m2: f64 = stems.iter().map(|s| s.basal_area_m2).sum();
    let diameter_sum: f64 = stems.iter().map(|s| s.diameter_cm).sum();
    let mean_diameter_cm = (n_total > 0).then(|| diameter_sum / n_total as f64);
    let diameter_min_cm = stems.iter().map(|s| s.diameter_cm).reduce(f64::min);
    let diameter_max_cm = stems.iter().map(|s| s.diameter_cm).reduce(f64::max);
    let diameter_cv_percent = mean_diameter_cm.and_then(|mean| {
        if n_total < 2 || mean <= 0.0 {
            return None;
        }
        let ss: f64 = stems.iter().map(|s| (s.diameter_cm - mean).powi(2)).sum();
        Some((ss / (n_total - 1) as f64).sqrt() / mean * 100.0)
    });

    // Gated figures
    let volume_available = computed.iter().all(|s| !s.height_incomplete);

    let volume_total_m3 = if volume_available {
        computed.iter().map(|s| s.totals.volume_m3).sum::<Option<f64>>()
    } else {
        None
    };
    let revenue_total_eur = volume_total_m3.and_then(|_| {
        computed
            .iter()
            .filter_map(|s| s.totals.value_eur)
            .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v))
    });

    let (height_sum, height_n, gh_sum, g_with_height) = stems
        .iter()
        .filter_map(|s| s.height.map(|h| (s.basal_area_m2, h.height_m)))
        .fold((0.0, 0usize, 0.0, 0.0), |(hs, n, gh, g), (sg, h)| {
            (hs + h, n + 1, gh + sg * h, g + sg)
        });
    let mean_height_m = (volume_available && height_n > 0).then(|| height_sum / height_n as f64);
    let lorey_height_m = (volume_available && g_with_height > 0.0).then(|| gh_sum / g_with_height);

    // Pricing completeness
    let unpriced_volume_total_m3 = volume_total_m3
        .map(|_| computed.iter().map(|s| s.totals.unpriced_volume_m3).sum::<f64>());
    let unpriced_species: Vec<String> = computed
        .iter()
        .filter(|s| s.totals.unpriced_volume_m3 > 0.0)
        .map(|s| input.catalog.display_name(&s.species))
        .collect();

    let species = computed
        .iter()
        .map(|s| SpeciesBreakdown {
            code: s.species.clone(),
            name: input.catalog.display_name(&s.species),
            count: s.totals.count,
            count_per_ha: per_ha(s.totals.count as f64),
            basal_area_m2: s.totals.basal_area_m2,
            basal_area_per_ha_m2: per_ha(s.totals.basal_area_m2),
            basal_area_percent: (g_total_m2 > 0.0)
                .then(|| s.totals.basal_area_m2 / g_total_m2 * 100.0),
            volume_m3: s.totals.volume_m3,
            volume_per_ha_m3: s.totals.volume_m3.map(per_ha),
            value_eur: s.totals.value_eur,
            unpriced_volume_m3: s.totals.unpriced_volume_m3,
            mean_diameter_cm: s.totals.mean_diameter_cm,
            dg_cm: s.totals.dg_cm,
            mean_height_m: s.totals.mean_height_m,
            lorey_height_m: s.totals.lorey_height_m,
            height_incomplete: s.height_incomplete,
            rows: s.rows.clone(),
        })
        .collect();

    let missing_heights = computed
        .iter()
        .filter(|s| s.height_incomplete)
        .map(|s| MissingHeight {
            code: s.species.clone(),
            name: input.catalog.display_name(&s.species),
            classes: s.missing_height_classes.clone(),
        })
        .collect();

    let failed_species = outcomes
        .iter()
        .filter_map(|o| match o {
            SpeciesOutcome::Failed { species, reason } => Some(SpeciesFailure {
                code: species.clone(),
                name: input.catalog.display_name(species),
                reason: reason.clone(),
            }),
            SpeciesOutcome::Computed(_) => None,
        })
        .collect();

    let regular: Vec<&Tige> = in_selection.iter().copied().filter(|s| !s.is_special()).collect();

    Some(MartelageStats {
        surface_ha,
        n_total,
        n_per_ha: per_ha(n_total as f64),
        g_total_m2,
        g_per_ha_m2: per_ha(g_total_m2),
        volume_available,
        volume_total_m3,
        volume_per_ha_m3: volume_total_m3.map(per_ha),
        revenue_total_eur,
        revenue_per_ha_eur: revenue_total_eur.map(per_ha),
        unpriced_volume_total_m3,
        unpriced_volume_per_ha_m3: unpriced_volume_total_m3.map(per_ha),
        unpriced_species,
        mean_diameter_cm,
        mean_height_m,
        dg_cm: quadratic_mean_diameter(g_total_m2, n_total),
        lorey_height_m,
        diameter_min_cm,
        diameter_max_cm,
        diameter_cv_percent,
        volume_per_g: volume_total_m3.filter(|_| g_total_m2 > 0.0).map(|v| v / g_total_m2),
        classes: class_distribution(&computed, volume_available),
        quality: quality_distribution(&stems),
        species,
        missing_heights,
        failed_species,
        special_trees: special_tree_counts(&in_selection),
        warnings: check_stems(regular, input.plausibility),
    })
}

fn class_distribution(
    computed: &[&EssenceSynthesis],
    volume_available: bool,
) -> Vec<ClassDistributionRow> {
    let mut by_class: BTreeMap<u32, ClassDistributionRow> = BTreeMap::new();
    for synthesis in computed {
        for row in &synthesis.rows {
            let entry = by_class.entry(row.class).or_insert(ClassDistributionRow {
                class: row.class,
                count: 0,
                basal_area_m2: 0.0,
                volume_m3: Some(0.0),
            });
            entry.count += row.count;
            entry.basal_area_m2 += row.basal_area_m2;
            entry.volume_m3 = match (entry.volume_m3, row.volume_m3) {
                (Some(acc), Some(v)) if volume_available => Some(acc + v),
                _ => None,
            };
        }
    }
    by_class.into_values().collect()
}

fn quality_distribution(stems: &[&StemCubage]) -> QualityDistribution {
    let mut counts: BTreeMap<QualityGrade, usize> = BTreeMap::new();
    for grade in stems.iter().filter_map(|s| s.quality) {
        *counts.entry(grade).or_insert(0) += 1;
    }
    let graded_count: usize = counts.values().sum();

    let shares = QualityGrade::all()
        .iter()
        .map(|grade| {
            let count = counts.get(grade).copied().unwrap_or(0);
            QualityShare {
                grade: *grade,
                count,
                percent: (graded_count > 0).then(|| count as f64 / graded_count as f64 * 100.0),
            }
        })
        .collect();

    QualityDistribution {
        shares,
        graded_count,
        ungraded_count: stems.len() - graded_count,
    }
}

fn special_tree_counts(stems: &[&Tige]) -> Vec<SpecialTreeCount> {
    let mut counts: BTreeMap<SpecialCategory, usize> = BTreeMap::new();
    for category in stems.iter().filter_map(|s| s.category) {
        *counts.entry(category).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(category, count)| SpecialTreeCount {
            category,
            label: category.label().to_string(),
            count,
        })
        .collect()
}
