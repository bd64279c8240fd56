//! Stand statistics result model
//!
//! Built fresh on every aggregation pass and never mutated afterwards.
//! Unknown figures are `None`, never zero.

use serde::Serialize;

use crate::model::{QualityGrade, SpecialCategory, SpeciesCode};
use crate::plausibility::PlausibilityWarning;
use crate::synthesis::{ClassSynthesisRow, EssenceSynthesis};

/// Result of one species' synthesis inside a stand pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SpeciesOutcome {
    Computed(EssenceSynthesis),
    Failed { species: SpeciesCode, reason: String },
}

impl SpeciesOutcome {
    pub fn species(&self) -> &SpeciesCode {
        match self {
            SpeciesOutcome::Computed(synthesis) => &synthesis.species,
            SpeciesOutcome::Failed { species, .. } => species,
        }
    }

    pub fn computed(&self) -> Option<&EssenceSynthesis> {
        match self {
            SpeciesOutcome::Computed(synthesis) => Some(synthesis),
            SpeciesOutcome::Failed { .. } => None,
        }
    }
}

/// Diameter class aggregated across species
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDistributionRow {
    pub class: u32,
    pub count: usize,
    pub basal_area_m2: f64,
    pub volume_m3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityShare {
    pub grade: QualityGrade,
    pub count: usize,
    /// Share of graded stems; `None` when no stem is graded
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityDistribution {
    pub shares: Vec<QualityShare>,
    pub graded_count: usize,
    pub ungraded_count: usize,
}

/// One row of the per-species breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesBreakdown {
    pub code: SpeciesCode,
    pub name: String,
    pub count: usize,
    pub count_per_ha: f64,
    pub basal_area_m2: f64,
    pub basal_area_per_ha_m2: f64,
    /// Share of the stand basal area
    pub basal_area_percent: Option<f64>,
    pub volume_m3: Option<f64>,
    pub volume_per_ha_m3: Option<f64>,
    pub value_eur: Option<f64>,
    pub unpriced_volume_m3: f64,
    pub mean_diameter_cm: Option<f64>,
    pub dg_cm: Option<f64>,
    pub mean_height_m: Option<f64>,
    pub lorey_height_m: Option<f64>,
    pub height_incomplete: bool,
    pub rows: Vec<ClassSynthesisRow>,
}

/// Species whose classes still lack a resolvable height
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingHeight {
    pub code: SpeciesCode,
    pub name: String,
    pub classes: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesFailure {
    pub code: SpeciesCode,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialTreeCount {
    pub category: SpecialCategory,
    pub label: String,
    pub count: usize,
}

/// Stand-level dendrometric and economic statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MartelageStats {
    pub surface_ha: f64,

    pub n_total: usize,
    pub n_per_ha: f64,
    pub g_total_m2: f64,
    pub g_per_ha_m2: f64,

    /// False as soon as one selected species has a class with an unresolved height
    pub volume_available: bool,
    pub volume_total_m3: Option<f64>,
    pub volume_per_ha_m3: Option<f64>,
    pub revenue_total_eur: Option<f64>,
    pub revenue_per_ha_eur: Option<f64>,
    /// Volume with no matching price; gated like `volume_total_m3`
    pub unpriced_volume_total_m3: Option<f64>,
    pub unpriced_volume_per_ha_m3: Option<f64>,
    /// Display names of species holding unpriced volume in classes whose
    /// volume is known
    pub unpriced_species: Vec<String>,

    pub mean_diameter_cm: Option<f64>,
    pub mean_height_m: Option<f64>,
    pub dg_cm: Option<f64>,
    pub lorey_height_m: Option<f64>,
    pub diameter_min_cm: Option<f64>,
    pub diameter_max_cm: Option<f64>,
    pub diameter_cv_percent: Option<f64>,
    /// Volume over basal area (m)
    pub volume_per_g: Option<f64>,

    pub classes: Vec<ClassDistributionRow>,
    pub quality: QualityDistribution,
    pub species: Vec<SpeciesBreakdown>,
    pub missing_heights: Vec<MissingHeight>,
    pub failed_species: Vec<SpeciesFailure>,
    pub special_trees: Vec<SpecialTreeCount>,
    pub warnings: Vec<PlausibilityWarning>,
}
