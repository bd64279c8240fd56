//! Cubage Model: per-stem volume under the selected tariff
//!
//! `VolumeModel` is the seam for volume tables. `StandardTariffs` carries the
//! engine's reference curves; authoritative regional tables plug in by
//! implementing the trait.
//!
//! Reference curves (D in cm, H in m, n = tariff numero, result in m³):
//!   - SCHAEFFER_1E: n·(D−5)(D−10) / 14000
//!   - SCHAEFFER_2E: n·(D−5)(D−10) / 14000 · H / 20
//!   - ALGAN:        (D−5)(D−7.5) · H / 30000
//!   - IFN_RAPIDE:   n·(D−5)² / 16000
//!   - IFN_LENT:     n·(D−5)·D / 18000
//!   - COEF_FORME:   g · H · f
//!
//! Numbered curves give n/10 m³ at D = 45 cm. Every curve is clamped at zero
//! below its root so volume never decreases as diameter grows.

use crate::cubage::geometry::compute_g;
use crate::cubage::tariff::{TariffMethod, TariffSelection};
use crate::error::{EngineError, EngineResult};
use crate::model::{SpeciesCode, Tige};

/// Reference height (m) for the two-entry Schaeffer scaling
const SCHAEFFER_2E_REFERENCE_HEIGHT: f64 = 20.0;

pub const DEFAULT_FORM_COEFFICIENT: f64 = 0.5;

/// Everything a tariff may look at for one stem
#[derive(Debug, Clone, Copy)]
pub struct VolumeInput<'a> {
    pub species: &'a SpeciesCode,
    pub diameter_cm: f64,
    /// Measured or resolved height
    pub height_m: Option<f64>,
    pub form_coefficient: Option<f64>,
    pub method: TariffMethod,
    pub numero: Option<u8>,
}

/// Volume table / formula provider
pub trait VolumeModel: Send + Sync {
    /// Stem volume in m³
    ///
    /// `Ok(None)` when the method needs a height and none was supplied.
    fn stem_volume(&self, input: &VolumeInput<'_>) -> EngineResult<Option<f64>>;
}

/// Engine reference curves
#[derive(Debug, Clone, Copy)]
pub struct StandardTariffs {
    default_form_coefficient: f64,
}

impl StandardTariffs {
    pub fn new(default_form_coefficient: f64) -> EngineResult<Self> {
        if !(default_form_coefficient.is_finite() && default_form_coefficient > 0.0) {
            return Err(EngineError::InvalidFormCoefficient(default_form_coefficient));
        }
        Ok(Self {
            default_form_coefficient,
        })
    }

    fn numero(input: &VolumeInput<'_>) -> EngineResult<f64> {
        match (input.numero, input.method.numero_range()) {
            (Some(n), Some(range)) if range.contains(&n) => Ok(f64::from(n)),
            (Some(n), Some(range)) => Err(EngineError::TariffNumeroOutOfRange {
                method: input.method,
                numero: n,
                min: *range.start(),
                max: *range.end(),
            }),
            (None, Some(range)) => Err(EngineError::MissingTariffNumero {
                method: input.method,
                min: *range.start(),
                max: *range.end(),
            }),
            (_, None) => Ok(0.0),
        }
    }
}

impl Default for StandardTariffs {
    fn default() -> Self {
        Self {
            default_form_coefficient: DEFAULT_FORM_COEFFICIENT,
        }
    }
}

/// (D − a)(D − b), zero below the larger root
fn clamped_quadratic(d: f64, a: f64, b: f64) -> f64 {
    if d <= a.max(b) {
        0.0
    } else {
        (d - a) * (d - b)
    }
}

impl VolumeModel for StandardTariffs {
    fn stem_volume(&self, input: &VolumeInput<'_>) -> EngineResult<Option<f64>> {
        let d = input.diameter_cm;
        if !(d.is_finite() && d > 0.0) {
            return Err(EngineError::InvalidDiameter(d));
        }

        let height = if input.method.requires_height() {
            match input.height_m.filter(|h| h.is_finite() && *h > 0.0) {
                Some(h) => h,
                None => return Ok(None),
            }
        } else {
            0.0
        };

        let n = Self::numero(input)?;

        let volume = match input.method {
            TariffMethod::Schaeffer1E => n * clamped_quadratic(d, 5.0, 10.0) / 14_000.0,
            TariffMethod::Schaeffer2E => {
                n * clamped_quadratic(d, 5.0, 10.0) / 14_000.0 * height
                    / SCHAEFFER_2E_REFERENCE_HEIGHT
            }
            TariffMethod::Algan => clamped_quadratic(d, 5.0, 7.5) * height / 30_000.0,
            TariffMethod::IfnRapide => n * clamped_quadratic(d, 5.0, 5.0) / 16_000.0,
            TariffMethod::IfnLent => n * clamped_quadratic(d, 5.0, 0.0) / 18_000.0,
            TariffMethod::CoefForme => {
                let f = match input.form_coefficient {
                    Some(f) if f.is_finite() && f > 0.0 => f,
                    Some(f) => return Err(EngineError::InvalidFormCoefficient(f)),
                    None => self.default_form_coefficient,
                };
                compute_g(d) * height * f
            }
        };

        if !volume.is_finite() {
            return Err(EngineError::NonFiniteVolume {
                method: input.method,
                diameter: d,
            });
        }
        Ok(Some(volume))
    }
}

/// Volume of a stem from its own measurements
pub fn volume_for_tige(
    stem: &Tige,
    selection: &TariffSelection,
    model: &dyn VolumeModel,
) -> EngineResult<Option<f64>> {
    volume_for_tige_with_height(stem, stem.measured_height(), selection, model)
}

/// Volume of a stem using an already-resolved height
pub fn volume_for_tige_with_height(
    stem: &Tige,
    height_m: Option<f64>,
    selection: &TariffSelection,
    model: &dyn VolumeModel,
) -> EngineResult<Option<f64>> {
    let input = VolumeInput {
        species: &stem.species,
        diameter_cm: stem.diameter_cm,
        height_m,
        form_coefficient: stem.form_coefficient,
        method: selection.method(),
        numero: selection.numero_for(&stem.species),
    };
    model.stem_volume(&input)
}
