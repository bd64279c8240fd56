//! Tariff Selection Model
//!
//! The active cubage method plus its table numero. Methods built on numbered
//! tariff families (Schaeffer, IFN) need a numero inside the method's range;
//! ALGAN and COEF_FORME take none. A selection is validated when it is built
//! and is immutable afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{EngineError, EngineResult};
use crate::model::SpeciesCode;

const NUMBERED_TARIFF_RANGE: RangeInclusive<u8> = 1..=36;

/// Volume tariff method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TariffMethod {
    /// Schaeffer one-entry (diameter only)
    #[serde(rename = "SCHAEFFER_1E")]
    Schaeffer1E,
    /// Schaeffer two-entry (diameter + height)
    #[serde(rename = "SCHAEFFER_2E")]
    Schaeffer2E,
    Algan,
    IfnRapide,
    IfnLent,
    CoefForme,
}

impl TariffMethod {
    pub fn all() -> &'static [TariffMethod] {
        &[
            TariffMethod::Schaeffer1E,
            TariffMethod::Schaeffer2E,
            TariffMethod::Algan,
            TariffMethod::IfnRapide,
            TariffMethod::IfnLent,
            TariffMethod::CoefForme,
        ]
    }

    /// 1 = diameter only, 2 = diameter + height
    pub fn required_inputs(&self) -> u8 {
        match self {
            TariffMethod::Schaeffer1E | TariffMethod::IfnRapide | TariffMethod::IfnLent => 1,
            TariffMethod::Schaeffer2E | TariffMethod::Algan | TariffMethod::CoefForme => 2,
        }
    }

    pub fn requires_height(&self) -> bool {
        self.required_inputs() == 2
    }

    /// Valid tariff numeros, `None` for methods that take no numero
    pub fn numero_range(&self) -> Option<RangeInclusive<u8>> {
        match self {
            TariffMethod::Schaeffer1E
            | TariffMethod::Schaeffer2E
            | TariffMethod::IfnRapide
            | TariffMethod::IfnLent => Some(NUMBERED_TARIFF_RANGE),
            TariffMethod::Algan | TariffMethod::CoefForme => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TariffMethod::Schaeffer1E => "SCHAEFFER_1E",
            TariffMethod::Schaeffer2E => "SCHAEFFER_2E",
            TariffMethod::Algan => "ALGAN",
            TariffMethod::IfnRapide => "IFN_RAPIDE",
            TariffMethod::IfnLent => "IFN_LENT",
            TariffMethod::CoefForme => "COEF_FORME",
        }
    }

    fn validate_numero(&self, numero: u8) -> EngineResult<()> {
        match self.numero_range() {
            Some(range) if !range.contains(&numero) => Err(EngineError::TariffNumeroOutOfRange {
                method: *self,
                numero,
                min: *range.start(),
                max: *range.end(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TariffMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeros a selection UI may offer for a method (empty when the method takes none)
pub fn available_tarif_numbers(method: TariffMethod) -> Vec<u8> {
    method.numero_range().map(|r| r.collect()).unwrap_or_default()
}

/// Validated tariff method + numero
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffSelection {
    method: TariffMethod,
    numero: Option<u8>,
    /// Species-specific numeros taking precedence over `numero`
    species_numeros: BTreeMap<SpeciesCode, u8>,
}

impl TariffSelection {
    /// Validate a method/numero pair
    ///
    /// A numero given for a method without a numero range is dropped.
    pub fn new(method: TariffMethod, numero: Option<u8>) -> EngineResult<Self> {
        let numero = match (method.numero_range(), numero) {
            (Some(range), None) => {
                return Err(EngineError::MissingTariffNumero {
                    method,
                    min: *range.start(),
                    max: *range.end(),
                })
            }
            (Some(_), Some(n)) => {
                method.validate_numero(n)?;
                Some(n)
            }
            (None, Some(n)) => {
                tracing::debug!("Ignoring numero {} for tariff {}", n, method);
                None
            }
            (None, None) => None,
        };

        Ok(Self {
            method,
            numero,
            species_numeros: BTreeMap::new(),
        })
    }

    /// Add a species-specific numero (ignored by methods without a numero)
    pub fn with_species_numero(mut self, species: SpeciesCode, numero: u8) -> EngineResult<Self> {
        if self.method.numero_range().is_some() {
            self.method.validate_numero(numero)?;
            self.species_numeros.insert(species, numero);
        }
        Ok(self)
    }

    pub fn method(&self) -> TariffMethod {
        self.method
    }

    pub fn numero(&self) -> Option<u8> {
        self.numero
    }

    /// Effective numero for a species: species-specific first, then the global one
    pub fn numero_for(&self, species: &SpeciesCode) -> Option<u8> {
        self.species_numeros.get(species).copied().or(self.numero)
    }
}
