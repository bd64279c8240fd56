//! Engine error taxonomy
//!
//! Invalid configuration is rejected when the typed values are built
//! (`DiameterClassGrid::new`, `TariffSelection::new`), so an aggregation pass
//! only ever starts from valid configuration. Data and pricing incompleteness
//! are not errors; they travel as flags and lists on the result objects.

use crate::cubage::TariffMethod;
use crate::model::SpeciesCode;
use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("diameter class grid must contain at least one bound")]
    EmptyClassGrid,

    #[error("diameter class grid must be strictly increasing ({previous} is followed by {next})")]
    UnsortedClassGrid { previous: u32, next: u32 },

    #[error("tariff {method} requires a numero in {min}..={max}")]
    MissingTariffNumero { method: TariffMethod, min: u8, max: u8 },

    #[error("tariff numero {numero} is outside {min}..={max} for {method}")]
    TariffNumeroOutOfRange {
        method: TariffMethod,
        numero: u8,
        min: u8,
        max: u8,
    },

    #[error("diameter must be a positive number of centimetres, got {0}")]
    InvalidDiameter(f64),

    #[error("height {height} m configured for {species} class {class} is not a positive number")]
    InvalidHeight {
        species: SpeciesCode,
        class: u32,
        height: f64,
    },

    #[error("form coefficient {0} is not a positive number")]
    InvalidFormCoefficient(f64),

    #[error("tariff {method} produced a non-finite volume for a {diameter} cm stem")]
    NonFiniteVolume { method: TariffMethod, diameter: f64 },
}
