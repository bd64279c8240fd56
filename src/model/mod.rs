//! Inventory data model: stems and species

pub mod essence;
pub mod tige;

pub use essence::{Essence, SpeciesCatalog, SpeciesCode};
pub use tige::{GpsFix, QualityGrade, SpecialCategory, Tige};
