//! Cubage: stem geometry, tariff selection and volume models

pub mod geometry;
pub mod tariff;
pub mod volume;

pub use geometry::{compute_g, quadratic_mean_diameter};
pub use tariff::{available_tarif_numbers, TariffMethod, TariffSelection};
pub use volume::{
    volume_for_tige, volume_for_tige_with_height, StandardTariffs, VolumeInput, VolumeModel,
    DEFAULT_FORM_COEFFICIENT,
};
