//! Height configuration and resolution
//!
//! - `overrides`: manual height overrides per scope and their merge
//! - `resolver`: per-stem height resolution for stems without a measurement

pub mod overrides;
pub mod resolver;

pub use overrides::{merge_overrides, ConfigScope, HeightOverrideMap, ScopedHeightOverrides};
pub use resolver::{
    HeightMode, HeightModeEntry, HeightModes, HeightResolver, HeightSource, ResolvedHeight,
};
