//! Diameter Class Grid
//!
//! Buckets stem diameters into ascending integer class lower-bounds.
//! The default grid runs from 5 cm to 120 cm in 5 cm steps.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_CLASS_MIN: u32 = 5;
pub const DEFAULT_CLASS_MAX: u32 = 120;
pub const DEFAULT_CLASS_STEP: u32 = 5;

/// Strictly increasing, non-empty list of class lower-bounds (cm)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct DiameterClassGrid {
    bounds: Vec<u32>,
}

impl DiameterClassGrid {
    pub fn new(bounds: Vec<u32>) -> EngineResult<Self> {
        if bounds.is_empty() {
            return Err(EngineError::EmptyClassGrid);
        }
        for pair in bounds.windows(2) {
            if pair[0] >= pair[1] {
                return Err(EngineError::UnsortedClassGrid {
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        Ok(Self { bounds })
    }

    pub fn bounds(&self) -> &[u32] {
        &self.bounds
    }

    pub fn smallest(&self) -> u32 {
        self.bounds[0]
    }

    pub fn largest(&self) -> u32 {
        self.bounds[self.bounds.len() - 1]
    }

    /// Greatest lower-bound ≤ diameter, clamped to the smallest bound
    pub fn class_for(&self, diameter_cm: f64) -> u32 {
        // partition_point: number of bounds ≤ diameter
        let idx = self
            .bounds
            .partition_point(|&bound| f64::from(bound) <= diameter_cm);
        if idx == 0 {
            self.smallest()
        } else {
            self.bounds[idx - 1]
        }
    }

    /// Grid extended at either edge, repeating the step found at that edge
    ///
    /// A single-bound grid uses the default 5 cm step. Extension at the low
    /// edge stops before reaching zero.
    pub fn extended_to(&self, min_cm: u32, max_cm: u32) -> Self {
        let n = self.bounds.len();
        let (low_step, high_step) = if n >= 2 {
            (
                self.bounds[1] - self.bounds[0],
                self.bounds[n - 1] - self.bounds[n - 2],
            )
        } else {
            (DEFAULT_CLASS_STEP, DEFAULT_CLASS_STEP)
        };

        let mut lower = Vec::new();
        let mut bound = self.smallest();
        while bound > min_cm && bound > low_step {
            bound -= low_step;
            lower.push(bound);
        }
        lower.reverse();

        let mut bounds = lower;
        bounds.extend_from_slice(&self.bounds);

        let mut bound = self.largest();
        while bound < max_cm {
            bound += high_step;
            bounds.push(bound);
        }

        Self { bounds }
    }
}

impl Default for DiameterClassGrid {
    fn default() -> Self {
        Self {
            bounds: (DEFAULT_CLASS_MIN..=DEFAULT_CLASS_MAX)
                .step_by(DEFAULT_CLASS_STEP as usize)
                .collect(),
        }
    }
}

impl TryFrom<Vec<u32>> for DiameterClassGrid {
    type Error = EngineError;

    fn try_from(bounds: Vec<u32>) -> EngineResult<Self> {
        DiameterClassGrid::new(bounds)
    }
}

impl From<DiameterClassGrid> for Vec<u32> {
    fn from(grid: DiameterClassGrid) -> Self {
        grid.bounds
    }
}

/// Class lower-bound for a diameter on the given grid
pub fn diameter_class_for(diameter_cm: f64, grid: &DiameterClassGrid) -> u32 {
    grid.class_for(diameter_cm)
}
