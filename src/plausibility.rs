//! Plausibility warnings for field measurements
//!
//! Non-fatal sanity checks run over the stems entering a stand aggregation.
//! They never alter figures, only flag stems worth re-measuring.

use serde::{Deserialize, Serialize};

use crate::model::Tige;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityThresholds {
    pub max_diameter_cm: f64,
    pub min_height_m: f64,
    pub max_height_m: f64,
    /// Height (m) over diameter (m)
    pub min_slenderness: f64,
    pub max_slenderness: f64,
}

impl Default for PlausibilityThresholds {
    fn default() -> Self {
        Self {
            max_diameter_cm: 250.0,
            min_height_m: 2.0,
            max_height_m: 60.0,
            min_slenderness: 30.0,
            max_slenderness: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlausibilityIssue {
    DiameterAboveMax { diameter_cm: f64, max_cm: f64 },
    HeightOutOfRange { height_m: f64, min_m: f64, max_m: f64 },
    Slenderness { ratio: f64, min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlausibilityWarning {
    pub stem_id: String,
    pub issue: PlausibilityIssue,
}

impl PlausibilityThresholds {
    /// Issues found on one stem, checked against its measured values only
    pub fn check(&self, stem: &Tige) -> Vec<PlausibilityIssue> {
        let mut issues = Vec::new();
        let d = stem.diameter_cm;

        if d > self.max_diameter_cm {
            issues.push(PlausibilityIssue::DiameterAboveMax {
                diameter_cm: d,
                max_cm: self.max_diameter_cm,
            });
        }

        if let Some(h) = stem.measured_height() {
            if h < self.min_height_m || h > self.max_height_m {
                issues.push(PlausibilityIssue::HeightOutOfRange {
                    height_m: h,
                    min_m: self.min_height_m,
                    max_m: self.max_height_m,
                });
            }
            if d > 0.0 {
                let ratio = h / (d / 100.0);
                if ratio < self.min_slenderness || ratio > self.max_slenderness {
                    issues.push(PlausibilityIssue::Slenderness {
                        ratio,
                        min: self.min_slenderness,
                        max: self.max_slenderness,
                    });
                }
            }
        }

        issues
    }
}

/// Warnings for a set of stems, in input order
pub fn check_stems<'a>(
    stems: impl IntoIterator<Item = &'a Tige>,
    thresholds: &PlausibilityThresholds,
) -> Vec<PlausibilityWarning> {
    stems
        .into_iter()
        .flat_map(|stem| {
            thresholds
                .check(stem)
                .into_iter()
                .map(move |issue| PlausibilityWarning {
                    stem_id: stem.id.clone(),
                    issue,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_stem_has_no_warnings() {
        let t = PlausibilityThresholds::default();
        // 30 cm, 24 m → slenderness 80
        assert!(t.check(&Tige::new("1", "p", "CHE", 30.0).with_height(24.0)).is_empty());
        assert!(t.check(&Tige::new("2", "p", "CHE", 30.0)).is_empty());
    }

    #[test]
    fn test_flags_outliers() {
        let t = PlausibilityThresholds::default();

        let giant = Tige::new("g", "p", "CHE", 320.0);
        assert!(matches!(t.check(&giant)[0], PlausibilityIssue::DiameterAboveMax { .. }));

        // 10 cm, 25 m → slenderness 250
        let whip = Tige::new("w", "p", "EPC", 10.0).with_height(25.0);
        assert!(matches!(t.check(&whip)[0], PlausibilityIssue::Slenderness { .. }));

        // 80 m is out of range and 80 / 0.6 ≈ 133 is fine
        let tall = Tige::new("t", "p", "DOU", 60.0).with_height(80.0);
        let issues = t.check(&tall);
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], PlausibilityIssue::HeightOutOfRange { .. }));
    }

    #[test]
    fn test_check_stems_keeps_ids() {
        let stems = vec![
            Tige::new("ok", "p", "CHE", 30.0).with_height(24.0),
            Tige::new("bad", "p", "CHE", 300.0),
        ];
        let warnings = check_stems(&stems, &PlausibilityThresholds::default());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].stem_id, "bad");
    }
}
