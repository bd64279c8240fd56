//! Stem (tige) records as captured in the field

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SpeciesCode;

/// Wood quality grade, best (A) to worst (D)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
}

impl QualityGrade {
    pub fn all() -> &'static [QualityGrade] {
        &[QualityGrade::A, QualityGrade::B, QualityGrade::C, QualityGrade::D]
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
            QualityGrade::D => "D",
        }
    }
}

/// Special-tree marker; marked stems stay in the inventory but are kept out of
/// diameter-class counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialCategory {
    Dying,
    BioHeritage,
    Dead,
    Parasitized,
}

impl SpecialCategory {
    pub fn label(&self) -> &'static str {
        match self {
            SpecialCategory::Dying => "Dépérissant",
            SpecialCategory::BioHeritage => "Arbre bio",
            SpecialCategory::Dead => "Mort",
            SpecialCategory::Parasitized => "Parasité",
        }
    }
}

/// GPS fix recorded with a stem
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal precision in meters
    #[serde(default)]
    pub precision_m: Option<f64>,
    #[serde(default)]
    pub altitude_m: Option<f64>,
}

/// One recorded tree stem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tige {
    pub id: String,
    pub parcel_id: String,
    #[serde(default)]
    pub plot_id: Option<String>,
    pub species: SpeciesCode,
    /// Diameter at breast height (cm)
    pub diameter_cm: f64,
    /// Measured total height (m)
    #[serde(default)]
    pub height_m: Option<f64>,
    #[serde(default)]
    pub gps: Option<GpsFix>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub quality: Option<QualityGrade>,
    #[serde(default)]
    pub defects: Vec<String>,
    #[serde(default)]
    pub category: Option<SpecialCategory>,
    #[serde(default)]
    pub numero: Option<u32>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    /// Form coefficient used by the COEF_FORME method
    #[serde(default)]
    pub form_coefficient: Option<f64>,
    /// Monetary value recorded against the stem (€)
    #[serde(default)]
    pub value_eur: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Tige {
    /// Minimal stem with only the fields the engine needs
    pub fn new(id: &str, parcel_id: &str, species: &str, diameter_cm: f64) -> Self {
        Tige {
            id: id.to_string(),
            parcel_id: parcel_id.to_string(),
            plot_id: None,
            species: SpeciesCode::new(species),
            diameter_cm,
            height_m: None,
            gps: None,
            note: None,
            quality: None,
            defects: Vec::new(),
            category: None,
            numero: None,
            photo: None,
            product: None,
            form_coefficient: None,
            value_eur: None,
            created_at: None,
        }
    }

    pub fn with_height(mut self, height_m: f64) -> Self {
        self.height_m = Some(height_m);
        self
    }

    pub fn with_quality(mut self, grade: QualityGrade) -> Self {
        self.quality = Some(grade);
        self
    }

    pub fn with_category(mut self, category: SpecialCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_plot(mut self, plot_id: &str) -> Self {
        self.plot_id = Some(plot_id.to_string());
        self
    }

    pub fn is_special(&self) -> bool {
        self.category.is_some()
    }

    /// Directly measured height, ignoring non-positive or non-finite entries
    pub fn measured_height(&self) -> Option<f64> {
        self.height_m.filter(|h| h.is_finite() && *h > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measured_height_ignores_placeholders() {
        let stem = Tige::new("t1", "p1", "che", 30.0);
        assert_eq!(stem.measured_height(), None);
        assert_eq!(stem.clone().with_height(0.0).measured_height(), None);
        assert_eq!(stem.with_height(18.5).measured_height(), Some(18.5));
    }

    #[test]
    fn test_deserialize_minimal_stem() {
        let json = r#"{
            "id": "t42",
            "parcel_id": "P12",
            "species": " hEt ",
            "diameter_cm": 35.0,
            "quality": "B",
            "category": "BIO_HERITAGE"
        }"#;
        let stem: Tige = serde_json::from_str(json).unwrap();
        assert_eq!(stem.species.as_str(), "HET");
        assert_eq!(stem.quality, Some(QualityGrade::B));
        assert!(stem.is_special());
        assert!(stem.defects.is_empty());
    }
}
