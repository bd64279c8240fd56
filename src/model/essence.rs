//! Species (essence) identity and catalog
//!
//! Species codes arrive from field entry, imports and configuration files in
//! any case and with stray whitespace. `SpeciesCode` normalizes once at
//! construction (trim + upper-case) so every map keyed by species agrees.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized species code ("CHE", "HET", ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SpeciesCode(String);

impl SpeciesCode {
    pub fn new(raw: &str) -> Self {
        SpeciesCode(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SpeciesCode {
    fn from(raw: String) -> Self {
        SpeciesCode::new(&raw)
    }
}

impl From<&str> for SpeciesCode {
    fn from(raw: &str) -> Self {
        SpeciesCode::new(raw)
    }
}

impl From<SpeciesCode> for String {
    fn from(code: SpeciesCode) -> Self {
        code.0
    }
}

impl fmt::Display for SpeciesCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tree species metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Essence {
    pub code: SpeciesCode,
    pub name: String,
    /// Display color ("#2E7D32")
    #[serde(default)]
    pub color: Option<String>,
    /// Silvicultural category ("feuillu", "resineux", ...)
    #[serde(default)]
    pub category: Option<String>,
    /// Wood density in kg/m³
    #[serde(default)]
    pub density: Option<f64>,
}

/// Snapshot of all species, keyed by normalized code
#[derive(Debug, Clone, Default)]
pub struct SpeciesCatalog {
    by_code: FxHashMap<SpeciesCode, Essence>,
}

impl SpeciesCatalog {
    pub fn new(essences: impl IntoIterator<Item = Essence>) -> Self {
        let by_code = essences
            .into_iter()
            .map(|essence| (essence.code.clone(), essence))
            .collect();
        Self { by_code }
    }

    pub fn get(&self, code: &SpeciesCode) -> Option<&Essence> {
        self.by_code.get(code)
    }

    /// Display name, falling back to the code for species missing from the catalog
    pub fn display_name(&self, code: &SpeciesCode) -> String {
        self.by_code
            .get(code)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| code.to_string())
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_normalization() {
        assert_eq!(SpeciesCode::new("  che "), SpeciesCode::new("CHE"));
        assert_eq!(SpeciesCode::from("Het").as_str(), "HET");
    }

    #[test]
    fn test_code_deserializes_normalized() {
        let code: SpeciesCode = serde_json::from_str("\" sap\"").unwrap();
        assert_eq!(code.as_str(), "SAP");
    }

    #[test]
    fn test_display_name_fallback() {
        let catalog = SpeciesCatalog::new(vec![Essence {
            code: SpeciesCode::new("CHE"),
            name: "Chêne sessile".to_string(),
            color: None,
            category: Some("feuillu".to_string()),
            density: Some(710.0),
        }]);

        assert_eq!(catalog.display_name(&SpeciesCode::new("che")), "Chêne sessile");
        assert_eq!(catalog.display_name(&SpeciesCode::new("ERA")), "ERA");
        assert_eq!(catalog.len(), 1);
    }
}
