use std::collections::{BTreeMap, HashSet};
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::screening::artifacts::ArtifactError;

/// Standardization parameters fit at training time: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub mean: f64,
    pub scale: f64,
}

impl ScalerParams {
    pub fn apply(&self, value: f64) -> f64 {
        // A constant training column has scale 0; it is left unscaled.
        let scale = if self.scale == 0.0 || !self.scale.is_finite() {
            1.0
        } else {
            self.scale
        };
        (value - self.mean) / scale
    }
}

/// Parameters learned at training time that the transformer replays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    pub scaler: ScalerParams,
    /// Ordered categories per categorical field.
    #[serde(default)]
    pub vocabulary: BTreeMap<String, Vec<String>>,
}

impl TransformParams {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ArtifactError> {
        let params: TransformParams = serde_json::from_reader(reader)?;
        if !params.scaler.mean.is_finite() {
            return Err(ArtifactError::InvalidParams(
                "scaler mean must be finite".to_string(),
            ));
        }
        Ok(params)
    }

    pub fn categories(&self, field: &str) -> &[String] {
        self.vocabulary
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Ordered feature names the scorer expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Result<Self, ArtifactError> {
        if names.is_empty() {
            return Err(ArtifactError::EmptySchema);
        }
        let duplicate = {
            let mut seen = HashSet::new();
            names.iter().find(|name| !seen.insert(name.as_str())).cloned()
        };
        if let Some(duplicate) = duplicate {
            return Err(ArtifactError::DuplicateFeature(duplicate));
        }
        Ok(Self { names })
    }

    /// Reads a header-less, one-name-per-row CSV.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ArtifactError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut names = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            if let Some(name) = row.get(0).filter(|name| !name.is_empty()) {
                names.push(name.to_string());
            }
        }
        Self::new(names)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn schema_reads_first_column_without_header() {
        let schema = FeatureSchema::from_reader(Cursor::new("Col01\nCol11\n\nCol13_Sim\n"))
            .expect("loads");
        assert_eq!(schema.names(), ["Col01", "Col11", "Col13_Sim"]);
    }

    #[test]
    fn schema_rejects_duplicates_and_empty_lists() {
        assert!(matches!(
            FeatureSchema::from_reader(Cursor::new("Col01\nCol01\n")),
            Err(ArtifactError::DuplicateFeature(name)) if name == "Col01"
        ));
        assert!(matches!(
            FeatureSchema::from_reader(Cursor::new("")),
            Err(ArtifactError::EmptySchema)
        ));
    }

    #[test]
    fn params_parse_from_json() {
        let params = TransformParams::from_reader(Cursor::new(
            r#"{"scaler":{"mean":14.0,"scale":2.0},"vocabulary":{"Col13":["Sim","Não","missing"]}}"#,
        ))
        .expect("params parse");
        assert_eq!(params.scaler.apply(18.0), 2.0);
        assert_eq!(params.categories("Col13").len(), 3);
        assert!(params.categories("Col15").is_empty());
    }

    #[test]
    fn zero_scale_leaves_value_centered_only() {
        let scaler = ScalerParams {
            mean: 10.0,
            scale: 0.0,
        };
        assert_eq!(scaler.apply(12.0), 2.0);
    }
}
