//! Turns a loosely structured submission into the fixed-order vector the scorer expects.

pub mod fields;
mod params;

pub use params::{FeatureSchema, ScalerParams, TransformParams};

use std::collections::BTreeMap;

use serde::Serialize;

use super::record::RawRecord;
use fields::{
    encode_demographic, encode_indicator, parse_number, FieldKind, AGGREGATE_FIELD,
    AGGREGATE_MIN_FIELDS, AGGREGATE_SOURCE_FIELDS, MISSING_CATEGORY, UNKNOWN_PLACEHOLDER,
};

/// Numeric input for the scorer, aligned with a [`FeatureSchema`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Transformer bound to the parameters and schema loaded at startup.
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    params: TransformParams,
    schema: FeatureSchema,
}

impl FeatureTransformer {
    pub fn new(params: TransformParams, schema: FeatureSchema) -> Self {
        Self { params, schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn transform(&self, raw: &RawRecord) -> FeatureVector {
        transform(raw, &self.params, &self.schema)
    }
}

/// Builds the feature vector for `raw`. Never fails: unusable answers become missing and
/// missing values end up as `0.0` in the schema-ordered output.
pub fn transform(
    raw: &RawRecord,
    params: &TransformParams,
    schema: &FeatureSchema,
) -> FeatureVector {
    let wide = wide_features(raw, params);

    FeatureVector(
        schema
            .names()
            .iter()
            .map(|name| wide.get(name.as_str()).copied().flatten().unwrap_or(0.0))
            .collect(),
    )
}

/// Every engineered column the record yields, keyed by column name; `None` marks a missing
/// value.
fn wide_features(raw: &RawRecord, params: &TransformParams) -> BTreeMap<String, Option<f64>> {
    let mut wide = BTreeMap::new();

    for (field, value) in raw.fields() {
        let value = value.filter(|answer| *answer != UNKNOWN_PLACEHOLDER);
        match FieldKind::of(field) {
            FieldKind::Indicator => {
                wide.insert(field.to_string(), value.and_then(encode_indicator));
            }
            FieldKind::Demographic => {
                wide.insert(field.to_string(), value.and_then(encode_demographic));
            }
            FieldKind::Continuous => {
                let scaled = value
                    .and_then(parse_number)
                    .map(|number| params.scaler.apply(number))
                    .filter(|scaled| scaled.is_finite());
                wide.insert(field.to_string(), scaled);
            }
            FieldKind::Categorical => {
                let category = value.unwrap_or(MISSING_CATEGORY);
                // Unseen categories match nothing and leave the whole row at zero.
                for known in params.categories(field) {
                    let hot = if known == category { 1.0 } else { 0.0 };
                    wide.insert(format!("{field}_{known}"), Some(hot));
                }
            }
            FieldKind::Numeric => {
                wide.insert(field.to_string(), value.and_then(parse_number));
            }
        }
    }

    if raw.len() >= AGGREGATE_MIN_FIELDS && !raw.contains(AGGREGATE_FIELD) {
        let total = AGGREGATE_SOURCE_FIELDS
            .iter()
            .filter_map(|field| wide.get(*field).copied().flatten())
            .sum::<f64>();
        wide.insert(AGGREGATE_FIELD.to_string(), Some(total));
    }

    wide
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn params() -> TransformParams {
        let mut vocabulary = BTreeMap::new();
        vocabulary.insert(
            "Col13".to_string(),
            vec![
                "Escola pública".to_string(),
                "Escola particular".to_string(),
                "missing".to_string(),
            ],
        );
        vocabulary.insert(
            "Col15".to_string(),
            vec!["Não".to_string(), "Sim".to_string(), "missing".to_string()],
        );
        TransformParams {
            scaler: ScalerParams {
                mean: 14.0,
                scale: 2.0,
            },
            vocabulary,
        }
    }

    fn schema() -> FeatureSchema {
        let names = [
            "Col01", "Col02", "Col03", "Col11", "Col12", "Col18", "Col13_Escola pública",
            "Col13_Escola particular", "Col13_missing", "Col15_Não", "Col15_Sim", "Col15_missing",
        ];
        FeatureSchema::new(names.iter().map(|name| name.to_string()).collect()).expect("schema")
    }

    fn full_record() -> RawRecord {
        let mut record = RawRecord::new();
        for index in 1..=10 {
            let answer = if index % 2 == 0 { "Sim" } else { "Não" };
            record.insert(format!("Col{index:02}"), Some(answer.to_string()));
        }
        record
            .with("Col11", "16")
            .with("Col12", "Feminino")
            .with("Col13", "Escola particular")
    }

    fn value(vector: &FeatureVector, name: &str) -> f64 {
        let index = schema()
            .names()
            .iter()
            .position(|candidate| candidate == name)
            .expect("feature in schema");
        vector.as_slice()[index]
    }

    #[test]
    fn transform_encodes_known_fields_in_schema_order() {
        let vector = transform(&full_record(), &params(), &schema());

        assert_eq!(vector.len(), schema().len());
        assert_eq!(value(&vector, "Col01"), 0.0);
        assert_eq!(value(&vector, "Col02"), 1.0);
        assert_eq!(value(&vector, "Col11"), 1.0);
        assert_eq!(value(&vector, "Col12"), 1.0);
        assert_eq!(value(&vector, "Col18"), 5.0);
        assert_eq!(value(&vector, "Col13_Escola particular"), 1.0);
        assert_eq!(value(&vector, "Col13_Escola pública"), 0.0);
    }

    #[test]
    fn transform_is_bit_identical_across_calls() {
        let record = full_record().with("Col11", "15.3");
        let first = transform(&record, &params(), &schema());
        let second = transform(&record, &params(), &schema());
        let bits = |vector: &FeatureVector| -> Vec<u64> {
            vector.as_slice().iter().map(|value| value.to_bits()).collect()
        };
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn unseen_category_yields_all_zero_row() {
        let record = full_record().with("Col13", "Escola técnica");
        let vector = transform(&record, &params(), &schema());
        assert_eq!(value(&vector, "Col13_Escola pública"), 0.0);
        assert_eq!(value(&vector, "Col13_Escola particular"), 0.0);
        assert_eq!(value(&vector, "Col13_missing"), 0.0);
    }

    #[test]
    fn placeholder_category_falls_back_to_missing() {
        let record = full_record().with("Col15", "?");
        let vector = transform(&record, &params(), &schema());
        assert_eq!(value(&vector, "Col15_missing"), 1.0);
        assert_eq!(value(&vector, "Col15_Sim"), 0.0);
    }

    #[test]
    fn malformed_values_degrade_to_zero() {
        let record = full_record()
            .with("Col01", "?")
            .with("Col02", "Talvez")
            .with("Col11", "quatorze")
            .with("Col12", "?");
        let vector = transform(&record, &params(), &schema());
        assert_eq!(value(&vector, "Col01"), 0.0);
        assert_eq!(value(&vector, "Col02"), 0.0);
        assert_eq!(value(&vector, "Col11"), 0.0);
        assert_eq!(value(&vector, "Col12"), 0.0);
        assert!(vector.as_slice().iter().all(|value| value.is_finite()));
    }

    #[test]
    fn overflowing_age_is_treated_as_missing() {
        let mut params = params();
        params.scaler = ScalerParams {
            mean: 30.0,
            scale: 0.5,
        };
        let record = full_record().with("Col11", "1e308");
        let vector = transform(&record, &params, &schema());
        assert_eq!(value(&vector, "Col11"), 0.0);
        assert!(vector.as_slice().iter().all(|value| value.is_finite()));
    }

    #[test]
    fn aggregate_requires_enough_fields() {
        let sparse = RawRecord::new().with("Col01", "Sim").with("Col02", "Sim");
        let vector = transform(&sparse, &params(), &schema());
        assert_eq!(value(&vector, "Col18"), 0.0);
        assert_eq!(value(&vector, "Col01"), 1.0);
    }

    #[test]
    fn supplied_aggregate_is_not_recomputed() {
        let record = full_record().with("Col18", "9");
        let vector = transform(&record, &params(), &schema());
        assert_eq!(value(&vector, "Col18"), 9.0);
    }

    #[test]
    fn empty_record_still_fills_schema() {
        let vector = transform(&RawRecord::new(), &params(), &schema());
        assert_eq!(vector.len(), schema().len());
        assert!(vector.as_slice().iter().all(|value| *value == 0.0));
    }

    #[test]
    fn columns_outside_schema_are_dropped() {
        let record = full_record().with("Col99", "42").with("Col15", "Sim");
        let transformer = FeatureTransformer::new(params(), schema());
        let vector = transformer.transform(&record);
        assert_eq!(vector.len(), transformer.schema().len());
        assert_eq!(value(&vector, "Col15_Sim"), 1.0);
    }
}
