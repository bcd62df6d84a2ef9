//! Catalog of the questionnaire fields the transformer knows how to encode.
//!
//! Every known field has one declared encoding; fields outside the catalog pass through as
//! plain numbers. Presence is checked once per field while walking the raw record.

/// Literal answer meaning "unknown".
pub const UNKNOWN_PLACEHOLDER: &str = "?";

/// Category substituted for a categorical field with no usable answer.
pub const MISSING_CATEGORY: &str = "missing";

/// Two-valued yes/no questions.
pub const INDICATOR_FIELDS: [&str; 12] = [
    "Col01", "Col02", "Col03", "Col04", "Col05", "Col06", "Col07", "Col08", "Col09", "Col10",
    "Col14", "Col16",
];

/// Indicators summed into the aggregate score.
pub const AGGREGATE_SOURCE_FIELDS: [&str; 10] = [
    "Col01", "Col02", "Col03", "Col04", "Col05", "Col06", "Col07", "Col08", "Col09", "Col10",
];

/// Minimum number of fields a record needs before the aggregate is derived.
pub const AGGREGATE_MIN_FIELDS: usize = 10;

pub const AGGREGATE_FIELD: &str = "Col18";
pub const DEMOGRAPHIC_FIELD: &str = "Col12";
pub const CONTINUOUS_FIELD: &str = "Col11";
pub const CATEGORICAL_FIELDS: [&str; 3] = ["Col13", "Col15", "Col17"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `Sim` → 1, `Não` → 0.
    Indicator,
    /// `Masculino` → 0, `Feminino` → 1.
    Demographic,
    /// Standardized with the stored scaler.
    Continuous,
    /// One-hot encoded against the stored vocabulary.
    Categorical,
    /// Any other field, read as a number.
    Numeric,
}

impl FieldKind {
    pub fn of(field: &str) -> Self {
        if INDICATOR_FIELDS.contains(&field) {
            FieldKind::Indicator
        } else if field == DEMOGRAPHIC_FIELD {
            FieldKind::Demographic
        } else if field == CONTINUOUS_FIELD {
            FieldKind::Continuous
        } else if CATEGORICAL_FIELDS.contains(&field) {
            FieldKind::Categorical
        } else {
            FieldKind::Numeric
        }
    }
}

pub fn encode_indicator(value: &str) -> Option<f64> {
    match value {
        "Sim" => Some(1.0),
        "Não" => Some(0.0),
        _ => None,
    }
}

pub fn encode_demographic(value: &str) -> Option<f64> {
    match value {
        "Masculino" => Some(0.0),
        "Feminino" => Some(1.0),
        _ => None,
    }
}

/// Lenient numeric parse; accepts a decimal comma. Unparsable or non-finite input is missing.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let parsed = match trimmed.parse::<f64>() {
        Ok(number) => Some(number),
        Err(_) if !trimmed.contains('.') => trimmed.replacen(',', ".", 1).parse::<f64>().ok(),
        Err(_) => None,
    };
    parsed.filter(|number| number.is_finite())
}
