use serde::{Deserialize, Serialize};

const THRESHOLD_TOLERANCE: f64 = 1e-9;

/// Operating thresholds that have a banding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingThreshold {
    /// 0.50
    Half,
    /// 0.45
    FortyFive,
    /// 0.40
    Forty,
}

impl OperatingThreshold {
    pub const ALL: [OperatingThreshold; 3] = [Self::Half, Self::FortyFive, Self::Forty];

    pub fn value(self) -> f64 {
        match self {
            Self::Half => 0.5,
            Self::FortyFive => 0.45,
            Self::Forty => 0.4,
        }
    }

    /// Matches `value` against the supported set; anything else has no table.
    pub fn from_value(value: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|threshold| (threshold.value() - value).abs() < THRESHOLD_TOLERANCE)
    }

    pub fn supported_values() -> [f64; 3] {
        Self::ALL.map(Self::value)
    }

    /// Half-width step the band boundaries are expressed in.
    pub fn delta(self) -> f64 {
        0.5 * self.value()
    }

    pub fn band_table(self) -> BandTable {
        let delta = self.delta();
        let bands = match self {
            Self::Half => vec![
                SeverityBand::new(0.0, delta, "Baixa", "improvável"),
                SeverityBand::new(delta, 2.0 * delta, "Leve", "possível"),
                SeverityBand::new(2.0 * delta, 3.0 * delta, "Moderada", "provável"),
                SeverityBand::new(3.0 * delta, 1.0, "Alta", "muito provável"),
            ],
            Self::FortyFive => vec![
                SeverityBand::new(0.0, delta, "Baixa", "improvável"),
                SeverityBand::new(
                    delta,
                    2.0 * delta,
                    "Sinal Inicial",
                    "recomenda-se observação",
                ),
                SeverityBand::new(2.0 * delta, 0.55, "Leve", "possível"),
                SeverityBand::new(0.55, 0.775, "Moderada", "provável"),
                SeverityBand::new(0.775, 1.0, "Alta", "muito provável"),
            ],
            Self::Forty => vec![
                SeverityBand::new(0.0, delta, "Baixa", "improvável"),
                SeverityBand::new(
                    delta,
                    2.0 * delta,
                    "Baixa a Leve",
                    "possibilidade não descartada",
                ),
                SeverityBand::new(2.0 * delta, 3.0 * delta, "Leve", "possível"),
                SeverityBand::new(3.0 * delta, 4.0 * delta, "Moderada", "provável"),
                SeverityBand::new(4.0 * delta, 1.0, "Alta", "muito provável"),
            ],
        };

        BandTable {
            threshold: self.value(),
            bands,
        }
    }
}

/// Scorer output known to lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Probability(f64);

impl Probability {
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Binary outcome against the operating threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Positive,
    Negative,
}

impl Decision {
    pub fn label(self) -> &'static str {
        match self {
            Decision::Positive => "TEA",
            Decision::Negative => "Não TEA",
        }
    }
}

/// Named probability range with interpretive text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityBand {
    pub lower: f64,
    pub upper: f64,
    pub label: &'static str,
    pub interpretation: &'static str,
}

impl SeverityBand {
    fn new(lower: f64, upper: f64, label: &'static str, interpretation: &'static str) -> Self {
        Self {
            lower,
            upper,
            label,
            interpretation,
        }
    }
}

/// Ordered bands for one threshold. Lower bounds are inclusive, upper bounds exclusive,
/// except the last band which also includes 1.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandTable {
    pub threshold: f64,
    pub bands: Vec<SeverityBand>,
}

impl BandTable {
    pub fn band_for(&self, probability: Probability) -> &SeverityBand {
        let p = probability.value();
        let last = self.bands.len() - 1;
        self.bands
            .iter()
            .enumerate()
            .find(|(index, band)| {
                p >= band.lower && (p < band.upper || (*index == last && p <= band.upper))
            })
            .map(|(_, band)| band)
            .unwrap_or(&self.bands[last])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub decision: Decision,
    pub severity: &'static str,
    pub interpretation: &'static str,
}

/// Applies the decision rule and the banding table of one threshold.
#[derive(Debug, Clone)]
pub struct ThresholdClassifier {
    threshold: OperatingThreshold,
    table: BandTable,
}

impl ThresholdClassifier {
    pub fn new(threshold: OperatingThreshold) -> Self {
        Self {
            threshold,
            table: threshold.band_table(),
        }
    }

    pub fn threshold(&self) -> OperatingThreshold {
        self.threshold
    }

    pub fn table(&self) -> &BandTable {
        &self.table
    }

    pub fn classify(&self, probability: Probability) -> Classification {
        // Strictly greater: a probability equal to the threshold is negative.
        let decision = if probability.value() > self.threshold.value() {
            Decision::Positive
        } else {
            Decision::Negative
        };
        let band = self.table.band_for(probability);

        Classification {
            decision,
            severity: band.label,
            interpretation: band.interpretation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(threshold: OperatingThreshold, value: f64) -> Classification {
        ThresholdClassifier::new(threshold)
            .classify(Probability::new(value).expect("probability in range"))
    }

    #[test]
    fn half_threshold_band_boundaries() {
        let cases = [
            (0.0, "Baixa"),
            (0.24999, "Baixa"),
            (0.25, "Leve"),
            (0.49, "Leve"),
            (0.5, "Moderada"),
            (0.75, "Alta"),
            (1.0, "Alta"),
        ];
        for (p, label) in cases {
            assert_eq!(classify(OperatingThreshold::Half, p).severity, label, "p={p}");
        }
    }

    #[test]
    fn decision_requires_strictly_greater_probability() {
        assert_eq!(
            classify(OperatingThreshold::Half, 0.5).decision,
            Decision::Negative
        );
        assert_eq!(
            classify(OperatingThreshold::Half, 0.5000001).decision,
            Decision::Positive
        );
    }

    #[test]
    fn forty_five_threshold_inserts_initial_signal_band() {
        let result = classify(OperatingThreshold::FortyFive, 0.50);
        assert_eq!(result.severity, "Leve");
        assert_eq!(result.interpretation, "possível");
        assert_eq!(result.decision, Decision::Positive);

        assert_eq!(
            classify(OperatingThreshold::FortyFive, 0.3).severity,
            "Sinal Inicial"
        );
        assert_eq!(
            classify(OperatingThreshold::FortyFive, 0.55).severity,
            "Moderada"
        );
        assert_eq!(
            classify(OperatingThreshold::FortyFive, 0.775).severity,
            "Alta"
        );
    }

    #[test]
    fn forty_threshold_uses_five_bands() {
        let table = OperatingThreshold::Forty.band_table();
        let labels: Vec<_> = table.bands.iter().map(|band| band.label).collect();
        assert_eq!(
            labels,
            ["Baixa", "Baixa a Leve", "Leve", "Moderada", "Alta"]
        );
        assert_eq!(
            classify(OperatingThreshold::Forty, 0.2).interpretation,
            "possibilidade não descartada"
        );
        assert_eq!(classify(OperatingThreshold::Forty, 0.79).severity, "Moderada");
        assert_eq!(classify(OperatingThreshold::Forty, 0.8).severity, "Alta");
    }

    #[test]
    fn every_table_covers_the_unit_interval_without_gaps() {
        for threshold in OperatingThreshold::ALL {
            let table = threshold.band_table();
            assert_eq!(table.bands.first().map(|band| band.lower), Some(0.0));
            assert_eq!(table.bands.last().map(|band| band.upper), Some(1.0));
            for pair in table.bands.windows(2) {
                assert_eq!(pair[0].upper, pair[1].lower, "{threshold:?}");
            }
        }
    }

    #[test]
    fn threshold_lookup_rejects_unsupported_values() {
        assert_eq!(
            OperatingThreshold::from_value(0.45),
            Some(OperatingThreshold::FortyFive)
        );
        assert!(OperatingThreshold::from_value(0.6).is_none());
        assert!(OperatingThreshold::from_value(f64::NAN).is_none());
    }

    #[test]
    fn probability_rejects_out_of_range_values() {
        assert!(Probability::new(-0.01).is_none());
        assert!(Probability::new(1.01).is_none());
        assert!(Probability::new(f64::NAN).is_none());
        assert!(Probability::new(1.0).is_some());
    }
}
