use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Failure classes the maintenance model distinguishes
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FailureClass {
    EngineFailure,
    OverstrainFailure,
    HeatDissipationFailure,
}

impl FailureClass {
    /// Parse a class label as written in a model artifact.
    ///
    /// Accepts `engine_failure`, `Engine Failure`, `engine-failure` and so on.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        Self::from_str(&normalized).ok()
    }

    /// Human-readable name for presentation layers
    pub fn display_name(&self) -> &'static str {
        match self {
            FailureClass::EngineFailure => "Engine Failure",
            FailureClass::OverstrainFailure => "Overstrain Failure",
            FailureClass::HeatDissipationFailure => "Heat Dissipation Failure",
        }
    }
}

/// Class probabilities keyed by failure class rather than model position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FailureProbabilities {
    pub engine_failure: f64,
    pub overstrain_failure: f64,
    pub heat_dissipation_failure: f64,
}

impl FailureProbabilities {
    /// Build from the model's class ordering and its probability vector.
    ///
    /// `classes[i]` names the class that `probabilities[i]` belongs to.
    pub fn from_ordered(classes: &[FailureClass], probabilities: &[f64]) -> Self {
        let mut out = Self::default();
        for (class, &p) in classes.iter().zip(probabilities) {
            *out.get_mut(*class) = p;
        }
        out
    }

    pub fn get(&self, class: FailureClass) -> f64 {
        match class {
            FailureClass::EngineFailure => self.engine_failure,
            FailureClass::OverstrainFailure => self.overstrain_failure,
            FailureClass::HeatDissipationFailure => self.heat_dissipation_failure,
        }
    }

    fn get_mut(&mut self, class: FailureClass) -> &mut f64 {
        match class {
            FailureClass::EngineFailure => &mut self.engine_failure,
            FailureClass::OverstrainFailure => &mut self.overstrain_failure,
            FailureClass::HeatDissipationFailure => &mut self.heat_dissipation_failure,
        }
    }

    pub fn sum(&self) -> f64 {
        self.engine_failure + self.overstrain_failure + self.heat_dissipation_failure
    }
}

/// Ranked prediction for a single vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Vehicle identifier (or `record-<index>` when the row had none)
    pub vehicle_id: String,

    /// Predicted class index in the model's class ordering
    pub predicted_class: usize,

    /// Failure class holding the highest probability
    pub highest_failure: FailureClass,

    /// Per-class probabilities
    pub probabilities: FailureProbabilities,

    /// Maximum class probability, used for ranking
    pub urgency: f64,

    /// Last service date, when present and parseable
    pub last_serviced_date: Option<NaiveDate>,

    /// Service is older than the configured maintenance interval
    pub maintenance_due: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_failure_class_labels() {
        assert_eq!(
            FailureClass::from_label("engine_failure"),
            Some(FailureClass::EngineFailure)
        );
        assert_eq!(
            FailureClass::from_label("Heat Dissipation Failure"),
            Some(FailureClass::HeatDissipationFailure)
        );
        assert_eq!(
            FailureClass::from_label("overstrain-failure"),
            Some(FailureClass::OverstrainFailure)
        );
        assert_eq!(FailureClass::from_label("brake_failure"), None);
    }

    #[test]
    fn test_failure_class_display() {
        assert_eq!(FailureClass::EngineFailure.to_string(), "engine_failure");
        assert_eq!(
            FailureClass::OverstrainFailure.display_name(),
            "Overstrain Failure"
        );
        assert_eq!(FailureClass::iter().count(), 3);
    }

    #[test]
    fn test_probabilities_follow_model_ordering() {
        // Model declares heat dissipation first
        let classes = [
            FailureClass::HeatDissipationFailure,
            FailureClass::EngineFailure,
            FailureClass::OverstrainFailure,
        ];
        let probs = FailureProbabilities::from_ordered(&classes, &[0.6, 0.3, 0.1]);

        assert_eq!(probs.heat_dissipation_failure, 0.6);
        assert_eq!(probs.engine_failure, 0.3);
        assert_eq!(probs.overstrain_failure, 0.1);
        assert!((probs.sum() - 1.0).abs() < 1e-12);
    }
}
