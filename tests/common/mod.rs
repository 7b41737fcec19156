//! Shared fixtures for integration tests
//!
//! A hand-built three-class forest over the nine base sensors and the four
//! derived risk features, a per-feature scaler fitted on plausible fleet
//! telemetry, and record builders.
#![allow(dead_code)]

use fleet_risk_ranker::{
    config::{ArtifactConfig, FeatureConfig, RankingConfig},
    ml::{
        write_artifact, ClassifierArtifact, FeatureScaling, GradientBoostedClassifier,
        ModelArtifacts, NormalizerSpec, RankingService, ScalerArtifact,
        TreeNode, TreeSpec,
    },
    ml::models::{Objective, ARTIFACT_FORMAT_VERSION},
    models::RawVehicleRecord,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Canonical base features with their (mean, scale)
pub const BASE_SCALING: &[(&str, f64, f64)] = &[
    ("Engine_Load", 40.0, 20.0),
    ("Engine_RPM", 2500.0, 800.0),
    ("Engine_Coolant_Temp", 90.0, 8.0),
    ("Vibration", 0.05, 0.03),
    ("Mass_Air_Flow_Rate", 12.0, 6.0),
    ("Engine_Oil_Temp", 95.0, 10.0),
    ("Trip_Distance", 100.0, 60.0),
    ("Trip_Time_journey", 1.5, 1.0),
    ("Turbo_Boost_And_Vcm_Gauge", 1.0, 0.4),
];

pub const DERIVED_FEATURES: &[&str] = &[
    "Condition_Score",
    "Overstrain_Risk",
    "Heat_Dissipation_Risk",
    "Power_Failure_Risk",
];

/// Model column order: base sensors, then derived features
pub fn model_feature_names() -> Vec<String> {
    BASE_SCALING
        .iter()
        .map(|(name, _, _)| name.to_string())
        .chain(DERIVED_FEATURES.iter().map(|name| name.to_string()))
        .collect()
}

fn feature_index(name: &str) -> usize {
    model_feature_names()
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("unknown fixture feature {}", name))
}

fn stump(class_index: usize, feature: &str, threshold: f64, left: f64, right: f64) -> TreeSpec {
    TreeSpec {
        class_index,
        nodes: vec![
            TreeNode::Split {
                feature: feature_index(feature),
                threshold,
                default_left: true,
                left: 1,
                right: 2,
            },
            TreeNode::Leaf { value: left },
            TreeNode::Leaf { value: right },
        ],
    }
}

pub fn scaler_spec(skip: &[&str]) -> NormalizerSpec {
    let features: BTreeMap<String, FeatureScaling> = BASE_SCALING
        .iter()
        .filter(|(name, _, _)| !skip.contains(name))
        .map(|(name, mean, scale)| {
            (
                name.to_string(),
                FeatureScaling::Standard {
                    mean: *mean,
                    scale: *scale,
                },
            )
        })
        .collect();
    NormalizerSpec::PerFeature { features }
}

pub fn holistic_scaler_spec() -> NormalizerSpec {
    NormalizerSpec::Holistic {
        feature_names: BASE_SCALING.iter().map(|(n, _, _)| n.to_string()).collect(),
        mean: BASE_SCALING.iter().map(|(_, m, _)| *m).collect(),
        scale: BASE_SCALING.iter().map(|(_, _, s)| *s).collect(),
    }
}

pub fn scaler_artifact() -> ScalerArtifact {
    ScalerArtifact {
        format_version: ARTIFACT_FORMAT_VERSION,
        normalizer: scaler_spec(&[]),
    }
}

pub fn classifier_artifact() -> ClassifierArtifact {
    ClassifierArtifact {
        format_version: ARTIFACT_FORMAT_VERSION,
        name: "predictive-maintenance".into(),
        version: "2024.06".into(),
        objective: Objective::Multiclass,
        num_class: 3,
        class_labels: vec![
            "Engine Failure".into(),
            "Overstrain Failure".into(),
            "Heat Dissipation Failure".into(),
        ],
        feature_names: model_feature_names(),
        base_scores: vec![0.1, 0.0, -0.1],
        trees: vec![
            stump(0, "Condition_Score", 0.5, -0.4, 0.8),
            stump(0, "Engine_Coolant_Temp", 1.0, -0.1, 0.6),
            stump(1, "Overstrain_Risk", 0.8, -0.3, 0.9),
            TreeSpec {
                class_index: 1,
                nodes: vec![
                    TreeNode::Split {
                        feature: feature_index("Engine_Load"),
                        threshold: 0.0,
                        default_left: false,
                        left: 1,
                        right: 2,
                    },
                    TreeNode::Leaf { value: -0.2 },
                    TreeNode::Split {
                        feature: feature_index("Engine_RPM"),
                        threshold: 1.0,
                        default_left: true,
                        left: 3,
                        right: 4,
                    },
                    TreeNode::Leaf { value: 0.1 },
                    TreeNode::Leaf { value: 0.7 },
                ],
            },
            stump(2, "Heat_Dissipation_Risk", 0.7, -0.2, 1.1),
            stump(2, "Power_Failure_Risk", 0.5, 0.0, 0.3),
        ],
    }
}

pub fn classifier() -> GradientBoostedClassifier {
    GradientBoostedClassifier::from_artifact(classifier_artifact(), None)
        .expect("fixture classifier is valid")
}

pub fn artifacts_with(spec: NormalizerSpec) -> ModelArtifacts {
    let normalizer = fleet_risk_ranker::ml::scaler::from_spec(spec).expect("fixture scaler is valid");
    ModelArtifacts::new(normalizer, classifier())
}

pub fn artifacts() -> ModelArtifacts {
    artifacts_with(scaler_spec(&[]))
}

pub fn ranking_config() -> RankingConfig {
    RankingConfig {
        parallel: false,
        ..RankingConfig::default()
    }
}

pub fn service() -> RankingService {
    RankingService::new(artifacts(), &FeatureConfig::default(), ranking_config())
}

pub fn service_with(artifacts: ModelArtifacts, config: RankingConfig) -> RankingService {
    RankingService::new(artifacts, &FeatureConfig::default(), config)
}

/// The reference telemetry row used throughout the docs
pub fn reference_record(vehicle_id: &str) -> RawVehicleRecord {
    RawVehicleRecord::new()
        .with("vehicle_id", vehicle_id)
        .with("user_id", "fleet-ops")
        .with("Engine_Load", 25.5)
        .with("Engine_RPM", 3000)
        .with("Engine_Coolant_Temp", 95)
        .with("Vibration", 0.02)
        .with("Mass_Air_Flow_Rate", 15.8)
        .with("Engine_Oil_Temp", 80)
        .with("Turbo_Boost_And_Vcm_Gauge", 1.1)
        .with("Trip_Distance", 150.5)
        .with("Trip_Time_Journey", 2.3)
}

/// A reference row pushed towards the given load and temperatures
pub fn record(vehicle_id: &str, load: f64, rpm: f64, coolant: f64, oil: f64) -> RawVehicleRecord {
    reference_record(vehicle_id)
        .with("Engine_Load", load)
        .with("Engine_RPM", rpm)
        .with("Engine_Coolant_Temp", coolant)
        .with("Engine_Oil_Temp", oil)
}

/// A varied fleet of `n` vehicles
pub fn fleet(n: usize) -> Vec<RawVehicleRecord> {
    (0..n)
        .map(|i| {
            let f = i as f64;
            record(
                &format!("VH-{:04}", i),
                10.0 + (f * 7.0) % 80.0,
                1200.0 + (f * 331.0) % 3600.0,
                80.0 + (f * 3.0) % 30.0,
                85.0 + (f * 5.0) % 35.0,
            )
            .with("user_id", if i % 2 == 0 { "alice" } else { "bob" })
        })
        .collect()
}

/// Write both artifacts to `dir` with the given extension
pub fn write_artifacts(dir: &Path, extension: &str) -> ArtifactConfig {
    let scaler_path = dir.join(format!("scaler.{}", extension));
    let model_path = dir.join(format!("model.{}", extension));
    write_artifact(&scaler_path, &scaler_artifact()).expect("write scaler");
    write_artifact(&model_path, &classifier_artifact()).expect("write model");
    ArtifactConfig {
        scaler_path,
        model_path,
        scaler_sha256: None,
        model_sha256: None,
    }
}

/// Extract metric value from a Prometheus output line
/// Example: `metric_name{label1="value1"} 42.5` -> Some(42.5)
pub fn extract_metric_value(line: &str) -> Option<f64> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    parts.last()?.parse::<f64>().ok()
}

/// Value of the first sample line starting with `prefix`
pub fn sample_value(output: &str, prefix: &str) -> Option<f64> {
    output
        .lines()
        .find(|line| line.starts_with(prefix))
        .and_then(extract_metric_value)
}

/// Validate that a Prometheus exposition format output is well-formed
pub fn validate_exposition_format(output: &str) -> Result<(), String> {
    for (i, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.starts_with("# TYPE") {
            let type_parts: Vec<&str> = line.split_whitespace().collect();
            if type_parts.len() < 4 {
                return Err(format!("Line {}: Invalid TYPE format", i + 1));
            }

            let valid_types = ["counter", "gauge", "histogram", "summary", "untyped"];
            if !valid_types.contains(&type_parts[3]) {
                return Err(format!(
                    "Line {}: Invalid metric type '{}'",
                    i + 1,
                    type_parts[3]
                ));
            }
        } else if !line.is_empty() && !line.starts_with('#') && extract_metric_value(line).is_none() {
            return Err(format!("Line {}: Sample without a numeric value", i + 1));
        }
    }

    Ok(())
}
