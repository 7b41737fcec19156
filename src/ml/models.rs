use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Artifact layout version understood by this build
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Number of failure classes the maintenance model predicts
pub const NUM_FAILURE_CLASSES: usize = 3;

/// Fitted scaler parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub format_version: u32,
    pub normalizer: NormalizerSpec,
}

/// The two scaler layouts produced by the training side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizerSpec {
    /// One fitted scaler per feature name
    PerFeature {
        features: BTreeMap<String, FeatureScaling>,
    },

    /// A single standard scaler fitted over an ordered feature list
    Holistic {
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
}

/// Fitted parameters for a single feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureScaling {
    /// `(x - mean) / scale`
    Standard { mean: f64, scale: f64 },

    /// `x * scale + min`
    MinMax { min: f64, scale: f64 },
}

impl FeatureScaling {
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            FeatureScaling::Standard { mean, scale } => (value - mean) / scale,
            FeatureScaling::MinMax { min, scale } => value * scale + min,
        }
    }
}

/// Trained boosted-tree classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub format_version: u32,
    pub name: String,
    pub version: String,
    pub objective: Objective,
    pub num_class: usize,
    /// Class labels in the model's internal class order
    pub class_labels: Vec<String>,
    /// Feature names in the exact column order the model was fit with
    pub feature_names: Vec<String>,
    pub base_scores: Vec<f64>,
    pub trees: Vec<TreeSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Softmax over per-class raw scores
    Multiclass,
}

/// One regression tree contributing to a single class score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    pub class_index: usize,
    /// Node 0 is the root
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// `x <= threshold` goes left; NaN follows `default_left`
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Number of input features
    pub n_features: usize,

    /// Number of classes
    pub n_classes: usize,

    /// Number of trees in the forest
    pub n_trees: usize,

    /// Class labels in model order
    pub class_labels: Vec<String>,

    /// Feature names in model order
    pub feature_names: Vec<String>,

    /// When the artifact was loaded
    pub loaded_at: chrono::DateTime<chrono::Utc>,

    /// SHA-256 of the artifact bytes, when known
    pub checksum: Option<String>,
}

/// Class scores for one feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Argmax class index in model order
    pub label: usize,

    /// Probability of the predicted class (0.0 - 1.0)
    pub confidence: f64,

    /// All class probabilities in model order
    pub probabilities: Vec<f64>,
}

impl Score {
    /// Build from a probability vector; ties resolve to the lowest index
    pub fn from_probabilities(probabilities: Vec<f64>) -> Self {
        let (label, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (idx, p)| {
                if p > best.1 {
                    (idx, p)
                } else {
                    best
                }
            });

        Self {
            label,
            confidence,
            probabilities,
        }
    }
}

/// Named feature values in the model's column order
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalFeatureVector {
    names: Arc<[String]>,
    values: Vec<f64>,
}

impl CanonicalFeatureVector {
    pub(crate) fn from_parts(names: Arc<[String]>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<f64>) =
            pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self {
            names: names.into(),
            values,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.values[idx])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
