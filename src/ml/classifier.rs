use crate::error::{ArtifactLoadError, ScoringError};
use crate::ml::models::{
    CanonicalFeatureVector, ClassifierArtifact, ModelMetadata, Score, TreeNode,
    TreeSpec, ARTIFACT_FORMAT_VERSION, NUM_FAILURE_CLASSES,
};
use crate::models::FailureClass;
use ndarray::{Array2, ArrayView1};
use std::collections::HashSet;
use std::sync::Arc;

/// Trait for pre-trained classifiers
pub trait Classifier: Send + Sync {
    /// Predict class labels, one per row.
    ///
    /// Columns must follow `feature_names()`; see `predict_proba`.
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>, ScoringError>;

    /// Predict class probabilities (n_samples x n_classes).
    ///
    /// Columns are read by position and must be supplied in `feature_names()`
    /// order. A matrix carries no column names, so only its width is checked;
    /// permuted columns of the right width are scored as given. Prefer
    /// `GradientBoostedClassifier::score` with a named vector when the order
    /// is not guaranteed.
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>, ScoringError>;

    /// Feature names in the column order the model expects
    fn feature_names(&self) -> &[String];

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;
}

/// Multiclass gradient-boosted forest
#[derive(Debug, Clone)]
pub struct GradientBoostedClassifier {
    metadata: ModelMetadata,
    feature_names: Arc<[String]>,
    classes: Vec<FailureClass>,
    base_scores: Vec<f64>,
    trees: Vec<TreeSpec>,
}

impl GradientBoostedClassifier {
    /// Validate an artifact and build the forest from it
    pub fn from_artifact(
        artifact: ClassifierArtifact,
        checksum: Option<String>,
    ) -> Result<Self, ArtifactLoadError> {
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactLoadError::Invalid(format!(
                "classifier format_version {} is not supported (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }

        if artifact.num_class != NUM_FAILURE_CLASSES {
            return Err(ArtifactLoadError::Invalid(format!(
                "num_class must be {}, got {}",
                NUM_FAILURE_CLASSES, artifact.num_class
            )));
        }
        if artifact.class_labels.len() != artifact.num_class
            || artifact.base_scores.len() != artifact.num_class
        {
            return Err(ArtifactLoadError::Invalid(format!(
                "num_class is {} but {} class labels and {} base scores were declared",
                artifact.num_class,
                artifact.class_labels.len(),
                artifact.base_scores.len()
            )));
        }
        if artifact.base_scores.iter().any(|s| !s.is_finite()) {
            return Err(ArtifactLoadError::Invalid(
                "base scores must be finite".to_string(),
            ));
        }

        let classes = Self::resolve_classes(&artifact.class_labels)?;
        Self::validate_feature_names(&artifact.feature_names)?;

        if artifact.trees.is_empty() {
            return Err(ArtifactLoadError::Invalid(
                "classifier contains no trees".to_string(),
            ));
        }
        for (tree_idx, tree) in artifact.trees.iter().enumerate() {
            Self::validate_tree(
                tree_idx,
                tree,
                artifact.num_class,
                artifact.feature_names.len(),
            )?;
        }

        let metadata = ModelMetadata {
            name: artifact.name,
            version: artifact.version,
            n_features: artifact.feature_names.len(),
            n_classes: artifact.num_class,
            n_trees: artifact.trees.len(),
            class_labels: artifact.class_labels,
            feature_names: artifact.feature_names.clone(),
            loaded_at: chrono::Utc::now(),
            checksum,
        };

        Ok(Self {
            metadata,
            feature_names: artifact.feature_names.into(),
            classes,
            base_scores: artifact.base_scores,
            trees: artifact.trees,
        })
    }

    /// Failure class for each probability position
    pub fn classes(&self) -> &[FailureClass] {
        &self.classes
    }

    pub(crate) fn shared_feature_names(&self) -> Arc<[String]> {
        Arc::clone(&self.feature_names)
    }

    /// Reject a declared feature list that differs from the model's, name for name
    pub fn check_features(&self, names: &[String]) -> Result<(), ScoringError> {
        if names == &self.feature_names[..] {
            return Ok(());
        }

        let declared: HashSet<&str> = names.iter().map(String::as_str).collect();
        let expected: HashSet<&str> = self.feature_names.iter().map(String::as_str).collect();

        let mut missing: Vec<String> = self
            .feature_names
            .iter()
            .filter(|n| !declared.contains(n.as_str()))
            .cloned()
            .collect();
        let unexpected: Vec<String> = names
            .iter()
            .filter(|n| !expected.contains(n.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            // Same names, different order or duplicated columns
            if let Some((pos, name)) = self
                .feature_names
                .iter()
                .enumerate()
                .find(|(pos, name)| names.get(*pos) != Some(*name))
            {
                missing.push(format!("{} (position {})", name, pos));
            }
        }

        Err(ScoringError::FeatureMismatch {
            missing,
            unexpected,
        })
    }

    /// Score one canonical vector
    pub fn score(&self, vector: &CanonicalFeatureVector) -> Result<Score, ScoringError> {
        self.check_features(vector.names())?;
        let row = ArrayView1::from(vector.values());
        let probabilities = self.row_probabilities(row)?;
        Ok(Score::from_probabilities(probabilities))
    }

    fn row_probabilities(&self, row: ArrayView1<f64>) -> Result<Vec<f64>, ScoringError> {
        let mut raw = self.base_scores.clone();
        for tree in &self.trees {
            raw[tree.class_index] += leaf_value(&tree.nodes, row);
        }

        if let Some(class_idx) = raw.iter().position(|s| !s.is_finite()) {
            return Err(ScoringError::NonFiniteScore(class_idx));
        }

        Ok(softmax(&raw))
    }

    fn check_columns(&self, features: &Array2<f64>) -> Result<(), ScoringError> {
        let n_cols = features.ncols();
        let n_expected = self.feature_names.len();
        if n_cols == n_expected {
            return Ok(());
        }

        // Width only; trailing model features are reported as missing
        let missing = self.feature_names.iter().skip(n_cols).cloned().collect();
        let unexpected = (n_expected..n_cols).map(|i| format!("column_{}", i)).collect();
        Err(ScoringError::FeatureMismatch {
            missing,
            unexpected,
        })
    }

    fn resolve_classes(labels: &[String]) -> Result<Vec<FailureClass>, ArtifactLoadError> {
        let mut classes = Vec::with_capacity(labels.len());
        for label in labels {
            let class = FailureClass::from_label(label).ok_or_else(|| {
                ArtifactLoadError::Invalid(format!("unknown class label: {}", label))
            })?;
            if classes.contains(&class) {
                return Err(ArtifactLoadError::Invalid(format!(
                    "class label {} declared more than once",
                    label
                )));
            }
            classes.push(class);
        }
        Ok(classes)
    }

    fn validate_feature_names(names: &[String]) -> Result<(), ArtifactLoadError> {
        if names.is_empty() {
            return Err(ArtifactLoadError::Invalid(
                "classifier declares no features".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for name in names {
            if name.trim().is_empty() {
                return Err(ArtifactLoadError::Invalid(
                    "classifier feature name must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(ArtifactLoadError::Invalid(format!(
                    "duplicate classifier feature: {}",
                    name
                )));
            }
        }
        Ok(())
    }

    fn validate_tree(
        tree_idx: usize,
        tree: &TreeSpec,
        n_classes: usize,
        n_features: usize,
    ) -> Result<(), ArtifactLoadError> {
        let invalid = |reason: String| {
            ArtifactLoadError::Invalid(format!("tree {}: {}", tree_idx, reason))
        };

        if tree.class_index >= n_classes {
            return Err(invalid(format!(
                "class_index {} out of range",
                tree.class_index
            )));
        }
        if tree.nodes.is_empty() {
            return Err(invalid("tree has no nodes".to_string()));
        }

        let n_nodes = tree.nodes.len();
        for (idx, node) in tree.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if feature >= n_features {
                        return Err(invalid(format!(
                            "node {} splits on feature {} but the model has {}",
                            idx, feature, n_features
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(invalid(format!("node {} has a non-finite threshold", idx)));
                    }
                    // Children strictly after the parent keeps traversal acyclic
                    for child in [left, right] {
                        if child <= idx || child >= n_nodes {
                            return Err(invalid(format!(
                                "node {} has invalid child {}",
                                idx, child
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(invalid(format!("node {} has a non-finite leaf", idx)));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Classifier for GradientBoostedClassifier {
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>, ScoringError> {
        let proba = self.predict_proba(features)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| Score::from_probabilities(row.to_vec()).label)
            .collect())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>, ScoringError> {
        self.check_columns(features)?;

        let n_samples = features.nrows();
        let mut proba = Array2::zeros((n_samples, self.classes.len()));
        for (i, row) in features.rows().into_iter().enumerate() {
            for (j, p) in self.row_probabilities(row)?.into_iter().enumerate() {
                proba[[i, j]] = p;
            }
        }

        Ok(proba)
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

fn leaf_value(nodes: &[TreeNode], row: ArrayView1<f64>) -> f64 {
    let mut idx = 0;
    loop {
        match nodes[idx] {
            TreeNode::Leaf { value } => return value,
            TreeNode::Split {
                feature,
                threshold,
                default_left,
                left,
                right,
            } => {
                let x = row[feature];
                let go_left = if x.is_nan() {
                    default_left
                } else {
                    x <= threshold
                };
                idx = if go_left { left } else { right };
            }
        }
    }
}

fn softmax(raw: &[f64]) -> Vec<f64> {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = raw.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
