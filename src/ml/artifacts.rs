use crate::config::ArtifactConfig;
use crate::error::ArtifactLoadError;
use crate::metrics::ARTIFACT_LOADS_TOTAL;
use crate::ml::classifier::{Classifier, GradientBoostedClassifier};
use crate::ml::models::{ClassifierArtifact, ScalerArtifact, ARTIFACT_FORMAT_VERSION};
use crate::ml::scaler::{self, Normalizer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// On-disk encoding, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Bincode,
}

impl ArtifactFormat {
    pub fn from_path(path: &Path) -> Result<Self, ArtifactLoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => Ok(ArtifactFormat::Json),
            Some("bin") => Ok(ArtifactFormat::Bincode),
            _ => Err(ArtifactLoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Scaler and classifier loaded together and shared by every scoring call
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub normalizer: Arc<dyn Normalizer>,
    pub classifier: Arc<GradientBoostedClassifier>,
}

impl ModelArtifacts {
    pub fn new(normalizer: Arc<dyn Normalizer>, classifier: GradientBoostedClassifier) -> Self {
        Self {
            normalizer,
            classifier: Arc::new(classifier),
        }
    }

    /// Load both artifacts, verifying any configured checksums
    pub fn load(config: &ArtifactConfig) -> Result<Self, ArtifactLoadError> {
        let normalizer = record_load("scaler", load_scaler(config))?;
        let classifier = record_load("model", load_classifier(config))?;

        let metadata = classifier.metadata();
        info!(
            model = %metadata.name,
            version = %metadata.version,
            features = metadata.n_features,
            trees = metadata.n_trees,
            normalizer = %normalizer.kind(),
            "Model artifacts loaded"
        );

        Ok(Self::new(normalizer, classifier))
    }
}

fn load_scaler(config: &ArtifactConfig) -> Result<Arc<dyn Normalizer>, ArtifactLoadError> {
    let (artifact, _) = read_artifact::<ScalerArtifact>(
        &config.scaler_path,
        config.scaler_sha256.as_deref(),
    )?;
    scaler::from_spec(artifact.normalizer)
}

fn load_classifier(config: &ArtifactConfig) -> Result<GradientBoostedClassifier, ArtifactLoadError> {
    let (artifact, checksum) = read_artifact::<ClassifierArtifact>(
        &config.model_path,
        config.model_sha256.as_deref(),
    )?;
    GradientBoostedClassifier::from_artifact(artifact, Some(checksum))
}

fn record_load<T>(
    artifact: &str,
    result: Result<T, ArtifactLoadError>,
) -> Result<T, ArtifactLoadError> {
    let outcome = if result.is_ok() { "success" } else { "error" };
    ARTIFACT_LOADS_TOTAL
        .with_label_values(&[artifact, outcome])
        .inc();
    if let Err(e) = &result {
        warn!(artifact, error = %e, "Artifact load failed");
    }
    result
}

/// Read, verify and decode a versioned artifact.
///
/// Returns the decoded value with the SHA-256 of the file bytes.
pub fn read_artifact<T: DeserializeOwned>(
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<(T, String), ArtifactLoadError> {
    let format = ArtifactFormat::from_path(path)?;
    let bytes = std::fs::read(path).map_err(|source| ArtifactLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let checksum = format!("{:x}", Sha256::digest(&bytes));
    if let Some(expected) = expected_sha256 {
        if !expected.eq_ignore_ascii_case(&checksum) {
            return Err(ArtifactLoadError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.to_ascii_lowercase(),
                actual: checksum,
            });
        }
    }

    let decode_error = |reason: String| ArtifactLoadError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    // Check the version before the full decode so a newer layout reports
    // as unsupported rather than malformed
    let value = match format {
        ArtifactFormat::Json => {
            let document: serde_json::Value =
                serde_json::from_slice(&bytes).map_err(|e| decode_error(e.to_string()))?;
            let version = document
                .get("format_version")
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| decode_error("missing format_version".to_string()))?;
            check_version(path, version)?;
            serde_json::from_value(document).map_err(|e| decode_error(e.to_string()))?
        }
        ArtifactFormat::Bincode => {
            // format_version is the leading field of every artifact
            let version: u32 =
                bincode::deserialize(&bytes).map_err(|e| decode_error(e.to_string()))?;
            check_version(path, u64::from(version))?;
            bincode::deserialize(&bytes).map_err(|e| decode_error(e.to_string()))?
        }
    };

    debug!(path = %path.display(), checksum = %checksum, "Artifact decoded");
    Ok((value, checksum))
}

/// Encode an artifact in the format implied by the path's extension
pub fn write_artifact<T: Serialize>(path: &Path, artifact: &T) -> Result<(), ArtifactLoadError> {
    let encode_error = |reason: String| ArtifactLoadError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = match ArtifactFormat::from_path(path)? {
        ArtifactFormat::Json => {
            serde_json::to_vec_pretty(artifact).map_err(|e| encode_error(e.to_string()))?
        }
        ArtifactFormat::Bincode => {
            bincode::serialize(artifact).map_err(|e| encode_error(e.to_string()))?
        }
    };

    std::fs::write(path, bytes).map_err(|source| ArtifactLoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn check_version(path: &Path, found: u64) -> Result<(), ArtifactLoadError> {
    if found != u64::from(ARTIFACT_FORMAT_VERSION) {
        return Err(ArtifactLoadError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: u32::try_from(found).unwrap_or(u32::MAX),
            supported: ARTIFACT_FORMAT_VERSION,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::models::{FeatureScaling, NormalizerSpec, Objective, TreeNode, TreeSpec};
    use crate::ml::scaler::NormalizerKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn scaler_artifact() -> ScalerArtifact {
        ScalerArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            normalizer: NormalizerSpec::PerFeature {
                features: [(
                    "Engine_Load".to_string(),
                    FeatureScaling::Standard {
                        mean: 30.0,
                        scale: 10.0,
                    },
                )]
                .into_iter()
                .collect(),
            },
        }
    }

    fn classifier_artifact() -> ClassifierArtifact {
        ClassifierArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            name: "maintenance".into(),
            version: "2024.1".into(),
            objective: Objective::Multiclass,
            num_class: 3,
            class_labels: vec![
                "Engine Failure".into(),
                "Overstrain Failure".into(),
                "Heat Dissipation Failure".into(),
            ],
            feature_names: vec!["Engine_Load".into()],
            base_scores: vec![0.1, 0.0, -0.1],
            trees: vec![TreeSpec {
                class_index: 0,
                nodes: vec![
                    TreeNode::Split {
                        feature: 0,
                        threshold: 0.0,
                        default_left: true,
                        left: 1,
                        right: 2,
                    },
                    TreeNode::Leaf { value: -0.5 },
                    TreeNode::Leaf { value: 0.5 },
                ],
            }],
        }
    }

    fn write_pair(dir: &TempDir, ext: &str) -> ArtifactConfig {
        let scaler_path = dir.path().join(format!("scaler.{}", ext));
        let model_path = dir.path().join(format!("model.{}", ext));
        write_artifact(&scaler_path, &scaler_artifact()).unwrap();
        write_artifact(&model_path, &classifier_artifact()).unwrap();
        ArtifactConfig {
            scaler_path,
            model_path,
            scaler_sha256: None,
            model_sha256: None,
        }
    }

    fn sha256_of(path: &Path) -> String {
        format!("{:x}", Sha256::digest(std::fs::read(path).unwrap()))
    }

    #[test]
    fn test_load_json_artifacts() {
        let dir = TempDir::new().unwrap();
        let config = write_pair(&dir, "json");

        let artifacts = ModelArtifacts::load(&config).unwrap();
        assert_eq!(artifacts.normalizer.kind(), NormalizerKind::PerFeature);
        assert_eq!(artifacts.classifier.metadata().name, "maintenance");
        assert_eq!(
            artifacts.classifier.metadata().checksum.as_deref(),
            Some(sha256_of(&config.model_path).as_str())
        );
    }

    #[test]
    fn test_load_bincode_artifacts() {
        let dir = TempDir::new().unwrap();
        let config = write_pair(&dir, "bin");

        let artifacts = ModelArtifacts::load(&config).unwrap();
        assert_eq!(artifacts.classifier.metadata().n_trees, 1);
        assert_eq!(artifacts.normalizer.scaled_features(), vec!["Engine_Load"]);
    }

    #[test]
    fn test_checksum_verification() {
        let dir = TempDir::new().unwrap();
        let mut config = write_pair(&dir, "json");

        config.model_sha256 = Some(sha256_of(&config.model_path).to_uppercase());
        assert!(ModelArtifacts::load(&config).is_ok());

        config.model_sha256 = Some("0".repeat(64));
        assert!(matches!(
            ModelArtifacts::load(&config),
            Err(ArtifactLoadError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scaler.json");
        std::fs::write(&path, r#"{"format_version": 7, "normalizer": {"future": {}}}"#).unwrap();

        let result = read_artifact::<ScalerArtifact>(&path, None);
        assert!(matches!(
            result,
            Err(ArtifactLoadError::UnsupportedVersion { found: 7, .. })
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = read_artifact::<ScalerArtifact>(&PathBuf::from("scaler.pkl"), None);
        assert!(matches!(result, Err(ArtifactLoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_artifact::<ScalerArtifact>(&dir.path().join("absent.json"), None);
        assert!(matches!(result, Err(ArtifactLoadError::Io { .. })));
    }

    #[test]
    fn test_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = read_artifact::<ClassifierArtifact>(&path, None);
        assert!(matches!(result, Err(ArtifactLoadError::Decode { .. })));
    }

    #[test]
    fn test_invalid_classifier_rejected_at_load() {
        let dir = TempDir::new().unwrap();
        let mut config = write_pair(&dir, "json");

        let mut broken = classifier_artifact();
        broken.class_labels[2] = "Brake Failure".into();
        config.model_path = dir.path().join("broken.json");
        write_artifact(&config.model_path, &broken).unwrap();

        assert!(matches!(
            ModelArtifacts::load(&config),
            Err(ArtifactLoadError::Invalid(_))
        ));
    }
}
