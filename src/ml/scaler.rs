use crate::error::{ArtifactLoadError, TransformError};
use crate::ml::models::{FeatureScaling, NormalizerSpec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use strum::{Display, IntoStaticStr};

/// Base feature values keyed by canonical name
pub type FeatureMap = BTreeMap<String, f64>;

/// Fitted normalization applied to base features before derivation.
///
/// Implementations accept a superset of the features they know; anything
/// they do not scale passes through unchanged.
pub trait Normalizer: Send + Sync + fmt::Debug {
    /// Scale the features this normalizer was fitted on
    fn scale(&self, features: FeatureMap) -> Result<FeatureMap, TransformError>;

    /// Canonical names this normalizer scales
    fn scaled_features(&self) -> Vec<&str>;

    /// Layout the parameters came from
    fn kind(&self) -> NormalizerKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NormalizerKind {
    PerFeature,
    Holistic,
}

/// Build the normalizer described by a scaler artifact
pub fn from_spec(spec: NormalizerSpec) -> Result<Arc<dyn Normalizer>, ArtifactLoadError> {
    match spec {
        NormalizerSpec::PerFeature { features } => Ok(Arc::new(PerFeatureScaler::new(features)?)),
        NormalizerSpec::Holistic {
            feature_names,
            mean,
            scale,
        } => Ok(Arc::new(HolisticScaler::new(feature_names, mean, scale)?)),
    }
}

/// One fitted scaler per feature; features without one pass through
#[derive(Debug, Clone)]
pub struct PerFeatureScaler {
    scalers: BTreeMap<String, FeatureScaling>,
}

impl PerFeatureScaler {
    pub fn new(scalers: BTreeMap<String, FeatureScaling>) -> Result<Self, ArtifactLoadError> {
        for (name, scaling) in &scalers {
            if name.trim().is_empty() {
                return Err(ArtifactLoadError::Invalid(
                    "scaler feature name must not be empty".to_string(),
                ));
            }
            let (offset, scale) = match *scaling {
                FeatureScaling::Standard { mean, scale } => (mean, scale),
                FeatureScaling::MinMax { min, scale } => (min, scale),
            };
            validate_parameters(name, offset, scale)?;
        }

        Ok(Self { scalers })
    }

    pub fn len(&self) -> usize {
        self.scalers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalers.is_empty()
    }
}

impl Normalizer for PerFeatureScaler {
    fn scale(&self, mut features: FeatureMap) -> Result<FeatureMap, TransformError> {
        for (name, value) in features.iter_mut() {
            if let Some(scaling) = self.scalers.get(name) {
                *value = scaling.apply(*value);
            }
        }
        Ok(features)
    }

    fn scaled_features(&self) -> Vec<&str> {
        self.scalers.keys().map(String::as_str).collect()
    }

    fn kind(&self) -> NormalizerKind {
        NormalizerKind::PerFeature
    }
}

/// A single standard scaler fitted jointly over an ordered feature list.
///
/// Like its training-side counterpart it needs every fitted column, so a
/// record lacking one of them cannot be scaled.
#[derive(Debug, Clone)]
pub struct HolisticScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl HolisticScaler {
    pub fn new(
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<Self, ArtifactLoadError> {
        if feature_names.len() != mean.len() || feature_names.len() != scale.len() {
            return Err(ArtifactLoadError::Invalid(format!(
                "holistic scaler has {} features, {} means and {} scales",
                feature_names.len(),
                mean.len(),
                scale.len()
            )));
        }

        let mut seen = HashSet::new();
        for (idx, name) in feature_names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ArtifactLoadError::Invalid(
                    "scaler feature name must not be empty".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(ArtifactLoadError::Invalid(format!(
                    "duplicate scaler feature: {}",
                    name
                )));
            }
            validate_parameters(name, mean[idx], scale[idx])?;
        }

        Ok(Self {
            feature_names,
            mean,
            scale,
        })
    }
}

impl Normalizer for HolisticScaler {
    fn scale(&self, mut features: FeatureMap) -> Result<FeatureMap, TransformError> {
        for (idx, name) in self.feature_names.iter().enumerate() {
            let value = features
                .get_mut(name)
                .ok_or_else(|| TransformError::MissingFeature(name.clone()))?;
            *value = (*value - self.mean[idx]) / self.scale[idx];
        }
        Ok(features)
    }

    fn scaled_features(&self) -> Vec<&str> {
        self.feature_names.iter().map(String::as_str).collect()
    }

    fn kind(&self) -> NormalizerKind {
        NormalizerKind::Holistic
    }
}

fn validate_parameters(name: &str, offset: f64, scale: f64) -> Result<(), ArtifactLoadError> {
    if !offset.is_finite() {
        return Err(ArtifactLoadError::Invalid(format!(
            "non-finite offset for scaler feature {}",
            name
        )));
    }
    if !scale.is_finite() || scale == 0.0 {
        return Err(ArtifactLoadError::Invalid(format!(
            "scale for feature {} must be finite and non-zero, got {}",
            name, scale
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature_map(pairs: &[(&str, f64)]) -> FeatureMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_per_feature_scales_known_and_passes_rest() {
        let scaler = PerFeatureScaler::new(
            [(
                "Engine_Load".to_string(),
                FeatureScaling::Standard {
                    mean: 20.0,
                    scale: 5.0,
                },
            )]
            .into_iter()
            .collect(),
        )
        .unwrap();

        let scaled = scaler
            .scale(feature_map(&[("Engine_Load", 25.0), ("Speed_GPS", 115.0)]))
            .unwrap();

        assert_eq!(scaled["Engine_Load"], 1.0);
        assert_eq!(scaled["Speed_GPS"], 115.0);
        assert_eq!(scaler.kind(), NormalizerKind::PerFeature);
    }

    #[test]
    fn test_per_feature_tolerates_absent_features() {
        let scaler = PerFeatureScaler::new(
            [(
                "Vibration".to_string(),
                FeatureScaling::MinMax {
                    min: 0.0,
                    scale: 2.0,
                },
            )]
            .into_iter()
            .collect(),
        )
        .unwrap();

        let scaled = scaler.scale(feature_map(&[("Engine_RPM", 3000.0)])).unwrap();
        assert_eq!(scaled.len(), 1);
        assert_eq!(scaled["Engine_RPM"], 3000.0);
    }

    #[test]
    fn test_zero_scale_rejected() {
        let result = PerFeatureScaler::new(
            [(
                "Engine_RPM".to_string(),
                FeatureScaling::Standard {
                    mean: 1.0,
                    scale: 0.0,
                },
            )]
            .into_iter()
            .collect(),
        );
        assert!(matches!(result, Err(ArtifactLoadError::Invalid(_))));
    }

    #[test]
    fn test_holistic_scaler() {
        let scaler = HolisticScaler::new(
            vec!["Engine_Load".into(), "Engine_RPM".into()],
            vec![10.0, 2000.0],
            vec![2.0, 500.0],
        )
        .unwrap();

        let scaled = scaler
            .scale(feature_map(&[
                ("Engine_Load", 14.0),
                ("Engine_RPM", 3000.0),
                ("Vibration", 0.02),
            ]))
            .unwrap();

        assert_eq!(scaled["Engine_Load"], 2.0);
        assert_eq!(scaled["Engine_RPM"], 2.0);
        assert_eq!(scaled["Vibration"], 0.02);
        assert_eq!(scaler.scaled_features(), vec!["Engine_Load", "Engine_RPM"]);
    }

    #[test]
    fn test_holistic_requires_every_fitted_column() {
        let scaler =
            HolisticScaler::new(vec!["Engine_Load".into(), "Engine_RPM".into()], vec![0.0, 0.0], vec![1.0, 1.0])
                .unwrap();

        let err = scaler
            .scale(feature_map(&[("Engine_Load", 1.0)]))
            .unwrap_err();
        assert_eq!(err, TransformError::MissingFeature("Engine_RPM".into()));
    }

    #[test]
    fn test_holistic_length_mismatch_rejected() {
        let result = HolisticScaler::new(vec!["A".into()], vec![0.0, 1.0], vec![1.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_spec_kind() {
        let normalizer = from_spec(NormalizerSpec::Holistic {
            feature_names: vec!["A".into()],
            mean: vec![0.0],
            scale: vec![1.0],
        })
        .unwrap();
        assert_eq!(normalizer.kind(), NormalizerKind::Holistic);
        assert_eq!(normalizer.kind().to_string(), "holistic");
    }
}
