//! Vehicle failure risk pipeline
//!
//! Raw telemetry flows through the stages below, in order:
//! - Canonical naming and scaling of base sensor features
//! - Derived risk features computed from the scaled values
//! - Gradient-boosted multiclass scoring
//! - Ranking by urgency with maintenance annotations

pub mod artifacts;
pub mod classifier;
pub mod features;
pub mod models;
pub mod ranking;
pub mod scaler;

pub use artifacts::{read_artifact, write_artifact, ArtifactFormat, ModelArtifacts};
pub use classifier::{Classifier, GradientBoostedClassifier};
pub use features::{DerivedFeature, FeatureSchema, FeatureTransformer};
pub use models::{
    CanonicalFeatureVector, ClassifierArtifact, FeatureScaling, ModelMetadata, NormalizerSpec,
    ScalerArtifact, Score, TreeNode, TreeSpec,
};
pub use ranking::{RankingReport, RankingService, SkippedRecord};
pub use scaler::{HolisticScaler, Normalizer, NormalizerKind, PerFeatureScaler};
