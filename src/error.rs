use std::path::PathBuf;
use thiserror::Error;

/// Per-record failure while turning a raw record into a feature vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// A feature the model requires could not be found or computed
    #[error("Missing feature: {0}")]
    MissingFeature(String),

    /// A raw value that is not numeric or not finite
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Failure raised by the scoring engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// The vector's feature set does not match the model's feature set
    #[error("Feature mismatch (missing: [{}], unexpected: [{}])", missing.join(", "), unexpected.join(", "))]
    FeatureMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// The forest produced a non-finite raw score
    #[error("Model produced a non-finite score for class {0}")]
    NonFiniteScore(usize),
}

/// Outcome of a failed pipeline run for a single record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

impl RecordError {
    /// Only a feature-set disagreement invalidates the whole batch
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, RecordError::Scoring(ScoringError::FeatureMismatch { .. }))
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            RecordError::Transform(TransformError::MissingFeature(_)) => "MISSING_FEATURE",
            RecordError::Transform(TransformError::InvalidValue { .. }) => "INVALID_VALUE",
            RecordError::Scoring(ScoringError::FeatureMismatch { .. }) => "FEATURE_MISMATCH",
            RecordError::Scoring(ScoringError::NonFiniteScore(_)) => "NON_FINITE_SCORE",
        }
    }
}

/// Scaler or classifier artifact could not be loaded
#[derive(Error, Debug)]
pub enum ArtifactLoadError {
    #[error("Failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode artifact {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Unsupported artifact format for {0} (expected .json or .bin)")]
    UnsupportedFormat(PathBuf),

    #[error("Unsupported artifact version {found} in {path} (supported: {supported})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Invalid artifact: {0}")]
    Invalid(String),
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Artifact load errors (fatal at startup)
    #[error(transparent)]
    Artifact(#[from] ArtifactLoadError),

    /// Model and pipeline disagree on the feature set
    #[error("Feature mismatch between pipeline and model (missing: [{}], unexpected: [{}])", missing.join(", "), unexpected.join(", "))]
    FeatureMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Artifact(_) => "ARTIFACT_LOAD_ERROR",
            AppError::FeatureMismatch { .. } => "FEATURE_MISMATCH",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Conversion from ScoringError
impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::FeatureMismatch {
                missing,
                unexpected,
            } => AppError::FeatureMismatch {
                missing,
                unexpected,
            },
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Conversion from RecordError, for per-record failures that end a batch
impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Scoring(e) => e.into(),
            RecordError::Transform(e) => AppError::Validation(e.to_string()),
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
