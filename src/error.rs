//! Error types for model fitting, artifact IO and prediction requests.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("training labels contain a single class ({0}); both classes are required")]
    SingleClass(u8),

    #[error("invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("inconsistent artifact: {0}")]
    Invalid(String),
}

/// Terminal failures of one prediction request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("Error loading model: {0}")]
    ArtifactLoad(String),

    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Error calculating risk scores: {0}")]
    Inference(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_message_lists_names() {
        let err = PredictError::MissingColumns(vec!["Topic".to_string(), "Relation".to_string()]);
        assert_eq!(
            err.to_string(),
            "Missing required columns: [\"Topic\", \"Relation\"]"
        );
    }

    #[test]
    fn artifact_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ArtifactError = io_err.into();
        assert!(matches!(err, ArtifactError::Io(_)));
    }
}
