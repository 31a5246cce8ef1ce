use ort::Error as OrtError;
use std::fmt;

use crate::model_manager::ModelError;

/// Represents the different types of errors that can occur in a toxicity classification session.
#[derive(Debug)]
pub enum ClassifierError {
    /// The model-loading service rejected or failed
    LoadFailure(String),
    /// Classification was attempted before the session reached `Ready`
    NotReady,
    /// The request text was blank after trimming
    EmptyInput,
    /// Another classification is already in flight on this session
    Busy,
    /// The owning view was torn down before the operation resolved
    Cancelled,
    /// The model returned output that does not have the expected shape
    MalformedResponse(String),
    /// Error occurred while loading or using the tokenizer
    TokenizerError(String),
    /// Error occurred while loading or running the ONNX model
    ModelError(String),
    /// Error occurred during the build phase
    BuildError(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl ClassifierError {
    /// True for the rejections that never reach the model.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::NotReady | Self::EmptyInput | Self::Busy | Self::Cancelled)
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadFailure(msg) => write!(f, "Load failure: {}", msg),
            Self::NotReady => write!(f, "Classifier is not ready"),
            Self::EmptyInput => write!(f, "Input text is empty"),
            Self::Busy => write!(f, "A classification is already in progress"),
            Self::Cancelled => write!(f, "Session was torn down"),
            Self::MalformedResponse(msg) => write!(f, "Malformed model response: {}", msg),
            Self::TokenizerError(msg) => write!(f, "Tokenizer error: {}", msg),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::BuildError(err.to_string())
    }
}

impl From<ModelError> for ClassifierError {
    fn from(err: ModelError) -> Self {
        ClassifierError::LoadFailure(err.to_string())
    }
}
