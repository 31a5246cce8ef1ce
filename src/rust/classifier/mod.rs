use serde::Serialize;

mod error;
mod labels;
mod model;
mod onnx;
mod prediction;
mod session;
mod teardown;
mod utils;

pub use error::ClassifierError;
pub use labels::{format_percent, result_rows, LabelTable, Locale, ResultRow};
pub use model::{ModelLoader, ToxicityModel};
pub use onnx::{OnnxModelLoader, OnnxModelPaths, OnnxToxicityModel};
pub use prediction::{
    exceeds_threshold, normalize_predictions, CategoryPrediction, Classification, Outcome,
    OutcomeProbability, PredictionResult,
};
pub use session::{ClassifierSession, SessionBuilder, SessionState, DEFAULT_THRESHOLD};
pub use teardown::Teardown;

/// Snapshot of a session for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    /// Lifecycle state at the time of the snapshot
    pub state: SessionState,
    /// Decision threshold, once the model is ready
    pub threshold: Option<f32>,
    /// Whether the owning view has gone away
    pub torn_down: bool,
    /// Message of the load failure, if any
    pub last_error: Option<String>,
}

impl ClassifierSession {
    /// Returns information about the session's current state
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            state: self.state(),
            threshold: self.threshold(),
            torn_down: self.is_torn_down(),
            last_error: self.last_error(),
        }
    }
}
