//! Toxicity classification sessions with a teardown-aware load/classify lifecycle.
//!
//! A [`ClassifierSession`] owns one model handle. It obtains the handle once
//! from a [`ModelLoader`], then serves single-shot classification requests
//! against it, reshaping the raw per-category probabilities into
//! [`Classification`] rows.
//!
//! # Basic Usage
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use toxicheck::{
//!     CategoryPrediction, ClassifierError, ClassifierSession, ModelLoader, PredictionResult,
//!     SessionState, ToxicityModel,
//! };
//!
//! struct Stub;
//!
//! #[async_trait]
//! impl ToxicityModel for Stub {
//!     async fn classify(&self, batch: &[String]) -> Result<Vec<CategoryPrediction>, ClassifierError> {
//!         let results = batch.iter().map(|_| PredictionResult::new(vec![0.99, 0.01], None)).collect();
//!         Ok(vec![CategoryPrediction::new("toxicity", results)])
//!     }
//! }
//!
//! #[async_trait]
//! impl ModelLoader for Stub {
//!     async fn load(&self, _: f32, _: &[String]) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
//!         Ok(Arc::new(Stub))
//!     }
//! }
//!
//! let session = ClassifierSession::builder().with_loader(Stub).build()?;
//! assert_eq!(session.initialize(0.85, vec![]).await?, SessionState::Ready);
//!
//! let results = session.classify("You are wonderful").await?;
//! assert_eq!(results[0].label, "toxicity");
//! assert!(!results[0].matched);
//! # Ok(())
//! # }
//! ```
//!
//! # ONNX models
//!
//! [`OnnxModelLoader`] is the bundled loader. It downloads a built-in model
//! through [`ModelManager`] and runs it with ONNX Runtime:
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use toxicheck::{ClassifierSession, ModelManager, OnnxModelLoader, DEFAULT_THRESHOLD};
//!
//! let loader = OnnxModelLoader::new(ModelManager::new_default()?);
//! let session = ClassifierSession::builder().with_loader(loader).build()?;
//! session.initialize(DEFAULT_THRESHOLD, vec![]).await?;
//! let results = session.classify("I will hurt you").await?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
mod runtime;
pub mod model_manager;
pub mod models;

pub use classifier::{
    format_percent, normalize_predictions, result_rows, CategoryPrediction, Classification,
    ClassifierError, ClassifierSession, LabelTable, Locale, ModelLoader, OnnxModelLoader,
    OnnxModelPaths, OnnxToxicityModel, Outcome, OutcomeProbability, PredictionResult, ResultRow,
    SessionBuilder, SessionInfo, SessionState, Teardown, ToxicityModel, DEFAULT_THRESHOLD,
};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};
pub use model_manager::{ModelManager, ModelError};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};

pub fn init_logger() {
    env_logger::init();
}
