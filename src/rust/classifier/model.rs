use std::sync::Arc;

use async_trait::async_trait;

use super::error::ClassifierError;
use super::prediction::CategoryPrediction;

/// A loaded, ready-to-use toxicity classifier.
///
/// Implementations receive a batch of texts and return one
/// [`CategoryPrediction`] per monitored category, each carrying one result
/// per input text, in the model's own category order.
///
/// ```
/// use async_trait::async_trait;
/// use toxicheck::{CategoryPrediction, ClassifierError, PredictionResult, ToxicityModel};
///
/// struct AlwaysClean;
///
/// #[async_trait]
/// impl ToxicityModel for AlwaysClean {
///     async fn classify(&self, batch: &[String]) -> Result<Vec<CategoryPrediction>, ClassifierError> {
///         let results = batch.iter().map(|_| PredictionResult::new(vec![1.0, 0.0], None)).collect();
///         Ok(vec![CategoryPrediction::new("toxicity", results)])
///     }
/// }
/// ```
#[async_trait]
pub trait ToxicityModel: Send + Sync {
    async fn classify(&self, batch: &[String]) -> Result<Vec<CategoryPrediction>, ClassifierError>;
}

/// The external service that produces a [`ToxicityModel`].
///
/// `categories` restricts the monitored categories; empty means all of them.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(
        &self,
        threshold: f32,
        categories: &[String],
    ) -> Result<Arc<dyn ToxicityModel>, ClassifierError>;
}
