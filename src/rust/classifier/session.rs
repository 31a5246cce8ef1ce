use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};
use serde::Serialize;

use super::error::ClassifierError;
use super::model::{ModelLoader, ToxicityModel};
use super::prediction::{normalize_predictions, Classification};
use super::teardown::Teardown;

/// Decision boundary used by the demo configuration.
pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// Lifecycle of the one model handle a session owns.
///
/// Transitions are `Uninitialized -> Loading -> Ready | Failed`; nothing
/// goes back to `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

struct SessionInner {
    state: SessionState,
    model: Option<Arc<dyn ToxicityModel>>,
    threshold: f32,
    last_error: Option<String>,
}

/// Owns the lifecycle of a single loaded toxicity model and mediates
/// classification requests against it.
///
/// Clones share the same state, handle and teardown token, so an
/// `initialize` call can be spawned onto a task while the caller keeps a
/// clone for classifying.
///
/// ```no_run
/// # use std::sync::Arc;
/// # async fn run(loader: Arc<dyn toxicheck::ModelLoader>) -> Result<(), toxicheck::ClassifierError> {
/// use toxicheck::{ClassifierSession, DEFAULT_THRESHOLD};
///
/// let session = ClassifierSession::builder()
///     .with_shared_loader(loader)
///     .build()?;
///
/// session.initialize(DEFAULT_THRESHOLD, vec![]).await?;
/// for row in session.classify("You are wonderful").await? {
///     println!("{}: {:.3} ({})", row.label, row.positive_probability(), row.matched);
/// }
/// session.teardown();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClassifierSession {
    loader: Arc<dyn ModelLoader>,
    inner: Arc<Mutex<SessionInner>>,
    in_flight: Arc<AtomicBool>,
    teardown: Teardown,
}

impl std::fmt::Debug for ClassifierSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierSession")
            .field("state", &self.state())
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

/// Releases the single-flight slot when a classification finishes or is dropped.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ClassifierSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Uninitialized,
                model: None,
                threshold: DEFAULT_THRESHOLD,
                last_error: None,
            })),
            in_flight: Arc::new(AtomicBool::new(false)),
            teardown: Teardown::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Loads the model once and moves the session to `Ready` or `Failed`.
    ///
    /// Returns the state the session is in when the call finishes. Load
    /// failures are recorded (see [`last_error`](Self::last_error)) rather
    /// than returned. If a load is already in flight or finished, this is a
    /// no-op that reports the current state.
    ///
    /// # Errors
    /// - `ValidationError` if `threshold` is not within `[0, 1]`
    /// - `Cancelled` if the session was torn down before or during the load
    pub async fn initialize(
        &self,
        threshold: f32,
        categories: Vec<String>,
    ) -> Result<SessionState, ClassifierError> {
        validate_threshold(threshold)?;

        {
            let mut inner = self.lock();
            if self.teardown.is_cancelled() {
                return Err(ClassifierError::Cancelled);
            }
            if inner.state != SessionState::Uninitialized {
                debug!("initialize ignored, session already {:?}", inner.state);
                return Ok(inner.state);
            }
            inner.state = SessionState::Loading;
        }

        info!(
            "Loading toxicity model (threshold {}, categories: {})",
            threshold,
            if categories.is_empty() { "all".to_string() } else { categories.join(", ") }
        );

        let outcome = tokio::select! {
            biased;
            _ = self.teardown.cancelled() => {
                debug!("Session torn down while loading; discarding load");
                return Err(ClassifierError::Cancelled);
            }
            result = self.loader.load(threshold, &categories) => result,
        };

        let mut inner = self.lock();
        if self.teardown.is_cancelled() {
            debug!("Session torn down while loading; discarding load");
            return Err(ClassifierError::Cancelled);
        }

        match outcome {
            Ok(model) => {
                inner.model = Some(model);
                inner.threshold = threshold;
                inner.state = SessionState::Ready;
                info!("Toxicity model ready");
            }
            Err(e) => {
                error!("Failed to load toxicity model: {}", e);
                inner.last_error = Some(e.to_string());
                inner.state = SessionState::Failed;
            }
        }
        Ok(inner.state)
    }

    /// Classifies one text against the loaded model.
    ///
    /// The text is trimmed and sent as a single-element batch. The session
    /// state is never modified by this call.
    ///
    /// # Errors
    /// - `Cancelled` if the session was torn down, before or during the call
    /// - `NotReady` if the model has not finished loading
    /// - `EmptyInput` if the text is blank
    /// - `Busy` if another classification is in flight
    /// - `PredictionError` or `MalformedResponse` if the model call fails
    pub async fn classify(&self, text: &str) -> Result<Vec<Classification>, ClassifierError> {
        if self.teardown.is_cancelled() {
            return Err(ClassifierError::Cancelled);
        }

        let (model, threshold) = {
            let inner = self.lock();
            match (inner.state, inner.model.as_ref()) {
                (SessionState::Ready, Some(model)) => (Arc::clone(model), inner.threshold),
                _ => return Err(ClassifierError::NotReady),
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ClassifierError::EmptyInput);
        }

        let _flight = FlightGuard::acquire(&self.in_flight).ok_or(ClassifierError::Busy)?;
        let batch = vec![text.to_string()];

        let response = tokio::select! {
            biased;
            _ = self.teardown.cancelled() => {
                debug!("Session torn down during classification; discarding result");
                return Err(ClassifierError::Cancelled);
            }
            result = model.classify(&batch) => result,
        };

        if self.teardown.is_cancelled() {
            debug!("Session torn down during classification; discarding result");
            return Err(ClassifierError::Cancelled);
        }

        let predictions = response.map_err(|e| {
            warn!("Classification failed: {}", e);
            match e {
                ClassifierError::PredictionError(_) | ClassifierError::MalformedResponse(_) => e,
                other => ClassifierError::PredictionError(other.to_string()),
            }
        })?;

        normalize_predictions(&predictions, threshold)
    }

    /// Signals that the owning view went away. Pending and future results
    /// are discarded; the session never changes state afterwards.
    ///
    /// A teardown while a load is in flight leaves the state at `Loading`
    /// for good: the load's outcome is dropped and nothing moves it on.
    pub fn teardown(&self) {
        let _inner = self.lock();
        if !self.teardown.is_cancelled() {
            info!("Tearing down classifier session");
        }
        self.teardown.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.teardown.is_cancelled()
    }

    /// Resolves once [`teardown`](Self::teardown) has been called on any clone.
    pub async fn torn_down(&self) {
        self.teardown.cancelled().await
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    /// True while a load is in flight. Stays true forever if the session was
    /// torn down during that load; check `is_torn_down` to tell the two apart.
    pub fn is_loading(&self) -> bool {
        self.state() == SessionState::Loading
    }

    /// True when a classify call would be accepted right now.
    pub fn can_classify(&self) -> bool {
        self.is_ready() && !self.is_torn_down() && !self.in_flight.load(Ordering::SeqCst)
    }

    /// Threshold in effect once the session is ready.
    pub fn threshold(&self) -> Option<f32> {
        let inner = self.lock();
        (inner.state == SessionState::Ready).then_some(inner.threshold)
    }

    /// Message of the load failure, if the session failed.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }
}

fn validate_threshold(threshold: f32) -> Result<(), ClassifierError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ClassifierError::ValidationError(format!(
            "Threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

/// A builder for constructing a [`ClassifierSession`].
#[derive(Default)]
pub struct SessionBuilder {
    loader: Option<Arc<dyn ModelLoader>>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model-loading service
    pub fn with_loader(self, loader: impl ModelLoader + 'static) -> Self {
        self.with_shared_loader(Arc::new(loader))
    }

    /// Sets a model-loading service that is shared with other sessions
    pub fn with_shared_loader(mut self, loader: Arc<dyn ModelLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn build(self) -> Result<ClassifierSession, ClassifierError> {
        let loader = self
            .loader
            .ok_or_else(|| ClassifierError::BuildError("A model loader must be set".to_string()))?;
        Ok(ClassifierSession::new(loader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::prediction::{CategoryPrediction, PredictionResult};
    use async_trait::async_trait;

    struct Fixed;

    #[async_trait]
    impl ToxicityModel for Fixed {
        async fn classify(&self, batch: &[String]) -> Result<Vec<CategoryPrediction>, ClassifierError> {
            let results = batch.iter().map(|_| PredictionResult::new(vec![0.2, 0.8], None)).collect();
            Ok(vec![CategoryPrediction::new("insult", results)])
        }
    }

    #[async_trait]
    impl ModelLoader for Fixed {
        async fn load(&self, _: f32, _: &[String]) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
            Ok(Arc::new(Fixed))
        }
    }

    #[test]
    fn test_builder_requires_loader() {
        assert!(matches!(
            ClassifierSession::builder().build(),
            Err(ClassifierError::BuildError(_))
        ));
        let session = ClassifierSession::builder().with_loader(Fixed).build().unwrap();
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(!session.can_classify());
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(-0.01).is_err());
        assert!(validate_threshold(1.01).is_err());
        assert!(validate_threshold(f32::NAN).is_err());
    }

    #[tokio::test]
    async fn test_invalid_threshold_leaves_state() {
        let session = ClassifierSession::new(Arc::new(Fixed));
        assert!(session.initialize(2.0, vec![]).await.is_err());
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_threshold_applies_after_ready() {
        let session = ClassifierSession::new(Arc::new(Fixed));
        assert_eq!(session.threshold(), None);

        session.initialize(0.5, vec![]).await.unwrap();
        assert_eq!(session.threshold(), Some(0.5));

        let rows = session.classify("hello").await.unwrap();
        assert!(rows[0].matched);
        assert!(session.can_classify());
    }

    #[test]
    fn test_flight_guard_releases() {
        let flag = AtomicBool::new(false);
        {
            let _guard = FlightGuard::acquire(&flag).unwrap();
            assert!(FlightGuard::acquire(&flag).is_none());
        }
        assert!(FlightGuard::acquire(&flag).is_some());
    }
}
