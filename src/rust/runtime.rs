use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use std::sync::OnceLock;

use crate::classifier::ClassifierError;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Graph optimization applied when an ONNX session is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    Disable,
    Level1,
    Level2,
    #[default]
    Level3,
}

impl From<OptimizationLevel> for GraphOptimizationLevel {
    fn from(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Disable => GraphOptimizationLevel::Disable,
            OptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
            OptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
            OptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        }
    }
}

/// ONNX Runtime settings for toxicity model sessions.
///
/// Thread counts of 0 let ONNX Runtime decide.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: OptimizationLevel,
}

impl RuntimeConfig {
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads;
        self
    }
}

/// Commits the process-wide ONNX Runtime environment once.
///
/// A failed commit is remembered; later calls report the same error.
pub fn ensure_initialized() -> Result<(), ClassifierError> {
    INIT.get_or_init(|| {
        ort::init()
            .with_name("toxicheck")
            .commit()
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .clone()
    .map_err(|e| ClassifierError::ModelError(format!("Failed to initialize ONNX Runtime: {}", e)))
}

pub fn create_session_builder(config: &RuntimeConfig) -> Result<SessionBuilder, ClassifierError> {
    ensure_initialized()?;
    let mut builder = Session::builder()?;

    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }

    builder = builder.with_optimization_level(config.optimization_level.into())?;

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_initialization() {
        assert!(ensure_initialized().is_ok());
        assert!(ensure_initialized().is_ok()); // Second call should be fine
    }

    #[test]
    fn test_session_builder_config() {
        let config = RuntimeConfig {
            inter_threads: 2,
            intra_threads: 2,
            optimization_level: OptimizationLevel::Level1,
        };
        assert!(create_session_builder(&config).is_ok());
    }

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default().with_intra_threads(4);
        assert_eq!(config.intra_threads, 4);
        assert_eq!(config.inter_threads, 0);
        assert_eq!(config.optimization_level, OptimizationLevel::Level3);
    }
}
