use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};

use super::error::ClassifierError;
use super::model::{ModelLoader, ToxicityModel};
use super::prediction::{CategoryPrediction, PredictionResult};
use super::utils::{library_match, sigmoid};
use crate::model_manager::ModelManager;
use crate::models::BuiltinModel;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Local files making up an ONNX toxicity model.
#[derive(Debug, Clone)]
pub struct OnnxModelPaths {
    pub model: PathBuf,
    pub tokenizer: PathBuf,
    /// Hugging Face `config.json` carrying the `id2label` category names
    pub config: PathBuf,
}

#[derive(Debug, Deserialize)]
struct LabelConfig {
    id2label: HashMap<String, String>,
}

/// Maps the bundled model's label ids onto the category vocabulary used for
/// display and filtering. Other ids pass through unchanged.
fn canonical_category(label: &str) -> &str {
    match label {
        "toxic" => "toxicity",
        "severe_toxic" => "severe_toxicity",
        "identity_hate" => "identity_attack",
        other => other,
    }
}

/// Reads the model's category names in output order.
fn read_labels(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| ClassifierError::ModelError(format!("Failed to read {:?}: {}", path, e)))?;
    let config: LabelConfig = serde_json::from_str(&raw)
        .map_err(|e| ClassifierError::ModelError(format!("Invalid model config {:?}: {}", path, e)))?;

    let mut indexed = config
        .id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|id| (id, label))
                .map_err(|_| ClassifierError::ModelError(format!("Invalid label id '{}'", id)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    indexed.sort_by_key(|(id, _)| *id);

    if indexed.iter().enumerate().any(|(pos, (id, _))| pos != *id) {
        return Err(ClassifierError::ModelError("Label ids must be contiguous from 0".into()));
    }
    Ok(indexed
        .into_iter()
        .map(|(_, label)| canonical_category(&label).to_string())
        .collect())
}

/// Keeps the requested categories, in model order. Empty means all.
fn select_categories(
    labels: &[String],
    requested: &[String],
) -> Result<Vec<(usize, String)>, ClassifierError> {
    if let Some(unknown) = requested.iter().find(|r| !labels.contains(r)) {
        return Err(ClassifierError::ValidationError(format!(
            "Unknown category '{}', model provides: {}",
            unknown,
            labels.join(", ")
        )));
    }
    Ok(labels
        .iter()
        .enumerate()
        .filter(|(_, label)| requested.is_empty() || requested.contains(label))
        .map(|(idx, label)| (idx, label.clone()))
        .collect())
}

/// A multi-label toxicity classifier running on ONNX Runtime.
///
/// Each category's logit goes through a sigmoid to give the positive
/// probability `p`; the reported distribution is `[1 - p, p]`.
#[derive(Debug)]
pub struct OnnxToxicityModel {
    tokenizer: Arc<Tokenizer>,
    session: Arc<Session>,
    num_labels: usize,
    categories: Vec<(usize, String)>,
    threshold: f32,
    uses_token_type_ids: bool,
}

impl OnnxToxicityModel {
    /// Loads tokenizer, session and labels from disk. Blocking.
    pub fn from_files(
        paths: &OnnxModelPaths,
        threshold: f32,
        categories: &[String],
        max_sequence_length: usize,
        runtime_config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let mut tokenizer = Tokenizer::from_file(&paths.tokenizer)
            .map_err(|e| ClassifierError::TokenizerError(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
        tokenizer.with_padding(None);
        info!("Tokenizer loaded successfully");

        let session = create_session_builder(runtime_config)?.commit_from_file(&paths.model)?;
        let uses_token_type_ids = Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        let labels = read_labels(&paths.config)?;
        let categories = select_categories(&labels, categories)?;
        info!(
            "Monitoring {} of {} categories",
            categories.len(),
            labels.len()
        );

        Ok(Self {
            tokenizer: Arc::new(tokenizer),
            session: Arc::new(session),
            num_labels: labels.len(),
            categories,
            threshold,
            uses_token_type_ids,
        })
    }

    /// Category ids this model reports, in output order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(_, label)| label.as_str())
    }

    /// Checks for `input_ids`/`attention_mask` inputs and at least one output.
    /// Returns whether the model also takes `token_type_ids`.
    fn validate_model(session: &Session) -> Result<bool, ClassifierError> {
        let has_input = |name: &str| session.inputs.iter().any(|i| i.name == name);
        if !has_input("input_ids") || !has_input("attention_mask") {
            return Err(ClassifierError::ModelError(
                "Model must have input_ids and attention_mask inputs".to_string(),
            ));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for logits".to_string(),
            ));
        }
        Ok(has_input("token_type_ids"))
    }

    /// Runs one text through the model and returns its raw logits.
    fn logits(
        tokenizer: &Tokenizer,
        session: &Session,
        uses_token_type_ids: bool,
        text: &str,
    ) -> Result<Vec<f32>, ClassifierError> {
        let encoding = tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
        let len = encoding.get_ids().len();

        let to_array = |values: &[u32], what: &str| {
            Array2::from_shape_vec((1, len), values.iter().map(|&x| x as i64).collect())
                .map(|a| a.into_dyn())
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create {} array: {}", what, e)))
        };
        let input_ids = to_array(encoding.get_ids(), "input")?;
        let attention_mask = to_array(encoding.get_attention_mask(), "mask")?;
        let token_type_ids = to_array(encoding.get_type_ids(), "type")?;

        let tensor = |array: &ndarray::ArrayD<i64>, what: &str| {
            Tensor::from_array(&array.as_standard_layout())
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create {} tensor: {}", what, e)))
        };
        let mut input_tensors = HashMap::new();
        input_tensors.insert("input_ids", tensor(&input_ids, "input")?);
        input_tensors.insert("attention_mask", tensor(&attention_mask, "mask")?);
        if uses_token_type_ids {
            input_tensors.insert("token_type_ids", tensor(&token_type_ids, "type")?);
        }

        let outputs = session
            .run(input_tensors)
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to run model: {}", e)))?;
        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::PredictionError(format!("Failed to extract logits: {}", e)))?;

        Ok(logits.iter().copied().collect())
    }
}

#[async_trait]
impl ToxicityModel for OnnxToxicityModel {
    async fn classify(&self, batch: &[String]) -> Result<Vec<CategoryPrediction>, ClassifierError> {
        let tokenizer = Arc::clone(&self.tokenizer);
        let session = Arc::clone(&self.session);
        let uses_token_type_ids = self.uses_token_type_ids;
        let texts = batch.to_vec();

        let per_text = tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|text| Self::logits(&tokenizer, &session, uses_token_type_ids, text))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| ClassifierError::PredictionError(format!("Inference task failed: {}", e)))??;

        if let Some(bad) = per_text.iter().find(|logits| logits.len() != self.num_labels) {
            return Err(ClassifierError::MalformedResponse(format!(
                "Model produced {} logits, expected {}",
                bad.len(),
                self.num_labels
            )));
        }
        debug!("Classified batch of {}", batch.len());

        Ok(self
            .categories
            .iter()
            .map(|(idx, label)| {
                let results = per_text
                    .iter()
                    .map(|logits| {
                        let positive = sigmoid(logits[*idx]);
                        let negative = 1.0 - positive;
                        PredictionResult::new(
                            vec![negative, positive],
                            library_match(negative, positive, self.threshold),
                        )
                    })
                    .collect();
                CategoryPrediction::new(label.clone(), results)
            })
            .collect())
    }
}

/// Loads a built-in toxicity model, downloading it into the cache first if needed.
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    manager: ModelManager,
    model: BuiltinModel,
    runtime_config: RuntimeConfig,
}

impl OnnxModelLoader {
    pub fn new(manager: ModelManager) -> Self {
        Self {
            manager,
            model: BuiltinModel::default(),
            runtime_config: RuntimeConfig::default(),
        }
    }

    pub fn with_model(mut self, model: BuiltinModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    pub fn paths(&self) -> OnnxModelPaths {
        let name = self.model.get_model_info().name;
        OnnxModelPaths {
            model: self.manager.get_model_path(&name),
            tokenizer: self.manager.get_tokenizer_path(&name),
            config: self.manager.get_config_path(&name),
        }
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(
        &self,
        threshold: f32,
        categories: &[String],
    ) -> Result<Arc<dyn ToxicityModel>, ClassifierError> {
        let info = self.model.get_model_info();
        let characteristics = self.model.characteristics();
        info!(
            "Loading model '{}' (~{} MB)",
            info.name, characteristics.model_size_mb
        );
        self.manager.ensure_model_downloaded(&info).await?;

        let paths = self.paths();
        let categories = categories.to_vec();
        let runtime_config = self.runtime_config.clone();
        let max_sequence_length = characteristics.max_sequence_length;

        let model = tokio::task::spawn_blocking(move || {
            OnnxToxicityModel::from_files(
                &paths,
                threshold,
                &categories,
                max_sequence_length,
                &runtime_config,
            )
        })
        .await
        .map_err(|e| ClassifierError::LoadFailure(format!("Model load task failed: {}", e)))??;

        info!("Categories: {}", model.categories().collect::<Vec<_>>().join(", "));
        Ok(Arc::new(model))
    }
}
