/// Represents the available built-in toxicity models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuiltinModel {
    /// BERT fine-tuned on the Jigsaw toxic comment data, exported to ONNX.
    ///
    /// Characteristics:
    /// - Max sequence length: 512
    /// - Size: ~440MB
    /// - Multi-label: one sigmoid output per category
    #[default]
    ToxicBert,
}

/// Characteristics of a model including its capabilities and requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCharacteristics {
    /// Maximum sequence length the model can handle; longer inputs are truncated
    pub max_sequence_length: usize,
    /// Approximate size of the model in memory
    pub model_size_mb: usize,
}

/// Where to fetch a model's assets from, and how to check them.
///
/// Hashes are SHA-256 hex digests. When a hash is `None` the file is only
/// checked for presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub model_url: String,
    pub tokenizer_url: String,
    pub config_url: String,
    pub model_hash: Option<String>,
    pub tokenizer_hash: Option<String>,
    pub config_hash: Option<String>,
}

impl BuiltinModel {
    /// Get the characteristics of the model
    pub fn characteristics(&self) -> ModelCharacteristics {
        match self {
            Self::ToxicBert => ModelCharacteristics {
                max_sequence_length: 512,
                model_size_mb: 440,
            },
        }
    }

    pub fn get_model_info(&self) -> ModelInfo {
        match self {
            Self::ToxicBert => {
                let base = "https://huggingface.co/Xenova/toxic-bert/resolve/main";
                ModelInfo {
                    name: "toxic-bert".to_string(),
                    model_url: format!("{}/onnx/model.onnx", base),
                    tokenizer_url: format!("{}/tokenizer.json", base),
                    config_url: format!("{}/config.json", base),
                    model_hash: None,
                    tokenizer_hash: None,
                    config_hash: None,
                }
            }
        }
    }
}
