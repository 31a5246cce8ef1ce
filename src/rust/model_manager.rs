use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use tokio::sync::Mutex;
use sha2::{Sha256, Digest};

use crate::models::ModelInfo;

/// Environment variable that overrides the cache root.
pub const CACHE_ENV_VAR: &str = "TOXICHECK_CACHE";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// One downloadable asset of a model.
struct Asset<'a> {
    file_type: &'static str,
    url: &'a str,
    path: PathBuf,
    hash: Option<&'a str>,
}

/// Downloads, verifies and locates model assets in a local cache directory.
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        if let Ok(path) = env::var(CACHE_ENV_VAR) {
            return PathBuf::from(path).join("models");
        }

        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("toxicheck").join("models");
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("toxicheck").join("models");
        }

        env::temp_dir().join("toxicheck").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn get_model_path(&self, model_name: &str) -> PathBuf {
        self.models_dir.join(model_name).join("model.onnx")
    }

    pub fn get_tokenizer_path(&self, model_name: &str) -> PathBuf {
        self.models_dir.join(model_name).join("tokenizer.json")
    }

    pub fn get_config_path(&self, model_name: &str) -> PathBuf {
        self.models_dir.join(model_name).join("config.json")
    }

    fn assets<'a>(&self, info: &'a ModelInfo) -> [Asset<'a>; 3] {
        [
            Asset {
                file_type: "model",
                url: &info.model_url,
                path: self.get_model_path(&info.name),
                hash: info.model_hash.as_deref(),
            },
            Asset {
                file_type: "tokenizer",
                url: &info.tokenizer_url,
                path: self.get_tokenizer_path(&info.name),
                hash: info.tokenizer_hash.as_deref(),
            },
            Asset {
                file_type: "config",
                url: &info.config_url,
                path: self.get_config_path(&info.name),
                hash: info.config_hash.as_deref(),
            },
        ]
    }

    pub fn is_model_downloaded(&self, model_name: &str) -> bool {
        let paths = [
            self.get_model_path(model_name),
            self.get_tokenizer_path(model_name),
            self.get_config_path(model_name),
        ];
        log::debug!("Checking if model '{}' is downloaded:", model_name);
        for path in &paths {
            log::debug!("  {:?} (exists: {})", path, path.exists());
        }
        paths.iter().all(|p| p.exists())
    }

    /// Downloads every missing or corrupted asset of the model.
    ///
    /// Concurrent downloads through clones of the same manager are serialized.
    /// On failure, partially downloaded files are removed.
    pub async fn download_model(&self, info: &ModelInfo) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;

        let model_dir = self.models_dir.join(&info.name);
        log::info!("Creating model directory at {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        for asset in self.assets(info) {
            let result = if asset.path.exists() && self.verify_file(&asset.path, asset.hash)? {
                log::info!("Existing {} file verified successfully", asset.file_type);
                Ok(())
            } else {
                log::info!("Fetching {} file...", asset.file_type);
                self.download_and_verify_file(&asset).await
            };

            if let Err(e) = result {
                log::error!("Failed to setup {} file: {}", asset.file_type, e);
                let _ = self.remove_download(&info.name);
                return Err(e);
            }
        }

        log::info!("Model '{}' ready to use", info.name);
        Ok(())
    }

    fn verify_file(&self, path: &Path, expected_hash: Option<&str>) -> Result<bool, ModelError> {
        let Some(expected_hash) = expected_hash else {
            log::debug!("No hash pinned for {:?}, checking presence only", path);
            return Ok(path.exists());
        };
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!("Verifying {:?}: calculated {}, expected {}", path, hash, expected_hash);
        Ok(hash == expected_hash)
    }

    pub fn verify_model(&self, info: &ModelInfo) -> Result<bool, ModelError> {
        for asset in self.assets(info) {
            if !asset.path.exists() {
                log::info!("{} file {:?} does not exist", asset.file_type, asset.path);
                return Ok(false);
            }
            if !self.verify_file(&asset.path, asset.hash)? {
                log::info!("{} file {:?} failed verification", asset.file_type, asset.path);
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn download_and_verify_file(&self, asset: &Asset<'_>) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", asset.file_type, asset.url, asset.path);
        let response = reqwest::get(asset.url).await?.error_for_status()?;
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected) = asset.hash {
            let hash = sha256_hex(&bytes);
            if hash != expected {
                log::error!("{} hash mismatch: expected {}, got {}", asset.file_type, expected, hash);
                return Err(ModelError::HashMismatch {
                    file_type: asset.file_type.to_string(),
                    expected: expected.to_string(),
                    actual: hash,
                });
            }
        }

        if let Some(parent) = asset.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&asset.path, &bytes)?;

        if !self.verify_file(&asset.path, asset.hash)? {
            return Err(ModelError::VerificationFailed);
        }

        log::info!("{} file downloaded and verified successfully", asset.file_type);
        Ok(())
    }

    pub fn remove_download(&self, model_name: &str) -> Result<(), ModelError> {
        for path in [
            self.get_model_path(model_name),
            self.get_tokenizer_path(model_name),
            self.get_config_path(model_name),
        ] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, info: &ModelInfo) -> Result<(), ModelError> {
        if !self.is_model_downloaded(&info.name) {
            log::info!("Model '{}' not found, downloading...", info.name);
            self.download_model(info).await?;
        } else if !self.verify_model(info)? {
            log::info!("Model '{}' verification failed, re-downloading...", info.name);
            self.remove_download(&info.name)?;
            self.download_model(info).await?;
        } else {
            log::info!("Model '{}' verification successful", info.name);
        }
        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_info(name: &str, model_hash: Option<String>) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            model_url: "http://127.0.0.1:9/model.onnx".to_string(),
            tokenizer_url: "http://127.0.0.1:9/tokenizer.json".to_string(),
            config_url: "http://127.0.0.1:9/config.json".to_string(),
            model_hash,
            tokenizer_hash: None,
            config_hash: None,
        }
    }

    fn write_assets(manager: &ModelManager, name: &str, model_bytes: &[u8]) {
        fs::create_dir_all(manager.models_dir().join(name)).unwrap();
        fs::write(manager.get_model_path(name), model_bytes).unwrap();
        fs::write(manager.get_tokenizer_path(name), "{}").unwrap();
        fs::write(manager.get_config_path(name), "{}").unwrap();
    }

    #[test]
    fn test_model_paths() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        assert!(manager.get_model_path("toxic-bert").ends_with("toxic-bert/model.onnx"));
        assert!(manager.get_tokenizer_path("toxic-bert").ends_with("toxic-bert/tokenizer.json"));
        assert!(manager.get_config_path("toxic-bert").ends_with("toxic-bert/config.json"));
    }

    #[test]
    fn test_verify_with_and_without_hash() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();

        assert!(!manager.is_model_downloaded("fake"));
        assert!(!manager.verify_model(&local_info("fake", None)).unwrap());

        write_assets(&manager, "fake", b"weights");
        assert!(manager.is_model_downloaded("fake"));
        assert!(manager.verify_model(&local_info("fake", None)).unwrap());

        let good = sha256_hex(b"weights");
        assert!(manager.verify_model(&local_info("fake", Some(good))).unwrap());

        fs::write(manager.get_model_path("fake"), "corrupted data").unwrap();
        let good = sha256_hex(b"weights");
        assert!(!manager.verify_model(&local_info("fake", Some(good))).unwrap());
    }

    #[test]
    fn test_remove_download() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        write_assets(&manager, "fake", b"weights");
        manager.remove_download("fake").unwrap();
        assert!(!manager.is_model_downloaded("fake"));
        // Removing again is fine
        manager.remove_download("fake").unwrap();
    }

    #[tokio::test]
    async fn test_ensure_skips_download_when_verified() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        write_assets(&manager, "fake", b"weights");
        // The URLs are unreachable, so success means nothing was fetched
        manager.ensure_model_downloaded(&local_info("fake", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_download_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::new(dir.path()).unwrap();
        let result = manager.download_model(&local_info("fake", None)).await;
        assert!(matches!(result, Err(ModelError::DownloadError(_))));
        assert!(!manager.get_model_path("fake").exists());
    }

    #[test]
    fn test_default_models_dir() {
        env::set_var(CACHE_ENV_VAR, "/tmp/toxicheck-test-cache");
        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("/tmp/toxicheck-test-cache/models"));
        env::remove_var(CACHE_ENV_VAR);

        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("toxicheck"));
    }
}
