//! Model and tokenizer loading utilities for Hugging Face Hub integration.
//!
//! This module provides loaders for downloading the files a classification
//! checkpoint is made of:
//! - Model weight files (safetensors, or PyTorch `.bin` as a fallback)
//! - Tokenizers (JSON format)
//! - Model configuration files (`config.json`)
//!
//! ## Main Types
//!
//! - [`HfLoader`] - Generic Hugging Face file loader with retry logic
//! - [`TokenizerLoader`] - Loads tokenizers from Hugging Face repositories
//! - [`ConfigLoader`] - Loads and deserializes JSON configuration files
//! - [`WeightsLoader`] - Locates model weight files
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use innervoice::loaders::{TokenizerLoader, WeightsLoader};
//!
//! async fn fetch() -> anyhow::Result<()> {
//!     let repo = "bhadresh-savani/distilbert-base-uncased-emotion";
//!     let _tokenizer = TokenizerLoader::new(repo, "tokenizer.json").load().await?;
//!     let (_weights, _format) = WeightsLoader::new(repo).load().await?;
//!     Ok(())
//! }
//! ```
//!
//! All loaders include built-in retry logic to handle Hugging Face Hub lock
//! acquisition failures when several processes share one cache directory.

use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;
use tokenizers::Tokenizer;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct HfLoader {
    pub repo: String,
    pub filename: String,
}

impl HfLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            repo: repo.into(),
            filename: filename.into(),
        }
    }

    pub async fn load(&self) -> anyhow::Result<PathBuf> {
        let hf_api = hf_hub::api::tokio::ApiBuilder::new()
            .with_chunk_size(None)
            .build()?;
        let hf_api = hf_api.model(self.repo.clone());

        let mut attempt = 0;
        loop {
            match hf_api.get(self.filename.as_str()).await {
                Ok(path) => return Ok(path),
                Err(e) => {
                    let error_msg = e.to_string();
                    if error_msg.contains("Lock acquisition failed") && attempt + 1 < MAX_RETRIES {
                        // Wait before retrying, with exponential backoff
                        let wait_time = Duration::from_millis(100 * (1 << attempt));
                        tracing::debug!(
                            repo = %self.repo,
                            file = %self.filename,
                            attempt,
                            "hub cache locked, retrying in {wait_time:?}"
                        );
                        tokio::time::sleep(wait_time).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(anyhow::anyhow!(
                        "Failed to fetch '{}' from '{}': {e}",
                        self.filename,
                        self.repo
                    ));
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct TokenizerLoader {
    pub tokenizer_file_loader: HfLoader,
}

impl TokenizerLoader {
    pub fn new(repo: &str, filename: &str) -> Self {
        let tokenizer_file_loader = HfLoader::new(repo, filename);

        Self {
            tokenizer_file_loader,
        }
    }

    pub async fn load(&self) -> anyhow::Result<Tokenizer> {
        let tokenizer_file_path = self.tokenizer_file_loader.load().await?;

        let tokenizer =
            Tokenizer::from_file(tokenizer_file_path).map_err(anyhow::Error::msg)?;

        Ok(tokenizer)
    }
}

/// Downloads a JSON file and deserializes it into `T`.
pub struct ConfigLoader<T> {
    pub config_file_loader: HfLoader,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> ConfigLoader<T> {
    pub fn new(repo: &str, filename: &str) -> Self {
        Self {
            config_file_loader: HfLoader::new(repo, filename),
            _marker: PhantomData,
        }
    }

    pub async fn load(&self) -> anyhow::Result<T> {
        let config_file_path = self.config_file_loader.load().await?;

        let config_content = std::fs::read_to_string(&config_file_path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {config_file_path:?}: {e}")
        })?;

        serde_json::from_str(&config_content)
            .map_err(|e| anyhow::anyhow!("Failed to parse model config: {e}"))
    }
}

/// On-disk format of a located weights file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    SafeTensors,
    PyTorch,
}

/// Locates model weights, preferring `model.safetensors` over `pytorch_model.bin`.
#[derive(Debug, Clone)]
pub struct WeightsLoader {
    pub repo: String,
}

impl WeightsLoader {
    pub fn new(repo: &str) -> Self {
        Self { repo: repo.into() }
    }

    pub async fn load(&self) -> anyhow::Result<(PathBuf, WeightsFormat)> {
        match HfLoader::new(&self.repo, "model.safetensors").load().await {
            Ok(path) => Ok((path, WeightsFormat::SafeTensors)),
            Err(_) => match HfLoader::new(&self.repo, "pytorch_model.bin").load().await {
                Ok(path) => Ok((path, WeightsFormat::PyTorch)),
                Err(e) => anyhow::bail!(
                    "Model weights not found in repo {}. \
                     Expected `model.safetensors` or `pytorch_model.bin`. Error: {e}",
                    self.repo
                ),
            },
        }
    }
}
