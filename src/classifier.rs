//! The emotion classification service behind `POST /analyze`.
//!
//! [`EmotionClassifier`] owns the one expensive resource in the process: the
//! loaded classification pipeline. It is built lazily on first use through a
//! [`ModelCache`], so concurrent first requests share a single load, and is
//! then reused for the life of the process.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::core::{ClassifierError, ModelCache};
use crate::models::{DistilBertCheckpoint, EmotionDistilBertModel};
use crate::pipelines::emotion::{EmotionModel, EmotionPipelineBuilder, LabelScore, TextClassifier};
use crate::pipelines::utils::DeviceRequest;

/// The emotion taxonomy the service is designed around.
pub const EMOTION_LABELS: [&str; 6] = ["happy", "sad", "angry", "anxious", "calm", "neutral"];

/// Label reported when the pipeline produced no usable scores.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Best label, its confidence, and the full distribution it was picked from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<LabelScore>,
}

impl ClassificationResult {
    /// The degraded result for pipeline output with nothing usable in it.
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            confidence: 0.0,
            all: Vec::new(),
        }
    }

    /// Reduce raw pipeline output to its highest-scoring entry.
    ///
    /// Malformed entries are dropped first. On equal scores the earlier entry
    /// wins. If nothing is left the result is [`ClassificationResult::unknown`].
    pub fn from_scores(scores: Vec<LabelScore>) -> Self {
        let all: Vec<LabelScore> = scores
            .into_iter()
            .filter(LabelScore::is_well_formed)
            .collect();

        let best = all.iter().fold(None::<&LabelScore>, |best, candidate| match best {
            Some(best) if best.score >= candidate.score => Some(best),
            _ => Some(candidate),
        });

        match best.map(|best| (best.label.clone(), best.score)) {
            Some((label, confidence)) => Self {
                label,
                confidence,
                all,
            },
            None => Self::unknown(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.all.is_empty() && self.label == UNKNOWN_LABEL
    }

    fn rename_labels(mut self, aliases: &BTreeMap<String, String>) -> Self {
        if aliases.is_empty() {
            return self;
        }
        let rename = |label: &mut String| {
            if let Some(alias) = aliases.get(label.as_str()) {
                label.clone_from(alias);
            }
        };
        rename(&mut self.label);
        self.all.iter_mut().for_each(|entry| rename(&mut entry.label));
        self
    }
}

/// Produces the classification pipeline on first use.
#[async_trait]
pub trait ClassifierLoader: Send + Sync {
    /// Identifies the pipeline; loads with equal keys are shared.
    fn cache_key(&self) -> String;

    async fn load(&self) -> anyhow::Result<Arc<dyn TextClassifier>>;
}

/// Loads an [`EmotionPipeline`](crate::pipelines::emotion::EmotionPipeline) for model `M`.
pub struct PipelineLoader<M: EmotionModel> {
    options: M::Options,
    device: DeviceRequest,
}

impl<M: EmotionModel> PipelineLoader<M> {
    pub fn new(options: M::Options, device: DeviceRequest) -> Self {
        Self { options, device }
    }

    fn builder(&self) -> EmotionPipelineBuilder<M> {
        EmotionPipelineBuilder::new(self.options.clone()).device_request(self.device.clone())
    }
}

#[async_trait]
impl<M: EmotionModel> ClassifierLoader for PipelineLoader<M> {
    fn cache_key(&self) -> String {
        self.builder().cache_key()
    }

    async fn load(&self) -> anyhow::Result<Arc<dyn TextClassifier>> {
        let pipeline = self.builder().build().await?;
        Ok(Arc::new(pipeline))
    }
}

pub struct EmotionClassifier {
    loader: Arc<dyn ClassifierLoader>,
    cache: ModelCache,
    label_aliases: BTreeMap<String, String>,
}

impl EmotionClassifier {
    pub fn new(loader: impl ClassifierLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
            cache: ModelCache::new(),
            label_aliases: BTreeMap::new(),
        }
    }

    /// Classifier for the configured DistilBERT checkpoint.
    pub fn from_config(config: &ModelConfig) -> Self {
        for (label, alias) in &config.label_aliases {
            if !EMOTION_LABELS.contains(&alias.as_str()) {
                tracing::warn!(%label, %alias, "label alias points outside the emotion taxonomy");
            }
        }

        let loader = PipelineLoader::<EmotionDistilBertModel>::new(
            DistilBertCheckpoint::new(config.repo.clone()),
            config.device.into(),
        );
        Self::new(loader).with_label_aliases(config.label_aliases.clone())
    }

    pub fn with_label_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.label_aliases = aliases;
        self
    }

    async fn pipeline(&self) -> Result<Arc<dyn TextClassifier>, ClassifierError> {
        let key = self.loader.cache_key();
        let loader = Arc::clone(&self.loader);
        let model = key.clone();

        self.cache
            .get_or_create(&key, move || async move {
                tracing::info!(%model, "loading emotion classification pipeline");
                let started = Instant::now();
                let pipeline = loader.load().await?;
                tracing::info!(
                    %model,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "emotion classification pipeline ready"
                );
                anyhow::Ok(pipeline)
            })
            .await
            .map_err(ClassifierError::Load)
    }

    /// Load the pipeline now rather than on the first request.
    pub async fn warm_up(&self) -> Result<(), ClassifierError> {
        self.pipeline().await.map(|_| ())
    }

    /// Whether the pipeline has been loaded.
    pub async fn is_ready(&self) -> bool {
        !self.cache.is_empty().await
    }

    /// Classify `text`, loading the pipeline first if this is the first call.
    ///
    /// The text is handed to the pipeline unmodified. Inference runs on the
    /// blocking pool.
    pub async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        let pipeline = self.pipeline().await?;

        let input = text.to_owned();
        let scores = tokio::task::spawn_blocking(move || pipeline.classify(&input))
            .await?
            .map_err(ClassifierError::Inference)?;

        let result = ClassificationResult::from_scores(scores).rename_labels(&self.label_aliases);
        if result.is_unknown() {
            tracing::warn!(
                chars = text.chars().count(),
                "pipeline returned no usable scores, answering '{UNKNOWN_LABEL}'"
            );
        } else {
            tracing::debug!(label = %result.label, confidence = result.confidence, "classified");
        }
        Ok(result)
    }
}
