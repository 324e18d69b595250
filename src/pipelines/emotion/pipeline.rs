use super::model::EmotionModel;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

/// One emotion category and the model's confidence for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }

    /// A usable pair has a non-empty label and a finite score in `[0, 1]`.
    pub fn is_well_formed(&self) -> bool {
        !self.label.trim().is_empty()
            && self.score.is_finite()
            && (0.0..=1.0).contains(&self.score)
    }
}

/// Anything that turns text into a score for every label it knows.
///
/// This is the seam between the HTTP service and the model: the service only
/// ever sees a `dyn TextClassifier`, so tests can swap in fixed scores.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> anyhow::Result<Vec<LabelScore>>;
}

pub struct EmotionPipeline<M: EmotionModel> {
    pub(crate) model: M,
    pub(crate) tokenizer: Tokenizer,
}

impl<M: EmotionModel> EmotionPipeline<M> {
    /// Score every label for `text`, highest first.
    pub fn predict(&self, text: &str) -> anyhow::Result<Vec<LabelScore>> {
        self.model.predict(&self.tokenizer, text)
    }

    pub fn device(&self) -> &candle_core::Device {
        self.model.device()
    }
}

impl<M: EmotionModel> TextClassifier for EmotionPipeline<M> {
    fn classify(&self, text: &str) -> anyhow::Result<Vec<LabelScore>> {
        self.predict(text)
    }
}
