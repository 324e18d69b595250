use super::pipeline::LabelScore;
use crate::core::ModelOptions;
use std::future::Future;
use tokenizers::Tokenizer;

/// A text-classification model that scores every emotion label it was trained on.
pub trait EmotionModel: Sized + Send + Sync + 'static {
    type Options: ModelOptions + std::fmt::Debug + Clone + Send + Sync + 'static;

    fn new(
        options: Self::Options,
        device: candle_core::Device,
    ) -> impl Future<Output = anyhow::Result<Self>> + Send;

    /// Scores for all labels, highest first.
    fn predict(&self, tokenizer: &Tokenizer, text: &str) -> anyhow::Result<Vec<LabelScore>>;

    fn get_tokenizer(
        options: Self::Options,
    ) -> impl Future<Output = anyhow::Result<Tokenizer>> + Send;

    /// Longest input, in tokens, the model accepts. Longer inputs are truncated.
    fn max_input_tokens(&self) -> usize;

    fn device(&self) -> &candle_core::Device;
}
