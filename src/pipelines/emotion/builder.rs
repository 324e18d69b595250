use super::model::EmotionModel;
use super::pipeline::EmotionPipeline;
use crate::pipelines::utils::{build_cache_key, DeviceRequest};
use tokenizers::TruncationParams;

pub struct EmotionPipelineBuilder<M: EmotionModel> {
    options: M::Options,
    device_request: DeviceRequest,
}

impl<M: EmotionModel> EmotionPipelineBuilder<M> {
    pub fn new(options: M::Options) -> Self {
        Self {
            options,
            device_request: DeviceRequest::Default,
        }
    }

    pub fn cpu(mut self) -> Self {
        self.device_request = DeviceRequest::Cpu;
        self
    }

    pub fn cuda_device(mut self, index: usize) -> Self {
        self.device_request = DeviceRequest::Cuda(index);
        self
    }

    pub fn device(mut self, device: candle_core::Device) -> Self {
        self.device_request = DeviceRequest::Explicit(device);
        self
    }

    pub fn device_request(mut self, request: DeviceRequest) -> Self {
        self.device_request = request;
        self
    }

    /// Identifies the pipeline this builder would produce.
    pub fn cache_key(&self) -> String {
        build_cache_key(&self.options, &self.device_request)
    }

    pub async fn build(self) -> anyhow::Result<EmotionPipeline<M>> {
        let device = self.device_request.resolve()?;
        let model = M::new(self.options.clone(), device).await?;

        let mut tokenizer = M::get_tokenizer(self.options).await?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: model.max_input_tokens(),
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("Failed to configure tokenizer truncation: {e}"))?;

        Ok(EmotionPipeline { model, tokenizer })
    }
}

impl EmotionPipelineBuilder<crate::models::implementations::distilbert::EmotionDistilBertModel> {
    pub fn distilbert(checkpoint: crate::models::DistilBertCheckpoint) -> Self {
        Self::new(checkpoint)
    }
}
