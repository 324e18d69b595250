//! DistilBERT for sequence classification.
//!
//! DistilBERT is a six-layer distilled BERT encoder. Classification checkpoints
//! put a two-layer head on the first token's hidden state:
//! - Learned word and position embeddings followed by LayerNorm
//! - Post-norm transformer blocks (self-attention, then a GELU feed-forward)
//! - `pre_classifier` + ReLU + `classifier` producing one logit per label
//!
//! # Quick Start
//! ```rust,no_run
//! use innervoice::models::{DistilBertCheckpoint, EmotionDistilBertModel};
//! use innervoice::pipelines::EmotionPipelineBuilder;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let pipeline = EmotionPipelineBuilder::distilbert(DistilBertCheckpoint::default())
//!         .cpu()
//!         .build()
//!         .await?;
//!     let scores = pipeline.predict("I am feeling very happy today!")?;
//!     println!("{scores:?}");
//!     Ok(())
//! }
//! ```

use candle_core::{DType, Device, IndexOp, Result, Tensor, D};
use candle_nn::{
    embedding, layer_norm, linear, ops::softmax, Embedding, LayerNorm, Linear, Module, VarBuilder,
};
use serde::Deserialize;
use std::collections::HashMap;

const LAYER_NORM_EPS: f64 = 1e-12;
const MIN_VALUE_F64: f64 = f32::MIN as f64;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Gelu,
    Relu,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    pub vocab_size: usize,
    pub dim: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub hidden_dim: usize,
    #[serde(default)]
    pub activation: Activation,
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub pad_token_id: u32,
    #[serde(default)]
    pub id2label: HashMap<String, String>,
}

/// Word + position embeddings.
#[derive(Debug, Clone)]
struct Embeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    norm: LayerNorm,
}

impl Embeddings {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let word_embeddings = embedding(config.vocab_size, config.dim, vb.pp("word_embeddings"))?;
        let position_embeddings = embedding(
            config.max_position_embeddings,
            config.dim,
            vb.pp("position_embeddings"),
        )?;
        let norm = layer_norm(config.dim, LAYER_NORM_EPS, vb.pp("LayerNorm"))?;

        Ok(Self {
            word_embeddings,
            position_embeddings,
            norm,
        })
    }

    fn forward(&self, input_ids: &Tensor) -> Result<Tensor> {
        let (_batch, seq_len) = input_ids.dims2()?;
        let positions = Tensor::arange(0u32, seq_len as u32, input_ids.device())?;

        let words = input_ids.apply(&self.word_embeddings)?;
        let positions = positions.apply(&self.position_embeddings)?;
        words.broadcast_add(&positions)?.apply(&self.norm)
    }
}

/// Multi-head self-attention.
#[derive(Debug, Clone)]
struct Attention {
    q_lin: Linear,
    k_lin: Linear,
    v_lin: Linear,
    out_lin: Linear,
    num_attention_heads: usize,
    attention_head_size: usize,
}

impl Attention {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let dim = config.dim;

        Ok(Self {
            q_lin: linear(dim, dim, vb.pp("q_lin"))?,
            k_lin: linear(dim, dim, vb.pp("k_lin"))?,
            v_lin: linear(dim, dim, vb.pp("v_lin"))?,
            out_lin: linear(dim, dim, vb.pp("out_lin"))?,
            num_attention_heads: config.n_heads,
            attention_head_size: dim / config.n_heads,
        })
    }

    /// `(batch, seq, dim)` -> `(batch, heads, seq, head_size)`
    fn split_heads(&self, xs: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, _) = xs.dims3()?;
        xs.reshape((
            batch,
            seq_len,
            self.num_attention_heads,
            self.attention_head_size,
        ))?
        .transpose(1, 2)?
        .contiguous()
    }

    fn forward(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, hidden_size) = hidden_states.dims3()?;

        let q = self.split_heads(&hidden_states.apply(&self.q_lin)?)?;
        let k = self.split_heads(&hidden_states.apply(&self.k_lin)?)?;
        let v = self.split_heads(&hidden_states.apply(&self.v_lin)?)?;

        let scale = (self.attention_head_size as f64).powf(-0.5);
        let q = (q * scale)?;

        let attention_scores = q.matmul(&k.transpose(D::Minus2, D::Minus1)?)?;
        let attention_scores = attention_scores.broadcast_add(attention_mask)?;
        let attention_probs = softmax(&attention_scores, D::Minus1)?;

        attention_probs
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((batch, seq_len, hidden_size))?
            .apply(&self.out_lin)
    }
}

/// Position-wise feed-forward network.
#[derive(Debug, Clone)]
struct FeedForward {
    lin1: Linear,
    lin2: Linear,
    activation: Activation,
}

impl FeedForward {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        Ok(Self {
            lin1: linear(config.dim, config.hidden_dim, vb.pp("lin1"))?,
            lin2: linear(config.hidden_dim, config.dim, vb.pp("lin2"))?,
            activation: config.activation,
        })
    }
}

impl Module for FeedForward {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = xs.apply(&self.lin1)?;
        let xs = match self.activation {
            Activation::Gelu => xs.gelu_erf()?,
            Activation::Relu => xs.relu()?,
        };
        xs.apply(&self.lin2)
    }
}

/// Single post-norm transformer layer.
#[derive(Debug, Clone)]
struct TransformerLayer {
    attention: Attention,
    sa_layer_norm: LayerNorm,
    ffn: FeedForward,
    output_layer_norm: LayerNorm,
}

impl TransformerLayer {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        Ok(Self {
            attention: Attention::load(vb.pp("attention"), config)?,
            sa_layer_norm: layer_norm(config.dim, LAYER_NORM_EPS, vb.pp("sa_layer_norm"))?,
            ffn: FeedForward::load(vb.pp("ffn"), config)?,
            output_layer_norm: layer_norm(config.dim, LAYER_NORM_EPS, vb.pp("output_layer_norm"))?,
        })
    }

    fn forward(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let attention_output = self.attention.forward(hidden_states, attention_mask)?;
        let hidden_states = (attention_output + hidden_states)?.apply(&self.sa_layer_norm)?;

        let ffn_output = hidden_states.apply(&self.ffn)?;
        (ffn_output + hidden_states)?.apply(&self.output_layer_norm)
    }
}

/// Turns a `(batch, seq)` 0/1 padding mask into an additive `(batch, 1, 1, seq)` mask.
fn extended_attention_mask(attention_mask: &Tensor) -> Result<Tensor> {
    attention_mask
        .to_dtype(DType::F32)?
        .affine(-1.0, 1.0)?
        .affine(MIN_VALUE_F64, 0.0)?
        .unsqueeze(1)?
        .unsqueeze(1)
}

/// DistilBERT encoder with a sequence classification head.
#[derive(Debug, Clone)]
pub struct DistilBertForSequenceClassification {
    embeddings: Embeddings,
    layers: Vec<TransformerLayer>,
    pre_classifier: Linear,
    classifier: Linear,
}

impl DistilBertForSequenceClassification {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let encoder = vb.pp("distilbert");
        let embeddings = Embeddings::load(encoder.pp("embeddings"), config)?;
        let layers = (0..config.n_layers)
            .map(|index| {
                TransformerLayer::load(encoder.pp(format!("transformer.layer.{index}")), config)
            })
            .collect::<Result<Vec<_>>>()?;

        let num_labels = config.id2label.len();
        let pre_classifier = linear(config.dim, config.dim, vb.pp("pre_classifier"))?;
        let classifier = linear(config.dim, num_labels, vb.pp("classifier"))?;

        Ok(Self {
            embeddings,
            layers,
            pre_classifier,
            classifier,
        })
    }

    /// Returns `(batch, num_labels)` logits.
    pub fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let attention_mask = extended_attention_mask(attention_mask)?;

        let mut hidden_states = self.embeddings.forward(input_ids)?;
        for layer in &self.layers {
            hidden_states = layer.forward(&hidden_states, &attention_mask)?;
        }

        hidden_states
            .i((.., 0))?
            .apply(&self.pre_classifier)?
            .relu()?
            .apply(&self.classifier)
    }
}

use crate::loaders::{ConfigLoader, TokenizerLoader, WeightsFormat, WeightsLoader};
use crate::pipelines::emotion::{EmotionModel, LabelScore};
use anyhow::{Error as E, Result as AnyhowResult};
use tokenizers::Tokenizer;

/// Emotion checkpoint used when nothing else is configured.
pub const DEFAULT_EMOTION_REPO: &str = "bhadresh-savani/distilbert-base-uncased-emotion";

/// Tokenizer used when a checkpoint repo ships only `vocab.txt`.
const FALLBACK_TOKENIZER_REPO: &str = "distilbert/distilbert-base-uncased";

/// A DistilBERT classification checkpoint on the Hugging Face Hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistilBertCheckpoint {
    pub repo: String,
}

impl DistilBertCheckpoint {
    pub fn new(repo: impl Into<String>) -> Self {
        Self { repo: repo.into() }
    }
}

impl Default for DistilBertCheckpoint {
    fn default() -> Self {
        Self::new(DEFAULT_EMOTION_REPO)
    }
}

impl std::fmt::Display for DistilBertCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.repo)
    }
}

impl crate::core::ModelOptions for DistilBertCheckpoint {
    fn cache_key(&self) -> String {
        format!("distilbert:{}", self.repo)
    }
}

/// Orders `id2label` by numeric id. Ids must be exactly `0..n`.
fn ordered_labels(id2label: &HashMap<String, String>) -> AnyhowResult<Vec<String>> {
    let mut entries = id2label
        .iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|id| (id, label.clone()))
                .map_err(|_| E::msg(format!("Non-numeric label id '{id}' in id2label")))
        })
        .collect::<AnyhowResult<Vec<_>>>()?;
    entries.sort_by_key(|(id, _)| *id);

    if let Some(position) = entries.iter().enumerate().position(|(i, (id, _))| i != *id) {
        anyhow::bail!("id2label is missing label id {position}");
    }
    if entries.is_empty() {
        anyhow::bail!("Model config has an empty id2label map; not a classification checkpoint");
    }

    Ok(entries.into_iter().map(|(_, label)| label).collect())
}

/// Pairs each label with its probability, highest first. Equal scores keep label order.
fn scores_by_label(labels: &[String], probabilities: Vec<f32>) -> Vec<LabelScore> {
    let mut scores: Vec<LabelScore> = labels
        .iter()
        .zip(probabilities)
        .map(|(label, score)| LabelScore::new(label.clone(), score))
        .collect();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

/// Emotion classification model using DistilBERT
#[derive(Clone)]
pub struct EmotionDistilBertModel {
    model: DistilBertForSequenceClassification,
    device: Device,
    labels: Vec<String>,
    max_position_embeddings: usize,
}

impl EmotionDistilBertModel {
    pub async fn new(checkpoint: DistilBertCheckpoint, device: Device) -> AnyhowResult<Self> {
        let config: Config = ConfigLoader::new(&checkpoint.repo, "config.json")
            .load()
            .await?;
        let labels = ordered_labels(&config.id2label)?;

        let (weights_filename, format) = WeightsLoader::new(&checkpoint.repo).load().await?;

        let dtype = DType::F32;
        let vb = match format {
            WeightsFormat::SafeTensors => unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights_filename], dtype, &device)?
            },
            WeightsFormat::PyTorch => VarBuilder::from_pth(&weights_filename, dtype, &device)?,
        };

        let model = DistilBertForSequenceClassification::load(vb, &config)?;

        Ok(Self {
            model,
            device,
            labels,
            max_position_embeddings: config.max_position_embeddings,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn predict(&self, tokenizer: &Tokenizer, text: &str) -> AnyhowResult<Vec<LabelScore>> {
        let tokens = tokenizer
            .encode(text, true)
            .map_err(|e| E::msg(format!("Tokenization error: {e}")))?;

        let input_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(tokens.get_attention_mask(), &self.device)?.unsqueeze(0)?;

        let logits = self.model.forward(&input_ids, &attention_mask)?;
        let probabilities = softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1::<f32>()?;

        Ok(scores_by_label(&self.labels, probabilities))
    }

    pub async fn get_tokenizer(checkpoint: DistilBertCheckpoint) -> AnyhowResult<Tokenizer> {
        match TokenizerLoader::new(&checkpoint.repo, "tokenizer.json").load().await {
            Ok(tokenizer) => Ok(tokenizer),
            Err(e) => {
                tracing::debug!(
                    repo = %checkpoint.repo,
                    "no tokenizer.json in checkpoint ({e}); using {FALLBACK_TOKENIZER_REPO}"
                );
                TokenizerLoader::new(FALLBACK_TOKENIZER_REPO, "tokenizer.json")
                    .load()
                    .await
            }
        }
    }
}

impl EmotionModel for EmotionDistilBertModel {
    type Options = DistilBertCheckpoint;

    async fn new(options: Self::Options, device: Device) -> AnyhowResult<Self> {
        EmotionDistilBertModel::new(options, device).await
    }

    fn predict(&self, tokenizer: &Tokenizer, text: &str) -> AnyhowResult<Vec<LabelScore>> {
        self.predict(tokenizer, text)
    }

    async fn get_tokenizer(options: Self::Options) -> AnyhowResult<Tokenizer> {
        Self::get_tokenizer(options).await
    }

    fn max_input_tokens(&self) -> usize {
        self.max_position_embeddings
    }

    fn device(&self) -> &Device {
        self.device()
    }
}
