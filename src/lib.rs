//! InnerVoice: text emotion classification behind a small HTTP API.
//!
//! The model runs locally with Candle. [`classifier::EmotionClassifier`] loads
//! it on first use and [`server`] exposes it as `POST /analyze`.

pub mod classifier;
pub mod config;
pub mod core;
pub mod loaders;
pub mod logging;
pub mod models;
pub mod pipelines;
pub mod server;

pub use classifier::{
    ClassificationResult, ClassifierLoader, EmotionClassifier, PipelineLoader, EMOTION_LABELS,
    UNKNOWN_LABEL,
};
pub use config::ServiceConfig;
pub use crate::core::{ClassifierError, ConfigError, ModelCache};
pub use models::{DistilBertCheckpoint, EmotionDistilBertModel};
pub use pipelines::emotion::{LabelScore, TextClassifier};
pub use server::AppState;
