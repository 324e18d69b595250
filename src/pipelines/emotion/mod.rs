//! Emotion classification pipeline.
//!
//! This module scores a piece of text against every emotion label a
//! pre-trained sequence-classification model knows, returning the full
//! distribution rather than only the top label.
//!
//! ## Main Types
//!
//! - [`EmotionPipeline`] - Model plus tokenizer, ready for inference
//! - [`EmotionPipelineBuilder`] - Builder pattern for pipeline configuration
//! - [`EmotionModel`] - Trait for emotion model implementations
//! - [`TextClassifier`] - Object-safe seam the HTTP service calls through
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use innervoice::models::DistilBertCheckpoint;
//! use innervoice::pipelines::emotion::*;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let pipeline = EmotionPipelineBuilder::distilbert(DistilBertCheckpoint::default())
//!         .build()
//!         .await?;
//!
//!     for LabelScore { label, score } in pipeline.predict("I love this product!")? {
//!         println!("{label}: {score:.2}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod model;
pub mod pipeline;

pub use builder::EmotionPipelineBuilder;
pub use model::EmotionModel;
pub use pipeline::{EmotionPipeline, LabelScore, TextClassifier};
