pub mod implementations;

pub use implementations::{DistilBertCheckpoint, EmotionDistilBertModel, DEFAULT_EMOTION_REPO};
