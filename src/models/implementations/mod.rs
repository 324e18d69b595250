pub mod distilbert;

pub use distilbert::{DistilBertCheckpoint, EmotionDistilBertModel, DEFAULT_EMOTION_REPO};
