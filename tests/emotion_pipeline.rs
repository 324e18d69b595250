// Runs the real DistilBERT checkpoint. Needs network access to the Hugging Face
// Hub on first run: `cargo test -- --ignored`.

use innervoice::models::DistilBertCheckpoint;
use innervoice::pipelines::emotion::EmotionPipelineBuilder;
use innervoice::{ClassificationResult, EmotionClassifier, ServiceConfig, UNKNOWN_LABEL};

#[tokio::test]
#[ignore = "downloads model weights"]
async fn distilbert_scores_every_label() -> anyhow::Result<()> {
    let pipeline = EmotionPipelineBuilder::distilbert(DistilBertCheckpoint::default())
        .cpu()
        .build()
        .await?;

    let scores = pipeline.predict("I am feeling very happy today!")?;
    assert_eq!(scores.len(), 6);
    assert!(scores.windows(2).all(|pair| pair[0].score >= pair[1].score));

    let total: f32 = scores.iter().map(|s| s.score).sum();
    assert!((total - 1.0).abs() < 1e-3);

    let best = ClassificationResult::from_scores(scores);
    assert_eq!(best.label, "joy");
    Ok(())
}

#[tokio::test]
#[ignore = "downloads model weights"]
async fn truncates_long_input() -> anyhow::Result<()> {
    let mut config = ServiceConfig::default();
    config.model.device = innervoice::config::DeviceSetting::Cpu;
    let classifier = EmotionClassifier::from_config(&config.model);

    let text = "I can't stop worrying about tomorrow. ".repeat(500);
    let result = classifier.classify(&text).await?;

    assert_ne!(result.label, UNKNOWN_LABEL);
    assert!((0.0..=1.0).contains(&result.confidence));
    Ok(())
}
