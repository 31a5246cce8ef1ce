//! End-to-end checks against the real ONNX model. These download several
//! hundred megabytes on first run, so they are ignored by default:
//! `cargo test -- --ignored`.
//!
//! The bundled model is toxic-bert. Its label ids are renamed to
//! `toxicity`, `severe_toxicity`, `obscene`, `threat`, `insult` and
//! `identity_attack`. It has no `sexual_explicit` head, so that category is
//! never reported.

use toxicheck::{
    BuiltinModel, ClassifierError, ClassifierSession, ModelManager, OnnxModelLoader, SessionState,
    DEFAULT_THRESHOLD,
};

async fn ready_session(categories: Vec<String>) -> Result<ClassifierSession, Box<dyn std::error::Error>> {
    let manager = ModelManager::new_default()?;
    manager
        .ensure_model_downloaded(&BuiltinModel::ToxicBert.get_model_info())
        .await?;

    let session = ClassifierSession::builder()
        .with_loader(OnnxModelLoader::new(manager))
        .build()?;
    assert_eq!(session.initialize(DEFAULT_THRESHOLD, categories).await?, SessionState::Ready);
    Ok(session)
}

#[tokio::test]
#[ignore = "downloads the toxic-bert model"]
async fn test_benign_text_is_clean() -> Result<(), Box<dyn std::error::Error>> {
    let session = ready_session(vec![]).await?;
    let results = session.classify("You are wonderful").await?;

    assert!(!results.is_empty());
    assert!(results.iter().all(|c| c.label != "sexual_explicit"));
    let toxicity = results.iter().find(|c| c.label == "toxicity").expect("toxicity category");
    assert!(toxicity.positive_probability() < 0.1);
    for classification in &results {
        assert!(classification.positive_probability() < 0.1, "{:?}", classification);
        assert!(!classification.matched);
    }
    Ok(())
}

#[tokio::test]
#[ignore = "downloads the toxic-bert model"]
async fn test_threat_is_detected() -> Result<(), Box<dyn std::error::Error>> {
    let session = ready_session(vec![]).await?;
    let results = session.classify("I will hurt you").await?;

    let threat = results.iter().find(|c| c.label == "threat").expect("threat category");
    assert!(threat.positive_probability() > DEFAULT_THRESHOLD, "{:?}", threat);
    assert!(threat.matched);
    Ok(())
}

#[tokio::test]
#[ignore = "downloads the toxic-bert model"]
async fn test_category_filter() -> Result<(), Box<dyn std::error::Error>> {
    let session = ready_session(vec!["threat".into(), "insult".into()]).await?;
    let results = session.classify("hello there").await?;

    let labels: Vec<_> = results.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, ["threat", "insult"]);
    Ok(())
}

#[tokio::test]
#[ignore = "downloads the toxic-bert model"]
async fn test_unknown_category_fails_load() -> Result<(), Box<dyn std::error::Error>> {
    let manager = ModelManager::new_default()?;
    let session = ClassifierSession::builder()
        .with_loader(OnnxModelLoader::new(manager))
        .build()?;

    let state = session.initialize(DEFAULT_THRESHOLD, vec!["spam".into()]).await?;
    assert_eq!(state, SessionState::Failed);
    assert!(session.last_error().unwrap().contains("spam"));
    assert!(matches!(session.classify("hello").await, Err(ClassifierError::NotReady)));
    Ok(())
}
