//! End-to-end pipeline runs against a mock analysis service over HTTP.

use std::sync::Arc;
use std::time::Duration;

use heirloom_analysis::{
    AnalysisOrchestrator, AnalysisStepInvoker, HttpStepTransport, RetryPolicy,
};
use heirloom_core::{classify, select_primary, AnalysisStatus, MediaKind, MediaList};
use heirloom_db::{AnalysisStateRepository, InMemoryAnalysisStateRepository};
use uuid::Uuid;

fn orchestrator(
    base_url: String,
) -> (AnalysisOrchestrator, Arc<InMemoryAnalysisStateRepository>) {
    let transport = HttpStepTransport::new(base_url, Some("test-key".to_string())).unwrap();
    let invoker = AnalysisStepInvoker::new(Arc::new(transport))
        .with_timeout(Duration::from_secs(5))
        .with_retry_policy(RetryPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(5),
        ));
    let states = Arc::new(InMemoryAnalysisStateRepository::new());
    (AnalysisOrchestrator::new(invoker, states.clone()), states)
}

#[tokio::test]
async fn test_item_media_feeds_primary_selection_and_analysis() {
    let media = MediaList::from_urls([
        "https://x/a.jpg",
        "https://x/b.mp4",
        "https://x/c.mp3",
    ]);
    let kinds: Vec<MediaKind> = media.iter().map(|m| classify(m.url())).collect();
    assert_eq!(kinds, vec![MediaKind::Image, MediaKind::Video, MediaKind::Audio]);
    assert_eq!(select_primary(media.as_slice()), Some("https://x/a.jpg"));

    let mut server = mockito::Server::new_async().await;
    let mut mocks = Vec::new();
    for step in ["audio", "images", "summary"] {
        mocks.push(
            server
                .mock("POST", format!("/analyze-{}", step).as_str())
                .match_header("authorization", "Bearer test-key")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"ok": true}"#)
                .expect(1)
                .create_async()
                .await,
        );
    }

    let (orchestrator, states) = orchestrator(server.url());
    let item = Uuid::new_v4();
    orchestrator.request_analysis(item).await.unwrap();

    let outcome = orchestrator.run(item).await.unwrap();
    assert!(outcome.is_done());
    for mock in &mocks {
        mock.assert_async().await;
    }

    let state = states.get(item).await.unwrap().unwrap();
    assert_eq!(state.status, AnalysisStatus::Done);
    assert_eq!(state.last_error, None);
}

#[tokio::test]
async fn test_failing_middle_step_is_retried_once_then_recorded() {
    let mut server = mockito::Server::new_async().await;
    let audio = server
        .mock("POST", "/analyze-audio")
        .with_status(200)
        .with_body(r#"{"ok": true}"#)
        .expect(1)
        .create_async()
        .await;
    let images = server
        .mock("POST", "/analyze-images")
        .with_status(500)
        .with_body(r#"{"ok": false, "error": "captioning model unavailable"}"#)
        .expect(2)
        .create_async()
        .await;
    let summary = server
        .mock("POST", "/analyze-summary")
        .with_status(200)
        .with_body(r#"{"ok": true}"#)
        .expect(0)
        .create_async()
        .await;

    let (orchestrator, _) = orchestrator(server.url());
    let item = Uuid::new_v4();

    let outcome = orchestrator.run(item).await.unwrap();
    assert_eq!(outcome.status, AnalysisStatus::Error);

    audio.assert_async().await;
    images.assert_async().await;
    summary.assert_async().await;

    let state = orchestrator.status(item).await.unwrap();
    assert_eq!(state.status, AnalysisStatus::Error);
    assert_eq!(
        state.last_error.as_deref(),
        Some("failed at images: captioning model unavailable (retry)")
    );
}

#[tokio::test]
async fn test_transient_failure_recovers_on_retry() {
    let mut server = mockito::Server::new_async().await;
    // Matching mocks are served in creation order until each has its expected hits.
    let flaky = server
        .mock("POST", "/analyze-audio")
        .with_status(502)
        .with_body("bad gateway")
        .expect(1)
        .create_async()
        .await;
    let recovered = server
        .mock("POST", "/analyze-audio")
        .with_status(200)
        .with_body(r#"{"ok": true}"#)
        .expect(1)
        .create_async()
        .await;

    let (orchestrator, _) = orchestrator(server.url());
    let orchestrator = orchestrator.with_steps(vec!["audio".parse().unwrap()]);

    let outcome = orchestrator.run(Uuid::new_v4()).await.unwrap();
    assert!(outcome.is_done());
    flaky.assert_async().await;
    recovered.assert_async().await;
}
