//! Direct and local backend integration tests.

use std::sync::Arc;
use std::time::Duration;

use conversio_core::{
    job::RecordStatus,
    testing::{fixtures, MemorySink, MockDirectService, MockEngineRuntime},
    ConversionBackend, ConversionOptions, ConversionOrchestrator, EngineConfig,
    LocalEngineAdapter, OrchestratorConfig, OrchestratorError, TargetFormat,
};

fn direct_harness() -> (ConversionOrchestrator, Arc<MockDirectService>, Arc<MemorySink>) {
    let service = Arc::new(MockDirectService::new());
    let sink = Arc::new(MemorySink::new());
    let orchestrator = ConversionOrchestrator::new(
        ConversionBackend::Direct {
            service: service.clone(),
        },
        Arc::new(conversio_core::health::StaticGate(true)),
        sink.clone(),
        OrchestratorConfig::default(),
    );
    (orchestrator, service, sink)
}

fn local_harness() -> (
    ConversionOrchestrator,
    Arc<LocalEngineAdapter>,
    Arc<MockEngineRuntime>,
    Arc<MemorySink>,
) {
    let runtime = Arc::new(MockEngineRuntime::new());
    let adapter = Arc::new(LocalEngineAdapter::new(
        runtime.clone(),
        EngineConfig::default()
            .with_sources(["mock://primary", "mock://fallback"])
            .with_load_retries(0),
    ));
    let sink = Arc::new(MemorySink::new());
    let orchestrator = ConversionOrchestrator::new(
        ConversionBackend::Local {
            adapter: adapter.clone(),
        },
        adapter.clone(),
        sink.clone(),
        OrchestratorConfig::default(),
    );
    (orchestrator, adapter, runtime, sink)
}

#[tokio::test]
async fn test_direct_failure_continues_batch() {
    let (orchestrator, service, sink) = direct_harness();
    service.fail("b.odt", 500, "LibreOffice crashed");

    let report = orchestrator
        .enqueue(
            vec![
                fixtures::document("a.docx"),
                fixtures::document("b.odt"),
                fixtures::document("c.doc"),
            ],
            TargetFormat::new("pdf"),
            ConversionOptions::new().with("pdfa", "PDF/A-2b"),
        )
        .await
        .unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);
    let completed = orchestrator.snapshot().completed;
    assert_eq!(completed[1].status, RecordStatus::Failed);
    assert_eq!(
        completed[1].error.as_deref(),
        Some("Conversion failed (500): LibreOffice crashed")
    );
    assert_eq!(sink.delivered_names(), vec!["a.pdf", "c.pdf"]);

    let calls = service.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].options.text("pdfa").as_deref(), Some("PDF/A-2b"));
}

#[tokio::test(start_paused = true)]
async fn test_direct_cancel_aborts_in_flight_request() {
    let (orchestrator, service, sink) = direct_harness();
    service.set_delay(Duration::from_secs(30));

    let (_, handle) = orchestrator
        .start_batch(
            fixtures::documents(3),
            TargetFormat::new("pdf"),
            ConversionOptions::new(),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    orchestrator.cancel_current();

    let report = handle.await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.attempted, 1);
    assert_eq!(report.skipped, 2);
    assert!(sink.delivered().is_empty());
    assert_eq!(service.calls().len(), 1);
    assert_eq!(orchestrator.snapshot().completed.len(), 1);
}

#[tokio::test]
async fn test_local_batch_requires_loaded_engine() {
    let (orchestrator, adapter, runtime, _) = local_harness();
    assert!(!orchestrator.can_start());

    let err = orchestrator
        .enqueue(
            vec![fixtures::video("clip.mov")],
            TargetFormat::new("mp4"),
            ConversionOptions::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err, OrchestratorError::NotReady);
    assert!(runtime.engine().exec_calls().is_empty());

    adapter.ensure_loaded().await.unwrap();
    assert!(orchestrator.can_start());
}

#[tokio::test]
async fn test_concurrent_loads_share_one_attempt() {
    let (_, adapter, runtime, _) = local_harness();

    let (a, b) = tokio::join!(adapter.ensure_loaded(), adapter.ensure_loaded());
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(runtime.load_calls(), vec!["mock://primary"]);

    adapter.ensure_loaded().await.unwrap();
    assert_eq!(runtime.load_calls().len(), 1);
}

#[tokio::test]
async fn test_local_batch_converts_and_records_unsupported_input() {
    let (orchestrator, adapter, runtime, sink) = local_harness();
    adapter.ensure_loaded().await.unwrap();
    runtime.engine().set_progress_steps(vec![0.5, 1.0]);

    let report = orchestrator
        .enqueue(
            vec![
                fixtures::video("clip.mov"),
                fixtures::document("notes.docx"),
                fixtures::audio("voice.wav"),
            ],
            TargetFormat::new("mp4"),
            ConversionOptions::new().with("videoCodec", "libx264"),
        )
        .await
        .unwrap();

    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);

    let completed = orchestrator.snapshot().completed;
    assert_eq!(
        completed[1].error.as_deref(),
        Some("Unsupported file type: application/vnd.openxmlformats-officedocument.wordprocessingml.document")
    );

    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[0].file_name, "clip.mp4");
    assert_eq!(delivered[0].mime_type, "video/mp4");
    assert_eq!(&delivered[0].bytes[..], b"mock output");

    let first_call = &runtime.engine().exec_calls()[0];
    assert!(first_call.windows(2).any(|w| w[0] == "-c:v" && w[1] == "libx264"));
    assert!(runtime.engine().staged_files().is_empty());
}

#[tokio::test]
async fn test_local_cancel_cleans_up_staged_files() {
    let (orchestrator, adapter, runtime, sink) = local_harness();
    adapter.ensure_loaded().await.unwrap();
    let engine = runtime.engine();
    engine.hang_exec();

    let (_, handle) = orchestrator
        .start_batch(
            vec![fixtures::video("clip.mov"), fixtures::audio("voice.wav")],
            TargetFormat::new("mp4"),
            ConversionOptions::new(),
        )
        .unwrap();

    for _ in 0..200 {
        if !engine.exec_calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(engine.exec_calls().len(), 1, "exec never started");
    assert!(!engine.staged_files().is_empty());

    orchestrator.cancel_current();
    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("batch did not stop after cancel")
        .unwrap();
    assert!(report.cancelled);
    assert!(sink.delivered().is_empty());

    for _ in 0..200 {
        if engine.staged_files().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(engine.staged_files().is_empty(), "left behind: {:?}", engine.staged_files());
    assert_eq!(engine.exec_calls().len(), 1);
}
