//! Common test utilities for route testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock backends injected, so the API can be exercised without a real
//! conversion service or ffmpeg install.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use conversio_core::{
    health::RemoteHealthProbe,
    load_config_from_str,
    testing::{MemorySink, MockConversionService, MockEngineRuntime},
    ConversionBackend, ConversionOrchestrator, EngineConfig, HealthMonitor, HealthStatus,
    LocalEngineAdapter, OrchestratorConfig, OrchestratorSnapshot,
};
use conversio_server::state::AppState;

const REMOTE_CONFIG: &str = r#"
[backend]
kind = "remote"

[remote]
base_url = "http://converter.test/api"
resource_type = "document"
"#;

const LOCAL_CONFIG: &str = r#"
[backend]
kind = "local"

[engine]
sources = ["mock://primary"]
load_retries = 0
"#;

/// Test fixture for route testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_conversion_accepted() {
///     let fixture = TestFixture::remote().await;
///
///     let response = fixture
///         .post_multipart("/api/v1/conversions", &Multipart::new().text("target_format", "pdf"))
///         .await;
///
///     assert_eq!(response.status, 400);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// State shared with the router
    pub state: Arc<AppState>,
    /// Orchestrator shared with the router
    pub orchestrator: ConversionOrchestrator,
    /// Mock remote service (remote fixtures only)
    pub service: Arc<MockConversionService>,
    /// Health monitor (remote fixtures only)
    pub health: Option<Arc<HealthMonitor>>,
    /// Mock engine runtime (local fixtures only)
    pub runtime: Arc<MockEngineRuntime>,
    /// Engine adapter (local fixtures only)
    pub engine: Option<Arc<LocalEngineAdapter>>,
    /// Captures delivered artifacts
    pub sink: Arc<MemorySink>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Remote backend whose health check has already passed.
    pub async fn remote() -> Self {
        Self::remote_with_health(None).await
    }

    /// Remote backend whose first health check reports `status`.
    pub async fn remote_with_health(status: Option<HealthStatus>) -> Self {
        let service = Arc::new(MockConversionService::new());
        if let Some(status) = status {
            service.set_health(status);
        }

        let monitor = Arc::new(HealthMonitor::new(Arc::new(RemoteHealthProbe::new(
            service.clone(),
            "document",
        ))));
        monitor.check_now().await;

        let sink = Arc::new(MemorySink::new());
        let orchestrator = ConversionOrchestrator::new(
            ConversionBackend::Remote {
                service: service.clone(),
                resource_type: "document".to_string(),
            },
            monitor.clone(),
            sink.clone(),
            OrchestratorConfig::default().with_poll_interval(10),
        );

        let config = load_config_from_str(REMOTE_CONFIG).expect("Invalid remote test config");
        let state = Arc::new(AppState::new(
            config,
            orchestrator.clone(),
            Some(monitor.clone()),
            None,
        ));

        Self {
            router: conversio_server::api::create_router(state.clone()),
            state,
            orchestrator,
            service,
            health: Some(monitor),
            runtime: Arc::new(MockEngineRuntime::new()),
            engine: None,
            sink,
        }
    }

    /// Local backend with an engine that has not been loaded yet.
    pub fn local() -> Self {
        let runtime = Arc::new(MockEngineRuntime::new());
        let adapter = Arc::new(LocalEngineAdapter::new(
            runtime.clone(),
            EngineConfig::default()
                .with_sources(["mock://primary"])
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

        let config = load_config_from_str(LOCAL_CONFIG).expect("Invalid local test config");
        let state = Arc::new(AppState::new(
            config,
            orchestrator.clone(),
            None,
            Some(adapter.clone()),
        ));

        Self {
            router: conversio_server::api::create_router(state.clone()),
            state,
            orchestrator,
            service: Arc::new(MockConversionService::new()),
            health: None,
            runtime,
            engine: Some(adapter),
            sink,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a multipart POST request.
    pub async fn post_multipart(&self, path: &str, form: &Multipart) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", Multipart::BOUNDARY),
            )
            .body(Body::from(form.body()))
            .unwrap();
        self.send(request).await
    }

    /// Get the raw text body of a request (for non-JSON endpoints).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&body_bytes).to_string())
    }

    /// Wait until the running batch (if any) has finished.
    pub async fn wait_idle(&self) -> OrchestratorSnapshot {
        for _ in 0..200 {
            let snapshot = self.orchestrator.snapshot();
            if !snapshot.is_processing {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Batch did not finish in time");
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Minimal multipart/form-data body builder.
#[derive(Debug, Default)]
pub struct Multipart {
    parts: Vec<u8>,
}

impl Multipart {
    pub const BOUNDARY: &'static str = "conversio-test-boundary";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                Self::BOUNDARY,
                name,
                value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                Self::BOUNDARY,
                file_name,
                content_type
            )
            .as_bytes(),
        );
        self.parts.extend_from_slice(bytes);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    pub fn body(&self) -> Vec<u8> {
        let mut body = self.parts.clone();
        body.extend_from_slice(format!("--{}--\r\n", Self::BOUNDARY).as_bytes());
        body
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
