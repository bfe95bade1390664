use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conversio_core::{
    health::{DirectHealthProbe, RemoteHealthProbe},
    load_config, validate_config, BackendKind, Config, ConversionBackend, ConversionOrchestrator,
    DirectorySink, FfmpegRuntime, GotenbergClient, HealthMonitor, HttpConversionClient,
    LocalEngineAdapter, ReadinessGate,
};

use conversio_server::api::create_router;
use conversio_server::state::AppState;

/// How long shutdown waits for a cancelled batch to clean up
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Backend wiring produced from the config
struct Wiring {
    backend: ConversionBackend,
    gate: Arc<dyn ReadinessGate>,
    health: Option<Arc<HealthMonitor>>,
    engine: Option<Arc<LocalEngineAdapter>>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CONVERSIO_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Backend: {}", config.backend.kind.as_str());
    info!("Output directory: {:?}", config.output.dir);

    let wiring = build_backend(&config)?;

    let sink = Arc::new(DirectorySink::new(config.output.dir.clone()));
    let orchestrator = ConversionOrchestrator::new(
        wiring.backend,
        wiring.gate,
        sink,
        config.orchestrator.clone(),
    );

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        orchestrator,
        wiring.health.clone(),
        wiring.engine,
    ));

    // Create router
    let app = create_router(state.clone());

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if let Some(report) = state.shutdown_batch(SHUTDOWN_GRACE).await {
        info!(
            "Batch stopped: {} completed, {} failed, {} skipped",
            report.completed, report.failed, report.skipped
        );
    }
    if let Some(monitor) = &wiring.health {
        monitor.stop_polling();
    }

    Ok(())
}

fn build_backend(config: &Config) -> Result<Wiring> {
    let health_interval = Duration::from_millis(config.health.interval_ms);

    match config.backend.kind {
        BackendKind::Remote => {
            let remote = config
                .remote
                .as_ref()
                .context("Remote backend selected but no [remote] section provided")?;
            info!(
                "Initializing remote conversion client at {} ({})",
                remote.base_url, remote.resource_type
            );
            let client = Arc::new(
                HttpConversionClient::new(remote).context("Failed to create remote client")?,
            );
            let monitor = Arc::new(HealthMonitor::new(Arc::new(RemoteHealthProbe::new(
                client.clone(),
                remote.resource_type.clone(),
            ))));
            monitor.start_polling(health_interval);

            Ok(Wiring {
                backend: ConversionBackend::Remote {
                    service: client,
                    resource_type: remote.resource_type.clone(),
                },
                gate: monitor.clone(),
                health: Some(monitor),
                engine: None,
            })
        }
        BackendKind::Direct => {
            let direct = config
                .direct
                .as_ref()
                .context("Direct backend selected but no [direct] section provided")?;
            info!("Initializing direct conversion client at {}", direct.url);
            let client = Arc::new(
                GotenbergClient::new(direct).context("Failed to create direct client")?,
            );
            let monitor = Arc::new(HealthMonitor::new(Arc::new(DirectHealthProbe::new(
                client.clone(),
            ))));
            monitor.start_polling(health_interval);

            Ok(Wiring {
                backend: ConversionBackend::Direct { service: client },
                gate: monitor.clone(),
                health: Some(monitor),
                engine: None,
            })
        }
        BackendKind::Local => {
            info!(
                "Initializing local engine ({} source(s), staging in {:?})",
                config.engine.sources.len(),
                config.engine.staging_dir
            );
            let runtime = Arc::new(FfmpegRuntime::from_config(&config.engine));
            let adapter = Arc::new(LocalEngineAdapter::new(runtime, config.engine.clone()));

            // Load in the background; conversions stay gated until it succeeds.
            let loader = adapter.clone();
            tokio::spawn(async move {
                if let Err(e) = loader.ensure_loaded().await {
                    warn!("Initial engine load failed: {}", e);
                }
            });

            Ok(Wiring {
                backend: ConversionBackend::Local {
                    adapter: adapter.clone(),
                },
                gate: adapter.clone(),
                health: None,
                engine: Some(adapter),
            })
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
