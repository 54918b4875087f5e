//! tutor-server binary

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use tutor_config::{load_settings, AgentCatalog, Settings};
use tutor_llm::LlmFactory;
use tutor_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("TUTOR_ENV").ok();
    let settings = read_settings(env.as_deref());
    init_tracing(&settings);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?settings.environment,
        profile = env.as_deref().unwrap_or("default"),
        model = %settings.llm.model,
        "Tutor server starting"
    );

    let catalog = AgentCatalog::load_or_builtin(settings.agents.catalog_path.as_deref())
        .context("loading agent catalog")?;
    let llm = LlmFactory::language_model(&settings).context("creating language model client")?;
    let tts = LlmFactory::text_to_speech(&settings).context("creating speech client")?;
    let stt = LlmFactory::speech_to_text(&settings).context("creating transcription client")?;

    let mut state = AppState::in_memory(settings.clone(), catalog, llm, tts, stt)
        .context("initializing application state")?;
    if settings.observability.metrics_enabled {
        match init_metrics() {
            Some(handle) => state = state.with_metrics(handle),
            None => tracing::warn!("Prometheus recorder unavailable, /metrics disabled"),
        }
    }

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .with_context(|| {
            format!("invalid listen address {}:{}", settings.server.host, settings.server.port)
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, "Accepting connections");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Tutor server stopped");
    Ok(())
}

/// Layered settings; unreadable files degrade to built-in defaults.
/// Runs before tracing exists, hence `eprintln!`.
fn read_settings(env: Option<&str>) -> Settings {
    load_settings(env).unwrap_or_else(|e| {
        eprintln!("config: {} (continuing with defaults)", e);
        Settings::default()
    })
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Ctrl+C handler could not be installed");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler could not be installed")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = interrupt => "interrupt",
        _ = terminate => "terminate",
    };
    tracing::info!(signal, "Draining connections before exit");
}

/// `RUST_LOG` wins over `observability.log_level`
fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tower_http=debug", settings.observability.log_level))
    });

    let output = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    };

    tracing_subscriber::registry().with(filter).with(output).init();
}
