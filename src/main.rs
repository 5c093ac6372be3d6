use std::sync::Arc;

use anyhow::Context;

use mailguard::analyzers::AnalyzerSet;
use mailguard::api::triage_routes;
use mailguard::config::{AnalyzerConfig, ServerConfig, TriageConfig};
use mailguard::triage::TriageCoordinator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let triage_config = TriageConfig::from_env().context("invalid triage configuration")?;
    let server_config = ServerConfig::from_env().context("invalid server configuration")?;
    let analyzer_config =
        AnalyzerConfig::from_env().context("invalid analyzer configuration")?;

    let analyzers =
        AnalyzerSet::from_config(&analyzer_config).context("failed to build analyzers")?;

    eprintln!("🛡️  MailGuard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Analyzers: {}", analyzers.names().join(", "));
    eprintln!(
        "   Timeouts: {}ms per analyzer, {}ms per run",
        triage_config.analyzer_timeout.as_millis(),
        triage_config.run_timeout.as_millis()
    );
    eprintln!("   Triage API: http://0.0.0.0:{}/api/triage", server_config.port);
    eprintln!("   Raw API: http://0.0.0.0:{}/api/triage/raw\n", server_config.port);

    let coordinator = Arc::new(TriageCoordinator::new(analyzers, triage_config));
    let app = triage_routes(coordinator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server_config.port))
        .await
        .with_context(|| format!("failed to bind port {}", server_config.port))?;

    tracing::info!(port = server_config.port, "Triage server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("server error")?;

    Ok(())
}
