//! Process entry: argument parsing, logging setup and component wiring.

pub mod args;

use anyhow::{Context, Result};
use args::Cli;
use clap::Parser;
use compliance_client::CollectorClient;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AgentConfig;
use crate::control;
use crate::coordinator::Coordinator;
use crate::executor::{ContentLocator, OscapExecutor};
use crate::host;
use crate::scheduler::Scheduler;

/// Run the agent until SIGINT or SIGTERM.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AgentConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    cli.apply(&mut config);
    config.validate()?;

    init_tracing(&config);

    let host_id = host::host_identifier(config.host_identifier.as_deref());
    info!(
        version = control::VERSION,
        host = %host_id,
        collector = %config.collector_base_url,
        profile = %config.default_profile,
        "compliance agent starting"
    );

    let addr = config.control_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind control surface on {addr}"))?;

    let client = config.collector_client()?;
    let collector_check = spawn_collector_check(client.clone());

    let executor = Arc::new(OscapExecutor::from_config(&config, host_id.as_str()));
    let coordinator = Coordinator::builder(executor, Arc::new(client))
        .content(ContentLocator::from_config(&config))
        .host_identifier(host_id)
        .degraded_reports(config.degraded_reports)
        .build();

    let scheduler = Scheduler::spawn(
        coordinator.clone(),
        config.default_profile.as_str(),
        config.scan_interval(),
    );
    if scheduler.is_none() {
        info!("scan interval is 0, scans run only on request");
    }

    let router = control::router(coordinator, &config.default_profile);
    control::serve(listener, router, shutdown_signal()).await?;

    collector_check.abort();
    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
    info!("compliance agent stopped");
    Ok(())
}

/// Log whether the collector answers, without holding up startup.
fn spawn_collector_check(client: CollectorClient) -> JoinHandle<bool> {
    tokio::spawn(async move {
        let reachable = client.health().await;
        if reachable {
            info!(collector = client.base_url(), "collector reachable");
        } else {
            warn!(
                collector = client.base_url(),
                "collector health check failed, submissions will retry"
            );
        }
        reachable
    })
}

fn init_tracing(config: &AgentConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn collector_check_does_not_block_startup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;
        let client = CollectorClient::builder(server.uri())
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        let started = Instant::now();
        let collector_check = spawn_collector_check(client);
        assert!(started.elapsed() < Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!collector_check.is_finished());
        collector_check.abort();
    }

    #[tokio::test]
    async fn collector_check_reports_reachability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let client = CollectorClient::new(server.uri()).unwrap();
        assert!(spawn_collector_check(client).await.unwrap());

        let down = CollectorClient::builder("http://127.0.0.1:1")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        assert!(!spawn_collector_check(down).await.unwrap());
    }
}
