use clap::Parser;
use kube::Client;
use nodegc::gateway::KubeGateway;
use nodegc::reconciler::Reconciler;
use nodegc::{health, Config};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = Config::parse();

    let client = Client::try_default().await?;
    let gateway = KubeGateway::new(client);

    let healthcheck_port = config.healthcheck_port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(healthcheck_port).await {
            error!("liveness endpoint failed: {e:#}");
        }
    });

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone())?;

    info!(
        poll_interval_secs = config.sleep_seconds,
        allowed_idle_secs = config.allowed_idle_seconds,
        min_node_age_secs = config.min_node_age_seconds,
        "starting reconciliation loop"
    );

    let mut reconciler = Reconciler::new(gateway, config.policy());
    reconciler.run(config.poll_interval(), shutdown).await?;

    Ok(())
}

// SIGINT from a terminal, SIGTERM from the kubelet. Either one requests a
// cooperative stop: the loop finishes its current tick and exits cleanly.
fn spawn_signal_listener(shutdown: CancellationToken) -> anyhow::Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
        info!("shutdown signal received, finishing current tick");
        shutdown.cancel();
    });
    Ok(())
}
