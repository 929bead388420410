// Liveness endpoint. Answers for as long as the process is up; it does not
// reflect reconciliation health, a failed tick kills the process and takes
// this listener with it.

use axum::routing::get;
use axum::Router;
use tracing::info;

pub async fn serve(port: u16) -> anyhow::Result<()> {
    let app = Router::new().route("/healthz", get(|| async { "ok" }));

    let addr = format!("0.0.0.0:{port}");
    info!(addr = %addr, "liveness endpoint listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
