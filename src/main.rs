use std::time::Duration;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use paylink::gate::GatePolicy;
use paylink::server::ServerOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port: u16 = std::env::var("PAYLINK_HTTP_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(7878);
    let identity_url = std::env::var("PAYLINK_IDENTITY_URL").ok();
    let identity_timeout_ms: u64 = std::env::var("PAYLINK_IDENTITY_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3000);
    let gate_policy = std::env::var("PAYLINK_GATE_POLICY")
        .ok()
        .and_then(|s| GatePolicy::parse(&s))
        .unwrap_or(GatePolicy::FailOpen);
    info!(
        target: "paylink",
        "paylink starting: RUST_LOG='{}', http_port={}, identity_url={:?}, identity_timeout_ms={}, gate_policy={:?}",
        rust_log, http_port, identity_url, identity_timeout_ms, gate_policy
    );

    let opts = ServerOptions {
        identity_url,
        identity_timeout: Duration::from_millis(identity_timeout_ms),
        gate_policy,
    };
    paylink::server::run_with_port(http_port, opts).await
}
