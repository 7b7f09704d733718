//!
//! paylink HTTP server
//! -------------------
//! This module defines the Axum-based HTTP surface for paylink.
//!
//! Responsibilities:
//! - Session-gated login boundary (active session redirects to /dashboard).
//! - Artifact endpoints: JSON data-URI delivery, raw PNG attachment delivery,
//!   and a server-rendered payment page embedding the QR inline.
//! - Cleanup stub endpoint with a fixed GET acknowledgment.
//! - Identity provider wiring (in-process store or remote service).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::artifact::{self, EncodeConfig};
use crate::error::AppError;
use crate::gate::{GateDecision, GatePolicy, SessionGate};
use crate::identity::{IdentityProvider, LocalIdentityProvider, RemoteIdentityProvider, SessionStore};

pub const SESSION_COOKIE: &str = "paylink_session";

/// Shared server state injected into all handlers.
///
/// Holds the identity provider (the gate keeps its own handle to the same
/// provider), plus the fixed artifact geometry applied to every encode.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub gate: SessionGate,
    pub encode: EncodeConfig,
}

/// Startup knobs resolved from the environment by `main`.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Base URL of the remote identity service; in-process store when unset.
    pub identity_url: Option<String>,
    pub identity_timeout: Duration,
    pub gate_policy: GatePolicy,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            identity_url: None,
            identity_timeout: Duration::from_millis(3000),
            gate_policy: GatePolicy::FailOpen,
        }
    }
}

/// Mount all HTTP routes onto a router sharing `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "paylink ok" }))
        .route("/login", get(login_page))
        .route("/dashboard", get(dashboard))
        .route("/pay/{reference}", get(pay_page))
        .route("/qr", get(qr_artifact))
        .route("/qr/download", get(qr_download))
        .route("/api/cleanup", any(cleanup))
        .with_state(state)
}

/// Start the paylink HTTP server bound to the given port.
pub async fn run_with_port(http_port: u16, opts: ServerOptions) -> anyhow::Result<()> {
    let identity: Arc<dyn IdentityProvider> = match &opts.identity_url {
        Some(url) => {
            info!(target: "startup", "using remote identity service at {}", url);
            Arc::new(RemoteIdentityProvider::new(url.clone(), opts.identity_timeout)?)
        }
        None => {
            info!(target: "startup", "no identity service configured, using in-process session store");
            Arc::new(LocalIdentityProvider::new(SessionStore::default()))
        }
    };
    let gate = SessionGate::new(identity.clone(), opts.gate_policy, opts.identity_timeout);
    let state = AppState { identity, gate, encode: EncodeConfig::default() };

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

// Backward-compatible entry that uses defaults
/// Convenience entry point using the default port (7878) and options.
pub async fn run() -> anyhow::Result<()> {
    run_with_port(7878, ServerOptions::default()).await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn error_response(err: &AppError) -> Response {
    (
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(json!({"status":"error","code": err.code_str(), "message": err.message()})),
    )
        .into_response()
}

static UNSAFE_FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Reduce a caller-supplied save name to header-safe characters.
fn sanitize_filename(raw: &str) -> String {
    let cleaned = UNSAFE_FILENAME.replace_all(raw.trim(), "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() { "artifact.png".to_string() } else { cleaned.to_string() }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<html>
<head><title>paylink - sign in</title></head>
<body>
<h1>Sign in</h1>
<form method="post" action="/identity/login">
  <label>Username <input name="username" autocomplete="username"></label>
  <label>Password <input name="password" type="password" autocomplete="current-password"></label>
  <button type="submit">Sign in</button>
</form>
</body>
</html>
"#;

/// Login boundary. An active session is bounced to the dashboard before any
/// of the boundary content is rendered.
async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = parse_cookie(&headers, SESSION_COOKIE);
    match state.gate.check(token.as_deref()).await {
        GateDecision::Deny { location } => Redirect::to(&location).into_response(),
        GateDecision::Allow => Html(LOGIN_PAGE).into_response(),
    }
}

async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let greeting = match parse_cookie(&headers, SESSION_COOKIE) {
        Some(token) => match state.identity.get_user(&token).await {
            Ok(Some(user)) => user.display_name.unwrap_or(user.user_id),
            Ok(None) => "guest".to_string(),
            Err(e) => {
                error!("identity user lookup failed: {e}");
                "guest".to_string()
            }
        },
        None => "guest".to_string(),
    };
    Html(format!(
        "<!doctype html>\n<html>\n<head><title>paylink - dashboard</title></head>\n<body>\n<h1>Dashboard</h1>\n<p>Signed in as {}</p>\n</body>\n</html>\n",
        escape_html(&greeting)
    ))
    .into_response()
}

/// Server-rendered payment page embedding the order QR as a data URI.
async fn pay_page(State(state): State<AppState>, Path(reference): Path<String>) -> Response {
    match artifact::encode(&reference, &state.encode) {
        Ok(art) => {
            let download_href = format!(
                "/qr/download?payload={}&filename={}",
                urlencoding::encode(&reference),
                urlencoding::encode(&format!("{}.png", sanitize_filename(&reference)))
            );
            Html(format!(
                "<!doctype html>\n<html>\n<head><title>paylink - {ref_html}</title></head>\n<body>\n<h1>Order {ref_html}</h1>\n<img alt=\"payment code for {ref_html}\" src=\"{src}\" width=\"300\" height=\"300\">\n<p><a href=\"{href}\">Download QR</a></p>\n</body>\n</html>\n",
                ref_html = escape_html(&reference),
                src = art.data_uri,
                href = escape_html(&download_href),
            ))
            .into_response()
        }
        Err(e) => {
            let app = AppError::from(e);
            error!("payment page encode failed: {app}");
            error_response(&app)
        }
    }
}

#[derive(Debug, Deserialize)]
struct QrParams {
    payload: String,
}

/// Artifact boundary for client code: JSON body carrying the data URI.
async fn qr_artifact(State(state): State<AppState>, Query(params): Query<QrParams>) -> Response {
    if params.payload.is_empty() {
        return error_response(&AppError::user("empty_payload", "payload must not be empty"));
    }
    match artifact::encode(&params.payload, &state.encode) {
        Ok(art) => (
            StatusCode::OK,
            Json(json!({"status":"ok","data_uri": art.data_uri, "mime_type": art.mime_type})),
        )
            .into_response(),
        Err(e) => {
            let app = AppError::from(e);
            error!("qr encode failed: {app}");
            error_response(&app)
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadParams {
    payload: String,
    filename: Option<String>,
}

/// Server-side delivery path of the download flow: raw PNG bytes with an
/// attachment disposition so the browser prompts a save dialog.
async fn qr_download(State(state): State<AppState>, Query(params): Query<DownloadParams>) -> Response {
    if params.payload.is_empty() {
        return error_response(&AppError::user("empty_payload", "payload must not be empty"));
    }
    match artifact::encode_png(&params.payload, &state.encode) {
        Ok(png) => {
            let name = sanitize_filename(params.filename.as_deref().unwrap_or("artifact.png"));
            let mut h = HeaderMap::new();
            h.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
            // Sanitized name is header-safe by construction
            h.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name)).unwrap(),
            );
            (StatusCode::OK, h, png).into_response()
        }
        Err(e) => {
            let app = AppError::from(e);
            error!("qr download encode failed: {app}");
            error_response(&app)
        }
    }
}

/// Cleanup stub contract: GET acknowledges, everything else is rejected.
async fn cleanup(method: Method) -> impl IntoResponse {
    if method == Method::GET {
        (StatusCode::OK, Json(json!({"status":"ok","message":"cleanup acknowledged, nothing to do"})))
    } else {
        (StatusCode::METHOD_NOT_ALLOWED, Json(json!({"status":"error","error":"method not allowed"})))
    }
}
