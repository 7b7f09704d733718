//! Session gate for the login boundary.
//!
//! The gate is an anti-entry check: an already-authenticated visitor is
//! redirected away to the dashboard instead of being shown the login page
//! again. It asks the identity provider for the session bound to the request
//! token and turns the answer into a `GateDecision`. Identity-service
//! failures are resolved through an explicit `GatePolicy`; the lookup is
//! bounded by a timeout so a stalled service cannot block the render path.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::{IdentityProvider, Session};

/// Where denied (already-authenticated) visitors are sent.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Resolution for identity-service failures. FailOpen treats an unreachable
/// service as "no session" and renders the boundary; FailClosed denies and
/// redirects. The configured posture is applied to every failure uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePolicy {
    FailOpen,
    FailClosed,
}

impl GatePolicy {
    /// Parse a configuration value (`open` / `closed`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "fail_open" => Some(GatePolicy::FailOpen),
            "closed" | "fail_closed" => Some(GatePolicy::FailClosed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Render the wrapped boundary content.
    Allow,
    /// Terminal for the current render: redirect to `location`, render nothing.
    Deny { location: String },
}

#[derive(Clone)]
pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
    policy: GatePolicy,
    redirect_to: String,
    timeout: Duration,
}

impl SessionGate {
    pub fn new(identity: Arc<dyn IdentityProvider>, policy: GatePolicy, timeout: Duration) -> Self {
        Self { identity, policy, redirect_to: DASHBOARD_PATH.to_string(), timeout }
    }

    fn deny(&self) -> GateDecision {
        GateDecision::Deny { location: self.redirect_to.clone() }
    }

    /// Raw session probe: `Ok(Some)` for an active session, `Ok(None)` for
    /// none, `Err` when the identity service failed or timed out.
    pub async fn probe(&self, token: &str) -> Result<Option<Session>, AppError> {
        match tokio::time::timeout(self.timeout, self.identity.get_session(token)).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => Err(AppError::gate("identity_unreachable", e.to_string())),
            Err(_) => Err(AppError::gate(
                "identity_timeout",
                format!("identity service did not answer within {:?}", self.timeout),
            )),
        }
    }

    /// Decide whether the login boundary may render for this request.
    ///
    /// No token means no session: the service is not consulted. Service
    /// failures are resolved by the configured policy, never surfaced to the
    /// visitor as an ambiguous half-rendered state.
    pub async fn check(&self, token: Option<&str>) -> GateDecision {
        let request_id = Uuid::new_v4();
        let Some(token) = token else {
            debug!(target: "gate", %request_id, decision = "allow", "no session token presented");
            return GateDecision::Allow;
        };
        match self.probe(token).await {
            Ok(Some(_)) => {
                debug!(target: "gate", %request_id, decision = "deny", "active session, redirecting");
                self.deny()
            }
            Ok(None) => {
                debug!(target: "gate", %request_id, decision = "allow", "no active session");
                GateDecision::Allow
            }
            Err(e) => {
                let decision = match self.policy {
                    GatePolicy::FailOpen => GateDecision::Allow,
                    GatePolicy::FailClosed => self.deny(),
                };
                warn!(target: "gate", %request_id, policy = ?self.policy, error = %e, "identity lookup failed, applying gate policy");
                decision
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::identity::User;

    struct StaticProvider {
        session: Option<Session>,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        fn some() -> Self {
            let session = Session { session_id: "sid".into(), user_id: "alice".into(), expires_at: None };
            Self { session: Some(session), calls: AtomicUsize::new(0) }
        }
        fn none() -> Self {
            Self { session: None, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl IdentityProvider for StaticProvider {
        async fn get_session(&self, _token: &str) -> Result<Option<Session>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.session.clone())
        }
        async fn get_user(&self, _token: &str) -> Result<Option<User>> {
            Ok(None)
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl IdentityProvider for FailingProvider {
        async fn get_session(&self, _token: &str) -> Result<Option<Session>> {
            Err(anyhow!("connection refused"))
        }
        async fn get_user(&self, _token: &str) -> Result<Option<User>> {
            Err(anyhow!("connection refused"))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl IdentityProvider for SlowProvider {
        async fn get_session(&self, _token: &str) -> Result<Option<Session>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
        async fn get_user(&self, _token: &str) -> Result<Option<User>> {
            Ok(None)
        }
    }

    fn gate(provider: Arc<dyn IdentityProvider>, policy: GatePolicy) -> SessionGate {
        SessionGate::new(provider, policy, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn active_session_is_denied_and_redirected() {
        let g = gate(Arc::new(StaticProvider::some()), GatePolicy::FailOpen);
        let decision = g.check(Some("token")).await;
        assert_eq!(decision, GateDecision::Deny { location: DASHBOARD_PATH.to_string() });
    }

    #[tokio::test]
    async fn absent_session_is_allowed() {
        let g = gate(Arc::new(StaticProvider::none()), GatePolicy::FailOpen);
        assert_eq!(g.check(Some("token")).await, GateDecision::Allow);
    }

    #[tokio::test]
    async fn missing_token_allows_without_consulting_the_service() {
        let provider = Arc::new(StaticProvider::some());
        let g = gate(provider.clone(), GatePolicy::FailClosed);
        assert_eq!(g.check(None).await, GateDecision::Allow);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn service_error_resolves_by_policy() {
        let open = gate(Arc::new(FailingProvider), GatePolicy::FailOpen);
        assert_eq!(open.check(Some("token")).await, GateDecision::Allow);

        let closed = gate(Arc::new(FailingProvider), GatePolicy::FailClosed);
        assert_eq!(
            closed.check(Some("token")).await,
            GateDecision::Deny { location: DASHBOARD_PATH.to_string() }
        );
    }

    #[tokio::test]
    async fn stalled_service_times_out_and_resolves_by_policy() {
        let g = gate(Arc::new(SlowProvider), GatePolicy::FailOpen);
        assert_eq!(g.check(Some("token")).await, GateDecision::Allow);

        let err = g.probe("token").await.expect_err("probe must surface the timeout");
        assert_eq!(err.code_str(), "identity_timeout");
    }

    #[tokio::test]
    async fn probe_surfaces_service_errors() {
        let g = gate(Arc::new(FailingProvider), GatePolicy::FailOpen);
        let err = g.probe("token").await.expect_err("probe must surface the failure");
        assert_eq!(err.code_str(), "identity_unreachable");
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn policy_parsing_accepts_both_spellings() {
        assert_eq!(GatePolicy::parse("open"), Some(GatePolicy::FailOpen));
        assert_eq!(GatePolicy::parse("FAIL_CLOSED"), Some(GatePolicy::FailClosed));
        assert_eq!(GatePolicy::parse("sideways"), None);
    }
}
