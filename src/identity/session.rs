use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::tprintln;

use super::user::User;

pub type SessionToken = String;

/// Proof of an authenticated identity. The gate consumes only its presence or
/// absence; the contents are carried for display surfaces and never inspected
/// by the gating logic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SessionEntry {
    session: Session,
    user: User,
    deadline: Instant,
}

fn gen_token() -> String {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// In-process token store backing the local identity provider. Issue, lookup
/// and revocation are value-scoped; cloning shares the underlying map.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<SessionToken, SessionEntry>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), ttl }
    }

    /// Create a session for `user` and return the bearer token for it.
    pub fn issue(&self, user: User) -> (SessionToken, Session) {
        let now = Instant::now();
        let token = gen_token();
        let session = Session {
            session_id: gen_token(),
            user_id: user.user_id.clone(),
            expires_at: chrono::Duration::from_std(self.ttl)
                .ok()
                .map(|ttl| Utc::now() + ttl),
        };
        let entry = SessionEntry { session: session.clone(), user, deadline: now + self.ttl };
        {
            let mut m = self.entries.write();
            m.insert(token.clone(), entry);
        }
        tprintln!("session.issue user={} sid={} ttl_secs={}", session.user_id, session.session_id, self.ttl.as_secs());
        (token, session)
    }

    /// Resolve a token to its session and user, dropping it when expired.
    pub fn lookup(&self, token: &str) -> Option<(Session, User)> {
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.entries.read();
            if let Some(ent) = map.get(token) {
                if ent.deadline > now {
                    Some((ent.session.clone(), ent.user.clone()))
                } else {
                    drop_key = Some(token.to_string());
                    None
                }
            } else {
                None
            }
        };
        if let Some(k) = drop_key {
            self.entries.write().remove(&k);
        }
        out
    }

    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.entries.write().remove(token);
        if let Some(ent) = &removed {
            tprintln!("session.revoke user={} sid={}", ent.session.user_id, ent.session.session_id);
        }
        removed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User { user_id: id.to_string(), display_name: Some(id.to_uppercase()) }
    }

    #[test]
    fn issue_then_lookup_round_trips() {
        let store = SessionStore::default();
        let (token, session) = store.issue(user("alice"));
        let (found, found_user) = store.lookup(&token).expect("session should resolve");
        assert_eq!(found, session);
        assert_eq!(found_user.user_id, "alice");
    }

    #[test]
    fn unknown_token_resolves_to_none() {
        let store = SessionStore::default();
        assert!(store.lookup("nope").is_none());
    }

    #[test]
    fn revoked_token_stops_resolving() {
        let store = SessionStore::default();
        let (token, _) = store.issue(user("bob"));
        assert!(store.revoke(&token));
        assert!(store.lookup(&token).is_none());
        assert!(!store.revoke(&token), "second revoke is a no-op");
    }

    #[test]
    fn expired_session_is_pruned_on_lookup() {
        let store = SessionStore::new(Duration::from_millis(0));
        let (token, _) = store.issue(user("carol"));
        assert!(store.lookup(&token).is_none(), "zero-ttl session must be expired");
    }
}
