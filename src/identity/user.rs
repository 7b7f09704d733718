use serde::{Deserialize, Serialize};

/// Authenticated identity as reported by the identity service. The front end
/// treats this as opaque display data; nothing here is interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}
