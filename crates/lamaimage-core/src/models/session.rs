//! Authenticated identity as reported by the backend service.

use serde::{Deserialize, Serialize};

/// Current identity. The `is_admin` flag comes from the backend's role
/// claim; it is never derived client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Session {
            user_id: user_id.into(),
            email: email.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Session {
            is_admin: true,
            ..Session::new(user_id, email)
        }
    }
}
