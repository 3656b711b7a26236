use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role name carried in tokens of privileged (staff) accounts.
pub const STAFF_ROLE: &str = "staff";

/// User entity - an account owned by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with generated ID and timestamp.
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            is_staff: false,
            created_at: Utc::now(),
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    /// Roles to embed in issued tokens.
    pub fn roles(&self) -> Vec<String> {
        let mut roles = vec!["user".to_string()];
        if self.is_staff {
            roles.push(STAFF_ROLE.to_string());
        }
        roles
    }
}
