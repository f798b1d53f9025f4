/// Account database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    /// Absent for accounts created through an external identity provider
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub picture: Option<String>,
    pub role: crate::account::Role,
    pub is_blocked: bool,
    pub referral_code: Option<String>,
    pub referral_count: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == crate::account::Role::Admin
    }
}

/// Session record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub session_token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
