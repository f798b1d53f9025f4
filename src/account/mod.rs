/// Account management system
///
/// Handles user registration, password login, opaque session tokens and
/// referral codes.

mod manager;

pub use manager::AccountManager;

use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> MarketResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(MarketError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub phone: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for register and login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Also set as the `session_token` cookie; returned for bearer clients
    pub session_token: String,
}

/// Current user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub picture: Option<String>,
    pub role: Role,
}

/// Referral code for the current user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralCodeResponse {
    pub referral_code: String,
    pub referral_count: i64,
}

/// Referral tracking request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackReferralRequest {
    pub ref_code: Option<String>,
}

/// Referral tracking response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackReferralResponse {
    pub tracked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_id: Option<String>,
}

/// Admin-side partial user update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub role: Option<String>,
    pub name: Option<String>,
    pub is_blocked: Option<bool>,
}
