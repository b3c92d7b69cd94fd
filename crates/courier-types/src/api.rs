use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// Role values carried in the token `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "admin")]
    Administrator,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl Role {
    /// The string stored in the `role` column and token claim.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Administrator => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Administrator),
            _ => Err(()),
        }
    }
}

/// JWT claims shared across courier-api (REST middleware), courier-auth
/// (codec) and courier-server (WebSocket authentication). Canonical
/// definition lives here in courier-types to eliminate duplication.
///
/// Only `exp` is mandatory for a token to decode; every other claim is
/// checked at the point of use, so a structurally valid token with a
/// missing claim fails with a field error rather than a signature error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub username: String,
    pub password: String,
    pub new_password: String,
}

// -- Profiles --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Public view of a user. `phone` and `email` are omitted when the
/// profile belongs to someone other than the requester.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_superuser: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: i64,
    pub text: Option<String>,
    pub photo: Option<String>,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub created_at: DateTime<Utc>,
}
