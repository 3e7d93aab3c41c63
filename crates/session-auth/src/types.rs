//! Session data model
//!
//! `Session` is what login, register and refresh hand back: a credential and
//! the principal it belongs to, always together. `Principal` is the user
//! record as the API serializes it.

use common::Secret;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque bearer credential. Redacted in logs, zeroized on drop.
pub type Credential = Secret<String>;

/// The authenticated user's profile record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// User ID. Accepted as a JSON string or number, stored as a string.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub email: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Avatar URL or storage key
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub is_enabled: bool,
    /// RFC 3339 timestamps as sent by the API
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Auth provider tag ("local", "google", "github", ...)
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A credential and its principal. Login, register and refresh always
/// produce both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub credential: Credential,
    pub principal: Principal,
}

/// Input to the login exchange.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(serialize_with = "expose_secret")]
    pub password: Secret<String>,
}

/// Input to the register exchange.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(serialize_with = "expose_secret")]
    pub password: Secret<String>,
    pub name: String,
}

/// Partial profile update. Absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.avatar.is_none()
    }
}

fn enabled_by_default() -> bool {
    true
}

fn expose_secret<S: Serializer>(secret: &Secret<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose())
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
