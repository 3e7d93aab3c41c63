//! Unverified credential claims
//!
//! Reads the payload segment of a JWT-shaped credential without checking the
//! signature. The result is only good for scheduling (when to refresh);
//! trust decisions stay with the server.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

/// Claims the lifecycle manager cares about.
///
/// Only `exp` is required. Everything else is best-effort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: Option<String>,
    /// Issued-at, unix seconds
    pub issued_at: Option<i64>,
    /// Expiry, unix seconds
    pub expiry: i64,
    pub roles: Vec<String>,
    pub email: Option<String>,
    /// `type` claim ("access", "refresh", ...)
    pub token_type: Option<String>,
}

impl Claims {
    /// `true` once `now` has reached the expiry second.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expiry
    }

    /// Seconds until expiry; negative once expired. Saturates, since `exp`
    /// is whatever the server put there.
    pub fn time_until_expiry(&self, now: i64) -> i64 {
        self.expiry.saturating_sub(now)
    }
}

/// Why a credential could not be read. Callers treat every variant as
/// "expired".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("credential is not a three-segment token")]
    Malformed,

    #[error("payload is not base64url: {0}")]
    Encoding(String),

    #[error("payload is not a JSON object: {0}")]
    Payload(String),

    #[error("payload has no numeric exp claim")]
    MissingExpiry,
}

/// Decode a credential's payload into `Claims`.
pub fn decode(credential: &str) -> Result<Claims, DecodeError> {
    let mut segments = credential.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(DecodeError::Malformed);
    };
    if payload.is_empty() {
        return Err(DecodeError::Malformed);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| DecodeError::Encoding(e.to_string()))?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Payload(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(DecodeError::Payload("expected an object".into()));
    };

    let expiry = fields
        .get("exp")
        .and_then(epoch_seconds)
        .ok_or(DecodeError::MissingExpiry)?;

    let subject = match fields.get("sub") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let roles = fields
        .get("roles")
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Ok(Claims {
        subject,
        issued_at: fields.get("iat").and_then(epoch_seconds),
        expiry,
        roles,
        email: fields.get("email").and_then(Value::as_str).map(str::to_owned),
        token_type: fields.get("type").and_then(Value::as_str).map(str::to_owned),
    })
}

/// Expiry check over a decode result: a credential we cannot read is expired.
pub fn expired_or_invalid(decoded: &Result<Claims, DecodeError>, now: i64) -> bool {
    match decoded {
        Ok(claims) => claims.is_expired(now),
        Err(_) => true,
    }
}

/// Current wall-clock time as unix seconds.
pub fn now_epoch_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Numeric claim as whole seconds. Floats are truncated (saturating at the
/// i64 bounds); non-finite values are rejected.
fn epoch_seconds(value: &Value) -> Option<i64> {
    let number = value.as_number()?;
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}
