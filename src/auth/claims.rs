/// JWT claim set for access tokens (RFC 7519 registered claims plus the
/// service's identity claims).

use serde::{Deserialize, Serialize};

use crate::auth::role::Role;
use crate::error::AuthError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user's email
    pub sub: String,
    /// Numeric user id; older tokens may carry only the email subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i32>,
    pub role: Role,
    /// Unique token id, reserved for revocation/anti-replay
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// The identity a token speaks for, resolved once at claim extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    ById(i32),
    ByEmail(String),
}

impl Claims {
    pub fn new(
        user_id: i32,
        email: String,
        role: Role,
        lifetime_minutes: i64,
        issuer: String,
        audience: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: email,
            uid: Some(user_id),
            role,
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + lifetime_minutes * 60,
            iss: issuer,
            aud: audience,
        }
    }

    /// Prefers the numeric id, falls back to the email subject.
    pub fn subject(&self) -> Result<Subject, AuthError> {
        if let Some(id) = self.uid {
            return Ok(Subject::ById(id));
        }
        let email = self.sub.trim();
        if email.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(Subject::ByEmail(email.to_string()))
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= chrono::Utc::now().timestamp()
    }
}
