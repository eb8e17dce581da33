/// Refresh-token generation and session rotation policy.
///
/// A refresh token is an opaque bearer capability: 64 bytes from a
/// CSPRNG, base64-encoded, no embedded structure. The store only ever
/// holds the single current value (SHA-256 hashed, never plaintext) on
/// the user row, so overwriting it is the revocation mechanism — no
/// separate revocation list exists.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::{AppError, AuthError};

const REFRESH_TOKEN_BYTES: usize = 64;

pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Persist a freshly rotated session on the user row.
///
/// Hash and expiry are written in a single UPDATE; the schema's CHECK
/// constraint keeps them atomically present or absent. Concurrent
/// rotations for the same user are last-writer-wins.
pub async fn store_session(
    pool: &PgPool,
    user_id: i32,
    token: &str,
    lifetime_days: i64,
) -> Result<(), AppError> {
    let expires_at = Utc::now() + Duration::days(lifetime_days);

    let result = sqlx::query(
        r#"
        UPDATE users
        SET refresh_token_hash = $1, refresh_token_expires_at = $2
        WHERE id = $3
        "#,
    )
    .bind(hash_refresh_token(token))
    .bind(expires_at)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("user {} not found", user_id)));
    }

    Ok(())
}

/// Check a presented refresh token against the stored session state.
///
/// Value mismatch (including an absent session) fails before the expiry
/// check, so a rotated-away token always reads as `InvalidSession`.
pub fn check_session(
    stored_hash: Option<&str>,
    stored_expiry: Option<DateTime<Utc>>,
    presented: &str,
) -> Result<(), AppError> {
    let (hash, expires_at) = match (stored_hash, stored_expiry) {
        (Some(hash), Some(expires_at)) => (hash, expires_at),
        _ => return Err(AuthError::InvalidSession.into()),
    };

    if hash != hash_refresh_token(presented) {
        return Err(AuthError::InvalidSession.into());
    }

    if expires_at <= Utc::now() {
        return Err(AuthError::SessionExpired.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_refresh_token() {
        let token = generate_refresh_token();

        // 64 random bytes base64-encode to 88 characters
        assert_eq!(token.len(), 88);
        let decoded = BASE64.decode(&token).expect("token is not valid base64");
        assert_eq!(decoded.len(), REFRESH_TOKEN_BYTES);
    }

    #[test]
    fn test_tokens_do_not_repeat() {
        assert_ne!(generate_refresh_token(), generate_refresh_token());
    }

    #[test]
    fn test_token_hashing() {
        let token = generate_refresh_token();
        let hash1 = hash_refresh_token(&token);
        let hash2 = hash_refresh_token(&token);

        assert_eq!(hash1, hash2);
        assert_ne!(token, hash1);
        // SHA-256 hex digest
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_tokens_different_hashes() {
        assert_ne!(
            hash_refresh_token(&generate_refresh_token()),
            hash_refresh_token(&generate_refresh_token())
        );
    }

    #[test]
    fn test_check_session_accepts_current_token() {
        let token = generate_refresh_token();
        let hash = hash_refresh_token(&token);
        let expiry = Utc::now() + Duration::days(7);

        assert!(check_session(Some(&hash), Some(expiry), &token).is_ok());
    }

    #[test]
    fn test_check_session_rejects_rotated_token() {
        let old_token = generate_refresh_token();
        let current = generate_refresh_token();
        let hash = hash_refresh_token(&current);
        let expiry = Utc::now() + Duration::days(7);

        let result = check_session(Some(&hash), Some(expiry), &old_token);
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::InvalidSession))
        ));
    }

    #[test]
    fn test_check_session_rejects_absent_session() {
        let token = generate_refresh_token();
        let result = check_session(None, None, &token);
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::InvalidSession))
        ));
    }

    #[test]
    fn test_check_session_rejects_expired_session() {
        let token = generate_refresh_token();
        let hash = hash_refresh_token(&token);
        let expiry = Utc::now() - Duration::seconds(1);

        let result = check_session(Some(&hash), Some(expiry), &token);
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::SessionExpired))
        ));
    }

    #[test]
    fn test_mismatch_takes_precedence_over_expiry() {
        // An expired session still reports InvalidSession when the value
        // does not match; SessionExpired only fires for the real token.
        let token = generate_refresh_token();
        let hash = hash_refresh_token(&token);
        let expiry = Utc::now() - Duration::days(1);

        let result = check_session(Some(&hash), Some(expiry), "some-other-token");
        assert!(matches!(
            result,
            Err(AppError::Auth(AuthError::InvalidSession))
        ));
    }
}
