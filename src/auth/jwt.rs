/// Access-token issuance and verification.
///
/// Two verification paths exist on purpose. `validate_access_token` is
/// the normal one: a live token must pass signature, issuer, audience
/// and expiry checks. `decode_expired_token` serves the refresh flow
/// only: it recovers identity claims from a token that has already
/// expired, while keeping every other check mandatory.

use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};

use crate::auth::claims::Claims;
use crate::auth::role::Role;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// The only algorithm this service signs or accepts.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

pub fn issue_access_token(
    user_id: i32,
    email: &str,
    role: Role,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(
        user_id,
        email.to_string(),
        role,
        config.access_token_expiry_minutes,
        config.issuer.clone(),
        config.audience.clone(),
    );

    encode(
        &Header::new(SIGNING_ALGORITHM),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token generation failed: {}", e)))
}

/// Full validation of a live token: signature, issuer, audience, expiry.
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("JWT validation error: {}", e);
        AppError::Auth(AuthError::InvalidToken)
    })
}

/// Recovers the claim set from an access token that has already expired.
///
/// Check order is part of the contract:
/// 1. structurally unparseable input fails with `MalformedToken`;
/// 2. a declared algorithm other than HS256 fails with
///    `UnsupportedAlgorithm` (algorithm-substitution defense);
/// 3. a token whose expiry is still in the future fails with
///    `NotYetExpired` — live tokens must go through
///    [`validate_access_token`] instead;
/// 4. signature, issuer and audience are then verified with expiry
///    checking disabled; any failure collapses to `InvalidToken`.
pub fn decode_expired_token(token: &str, config: &JwtSettings) -> Result<Claims, AppError> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
    if header.alg != SIGNING_ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm.into());
    }

    // Read the claims without trusting them yet; the expiry precondition
    // must be checked before verification runs with expiry disabled.
    let mut peek = Validation::new(SIGNING_ALGORITHM);
    peek.insecure_disable_signature_validation();
    peek.validate_exp = false;
    peek.validate_aud = false;
    peek.required_spec_claims.clear();

    let unverified = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &peek)
        .map_err(|_| AuthError::MalformedToken)?;

    // No leeway here: a token is either expired or it is not.
    if unverified.claims.exp > chrono::Utc::now().timestamp() {
        return Err(AuthError::NotYetExpired.into());
    }

    let mut validation = Validation::new(SIGNING_ALGORITHM);
    validation.validate_exp = false;
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("expired-token verification failed: {}", e);
        AppError::Auth(AuthError::InvalidToken)
    })
}
