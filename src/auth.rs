//! # Auth
//!
//! Stateless bearer-token authentication: bcrypt password hashes, JWT
//! issue/verify, and the [`AuthUser`] / [`AdminUser`] extractors used by the
//! route handlers. Verified users are cached under `session:{user_id}` so a
//! busy client does not hit the database on every request.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::{cache::SESSION_TTL, error::AppError, models::User, state::AppState, utils};

pub const TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Hex user id.
    pub sub: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    Ok(bcrypt::verify(password, hash)?)
}

pub fn issue_token(secret: &str, user_id: &ObjectId, role: Role) -> Result<String, AppError> {
    let now = now_secs();

    let claims = Claims {
        sub: user_id.to_hex(),
        role,
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    // Failing to sign a token is a server fault, never the client's.
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(Box::new(e)))
}

/// Decodes and validates a token; expired or tampered tokens map to 401.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    Ok(data.claims)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System clock before Unix epoch")
        .as_secs()
}

/// Extractor for any authenticated account.
pub struct AuthUser(pub User);

/// Extractor that additionally requires the admin role.
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;
        let claims = verify_token(&state.config.jwt_secret, token)?;

        Ok(AuthUser(load_user(state, &claims.sub).await?))
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if user.role != Role::Admin {
            return Err(AppError::Forbidden);
        }

        Ok(AdminUser(user))
    }
}

async fn load_user(state: &Arc<AppState>, sub: &str) -> Result<User, AppError> {
    let key = utils::session_key(sub);

    if let Some(cached) = state.cache.get(&key).await {
        return Ok(serde_json::from_value(cached)?);
    }

    let user_id = utils::parse_object_id(sub)?;
    let user = state
        .db
        .users
        .find_one(doc! { "_id": user_id })
        .await?
        .ok_or(AppError::Unauthorized)?;

    state
        .cache
        .set(key, serde_json::to_value(&user)?, SESSION_TTL)
        .await;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();

        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn token_roundtrip() {
        let user_id = ObjectId::new();

        let token = issue_token("secret", &user_id, Role::Admin).unwrap();
        let claims = verify_token("secret", &token).unwrap();

        assert_eq!(claims.sub, user_id.to_hex());
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_token_rejected() {
        let token = issue_token("secret", &ObjectId::new(), Role::User).unwrap();

        assert!(verify_token("other secret", &token).is_err());
    }

    #[test]
    fn verification_failures_map_to_unauthorized() {
        let err = verify_token("secret", "not-a-token").unwrap_err();

        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn expired_token_rejected() {
        let now = now_secs();
        let claims = Claims {
            sub: ObjectId::new().to_hex(),
            role: Role::User,
            iat: now - 7200,
            // Well past the default validation leeway.
            exp: now - 3600,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(verify_token("secret", &token).is_err());
    }
}
