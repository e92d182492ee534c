use async_trait::async_trait;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::JwtSettings,
    web::{ApiMessage, AppState, json_error},
};

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a session token for `username`, valid for the configured number of days.
pub fn issue_token(
    settings: &JwtSettings,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        username: username.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(settings.expires_days)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.secret.as_bytes()),
    )
}

pub fn verify_token(
    settings: &JwtSettings,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Caller identity taken from a valid `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct BearerUser {
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for BearerUser {
    type Rejection = (StatusCode, Json<ApiMessage>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "缺少授权令牌"))?;

        let claims = verify_token(&state.config().jwt, token).map_err(|err| {
            debug!(?err, "rejected bearer token");
            json_error(StatusCode::UNAUTHORIZED, "授权令牌无效或已过期")
        })?;

        Ok(BearerUser {
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secret: &str, expires_days: i64) -> JwtSettings {
        JwtSettings {
            secret: secret.to_string(),
            expires_days,
        }
    }

    #[test]
    fn token_carries_username() {
        let settings = settings("secret", 365);
        let token = issue_token(&settings, "tsukiko").expect("issue");
        let claims = verify_token(&settings, &token).expect("verify");
        assert_eq!(claims.username, "tsukiko");
        assert!(claims.exp - claims.iat >= 364 * 24 * 3600);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(&settings("one", 365), "tsukiko").expect("issue");
        assert!(verify_token(&settings("two", 365), &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let settings = settings("secret", -1);
        let token = issue_token(&settings, "tsukiko").expect("issue");
        assert!(verify_token(&settings, &token).is_err());
    }
}
