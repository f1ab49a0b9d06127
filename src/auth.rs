use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Role;
use crate::state::AppState;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: String,
    role: Role,
    exp: i64,
}

/// The caller resolved from a bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Admins act on anything; everyone else only on what they own.
    pub fn can_act_for(&self, owner_id: &str) -> bool {
        self.is_admin() || self.id == owner_id
    }
}

fn sign(secret: &str, payload: &str) -> anyhow::Result<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid token secret: {e}"))?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Issues `base64url(claims).base64url(hmac)`.
pub fn issue_token(
    secret: &str,
    user_id: &str,
    role: Role,
    ttl: Duration,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let claims = Claims {
        id: user_id.to_string(),
        role,
        exp: (now + ttl).timestamp(),
    };
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signature = URL_SAFE_NO_PAD.encode(sign(secret, &payload)?.finalize().into_bytes());
    Ok(format!("{payload}.{signature}"))
}

/// Checks signature and expiry. Any failure is reported as `Unauthorized`.
pub fn verify_token(secret: &str, token: &str, now: DateTime<Utc>) -> Result<Principal, AppError> {
    let (payload, signature) = token.split_once('.').ok_or(AppError::Unauthorized)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AppError::Unauthorized)?;

    sign(secret, payload)?
        .verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AppError::Unauthorized)?;
    let claims: Claims = serde_json::from_slice(&raw).map_err(|_| AppError::Unauthorized)?;

    if claims.exp <= now.timestamp() {
        return Err(AppError::Unauthorized);
    }

    Ok(Principal {
        id: claims.id,
        role: claims.role,
    })
}

/// Resolves the `Authorization: Bearer` header to a principal whose account still
/// exists with the role the token claims.
pub fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Principal, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("").trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized);
    }

    let principal = verify_token(&state.config.token_secret, token, Utc::now())?;

    let user = queries::get_user(&state.db(), &principal.id)?;
    match user {
        Some(user) if user.role == principal.role => Ok(principal),
        _ => {
            tracing::warn!(user_id = %principal.id, "token for unknown user or stale role");
            Err(AppError::Unauthorized)
        }
    }
}

pub fn require_admin(principal: &Principal) -> Result<(), AppError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".to_string()))
    }
}
