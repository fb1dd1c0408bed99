use crate::error::{AppError, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bearer-token payload. `sub` identifies the actor, `roles` drives the
/// RBAC checks at the API surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    /// Role gate used by mutating handlers.
    pub fn require_any_role(&self, roles: &[&str]) -> Result<()> {
        if self.has_any_role(roles) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "One of roles [{}] required",
                roles.join(", ")
            )))
        }
    }
}

/// Signs and validates bearer tokens. Built once at startup from settings
/// that have already passed the weak-secret checks.
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    expiration_minutes: i64,
}

impl JwtHandler {
    pub fn new(secret: &str, algorithm: &str, expiration_minutes: i64) -> Result<Self> {
        let algorithm: Algorithm = algorithm
            .parse()
            .map_err(|_| AppError::Validation(format!("Unsupported JWT algorithm '{algorithm}'")))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            expiration_minutes,
        })
    }

    pub fn issue_token(&self, sub: &str, roles: Vec<String>) -> Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(chrono::Duration::minutes(self.expiration_minutes))
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token expiry overflow")))?
            .timestamp() as usize;

        let claims = Claims {
            sub: sub.to_string(),
            roles,
            exp: expiration,
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|err| AppError::Internal(anyhow::anyhow!("failed to sign token: {err}")))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &self.decoding_key,
            &Validation::new(self.algorithm),
        )
        .map_err(|err| AppError::Auth(format!("Invalid or expired token: {err}")))?;

        debug!(sub = %decoded.claims.sub, "validated bearer token");
        Ok(decoded.claims)
    }
}
