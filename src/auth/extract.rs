use crate::api::routes::AppState;
use crate::auth::jwt::Claims;
use crate::error::AppError;
use crate::models::RequestContext;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Extractor for routes that require a valid bearer token.
pub struct Authenticated(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Auth("Missing authorization token".to_string()))?;
        let claims = state.jwt.validate_token(token)?;
        Ok(Authenticated(claims))
    }
}

/// Extractor for routes readable without a token; claims are attached
/// when a valid token happens to be present.
pub struct MaybeAuthenticated(pub Option<Claims>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthenticated {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = bearer_token(parts).and_then(|token| state.jwt.validate_token(token).ok());
        Ok(MaybeAuthenticated(claims))
    }
}

/// Caller context (peer address, user agent) recorded on audit entries.
pub struct ExtractRequestContext(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for ExtractRequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_str = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        Ok(ExtractRequestContext(RequestContext {
            ip_address: header_str("x-forwarded-for")
                .map(|forwarded| forwarded.split(',').next().unwrap_or("").trim().to_string())
                .filter(|ip| !ip.is_empty()),
            user_agent: header_str("user-agent"),
        }))
    }
}
