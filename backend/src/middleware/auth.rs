//! Authentication middleware
//!
//! Turns a bearer JWT into an [`AuthUser`] carrying the caller's id and role. Handlers
//! receive it through the [`CurrentUser`] extractor and pass `user.actor()` to every
//! domain operation.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::models::{Actor, Role};

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Sign an access token for `user_id`
pub fn encode_token(
    user_id: i64,
    role: Role,
    secret: &str,
    expiry_seconds: i64,
    now: DateTime<Utc>,
) -> AppResult<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        exp: (now + Duration::seconds(expiry_seconds)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
}

/// Decode and validate an access token
pub fn decode_token(token: &str, secret: &str) -> AppResult<AuthUser> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    let user_id = claims.sub.parse::<i64>().map_err(|_| AppError::InvalidToken)?;
    let role = Role::from_str(&claims.role).ok_or(AppError::InvalidToken)?;
    Ok(AuthUser { user_id, role })
}

/// Authentication middleware that validates JWT tokens and rejects deactivated accounts
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        Some(token) => token.to_string(),
        None => {
            return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
                .into_response()
        }
    };

    let auth_user = match decode_token(&token, &state.config.jwt.secret) {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = $1")
        .bind(auth_user.user_id)
        .fetch_optional(&state.db)
        .await;
    match active {
        Ok(Some(true)) => {}
        Ok(_) => {
            return AppError::Unauthorized("Account is inactive or no longer exists".to_string())
                .into_response()
        }
        Err(e) => return AppError::from(e).into_response(),
    }

    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail::new("UNAUTHORIZED", "Authentication required"),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = encode_token(42, Role::StockKeeper, "secret", 3600, Utc::now()).unwrap();
        let user = decode_token(&token, "secret").unwrap();
        assert_eq!(user.user_id, 42);
        assert_eq!(user.role, Role::StockKeeper);
        assert_eq!(user.actor(), Actor::new(42, Role::StockKeeper));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = encode_token(1, Role::Admin, "secret", 3600, Utc::now()).unwrap();
        assert!(matches!(
            decode_token(&token, "other"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token() {
        let issued = Utc::now() - Duration::hours(3);
        let token = encode_token(1, Role::Admin, "secret", 60, issued).unwrap();
        assert!(matches!(
            decode_token(&token, "secret"),
            Err(AppError::TokenExpired)
        ));
    }
}
