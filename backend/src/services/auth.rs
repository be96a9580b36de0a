//! Authentication service: password login and access token issue

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::encode_token;
use crate::models::{CredentialRow, Role, User, UserRow};

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Response after successful login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
        }
    }

    /// Authenticate user with username and password
    pub async fn login(&self, input: LoginInput) -> AppResult<LoginResponse> {
        let username = input.username.trim().to_lowercase();

        let credentials = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, role, password_hash, is_active FROM users WHERE username = $1",
        )
        .bind(&username)
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        if !credentials.is_active {
            tracing::warn!(user_id = credentials.id, "Login attempt on inactive account");
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }

        let valid = verify(&input.password, &credentials.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        let role = Role::from_str(&credentials.role)
            .ok_or_else(|| AppError::Internal(format!("Unknown role '{}'", credentials.role)))?;

        let access_token = encode_token(
            credentials.id,
            role,
            &self.jwt_secret,
            self.access_token_expiry,
            Utc::now(),
        )?;

        let user = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, full_name, role, is_active, created_at FROM users WHERE id = $1",
        )
        .bind(credentials.id)
        .fetch_one(&self.db)
        .await?
        .into_domain()?;

        tracing::info!(user_id = user.id, role = %user.role, "User logged in");

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
            user,
        })
    }
}
