//! User administration service

use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::config::BootstrapConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Actor, Capability, Role, User, UserRow};
use crate::services::auth::hash_password;

/// User service for account administration
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// Input for creating a user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 200, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleInput {
    pub role: Role,
}

const USER_COLUMNS: &str = "id, username, full_name, role, is_active, created_at";

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self, actor: &Actor) -> AppResult<Vec<User>> {
        actor.require(Capability::ManageUsers, "list users")?;
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(UserRow::into_domain).collect()
    }

    pub async fn get(&self, user_id: i64) -> AppResult<User> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?
            .into_domain()
    }

    pub async fn create(&self, actor: &Actor, input: CreateUserInput) -> AppResult<User> {
        actor.require(Capability::ManageUsers, "create users")?;
        input.validate()?;

        let username = input.username.trim().to_lowercase();
        shared::validation::validate_username(&username)
            .map_err(|m| AppError::validation("username", m))?;
        shared::validation::validate_password(&input.password)
            .map_err(|m| AppError::validation("password", m))?;

        let password_hash = hash_password(&input.password)?;
        let user = insert_user(
            &self.db,
            &username,
            input.full_name.trim(),
            input.role,
            &password_hash,
        )
        .await?;

        tracing::info!(user_id = user.id, role = %user.role, actor = actor.id, "User created");
        Ok(user)
    }

    pub async fn change_role(
        &self,
        actor: &Actor,
        user_id: i64,
        input: ChangeRoleInput,
    ) -> AppResult<User> {
        actor.require(Capability::ManageUsers, "change user roles")?;
        if user_id == actor.id && input.role != Role::Admin {
            return Err(AppError::Conflict {
                message: "Administrators cannot remove their own admin role".to_string(),
                current_state: Some(actor.role.as_str().to_string()),
            });
        }

        let user = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(input.role.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?
        .into_domain()?;

        tracing::info!(user_id, role = %user.role, actor = actor.id, "User role changed");
        Ok(user)
    }

    pub async fn deactivate(&self, actor: &Actor, user_id: i64) -> AppResult<User> {
        actor.require(Capability::ManageUsers, "deactivate users")?;
        if user_id == actor.id {
            return Err(AppError::Conflict {
                message: "Cannot deactivate your own account".to_string(),
                current_state: Some("active".to_string()),
            });
        }

        let user = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET is_active = FALSE WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?
        .into_domain()?;

        tracing::info!(user_id, actor = actor.id, "User deactivated");
        Ok(user)
    }
}

async fn insert_user(
    db: &PgPool,
    username: &str,
    full_name: &str,
    role: Role,
    password_hash: &str,
) -> AppResult<User> {
    sqlx::query_as::<_, UserRow>(&format!(
        r#"
        INSERT INTO users (username, full_name, role, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(username)
    .bind(full_name)
    .bind(role.as_str())
    .bind(password_hash)
    .fetch_one(db)
    .await?
    .into_domain()
}

/// Create the first admin account when the users table is empty
pub async fn bootstrap_admin(db: &PgPool, config: &BootstrapConfig) -> AppResult<Option<User>> {
    let Some(password) = config.admin_password.as_deref() else {
        return Ok(None);
    };

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    if existing > 0 {
        return Ok(None);
    }

    let username = config.admin_username.trim().to_lowercase();
    shared::validation::validate_username(&username)
        .map_err(|m| AppError::validation("bootstrap.admin_username", m))?;
    shared::validation::validate_password(password)
        .map_err(|m| AppError::validation("bootstrap.admin_password", m))?;

    let user = insert_user(
        db,
        &username,
        "Administrator",
        Role::Admin,
        &hash_password(password)?,
    )
    .await?;
    tracing::info!(user_id = user.id, username = %user.username, "Bootstrap admin created");
    Ok(Some(user))
}
