use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use mongodb::{
    bson::{DateTime, doc},
    error::{ErrorKind, WriteFailure},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{AuthUser, Role, hash_password, issue_token, verify_password},
    error::AppError,
    models::User,
    state::AppState,
};

#[derive(Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RegisterInput>,
) -> Result<impl IntoResponse, AppError> {
    let name = input.name.trim().to_string();
    let email = input.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(AppError::Validation("Name must not be empty".into()));
    }
    if !email.contains('@') {
        return Err(AppError::Validation("Invalid email address".into()));
    }
    if input.password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    let mut user = User {
        id: None,
        name,
        email,
        password_hash: hash_password(&input.password)?,
        role: Role::User,
        created_at: DateTime::now(),
    };

    // The unique index on email is the source of truth; a lost race surfaces
    // as a duplicate-key write error.
    let inserted = state.db.users.insert_one(&user).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::DuplicateEmail
        } else {
            AppError::Database(e)
        }
    })?;

    user.id = inserted.inserted_id.as_object_id();
    info!(email = %user.email, "Registered user");

    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<LoginInput>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = input.email.trim().to_lowercase();

    let user = state
        .db
        .users
        .find_one(doc! { "email": &email })
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&input.password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let user_id = user.id.ok_or(AppError::Unauthorized)?;
    let token = issue_token(&state.config.jwt_secret, &user_id, user.role)?;

    Ok(Json(LoginResponse {
        token,
        user: UserProfile::from(user),
    }))
}

pub async fn me_handler(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(user))
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        &*e.kind,
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}
