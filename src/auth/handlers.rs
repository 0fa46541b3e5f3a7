use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::extractors::ApiJson;
use crate::state::AppState;
use crate::users::UserRepository;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

// -- Request types --

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
}

fn validate_username(username: &str) -> AppResult<()> {
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest(
            "Username may only contain letters and digits".into(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

// -- Handlers --

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Credentials>,
) -> AppResult<impl IntoResponse> {
    let username = body.username.trim().to_string();
    validate_username(&username)?;
    validate_password(&body.password)?;

    // bcrypt blocks
    let cost = state.config.auth.bcrypt_cost;
    let password = body.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hash task failed: {}", e)))??;

    let user = state
        .users
        .create(&username, &hash, state.clock.now())
        .await?;
    tracing::info!(user_id = user.id, username = %user.username, "registered user");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "registered" })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Credentials>,
) -> AppResult<Json<LoginResponse>> {
    let invalid = || AppError::Unauthorized("invalid credentials".into());

    let user = state
        .users
        .find_by_username(body.username.trim())
        .await?
        .ok_or_else(invalid)?;

    let password = body.password;
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {}", e)))?;
    if !matches {
        return Err(invalid());
    }

    let token = state.tokens.issue(user.id)?;
    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_must_be_alphanumeric_and_long_enough() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("bob42").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_username("alice!").is_err());
        assert!(validate_username(&"a".repeat(33)).is_ok());
        assert!(validate_username(&"b7".repeat(100)).is_ok());
    }

    #[test]
    fn passwords_need_six_characters() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("short").is_err());
    }
}
