//! Development auth stubs.
//!
//! No credentials are checked. Any request with an email gets the fixed
//! development token and user 1, which is who the seed data belongs to.

use super::ApiError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use taskboard_core::UserId;
use taskboard_core::seed::SEED_USER;

/// Token handed out by [`login`].
pub const DEV_TOKEN: &str = "dev-token";

/// Login or register body. Other fields (password, name) are accepted and ignored.
#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: &'static str,
    pub user: AuthUser,
}

fn require_email(body: Result<Json<Credentials>, JsonRejection>) -> Result<String, ApiError> {
    let missing = || ApiError::BadRequest("email required".to_string());
    let Json(credentials) = body.map_err(|_| missing())?;
    credentials
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .ok_or_else(missing)
}

/// `POST /api/auth/login`
pub async fn login(
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = require_email(body)?;
    tracing::debug!(%email, "dev login");
    Ok(Json(LoginResponse {
        token: DEV_TOKEN,
        user: AuthUser {
            id: SEED_USER,
            email,
        },
    }))
}

/// `POST /api/auth/register`
pub async fn register(
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthUser>), ApiError> {
    let email = require_email(body)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthUser {
            id: SEED_USER,
            email,
        }),
    ))
}
