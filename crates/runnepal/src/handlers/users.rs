//! User management handlers.

use axum::{Extension, response::Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{errors::AppError, models::User, store::Database};

/// User creation request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct NewUserRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: String,
}

/// Create a new user.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = NewUserRequest,
    responses(
        (status = 200, description = "User created successfully", body = User),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn new_user(
    Extension(db): Extension<Database>,
    Json(req): Json<NewUserRequest>,
) -> Result<Json<User>, AppError> {
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;
    let user = db.new_user(&req.username, &req.email).await?;
    Ok(Json(user))
}

/// Get all users.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "List of all users", body = Vec<User>)
    )
)]
pub async fn all_users(Extension(db): Extension<Database>) -> Result<Json<Vec<User>>, AppError> {
    let users = db.all_users().await?;
    Ok(Json(users))
}
