use axum::{extract::Extension, Json};

use crate::duststicks::users::User;

/// The session guard has already resolved the principal.
#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Return the authenticated user.", body = User),
        (status = 401, description = "Missing or invalid session cookie.", body = crate::duststicks::error::ErrorBody),
    ),
    tag = "me"
)]
pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
