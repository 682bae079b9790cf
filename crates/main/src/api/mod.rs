//! JSON surface used by the admin dashboard, the payment gateway and the
//! external cron scheduler.

pub mod admins;
pub mod cron;
pub mod files;
pub mod notification;
pub mod session;
pub mod stats;
pub mod transactions;

use rocket::{http::Status, response::status::Custom, serde::json::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub fn ok() -> Json<Success> {
        Json(Success { success: true })
    }
}

pub type ApiResult<T> = Result<Json<T>, Custom<Json<ApiError>>>;

pub fn bad_request<T: ToString>(message: T) -> Custom<Json<ApiError>> {
    Custom(
        Status::BadRequest,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}

/// The backend's error message is forwarded to the client verbatim, as the
/// dashboard expects.
pub fn internal_error<T: std::fmt::Display>(error: T) -> Custom<Json<ApiError>> {
    tracing::error!("request failed: {error}");
    Custom(
        Status::InternalServerError,
        Json(ApiError {
            error: error.to_string(),
        }),
    )
}
