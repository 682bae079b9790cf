use chrono::Utc;
use rocket::serde::json::Json;
use serde::Serialize;

use crate::{
    api::{bad_request, ApiResult},
    permissions::AdminSession,
    signed_url,
};

#[derive(Serialize)]
pub struct SignedUrlResponse {
    pub url: String,
}

/// Issues a time-limited (seven day) download URL for a stored sponsor
/// letter.
#[get("/api/sponsor-letter-signed-url?<path>")]
pub async fn sponsor_letter_signed_url(
    _admin: AdminSession,
    path: Option<String>,
) -> ApiResult<SignedUrlResponse> {
    let path = path.ok_or_else(|| bad_request("path is required"))?;

    if !signed_url::is_safe_path(&path) {
        return Err(bad_request("path is not valid"));
    }

    let site_url = std::env::var("SITE_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_string());

    let url = signed_url::signed_url(
        &site_url,
        &path,
        Utc::now().timestamp(),
        &signed_url::secret_from_env(),
    );

    Ok(Json(SignedUrlResponse { url }))
}
