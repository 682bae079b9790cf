use db::{admin::AdminProfile, user::User, DbConn};
use rocket::serde::json::Json;
use serde::Serialize;

use crate::permissions::{check_admin_access, AdminAccess};

#[derive(Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_profile: Option<AdminProfile>,
}

#[get("/api/admin/session")]
pub async fn admin_session(
    user: Option<User>,
    db: DbConn,
) -> Json<SessionResponse> {
    db.run(move |conn| {
        let response = match check_admin_access(user.as_ref(), conn) {
            AdminAccess::Anonymous => SessionResponse {
                authenticated: false,
                is_admin: false,
                user: None,
                admin_profile: None,
            },
            AdminAccess::NotAdmin(user) => SessionResponse {
                authenticated: true,
                is_admin: false,
                user: Some(user),
                admin_profile: None,
            },
            AdminAccess::Admin(user, profile) => SessionResponse {
                authenticated: true,
                is_admin: true,
                user: Some(user),
                admin_profile: Some(profile),
            },
        };
        Json(response)
    })
    .await
}
