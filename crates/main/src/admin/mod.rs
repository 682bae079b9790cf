//! The admin dashboard: login, first-run setup, the tabbed management
//! views and the actions they post to.

pub mod actions;
pub mod config;
pub mod dashboard;
pub mod login;
pub mod setup;

use rocket::response::{Flash, Redirect};

use crate::permissions::AdminAccess;

/// Pages and form actions under `/admin` redirect to the login page unless
/// the session belongs to a user with an admin profile. A logged-in user
/// without one is sent back with an error query parameter.
pub(crate) fn require_admin(
    access: AdminAccess,
) -> Result<(db::user::User, db::admin::AdminProfile), Flash<Redirect>> {
    match access {
        AdminAccess::Anonymous => Err(Flash::error(
            Redirect::to("/admin/login"),
            "Please log in first.",
        )),
        AdminAccess::NotAdmin(_) => Err(Flash::error(
            Redirect::to("/admin/login?error=unauthorized"),
            "That account does not have admin access.",
        )),
        AdminAccess::Admin(user, profile) => Ok((user, profile)),
    }
}
