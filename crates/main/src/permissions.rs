use db::{admin::AdminProfile, schema::admin_profiles, user::User, DbConn};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{self, FromRequest},
    Request,
};

/// Result of the admin access check, per request.
///
/// A valid session without an `admin_profiles` row is still "not an admin":
/// the profile row is the sole authorization signal.
#[derive(Debug)]
pub enum AdminAccess {
    /// No session at all.
    Anonymous,
    /// A session exists but no admin profile is associated with it.
    NotAdmin(User),
    Admin(User, AdminProfile),
}

/// Looks up the admin profile for the current user. Never cached: every
/// navigation re-derives this from the database.
#[tracing::instrument(skip(conn))]
pub fn check_admin_access(
    user: Option<&User>,
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> AdminAccess {
    let user = match user {
        Some(user) => user.clone(),
        None => return AdminAccess::Anonymous,
    };

    let profile = admin_profiles::table
        .filter(AdminProfile::with_user_id(user.id))
        .first::<AdminProfile>(conn)
        .optional()
        .unwrap();

    match profile {
        Some(profile) => AdminAccess::Admin(user, profile),
        None => AdminAccess::NotAdmin(user),
    }
}

/// Request guard for JSON routes that must only ever run with a verified
/// admin profile; failure is a plain 401 rather than a redirect.
pub struct AdminSession(pub User, pub AdminProfile);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminSession {
    type Error = ();

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, Self::Error> {
        let user = try_outcome!(request
            .guard::<User>()
            .await
            .map_error(|_| (Status::Unauthorized, ())));

        let db = try_outcome!(request
            .guard::<DbConn>()
            .await
            .map_error(|_| (Status::InternalServerError, ())));

        let user_id = user.id;
        let profile = db
            .run(move |conn| {
                admin_profiles::table
                    .filter(AdminProfile::with_user_id(user_id))
                    .first::<AdminProfile>(conn)
                    .optional()
            })
            .await;

        match profile {
            Ok(Some(profile)) => {
                request::Outcome::Success(AdminSession(user, profile))
            }
            Ok(None) => {
                request::Outcome::Error((Status::Unauthorized, ()))
            }
            Err(_) => {
                request::Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}
