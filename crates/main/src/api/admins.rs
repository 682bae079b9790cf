use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use db::{
    admin::AdminProfile,
    schema::{admin_profiles, users},
    user::User,
    DbConn,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use rand::rngs::OsRng;
use rocket::serde::json::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{bad_request, internal_error, ApiResult, Success},
    permissions::AdminSession,
};

#[derive(Debug)]
pub enum CreateAdminError {
    Validation(&'static str),
    Db(String),
}

impl std::fmt::Display for CreateAdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => f.write_str(msg),
            Self::Db(msg) => f.write_str(msg),
        }
    }
}

/// Creates an auth user and its admin profile. The two inserts are
/// deliberately not wrapped in one transaction: the auth identity and the
/// profile are separate concerns, and a failed profile insert rolls the
/// user back explicitly so no orphan identity is left behind.
pub fn create_admin(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    email: &str,
    password: &str,
    full_name: &str,
) -> Result<AdminProfile, CreateAdminError> {
    if !User::validate_email(email) {
        return Err(CreateAdminError::Validation(
            "that email is not a valid email",
        ));
    }
    if !User::validate_password(password) {
        return Err(CreateAdminError::Validation(
            "passwords must be at least 6 characters",
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string();

    let user_id = diesel::insert_into(users::table)
        .values((
            users::public_id.eq(Uuid::now_v7().to_string()),
            users::email.eq(email),
            users::password_hash.eq(&password_hash),
            users::created_at.eq(diesel::dsl::now),
        ))
        .returning(users::id)
        .get_result::<i64>(conn)
        .map_err(|e| CreateAdminError::Db(e.to_string()))?;

    let profile = diesel::insert_into(admin_profiles::table)
        .values((
            admin_profiles::public_id.eq(Uuid::now_v7().to_string()),
            admin_profiles::user_id.eq(user_id),
            admin_profiles::role.eq("admin"),
            admin_profiles::full_name.eq(full_name),
            admin_profiles::email.eq(email),
            admin_profiles::created_at.eq(diesel::dsl::now),
            admin_profiles::updated_at.eq(diesel::dsl::now),
        ))
        .get_result::<AdminProfile>(conn);

    match profile {
        Ok(profile) => Ok(profile),
        Err(e) => {
            // roll the just-created user back so no orphan identity remains
            let _ = diesel::delete(users::table.filter(users::id.eq(user_id)))
                .execute(conn);
            Err(CreateAdminError::Db(e.to_string()))
        }
    }
}

#[derive(Deserialize)]
pub struct CreateAdminRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
}

#[post("/api/admin/create", data = "<request>")]
pub async fn do_create_admin(
    _admin: AdminSession,
    db: DbConn,
    request: Json<CreateAdminRequest>,
) -> ApiResult<Success> {
    let missing =
        || bad_request("email, password and full_name are required");

    let email = request
        .email
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(missing)?;
    let password = request
        .password
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(missing)?;
    let full_name = request
        .full_name
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(missing)?;

    db.run(move |conn| create_admin(conn, &email, &password, &full_name))
        .await
        .map_err(|e| match e {
            CreateAdminError::Validation(msg) => bad_request(msg),
            CreateAdminError::Db(msg) => internal_error(msg),
        })?;

    Ok(Success::ok())
}
