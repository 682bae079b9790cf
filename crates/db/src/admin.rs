use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema;

/// Presence of this row is the sole authorization signal for admin
/// capability: a valid session without one is still "not an admin".
#[derive(Debug, Queryable, Serialize, Clone)]
pub struct AdminProfile {
    pub id: i64,
    pub public_id: String,
    pub user_id: i64,
    pub role: String,
    pub full_name: String,
    pub email: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

type WithUserId = diesel::dsl::Eq<schema::admin_profiles::user_id, i64>;

impl AdminProfile {
    pub fn with_user_id(user_id: i64) -> WithUserId {
        schema::admin_profiles::user_id.eq(user_id)
    }
}
