use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::registrations;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_VERIFIED: &str = "verified";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_EXPIRED: &str = "expired";

#[derive(Debug, Queryable, Serialize, Clone)]
pub struct Registration {
    pub id: i64,
    pub public_id: String,
    pub registration_number: String,
    pub payment_status: String,
    pub final_amount: i64,
    pub contact_email: String,
    pub sponsor_letter_path: Option<String>,
    pub promo_code: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

type WithNumber<'a> = diesel::dsl::Eq<registrations::registration_number, &'a str>;

type WithPublicId<'a> = diesel::dsl::Eq<registrations::public_id, &'a str>;

impl Registration {
    pub fn with_number(number: &str) -> WithNumber {
        registrations::registration_number.eq(number)
    }

    pub fn with_public_id(pid: &str) -> WithPublicId {
        registrations::public_id.eq(pid)
    }
}
