use diesel::prelude::*;
use serde::Serialize;

use crate::schema::participants;

pub const TYPE_GENERAL: &str = "general";
pub const TYPE_WORKSHOP: &str = "workshop";

#[derive(Debug, Queryable, Serialize, Clone)]
pub struct Participant {
    pub id: i64,
    pub public_id: String,
    pub registration_id: i64,
    pub full_name: String,
    pub email: String,
    pub participant_type: String,
}

type OfRegistration = diesel::dsl::Eq<participants::registration_id, i64>;

impl Participant {
    pub fn of_registration(registration_id: i64) -> OfRegistration {
        participants::registration_id.eq(registration_id)
    }

    pub fn validate_type(participant_type: &str) -> bool {
        matches!(participant_type, TYPE_GENERAL | TYPE_WORKSHOP)
    }
}
