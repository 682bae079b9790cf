use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::check_ins;

/// Existence of a row means the participant has been checked in.
#[derive(Debug, Queryable, Serialize, Clone)]
pub struct CheckIn {
    pub id: i64,
    pub public_id: String,
    pub participant_id: i64,
    pub created_at: NaiveDateTime,
}

type OfParticipant = diesel::dsl::Eq<check_ins::participant_id, i64>;

impl CheckIn {
    pub fn of_participant(participant_id: i64) -> OfParticipant {
        check_ins::participant_id.eq(participant_id)
    }
}
