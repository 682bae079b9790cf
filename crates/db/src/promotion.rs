use chrono::NaiveDateTime;
use diesel::{prelude::*, sql_types::Bool, sqlite::Sqlite};
use serde::Serialize;

use crate::schema::promotions;

#[derive(Debug, Queryable, Serialize, Clone)]
pub struct Promotion {
    pub id: i64,
    pub public_id: String,
    pub code: String,
    pub discount_percent: i64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

impl Promotion {
    pub fn active_with_code<'a>(
        code: &'a str,
    ) -> Box<
        dyn BoxableExpression<promotions::table, Sqlite, SqlType = Bool> + 'a,
    > {
        Box::new(
            promotions::code
                .eq(code)
                .and(promotions::is_active.eq(true)),
        )
    }

    pub fn validate_discount(percent: i64) -> bool {
        (0..=100).contains(&percent)
    }
}
