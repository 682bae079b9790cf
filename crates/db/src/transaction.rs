use chrono::NaiveDateTime;
use diesel::{prelude::*, sql_types::Bool, sqlite::Sqlite};
use serde::Serialize;

use crate::schema::transactions;

/// A payment attempt reported by the gateway. `registration_id` is set
/// either by the gateway notification or by the admin match action; the
/// latest write wins.
#[derive(Debug, Queryable, Serialize, Clone)]
pub struct Transaction {
    pub id: i64,
    pub public_id: String,
    pub order_id: String,
    pub gateway_status: String,
    pub gross_amount: i64,
    pub registration_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

type WithOrderId<'a> = diesel::dsl::Eq<transactions::order_id, &'a str>;

type WithPublicId<'a> = diesel::dsl::Eq<transactions::public_id, &'a str>;

impl Transaction {
    pub fn with_order_id(order_id: &str) -> WithOrderId {
        transactions::order_id.eq(order_id)
    }

    pub fn with_public_id(pid: &str) -> WithPublicId {
        transactions::public_id.eq(pid)
    }

    /// Transactions mutated since `watermark`, for the first reconciliation
    /// phase.
    pub fn mutated_since(
        watermark: NaiveDateTime,
    ) -> Box<
        dyn BoxableExpression<transactions::table, Sqlite, SqlType = Bool>,
    > {
        Box::new(
            transactions::updated_at
                .gt(watermark)
                .and(transactions::registration_id.is_not_null()),
        )
    }
}

/// A deferred gateway re-check for a transaction whose outcome was still
/// pending when last observed.
#[derive(Debug, Queryable, Serialize, Clone)]
pub struct ScheduledCheck {
    pub id: i64,
    pub transaction_id: i64,
    pub due_at: NaiveDateTime,
    pub completed: bool,
    pub created_at: NaiveDateTime,
}
