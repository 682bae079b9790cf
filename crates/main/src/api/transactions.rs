use db::{
    registration::Registration, schema::{registrations, transactions},
    transaction::Transaction, DbConn,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use rocket::serde::json::Json;
use serde::Deserialize;

use crate::{
    api::{internal_error, ApiResult, Success},
    permissions::AdminSession,
    reconcile::apply_gateway_status,
};

/// Points a transaction at a registration and re-derives the registration's
/// payment status from that transaction. The update is unconditional: a
/// later match overwrites an earlier one, and repeating the same pair is a
/// no-op.
pub fn match_transaction(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    registration_pid: &str,
    transaction_pid: &str,
) -> Result<(), diesel::result::Error> {
    let registration: Registration = registrations::table
        .filter(Registration::with_public_id(registration_pid))
        .first(conn)?;

    let transaction: Transaction = transactions::table
        .filter(Transaction::with_public_id(transaction_pid))
        .first(conn)?;

    diesel::update(
        transactions::table.filter(transactions::id.eq(transaction.id)),
    )
    .set(transactions::registration_id.eq(registration.id))
    .execute(conn)?;

    apply_gateway_status(
        conn,
        transaction.id,
        Some(registration.id),
        &transaction.gateway_status,
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTransactionRequest {
    pub registration_id: String,
    pub transaction_id: String,
}

#[post("/api/admin/match-transaction", data = "<request>")]
pub async fn do_match_transaction(
    _admin: AdminSession,
    db: DbConn,
    request: Json<MatchTransactionRequest>,
) -> ApiResult<Success> {
    db.run(move |conn| {
        conn.transaction(|conn| {
            match_transaction(
                conn,
                &request.registration_id,
                &request.transaction_id,
            )
        })
    })
    .await
    .map_err(internal_error)?;

    Ok(Success::ok())
}
