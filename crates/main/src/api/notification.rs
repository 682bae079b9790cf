use db::{
    registration::Registration, schema::{registrations, transactions},
    transaction::Transaction, DbConn,
};
use diesel::prelude::*;
use rocket::{http::Status, response::status::Custom, serde::json::Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{internal_error, ApiError, ApiResult, Success},
    reconcile::apply_gateway_status,
};

#[derive(Deserialize)]
pub struct NotificationPayload {
    pub order_id: String,
    pub transaction_status: String,
    pub gross_amount: i64,
    pub signature: String,
    /// Set when the gateway knows which registration the order belongs to;
    /// the transaction is linked automatically in that case.
    pub registration_number: Option<String>,
}

/// Receives payment status notifications pushed by the gateway. The
/// signature covers the order id and amount; an invalid one is rejected
/// before any state is touched.
#[post("/api/payments/notification", data = "<payload>")]
pub async fn payment_notification(
    db: DbConn,
    payload: Json<NotificationPayload>,
) -> ApiResult<Success> {
    let server_key = std::env::var("GATEWAY_SERVER_KEY").unwrap_or_default();

    if !payments::verify_notification(
        &payload.order_id,
        payload.gross_amount,
        &payload.signature,
        &server_key,
    ) {
        tracing::warn!(
            "rejected notification for order {} with bad signature",
            payload.order_id
        );
        return Err(Custom(
            Status::Unauthorized,
            Json(ApiError {
                error: "invalid signature".to_string(),
            }),
        ));
    }

    db.run(move |conn| {
        conn.transaction(|conn| -> Result<(), diesel::result::Error> {
            diesel::insert_into(transactions::table)
                .values((
                    transactions::public_id.eq(Uuid::now_v7().to_string()),
                    transactions::order_id.eq(&payload.order_id),
                    transactions::gateway_status
                        .eq(&payload.transaction_status),
                    transactions::gross_amount.eq(payload.gross_amount),
                    transactions::created_at.eq(diesel::dsl::now),
                    transactions::updated_at.eq(diesel::dsl::now),
                ))
                .on_conflict(transactions::order_id)
                .do_update()
                .set((
                    transactions::gateway_status
                        .eq(&payload.transaction_status),
                    transactions::gross_amount.eq(payload.gross_amount),
                    transactions::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;

            let transaction: Transaction = transactions::table
                .filter(Transaction::with_order_id(&payload.order_id))
                .first(conn)?;

            let registration_id = match &payload.registration_number {
                Some(number) => {
                    let registration: Option<Registration> =
                        registrations::table
                            .filter(Registration::with_number(number))
                            .first(conn)
                            .optional()?;
                    match registration {
                        Some(registration) => {
                            diesel::update(transactions::table.filter(
                                transactions::id.eq(transaction.id),
                            ))
                            .set(
                                transactions::registration_id
                                    .eq(registration.id),
                            )
                            .execute(conn)?;
                            Some(registration.id)
                        }
                        None => transaction.registration_id,
                    }
                }
                None => transaction.registration_id,
            };

            apply_gateway_status(
                conn,
                transaction.id,
                registration_id,
                &payload.transaction_status,
            )
        })
    })
    .await
    .map_err(internal_error)?;

    Ok(Success::ok())
}
