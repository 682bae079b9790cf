//! The payment reconciliation job.
//!
//! Invoked out-of-band by the cron endpoints, independently of user
//! traffic. Each invocation runs its phases sequentially and fails fast: a
//! phase error leaves the remaining work for the next scheduled tick, which
//! is the retry mechanism.

use chrono::{NaiveDateTime, Utc};
use db::{
    config::{ConfigItem, KEY_RECONCILE_WATERMARK},
    schema::{config, registrations, scheduled_checks, transactions},
    transaction::{ScheduledCheck, Transaction},
    DbConn,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use itertools::Itertools;
use payments::{GatewayError, GatewayStatus, PaymentGateway};
use uuid::Uuid;

/// A registration must have been pending for at least this long before the
/// second phase re-queries the gateway for it.
const PENDING_AGE_SECS: i64 = 3600;

/// Delay before a still-pending gateway outcome is looked at again.
const RECHECK_DELAY_SECS: i64 = 900;

#[derive(Debug)]
pub enum ReconcileError {
    Db(diesel::result::Error),
    Gateway(GatewayError),
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(e) => write!(f, "database error: {e}"),
            Self::Gateway(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ReconcileError {}

impl From<diesel::result::Error> for ReconcileError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Db(e)
    }
}

impl From<GatewayError> for ReconcileError {
    fn from(e: GatewayError) -> Self {
        Self::Gateway(e)
    }
}

/// Applies a gateway outcome to a transaction and, when one is linked, to
/// its registration, so that the registration's payment status always
/// reflects the latest observed transaction state. Still-pending outcomes
/// schedule a deferred re-check.
pub fn apply_gateway_status(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    transaction_id: i64,
    registration_id: Option<i64>,
    raw_status: &str,
) -> Result<(), diesel::result::Error> {
    let status = GatewayStatus::from(raw_status);

    diesel::update(transactions::table.filter(transactions::id.eq(transaction_id)))
        .set((
            transactions::gateway_status.eq(raw_status),
            transactions::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;

    if let Some(registration_id) = registration_id {
        diesel::update(
            registrations::table.filter(registrations::id.eq(registration_id)),
        )
        .set((
            registrations::payment_status.eq(status.registration_status()),
            registrations::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;
    }

    if !status.is_settled() {
        // one outstanding check per transaction; repeated pending
        // notifications must not pile up duplicate gateway queries
        let already_scheduled = diesel::select(diesel::dsl::exists(
            scheduled_checks::table
                .filter(scheduled_checks::transaction_id.eq(transaction_id))
                .filter(scheduled_checks::completed.eq(false)),
        ))
        .get_result::<bool>(conn)?;

        if !already_scheduled {
            let due = Utc::now().naive_utc()
                + chrono::Duration::seconds(RECHECK_DELAY_SECS);
            diesel::insert_into(scheduled_checks::table)
                .values((
                    scheduled_checks::transaction_id.eq(transaction_id),
                    scheduled_checks::due_at.eq(due),
                    scheduled_checks::completed.eq(false),
                    scheduled_checks::created_at.eq(diesel::dsl::now),
                ))
                .execute(conn)?;
        }
    }

    Ok(())
}

fn read_watermark(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> Result<NaiveDateTime, diesel::result::Error> {
    let stored = config::table
        .filter(ConfigItem::with_key(KEY_RECONCILE_WATERMARK))
        .select(config::value)
        .first::<String>(conn)
        .optional()?;

    Ok(stored
        .and_then(|value| {
            NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S%.f").ok()
        })
        .unwrap_or(NaiveDateTime::UNIX_EPOCH))
}

fn write_watermark(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    watermark: NaiveDateTime,
) -> Result<(), diesel::result::Error> {
    let value = watermark.format("%Y-%m-%dT%H:%M:%S%.f").to_string();
    diesel::insert_into(config::table)
        .values((
            config::public_id.eq(Uuid::now_v7().to_string()),
            config::key.eq(KEY_RECONCILE_WATERMARK),
            config::value.eq(&value),
        ))
        .on_conflict(config::key)
        .do_update()
        .set(config::value.eq(&value))
        .execute(conn)?;
    Ok(())
}

/// Phase one: re-derive registration payment status from transactions
/// mutated since the last run.
#[tracing::instrument(skip(db))]
pub async fn process_recent_transactions(
    db: &DbConn,
) -> Result<usize, ReconcileError> {
    let updated = db
        .run(|conn| {
            conn.transaction(
                |conn| -> Result<usize, diesel::result::Error> {
                    let watermark = read_watermark(conn)?;
                    let now = Utc::now().naive_utc();

                    // oldest mutation first, so when several transactions
                    // point at one registration the latest one wins
                    let mutated: Vec<Transaction> = transactions::table
                        .filter(Transaction::mutated_since(watermark))
                        .order(transactions::updated_at.asc())
                        .load(conn)?;

                    let mut updated = 0;
                    for tx in mutated {
                        let status =
                            GatewayStatus::from(tx.gateway_status.as_str());
                        if let Some(registration_id) = tx.registration_id {
                            diesel::update(registrations::table.filter(
                                registrations::id.eq(registration_id),
                            ))
                            .set((
                                registrations::payment_status
                                    .eq(status.registration_status()),
                                registrations::updated_at.eq(diesel::dsl::now),
                            ))
                            .execute(conn)?;
                            updated += 1;
                        }
                    }

                    write_watermark(conn, now)?;
                    Ok(updated)
                },
            )
        })
        .await?;

    tracing::info!("phase one updated {updated} registration(s)");
    Ok(updated)
}

/// Phase two: for registrations pending beyond `PENDING_AGE_SECS`, re-query
/// the gateway for their latest transaction.
#[tracing::instrument(skip(db, gateway))]
pub async fn process_pending_payments(
    db: &DbConn,
    gateway: &PaymentGateway,
) -> Result<usize, ReconcileError> {
    let cutoff =
        Utc::now().naive_utc() - chrono::Duration::seconds(PENDING_AGE_SECS);

    let stale: Vec<(i64, String, i64)> = db
        .run(move |conn| {
            transactions::table
                .inner_join(registrations::table)
                .filter(registrations::payment_status.eq("pending"))
                .filter(registrations::created_at.lt(cutoff))
                .order((
                    registrations::id.asc(),
                    transactions::id.desc(),
                ))
                .select((
                    transactions::id,
                    transactions::order_id,
                    registrations::id,
                ))
                .load(conn)
        })
        .await?;

    // only the latest transaction per registration is consulted
    let latest = stale
        .into_iter()
        .unique_by(|(_, _, registration_id)| *registration_id)
        .collect::<Vec<_>>();

    let mut checked = 0;
    for (transaction_id, order_id, registration_id) in latest {
        let response = gateway.transaction_status(&order_id).await?;
        let raw = response.transaction_status.clone();
        db.run(move |conn| {
            apply_gateway_status(
                conn,
                transaction_id,
                Some(registration_id),
                &raw,
            )
        })
        .await?;
        checked += 1;
    }

    tracing::info!("phase two re-checked {checked} registration(s)");
    Ok(checked)
}

/// Completes due scheduled status checks by re-querying the gateway.
#[tracing::instrument(skip(db, gateway))]
pub async fn process_scheduled_checks(
    db: &DbConn,
    gateway: &PaymentGateway,
) -> Result<usize, ReconcileError> {
    let due: Vec<(ScheduledCheck, Transaction)> = db
        .run(|conn| {
            scheduled_checks::table
                .inner_join(transactions::table)
                .filter(scheduled_checks::completed.eq(false))
                .filter(scheduled_checks::due_at.le(Utc::now().naive_utc()))
                .load(conn)
        })
        .await?;

    let mut completed = 0;
    for (check, tx) in due {
        let response = gateway.transaction_status(&tx.order_id).await?;
        let raw = response.transaction_status.clone();
        db.run(move |conn| {
            conn.transaction(|conn| -> Result<(), diesel::result::Error> {
                apply_gateway_status(
                    conn,
                    tx.id,
                    tx.registration_id,
                    &raw,
                )?;
                diesel::update(
                    scheduled_checks::table
                        .filter(scheduled_checks::id.eq(check.id)),
                )
                .set(scheduled_checks::completed.eq(true))
                .execute(conn)?;
                Ok(())
            })
        })
        .await?;
        completed += 1;
    }

    tracing::info!("completed {completed} scheduled check(s)");
    Ok(completed)
}
