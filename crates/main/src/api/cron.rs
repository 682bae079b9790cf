use db::DbConn;
use payments::PaymentGateway;
use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request,
};

use crate::{
    api::{internal_error, ApiResult, Success},
    reconcile,
};

/// Guard for the cron endpoints: the external scheduler authenticates with
/// `Authorization: Bearer <CRON_SECRET>`. Any mismatch is a 401 and neither
/// reconciliation phase runs.
pub struct CronAuth;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CronAuth {
    type Error = ();

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, Self::Error> {
        let secret = match std::env::var("CRON_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                return request::Outcome::Error((Status::Unauthorized, ()))
            }
        };

        match request.headers().get_one("Authorization") {
            Some(header) if header == format!("Bearer {secret}") => {
                request::Outcome::Success(CronAuth)
            }
            _ => request::Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

#[get("/api/cron/process-payments")]
pub async fn process_payments(
    _auth: CronAuth,
    db: DbConn,
) -> ApiResult<Success> {
    reconcile::process_recent_transactions(&db)
        .await
        .map_err(internal_error)?;

    let gateway = PaymentGateway::from_env();
    reconcile::process_pending_payments(&db, &gateway)
        .await
        .map_err(internal_error)?;

    Ok(Success::ok())
}

#[get("/api/cron/process-scheduled-tasks")]
pub async fn process_scheduled_tasks(
    _auth: CronAuth,
    db: DbConn,
) -> ApiResult<Success> {
    let gateway = PaymentGateway::from_env();
    reconcile::process_scheduled_checks(&db, &gateway)
        .await
        .map_err(internal_error)?;

    Ok(Success::ok())
}
