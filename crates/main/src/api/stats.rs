use chrono::NaiveDate;
use db::{
    participant::Participant, registration::Registration,
    schema::{participants, registrations}, DbConn,
};
use diesel::prelude::*;
use itertools::Itertools;
use rocket::serde::json::Json;
use serde::Serialize;

use crate::{
    api::{internal_error, ApiResult},
    permissions::AdminSession,
};

#[derive(Serialize)]
pub struct RecentRegistration {
    pub registration_number: String,
    pub payment_status: String,
    pub final_amount: i64,
    pub participant_count: usize,
    pub created_at: chrono::NaiveDateTime,
}

#[get("/api/admin/recent-registrations")]
pub async fn recent_registrations(
    _admin: AdminSession,
    db: DbConn,
) -> ApiResult<Vec<RecentRegistration>> {
    let rows = db
        .run(|conn| {
            conn.transaction(
                |conn| -> Result<_, diesel::result::Error> {
                    let recent: Vec<Registration> = registrations::table
                        .order_by(registrations::created_at.desc())
                        .limit(10)
                        .load(conn)?;

                    let mut rows = Vec::with_capacity(recent.len());
                    for registration in recent {
                        let count: i64 = participants::table
                            .filter(Participant::of_registration(
                                registration.id,
                            ))
                            .count()
                            .get_result(conn)?;
                        rows.push(RecentRegistration {
                            registration_number: registration
                                .registration_number,
                            payment_status: registration.payment_status,
                            final_amount: registration.final_amount,
                            participant_count: count as usize,
                            created_at: registration.created_at,
                        });
                    }
                    Ok(rows)
                },
            )
        })
        .await
        .map_err(internal_error)?;

    Ok(Json(rows))
}

#[derive(Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub count: usize,
}

/// Registration counts per day, oldest first, for the dashboard chart.
#[get("/api/admin/registration-chart-data")]
pub async fn registration_chart_data(
    _admin: AdminSession,
    db: DbConn,
) -> ApiResult<Vec<ChartPoint>> {
    let created: Vec<chrono::NaiveDateTime> = db
        .run(|conn| {
            registrations::table
                .order_by(registrations::created_at.asc())
                .select(registrations::created_at)
                .load(conn)
        })
        .await
        .map_err(internal_error)?;

    let by_date =
        created.into_iter().chunk_by(|created_at| created_at.date());
    let points = (&by_date)
        .into_iter()
        .map(|(date, group)| ChartPoint {
            date,
            count: group.count(),
        })
        .collect::<Vec<_>>();

    Ok(Json(points))
}
