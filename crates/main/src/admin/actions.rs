//! Form actions posted from the dashboard tabs. Each one re-checks admin
//! access, applies the change in a transaction and redirects back to the
//! tab it came from.

use db::{
    check_in::CheckIn,
    participant::Participant,
    promotion::Promotion,
    registration::Registration,
    schema::{check_ins, participants, promotions, registrations},
    user::User,
    DbConn,
};
use diesel::prelude::*;
use rocket::{
    form::Form,
    response::{Flash, Redirect},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    admin::require_admin,
    api::{
        admins::{create_admin, CreateAdminError},
        transactions::match_transaction,
    },
    permissions::check_admin_access,
};

#[post("/admin/registrations/<pid>/verify")]
pub async fn do_verify_registration(
    user: Option<User>,
    pid: String,
    db: DbConn,
) -> Flash<Redirect> {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            if let Err(flash) =
                require_admin(check_admin_access(user.as_ref(), conn))
            {
                return Ok(flash);
            }

            let updated = diesel::update(
                registrations::table
                    .filter(Registration::with_public_id(&pid)),
            )
            .set((
                registrations::payment_status
                    .eq(db::registration::STATUS_VERIFIED),
                registrations::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)?;

            if updated == 0 {
                return Ok(Flash::error(
                    Redirect::to("/admin?tab=payments"),
                    "No such registration.",
                ));
            }

            Ok(Flash::success(
                Redirect::to("/admin?tab=payments"),
                "Registration marked as verified.",
            ))
        })
        .unwrap()
    })
    .await
}

#[derive(FromForm, Serialize)]
pub struct MatchPaymentForm {
    pub registration_id: String,
    pub transaction_id: String,
}

#[post("/admin/payments/match", data = "<form>")]
pub async fn do_match_payment(
    user: Option<User>,
    form: Form<MatchPaymentForm>,
    db: DbConn,
) -> Flash<Redirect> {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            if let Err(flash) =
                require_admin(check_admin_access(user.as_ref(), conn))
            {
                return Ok(flash);
            }

            match match_transaction(
                conn,
                &form.registration_id,
                &form.transaction_id,
            ) {
                Ok(()) => Ok(Flash::success(
                    Redirect::to("/admin?tab=payments"),
                    "Transaction matched.",
                )),
                Err(diesel::result::Error::NotFound) => Ok(Flash::error(
                    Redirect::to("/admin?tab=payments"),
                    "No such registration or transaction.",
                )),
                Err(e) => Err(e),
            }
        })
        .unwrap()
    })
    .await
}

#[post("/admin/participants/<pid>/checkin")]
pub async fn do_checkin(
    user: Option<User>,
    pid: String,
    db: DbConn,
) -> Flash<Redirect> {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            if let Err(flash) =
                require_admin(check_admin_access(user.as_ref(), conn))
            {
                return Ok(flash);
            }

            let participant: Option<Participant> = participants::table
                .filter(participants::public_id.eq(&pid))
                .first(conn)
                .optional()?;

            let participant = match participant {
                Some(participant) => participant,
                None => {
                    return Ok(Flash::error(
                        Redirect::to("/admin?tab=checkin"),
                        "No such participant.",
                    ))
                }
            };

            let existing: Option<CheckIn> = check_ins::table
                .filter(CheckIn::of_participant(participant.id))
                .first(conn)
                .optional()?;

            // checking in twice is a no-op, not an error
            if existing.is_none() {
                diesel::insert_into(check_ins::table)
                    .values((
                        check_ins::public_id
                            .eq(Uuid::now_v7().to_string()),
                        check_ins::participant_id.eq(participant.id),
                        check_ins::created_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;
            }

            Ok(Flash::success(
                Redirect::to("/admin?tab=checkin"),
                format!("{} is checked in.", participant.full_name),
            ))
        })
        .unwrap()
    })
    .await
}

#[post("/admin/participants/<pid>/undo-checkin")]
pub async fn do_undo_checkin(
    user: Option<User>,
    pid: String,
    db: DbConn,
) -> Flash<Redirect> {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            if let Err(flash) =
                require_admin(check_admin_access(user.as_ref(), conn))
            {
                return Ok(flash);
            }

            let participant: Option<Participant> = participants::table
                .filter(participants::public_id.eq(&pid))
                .first(conn)
                .optional()?;

            if let Some(participant) = participant {
                diesel::delete(
                    check_ins::table
                        .filter(CheckIn::of_participant(participant.id)),
                )
                .execute(conn)?;
            }

            Ok(Flash::success(
                Redirect::to("/admin?tab=checkin"),
                "Check-in removed.",
            ))
        })
        .unwrap()
    })
    .await
}

#[derive(FromForm, Serialize)]
pub struct PromotionForm {
    pub code: String,
    pub discount_percent: i64,
}

#[post("/admin/promotions/new", data = "<form>")]
pub async fn do_create_promotion(
    user: Option<User>,
    form: Form<PromotionForm>,
    db: DbConn,
) -> Flash<Redirect> {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            if let Err(flash) =
                require_admin(check_admin_access(user.as_ref(), conn))
            {
                return Ok(flash);
            }

            let code = form.code.trim().to_uppercase();
            if code.is_empty() {
                return Ok(Flash::error(
                    Redirect::to("/admin?tab=promotions"),
                    "A promotion needs a code.",
                ));
            }
            if !Promotion::validate_discount(form.discount_percent) {
                return Ok(Flash::error(
                    Redirect::to("/admin?tab=promotions"),
                    "The discount must be between 0 and 100 percent.",
                ));
            }

            let inserted = diesel::insert_into(promotions::table)
                .values((
                    promotions::public_id.eq(Uuid::now_v7().to_string()),
                    promotions::code.eq(&code),
                    promotions::discount_percent.eq(form.discount_percent),
                    promotions::is_active.eq(true),
                    promotions::created_at.eq(diesel::dsl::now),
                ))
                .on_conflict_do_nothing()
                .execute(conn)?;

            if inserted == 0 {
                return Ok(Flash::error(
                    Redirect::to("/admin?tab=promotions"),
                    "A promotion with that code already exists.",
                ));
            }

            Ok(Flash::success(
                Redirect::to("/admin?tab=promotions"),
                format!("Promotion {code} created."),
            ))
        })
        .unwrap()
    })
    .await
}

#[post("/admin/promotions/<pid>/toggle")]
pub async fn do_toggle_promotion(
    user: Option<User>,
    pid: String,
    db: DbConn,
) -> Flash<Redirect> {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            if let Err(flash) =
                require_admin(check_admin_access(user.as_ref(), conn))
            {
                return Ok(flash);
            }

            let promotion: Option<Promotion> = promotions::table
                .filter(promotions::public_id.eq(&pid))
                .first(conn)
                .optional()?;

            let promotion = match promotion {
                Some(promotion) => promotion,
                None => {
                    return Ok(Flash::error(
                        Redirect::to("/admin?tab=promotions"),
                        "No such promotion.",
                    ))
                }
            };

            diesel::update(
                promotions::table
                    .filter(promotions::id.eq(promotion.id)),
            )
            .set(promotions::is_active.eq(!promotion.is_active))
            .execute(conn)?;

            Ok(Flash::success(
                Redirect::to("/admin?tab=promotions"),
                format!(
                    "Promotion {} is now {}.",
                    promotion.code,
                    if promotion.is_active {
                        "inactive"
                    } else {
                        "active"
                    }
                ),
            ))
        })
        .unwrap()
    })
    .await
}

#[derive(FromForm, Serialize)]
pub struct NewAdminForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[post("/admin/admins/new", data = "<form>")]
pub async fn do_create_admin_account(
    user: Option<User>,
    form: Form<NewAdminForm>,
    db: DbConn,
) -> Flash<Redirect> {
    db.run(move |conn| {
        if let Err(flash) = conn
            .transaction(|conn| {
                Ok::<_, diesel::result::Error>(require_admin(
                    check_admin_access(user.as_ref(), conn),
                ))
            })
            .unwrap()
        {
            return flash;
        }

        match create_admin(conn, &form.email, &form.password, &form.full_name)
        {
            Ok(profile) => Flash::success(
                Redirect::to("/admin?tab=admins"),
                format!("Admin account for {} created.", profile.email),
            ),
            Err(CreateAdminError::Validation(msg)) => Flash::error(
                Redirect::to("/admin?tab=admins"),
                format!("Error: {msg}."),
            ),
            Err(CreateAdminError::Db(msg)) => Flash::error(
                Redirect::to("/admin?tab=admins"),
                format!("Error: {msg}."),
            ),
        }
    })
    .await
}
