use std::sync::Arc;

use db::{
    config::{ConfigItem, KEY_DISABLE_REGISTRATIONS},
    participant::{self, Participant},
    promotion::Promotion,
    schema::{config, participants, promotions, registrations},
    user::User,
    DbConn,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use either::Either;
use maud::Markup;
use rocket::{
    form::Form,
    response::{Flash, Redirect},
};
use serde::Serialize;
use ui::{page_of_body, page_title};
use uuid::Uuid;

use crate::{
    registration::{apply_discount, price_of},
    util::new_registration_number,
};

/// A registration covers at most this many participants.
pub const MAX_PARTICIPANTS: usize = 5;

#[derive(FromForm, Serialize, Clone, Debug)]
pub struct ParticipantEntry {
    pub full_name: String,
    pub email: String,
    pub participant_type: String,
}

#[derive(FromForm, Serialize, Clone, Debug)]
pub struct RegistrationForm {
    pub contact_email: String,
    pub promo_code: Option<String>,
    pub participants: Vec<ParticipantEntry>,
}

impl RegistrationForm {
    /// Participants with every field left blank are treated as unused rows
    /// of the form, not as errors.
    fn filled_participants(&self) -> Vec<&ParticipantEntry> {
        self.participants
            .iter()
            .filter(|p| {
                !(p.full_name.trim().is_empty()
                    && p.email.trim().is_empty())
            })
            .collect()
    }

    fn validate(&self) -> Result<Vec<&ParticipantEntry>, String> {
        if !User::validate_email(&self.contact_email) {
            return Err(
                "please provide a valid contact email address".to_string()
            );
        }

        let filled = self.filled_participants();
        if filled.is_empty() {
            return Err("please add at least one participant".to_string());
        }
        if filled.len() > MAX_PARTICIPANTS {
            return Err(format!(
                "a registration covers at most {MAX_PARTICIPANTS} participants"
            ));
        }

        for entry in &filled {
            if entry.full_name.trim().is_empty() {
                return Err(
                    "every participant needs a full name".to_string()
                );
            }
            if !User::validate_email(&entry.email) {
                return Err(format!(
                    "\"{}\" is not a valid email address",
                    entry.email
                ));
            }
            if !Participant::validate_type(&entry.participant_type) {
                return Err(
                    "unknown participant type selected".to_string()
                );
            }
        }

        Ok(filled)
    }

    fn promo_code(&self) -> Option<&str> {
        self.promo_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

pub struct Quote {
    pub total: i64,
    pub discount_percent: i64,
    pub final_amount: i64,
    pub promo_code: Option<String>,
}

/// Prices a registration, resolving the promotion code against the active
/// promotions. An inactive or unknown code is an error rather than being
/// silently ignored.
pub fn quote(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
    entries: &[&ParticipantEntry],
    promo_code: Option<&str>,
) -> Result<Result<Quote, String>, diesel::result::Error> {
    let total: i64 = entries
        .iter()
        .map(|entry| price_of(&entry.participant_type))
        .sum();

    let promotion = match promo_code {
        Some(code) => {
            let code = code.to_uppercase();
            let promotion: Option<Promotion> = promotions::table
                .filter(Promotion::active_with_code(&code))
                .first(conn)
                .optional()?;
            match promotion {
                Some(promotion) => Some(promotion),
                None => {
                    return Ok(Err(format!(
                        "the promotion code {code} is not valid"
                    )))
                }
            }
        }
        None => None,
    };

    let discount_percent =
        promotion.as_ref().map(|p| p.discount_percent).unwrap_or(0);

    Ok(Ok(Quote {
        total,
        discount_percent,
        final_amount: apply_discount(total, discount_percent),
        promo_code: promotion.map(|p| p.code),
    }))
}

fn registrations_disabled(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> Result<bool, diesel::result::Error> {
    let item: Option<ConfigItem> = config::table
        .filter(ConfigItem::with_key(KEY_DISABLE_REGISTRATIONS))
        .first(conn)
        .optional()?;
    Ok(matches!(item, Some(item) if item.value == "true"))
}

fn registrations_closed_page(user: Option<User>) -> Markup {
    page_of_body(
        maud::html! {
            div class="alert alert-danger" role="alert" {
                "Registrations are currently closed. Please check back later."
            }
        },
        user,
    )
}

fn participant_type_select(name: &str, selected: &str) -> Markup {
    maud::html! {
        select class="form-select" name=(name) {
            option value=(participant::TYPE_GENERAL)
                selected[selected == participant::TYPE_GENERAL] {
                "General attendance"
            }
            option value=(participant::TYPE_WORKSHOP)
                selected[selected == participant::TYPE_WORKSHOP] {
                "Workshop"
            }
        }
    }
}

fn registration_form_page(
    prev: Option<&RegistrationForm>,
    error: Option<String>,
    user: Option<User>,
) -> Markup {
    let entry_at = |i: usize| -> Option<&ParticipantEntry> {
        prev.and_then(|form| form.participants.get(i))
    };

    page_of_body(
        maud::html! {
            (page_title("Register for MCVU 2025"))
            @if let Some(err) = error {
                div class="alert alert-danger" role="alert" {
                    (err)
                }
            }
            form method="post" action="/register/review" {
                div class="mb-3" {
                    label for="contact_email" class="form-label" {
                        "Contact email"
                    }
                    input type="email" class="form-control" id="contact_email"
                        name="contact_email"
                        value=(prev.map(|f| f.contact_email.as_str()).unwrap_or(""))
                        required;
                    div class="form-text" {
                        "We send the registration confirmation and payment updates here."
                    }
                }
                h2 { "Participants" }
                p class="text-muted" {
                    "Add up to five participants. Leave rows you don't need blank."
                }
                @for i in 0..MAX_PARTICIPANTS {
                    div class="row mb-2" {
                        div class="col" {
                            input type="text" class="form-control"
                                name=(format!("participants[{i}].full_name"))
                                placeholder="Full name"
                                value=(entry_at(i).map(|e| e.full_name.as_str()).unwrap_or(""));
                        }
                        div class="col" {
                            input type="text" class="form-control"
                                name=(format!("participants[{i}].email"))
                                placeholder="Email"
                                value=(entry_at(i).map(|e| e.email.as_str()).unwrap_or(""));
                        }
                        div class="col" {
                            (participant_type_select(
                                &format!("participants[{i}].participant_type"),
                                entry_at(i)
                                    .map(|e| e.participant_type.as_str())
                                    .unwrap_or(participant::TYPE_GENERAL),
                            ))
                        }
                    }
                }
                div class="mb-3" {
                    label for="promo_code" class="form-label" {
                        "Promotion code (optional)"
                    }
                    input type="text" class="form-control" id="promo_code"
                        name="promo_code"
                        value=(prev.and_then(|f| f.promo_code.as_deref()).unwrap_or(""));
                }
                button type="submit" class="btn btn-primary" {
                    "Review registration"
                }
            }
        },
        user,
    )
}

#[get("/register")]
pub async fn register_page(user: Option<User>, db: DbConn) -> Markup {
    db.run(|conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            if registrations_disabled(conn)? {
                return Ok(registrations_closed_page(user));
            }
            Ok(registration_form_page(None, None, user))
        })
        .unwrap()
    })
    .await
}

fn hidden_fields(form: &RegistrationForm) -> Markup {
    maud::html! {
        input type="hidden" name="contact_email" value=(form.contact_email);
        @if let Some(code) = form.promo_code() {
            input type="hidden" name="promo_code" value=(code);
        }
        @for (i, entry) in form.filled_participants().iter().enumerate() {
            input type="hidden"
                name=(format!("participants[{i}].full_name"))
                value=(entry.full_name);
            input type="hidden"
                name=(format!("participants[{i}].email"))
                value=(entry.email);
            input type="hidden"
                name=(format!("participants[{i}].participant_type"))
                value=(entry.participant_type);
        }
    }
}

/// The review step: nothing is written yet, the submitted form is echoed
/// back alongside the price breakdown for confirmation.
#[post("/register/review", data = "<form>")]
pub async fn review_registration(
    user: Option<User>,
    form: Form<RegistrationForm>,
    db: DbConn,
) -> Markup {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            if registrations_disabled(conn)? {
                return Ok(registrations_closed_page(user));
            }

            let entries = match form.validate() {
                Ok(entries) => entries,
                Err(msg) => {
                    return Ok(registration_form_page(
                        Some(&form),
                        Some(msg),
                        user,
                    ))
                }
            };

            let quote = match quote(conn, &entries, form.promo_code())? {
                Ok(quote) => quote,
                Err(msg) => {
                    return Ok(registration_form_page(
                        Some(&form),
                        Some(msg),
                        user,
                    ))
                }
            };

            Ok(page_of_body(
                maud::html! {
                    (page_title("Review your registration"))
                    table class="table" {
                        thead {
                            tr {
                                th scope="col" { "Name" }
                                th scope="col" { "Email" }
                                th scope="col" { "Type" }
                                th scope="col" { "Price" }
                            }
                        }
                        tbody {
                            @for entry in entries.iter() {
                                tr {
                                    td { (entry.full_name) }
                                    td { (entry.email) }
                                    td { (entry.participant_type) }
                                    td { (price_of(&entry.participant_type)) }
                                }
                            }
                        }
                    }
                    dl class="row" {
                        dt class="col-sm-3" { "Contact email" }
                        dd class="col-sm-9" { (form.contact_email) }
                        dt class="col-sm-3" { "Total" }
                        dd class="col-sm-9" { (quote.total) }
                        @if quote.discount_percent > 0 {
                            dt class="col-sm-3" { "Discount" }
                            dd class="col-sm-9" {
                                (quote.discount_percent) "% ("
                                (quote.promo_code.as_deref().unwrap_or("")) ")"
                            }
                        }
                        dt class="col-sm-3" { "Amount due" }
                        dd class="col-sm-9" { strong { (quote.final_amount) } }
                    }
                    form method="post" action="/register" {
                        (hidden_fields(&form))
                        button type="submit" class="btn btn-primary" {
                            "Confirm registration"
                        }
                        " "
                        a href="/register" class="btn btn-outline-secondary" {
                            "Start over"
                        }
                    }
                },
                user,
            ))
        })
        .unwrap()
    })
    .await
}

#[post("/register", data = "<form>")]
pub async fn do_register(
    user: Option<User>,
    form: Form<RegistrationForm>,
    db: DbConn,
) -> Either<Markup, Flash<Redirect>> {
    let db = Arc::new(db);

    let form = form.into_inner();
    let outcome = db
        .run(move |conn| {
            conn.transaction(
                |conn| -> Result<_, diesel::result::Error> {
                    if registrations_disabled(conn)? {
                        return Ok(Either::Left(registrations_closed_page(
                            user,
                        )));
                    }

                    let entries = match form.validate() {
                        Ok(entries) => entries,
                        Err(msg) => {
                            return Ok(Either::Left(registration_form_page(
                                Some(&form),
                                Some(msg),
                                user,
                            )))
                        }
                    };

                    let quote =
                        match quote(conn, &entries, form.promo_code())? {
                            Ok(quote) => quote,
                            Err(msg) => {
                                return Ok(Either::Left(
                                    registration_form_page(
                                        Some(&form),
                                        Some(msg),
                                        user,
                                    ),
                                ))
                            }
                        };

                    // the number space is large enough that collisions are
                    // rare; regenerate rather than fail when one happens
                    let number = loop {
                        let candidate = new_registration_number();
                        let taken = diesel::select(diesel::dsl::exists(
                            registrations::table.filter(
                                registrations::registration_number
                                    .eq(&candidate),
                            ),
                        ))
                        .get_result::<bool>(conn)?;
                        if !taken {
                            break candidate;
                        }
                    };

                    let registration_id = diesel::insert_into(
                        registrations::table,
                    )
                    .values((
                        registrations::public_id
                            .eq(Uuid::now_v7().to_string()),
                        registrations::registration_number.eq(&number),
                        registrations::payment_status
                            .eq(db::registration::STATUS_PENDING),
                        registrations::final_amount.eq(quote.final_amount),
                        registrations::contact_email.eq(&form.contact_email),
                        registrations::promo_code
                            .eq(quote.promo_code.as_deref()),
                        registrations::created_at.eq(diesel::dsl::now),
                        registrations::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(registrations::id)
                    .get_result::<i64>(conn)?;

                    for entry in &entries {
                        diesel::insert_into(participants::table)
                            .values((
                                participants::public_id
                                    .eq(Uuid::now_v7().to_string()),
                                participants::registration_id
                                    .eq(registration_id),
                                participants::full_name
                                    .eq(entry.full_name.trim()),
                                participants::email.eq(entry.email.trim()),
                                participants::participant_type
                                    .eq(&entry.participant_type),
                            ))
                            .execute(conn)?;
                    }

                    Ok(Either::Right((
                        number,
                        quote.final_amount,
                        form.contact_email.clone(),
                    )))
                },
            )
            .unwrap()
        })
        .await;

    match outcome {
        Either::Left(markup) => Either::Left(markup),
        Either::Right((number, amount, contact_email)) => {
            email::send_mail(
                vec![("MCVU 2025 registrant", contact_email.as_str())],
                "Your MCVU 2025 registration",
                &format!(
                    "<p>Thank you for registering for the MCVU 2025 \
                     Symposium.</p>\
                     <p>Your registration number is <b>{number}</b> and the \
                     amount due is {amount}. You can check your payment \
                     status at any time using your registration number.</p>"
                ),
                &format!(
                    "Thank you for registering for the MCVU 2025 Symposium. \
                     Your registration number is {number} and the amount \
                     due is {amount}."
                ),
                db.clone(),
            )
            .await;

            Either::Right(Flash::success(
                Redirect::to(format!("/status/{number}")),
                "Registration received! We have emailed your registration \
                 number to the contact address.",
            ))
        }
    }
}
