use std::path::PathBuf;

use chrono::Utc;
use db::{
    registration::Registration,
    schema::{participants, registrations, transactions},
    user::User,
    DbConn,
};
use diesel::prelude::*;
use maud::Markup;
use rocket::{
    form::Form,
    fs::{NamedFile, TempFile},
    http::{ContentType, Status},
    request::FlashMessage,
    response::{Flash, Redirect},
};
use ui::{page_of_body_and_flash_msg, page_title};
use uuid::Uuid;

use crate::signed_url;

fn uploads_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),
    )
}

#[get("/status")]
pub async fn status_lookup_page(
    user: Option<User>,
    flash: Option<FlashMessage<'_>>,
) -> Markup {
    page_of_body_and_flash_msg(
        maud::html! {
            (page_title("Check your payment status"))
            form method="post" action="/status" {
                div class="mb-3" {
                    label for="registration_number" class="form-label" {
                        "Registration number"
                    }
                    input type="text" class="form-control"
                        id="registration_number" name="registration_number"
                        placeholder="MCVU25-XXXXXX" required;
                }
                button type="submit" class="btn btn-primary" { "Look up" }
            }
        },
        flash.map(|f| f.message().to_string()),
        user,
    )
}

#[derive(FromForm)]
pub struct StatusLookupForm {
    pub registration_number: String,
}

#[post("/status", data = "<form>")]
pub async fn do_status_lookup(form: Form<StatusLookupForm>) -> Redirect {
    Redirect::to(format!(
        "/status/{}",
        form.registration_number.trim().to_uppercase()
    ))
}

#[get("/status/<number>")]
pub async fn status_page(
    number: String,
    user: Option<User>,
    flash: Option<FlashMessage<'_>>,
    db: DbConn,
) -> Option<Markup> {
    let flash = flash.map(|f| f.message().to_string());

    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            let registration: Registration = match registrations::table
                .filter(Registration::with_number(&number))
                .first(conn)
                .optional()?
            {
                Some(registration) => registration,
                None => return Ok(None),
            };

            let participant_rows: Vec<db::participant::Participant> =
                participants::table
                    .filter(db::participant::Participant::of_registration(
                        registration.id,
                    ))
                    .load(conn)?;

            let paid: i64 = transactions::table
                .filter(
                    transactions::registration_id.eq(registration.id),
                )
                .count()
                .get_result(conn)?;

            let status_alert = match registration.payment_status.as_str() {
                db::registration::STATUS_VERIFIED => maud::html! {
                    div class="alert alert-success" role="alert" {
                        "Your payment has been verified. See you at the symposium!"
                    }
                },
                db::registration::STATUS_PENDING => maud::html! {
                    div class="alert alert-warning" role="alert" {
                        "We have not verified your payment yet."
                        @if paid == 0 {
                            " If you are paying by sponsor, please upload your guarantee letter below."
                        }
                    }
                },
                _ => maud::html! {
                    div class="alert alert-danger" role="alert" {
                        "Your payment was not completed. Please contact the organizing committee."
                    }
                },
            };

            Ok(Some(page_of_body_and_flash_msg(
                maud::html! {
                    (page_title(format!(
                        "Registration {}",
                        registration.registration_number
                    )))
                    (status_alert)
                    dl class="row" {
                        dt class="col-sm-3" { "Payment status" }
                        dd class="col-sm-9" { (registration.payment_status) }
                        dt class="col-sm-3" { "Amount due" }
                        dd class="col-sm-9" { (registration.final_amount) }
                        dt class="col-sm-3" { "Contact email" }
                        dd class="col-sm-9" { (registration.contact_email) }
                        @if let Some(code) = &registration.promo_code {
                            dt class="col-sm-3" { "Promotion" }
                            dd class="col-sm-9" { (code) }
                        }
                    }
                    h2 { "Participants" }
                    ul {
                        @for participant in participant_rows.iter() {
                            li {
                                (participant.full_name)
                                " (" (participant.participant_type) ")"
                            }
                        }
                    }
                    h2 { "Sponsor guarantee letter" }
                    @if registration.sponsor_letter_path.is_some() {
                        p {
                            "A sponsor letter has been uploaded for this registration. "
                            "Uploading another file replaces it."
                        }
                    }
                    form method="post"
                        action=(format!(
                            "/status/{}/sponsor-letter",
                            registration.registration_number
                        ))
                        enctype="multipart/form-data" {
                        div class="mb-3" {
                            input type="file" class="form-control"
                                name="letter" accept="application/pdf"
                                required;
                            div class="form-text" { "PDF only." }
                        }
                        button type="submit" class="btn btn-primary" {
                            "Upload letter"
                        }
                    }
                },
                flash,
                user,
            )))
        })
        .unwrap()
    })
    .await
}

#[derive(FromForm)]
pub struct SponsorLetterForm<'f> {
    pub letter: TempFile<'f>,
}

#[post("/status/<number>/sponsor-letter", data = "<form>")]
pub async fn do_upload_sponsor_letter(
    number: String,
    mut form: Form<SponsorLetterForm<'_>>,
    db: DbConn,
) -> Flash<Redirect> {
    let back = format!("/status/{number}");

    if form.letter.content_type() != Some(&ContentType::PDF) {
        return Flash::error(
            Redirect::to(back),
            "Please upload the letter as a PDF file.",
        );
    }

    let lookup_number = number.clone();
    let registration: Option<Registration> = db
        .run(move |conn| {
            registrations::table
                .filter(Registration::with_number(&lookup_number))
                .first(conn)
                .optional()
                .unwrap()
        })
        .await;

    let registration = match registration {
        Some(registration) => registration,
        None => {
            return Flash::error(
                Redirect::to("/status"),
                "No registration with that number.",
            )
        }
    };

    let relative = format!("letters/{}.pdf", Uuid::now_v7());
    let dest = uploads_dir().join(&relative);
    if let Some(parent) = dest.parent() {
        if let Err(error) = rocket::tokio::fs::create_dir_all(parent).await {
            tracing::error!("could not create uploads directory: {error}");
            return Flash::error(
                Redirect::to(back),
                "Something went wrong storing your letter. Please try again.",
            );
        }
    }

    // copy rather than persist: the temp file may live on another filesystem
    if let Err(error) = form.letter.copy_to(&dest).await {
        tracing::error!("could not store sponsor letter: {error}");
        return Flash::error(
            Redirect::to(back),
            "Something went wrong storing your letter. Please try again.",
        );
    }

    db.run(move |conn| {
        diesel::update(
            registrations::table
                .filter(registrations::id.eq(registration.id)),
        )
        .set((
            registrations::sponsor_letter_path.eq(&relative),
            registrations::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .unwrap()
    })
    .await;

    Flash::success(
        Redirect::to(back),
        "Sponsor letter received. The committee will verify it shortly.",
    )
}

/// Serves a stored sponsor letter. The link must carry a valid, unexpired
/// signature; see [`crate::signed_url`].
#[get("/files/sponsor-letter?<path>&<expires>&<sig>")]
pub async fn download_sponsor_letter(
    path: String,
    expires: i64,
    sig: String,
) -> Result<NamedFile, Status> {
    if !signed_url::is_safe_path(&path) {
        return Err(Status::Forbidden);
    }

    let secret = signed_url::secret_from_env();
    if !signed_url::verify(
        &path,
        expires,
        &sig,
        &secret,
        Utc::now().timestamp(),
    ) {
        return Err(Status::Forbidden);
    }

    NamedFile::open(uploads_dir().join(&path))
        .await
        .map_err(|_| Status::NotFound)
}
