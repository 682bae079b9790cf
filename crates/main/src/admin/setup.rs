use db::{schema::admin_profiles, DbConn};
use diesel::prelude::*;
use maud::Markup;
use rocket::{form::Form, response::Redirect};
use serde::Serialize;
use ui::{error_403, page_of_body};

use crate::api::admins::{create_admin, CreateAdminError};

fn setup_page_form(error: Option<String>) -> Markup {
    page_of_body(
        maud::html! {
            @if let Some(err) = error {
                div class="alert alert-danger" role="alert" {
                    (err)
                }
            }
            form method="POST" class="container" action="/admin/setup" {
                div class="mb-3" {
                    label for="full_name" class="form-label" { "Full name" }
                    input type="text" class="form-control" id="full_name" name="full_name" required;
                }
                div class="mb-3" {
                    label for="email" class="form-label" { "Email" }
                    input type="email" class="form-control" id="email" name="email" required;
                }
                div class="mb-3" {
                    label for="password" class="form-label" { "Password" }
                    input type="password" class="form-control" id="password" name="password" required;
                }
                div class="mb-3" {
                    label for="password2" class="form-label" { "Password confirmation" }
                    input type="password" class="form-control" id="password2" name="password2" required;
                }
                button type="submit" class="btn btn-primary" { "Create Admin Account" }
            }
        },
        None,
    )
}

#[get("/admin/setup")]
/// Page to create the first admin account. Only usable while no admin
/// profile exists; afterwards new admins are created from the dashboard.
pub async fn setup_page(db: DbConn) -> Markup {
    db.run(|conn| {
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let admin_count =
                admin_profiles::table.count().get_result::<i64>(conn)?;
            assert!(admin_count >= 0);

            if admin_count > 0 {
                return Ok(error_403(
                    Some(
                        "Error: setup has already been performed!".to_string(),
                    ),
                    None,
                ));
            }

            Ok(setup_page_form(None))
        })
        .unwrap()
    })
    .await
}

#[derive(FromForm, Serialize)]
pub struct SetupForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

#[post("/admin/setup", data = "<form>")]
/// Creates the first admin. This is only permitted while no admin profile
/// exists in the system.
pub async fn do_setup(
    db: DbConn,
    form: Form<SetupForm>,
) -> Result<Redirect, Markup> {
    db.run(move |conn| {
        let admin_count = admin_profiles::table
            .count()
            .get_result::<i64>(conn)
            .unwrap();

        if admin_count > 0 {
            return Err(error_403(
                Some("Error: setup has already been performed!".to_string()),
                None,
            ));
        }

        if form.password != form.password2 {
            return Err(setup_page_form(Some(
                "Error: those passwords do not match!".to_string(),
            )));
        }

        if form.full_name.trim().is_empty() {
            return Err(setup_page_form(Some(
                "Error: please provide your full name.".to_string(),
            )));
        }

        match create_admin(conn, &form.email, &form.password, &form.full_name)
        {
            Ok(_) => Ok(Redirect::to("/admin/login")),
            Err(CreateAdminError::Validation(msg)) => {
                Err(setup_page_form(Some(format!("Error: {msg}."))))
            }
            Err(CreateAdminError::Db(msg)) => {
                Err(setup_page_form(Some(format!("Error: {msg}."))))
            }
        }
    })
    .await
}
