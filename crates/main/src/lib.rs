use admin::{
    actions::{
        do_checkin, do_create_admin_account, do_create_promotion,
        do_match_payment, do_toggle_promotion, do_undo_checkin,
        do_verify_registration,
    },
    config::{config_page, do_upsert_config, edit_config_item_page},
    dashboard::dashboard_page,
    login::{do_login, login_page, logout},
    setup::{do_setup, setup_page},
};
use api::{
    admins::do_create_admin,
    cron::{process_payments, process_scheduled_tasks},
    files::sponsor_letter_signed_url,
    notification::payment_notification,
    session::admin_session,
    stats::{recent_registrations, registration_chart_data},
    transactions::do_match_transaction,
};
use db::{user::User, DbConn};
use diesel_migrations::{
    embed_migrations, EmbeddedMigrations, MigrationHarness,
};
use registration::{
    register::{do_register, register_page, review_registration},
    status::{
        do_status_lookup, do_upload_sponsor_letter, download_sponsor_letter,
        status_lookup_page, status_page,
    },
};
use rocket::{
    fairing::AdHoc,
    figment::{
        util::map,
        value::{Map, Value},
    },
    Build, Rocket,
};
use trace_request::RequestIdFairing;
use ui::{error_404, page_of_body};

pub mod admin;
pub mod api;
pub mod permissions;
pub mod reconcile;
pub mod registration;
pub mod signed_url;
pub mod util;

#[cfg(test)]
pub mod tests;

#[macro_use]
extern crate rocket;

#[get("/")]
fn index(user: Option<User>) -> maud::Markup {
    page_of_body(
        maud::html! {
            div class="text-center" {
                h1 { "MCVU 2025 Symposium" }
                p class="lead" {
                    "Myocardial infarction, Cardiometabolic syndrome and \
                     Vascular disease Update."
                }
                a class="btn btn-primary btn-lg" href="/register" {
                    "Register now"
                }
                " "
                a class="btn btn-outline-primary btn-lg" href="/status" {
                    "Check payment status"
                }
            }
        },
        user,
    )
}

#[catch(404)]
fn not_found() -> maud::Markup {
    error_404::<String>(None, None)
}

pub const MIGRATIONS: EmbeddedMigrations =
    embed_migrations!("../../migrations");

pub fn make_rocket(default_db: &str) -> Rocket<Build> {
    let db: Map<_, Value> = map![
        "url" => std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| default_db.to_string())
            .into(),
        "pool_size" => 10.into(),
        "timeout" => 5.into(),
    ];

    let figment =
        rocket::Config::figment().merge(("databases", map!["database" => db]));

    rocket::custom(figment)
        .attach(DbConn::fairing())
        .attach(AdHoc::try_on_ignite("migrations", |rocket| async move {
            let db_conn = DbConn::get_one(&rocket).await.unwrap();

            let ret: Result<(), Box<dyn std::error::Error + Send + Sync>> =
                db_conn
                    .run(move |conn| {
                        conn.run_pending_migrations(MIGRATIONS)?;
                        Ok(())
                    })
                    .await;

            match ret {
                Ok(_) => Ok(rocket),
                Err(_) => Err(rocket),
            }
        }))
        .mount(
            "/",
            routes![
                index,
                register_page,
                review_registration,
                do_register,
                status_lookup_page,
                do_status_lookup,
                status_page,
                do_upload_sponsor_letter,
                download_sponsor_letter,
                login_page,
                do_login,
                logout,
                setup_page,
                do_setup,
                dashboard_page,
                do_verify_registration,
                do_match_payment,
                do_checkin,
                do_undo_checkin,
                do_create_promotion,
                do_toggle_promotion,
                do_create_admin_account,
                config_page,
                edit_config_item_page,
                do_upsert_config,
                admin_session,
                do_create_admin,
                do_match_transaction,
                recent_registrations,
                registration_chart_data,
                sponsor_letter_signed_url,
                payment_notification,
                process_payments,
                process_scheduled_tasks,
            ],
        )
        .register("/", catchers![not_found])
        .attach(RequestIdFairing)
}
