//! End-to-end tests of the public registration flow, the admin dashboard
//! and the JSON API, run against a throwaway SQLite database.

use db::{
    check_in::CheckIn,
    participant::Participant,
    registration::Registration,
    schema::{
        admin_profiles, check_ins, participants, promotions, registrations,
        scheduled_checks, transactions, users,
    },
    transaction::Transaction,
    user::User,
};
use diesel::prelude::*;
use diesel::SqliteConnection;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::Client;
use uuid::Uuid;

use crate::make_rocket;

const CRON_SECRET: &str = "test-cron-secret";
const GATEWAY_SERVER_KEY: &str = "test-server-key";

fn get_test_rocket_instance(
) -> (rocket::local::blocking::Client, SqliteConnection) {
    use std::sync::Arc;

    use diesel::{Connection, RunQueryDsl};

    // process-global; every test uses the same values so races are harmless
    std::env::set_var("CRON_SECRET", CRON_SECRET);
    std::env::set_var("GATEWAY_SERVER_KEY", GATEWAY_SERVER_KEY);
    std::env::set_var("SIGNED_URL_SECRET", "test-signing-secret");
    std::env::set_var("SITE_URL", "http://localhost:8000");

    let db_name = Arc::new(format!("{}.db", Uuid::now_v7()));

    let mut conn = diesel::SqliteConnection::establish(&db_name.to_string())
        .expect("Database connection failed");
    diesel::sql_query("PRAGMA journal_mode=WAL")
        .execute(&mut conn)
        .expect("Failed to enable WAL mode");
    diesel::sql_query("PRAGMA foreign_keys=ON")
        .execute(&mut conn)
        .expect("Failed to enable foreign keys");
    diesel::sql_query("pragma synchronous = off;")
        .execute(&mut conn)
        .expect("Failed to disable sync commit");

    let rocket = make_rocket(&db_name.clone());
    (Client::tracked(rocket).unwrap(), conn)
}

const ADMIN_EMAIL: &str = "committee@example.com";
const ADMIN_PASSWORD: &str = "random@string123!!:";

fn create_admin_and_login(client: &Client) {
    let response = client
        .post("/admin/setup")
        .header(ContentType::Form)
        .body(
            serde_urlencoded::to_string([
                ("full_name", "Committee Chair"),
                ("email", ADMIN_EMAIL),
                ("password", ADMIN_PASSWORD),
                ("password2", ADMIN_PASSWORD),
            ])
            .unwrap(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let response = client
        .post("/admin/login")
        .header(ContentType::Form)
        .body(
            serde_urlencoded::to_string([
                ("email", ADMIN_EMAIL),
                ("password", ADMIN_PASSWORD),
            ])
            .unwrap(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/admin"));
}

/// Submits a minimal one-participant registration and returns the
/// registration number it was redirected to.
fn register_one_participant(client: &Client) -> String {
    let response = client
        .post("/register")
        .header(ContentType::Form)
        .body(
            serde_urlencoded::to_string([
                ("contact_email", "attendee@example.com"),
                ("participants[0].full_name", "Dr. Example"),
                ("participants[0].email", "attendee@example.com"),
                ("participants[0].participant_type", "general"),
            ])
            .unwrap(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let location = response.headers().get_one("Location").unwrap();
    location.strip_prefix("/status/").unwrap().to_string()
}

#[test]
fn admin_pages_require_login() {
    let (client, _conn) = get_test_rocket_instance();

    for path in ["/admin", "/admin?tab=payments", "/admin/config"] {
        let response = client.get(path).dispatch();
        assert_eq!(response.status(), Status::SeeOther, "{path}");
        assert_eq!(
            response.headers().get_one("Location"),
            Some("/admin/login"),
            "{path}"
        );
    }
}

#[test]
fn first_admin_setup_then_login() {
    let (client, mut conn) = get_test_rocket_instance();

    create_admin_and_login(&client);

    let user_count: i64 = users::table.count().get_result(&mut conn).unwrap();
    assert_eq!(user_count, 1);
    let admin_count: i64 = admin_profiles::table
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(admin_count, 1);

    let response = client.get("/api/admin/session").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: serde_json::Value =
        serde_json::from_str(&response.into_string().unwrap()).unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["is_admin"], true);

    let response = client.get("/admin").dispatch();
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn setup_is_locked_after_the_first_admin() {
    let (client, mut conn) = get_test_rocket_instance();

    create_admin_and_login(&client);

    let response = client
        .post("/admin/setup")
        .header(ContentType::Form)
        .body(
            serde_urlencoded::to_string([
                ("full_name", "Imposter"),
                ("email", "imposter@example.com"),
                ("password", "hunter222"),
                ("password2", "hunter222"),
            ])
            .unwrap(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let user_count: i64 = users::table.count().get_result(&mut conn).unwrap();
    assert_eq!(user_count, 1);
}

#[test]
fn registration_creates_pending_registration() {
    let (client, mut conn) = get_test_rocket_instance();

    let number = register_one_participant(&client);
    assert!(number.starts_with("MCVU25-"));

    let registration: Registration = registrations::table
        .filter(Registration::with_number(&number))
        .first(&mut conn)
        .unwrap();
    assert_eq!(registration.payment_status, "pending");
    assert_eq!(registration.final_amount, 750_000);
    assert_eq!(registration.contact_email, "attendee@example.com");

    let participant_rows: Vec<Participant> = participants::table
        .filter(Participant::of_registration(registration.id))
        .load(&mut conn)
        .unwrap();
    assert_eq!(participant_rows.len(), 1);
    assert_eq!(participant_rows[0].full_name, "Dr. Example");

    let response = client.get(format!("/status/{number}")).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains(&number));
}

#[test]
fn promotion_codes_discount_the_total() {
    let (client, mut conn) = get_test_rocket_instance();

    diesel::insert_into(promotions::table)
        .values((
            promotions::public_id.eq(Uuid::now_v7().to_string()),
            promotions::code.eq("CARDIO10"),
            promotions::discount_percent.eq(10),
            promotions::is_active.eq(true),
            promotions::created_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)
        .unwrap();

    let response = client
        .post("/register")
        .header(ContentType::Form)
        .body(
            serde_urlencoded::to_string([
                ("contact_email", "group@example.com"),
                ("promo_code", "cardio10"),
                ("participants[0].full_name", "Dr. One"),
                ("participants[0].email", "one@example.com"),
                ("participants[0].participant_type", "general"),
                ("participants[1].full_name", "Dr. Two"),
                ("participants[1].email", "two@example.com"),
                ("participants[1].participant_type", "workshop"),
            ])
            .unwrap(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let registration: Registration = registrations::table
        .order_by(registrations::created_at.desc())
        .first(&mut conn)
        .unwrap();
    // (750_000 + 1_250_000) less 10%
    assert_eq!(registration.final_amount, 1_800_000);
    assert_eq!(registration.promo_code.as_deref(), Some("CARDIO10"));
}

#[test]
fn unknown_promotion_codes_are_rejected() {
    let (client, mut conn) = get_test_rocket_instance();

    let response = client
        .post("/register")
        .header(ContentType::Form)
        .body(
            serde_urlencoded::to_string([
                ("contact_email", "someone@example.com"),
                ("promo_code", "NOSUCHCODE"),
                ("participants[0].full_name", "Dr. Example"),
                ("participants[0].email", "someone@example.com"),
                ("participants[0].participant_type", "general"),
            ])
            .unwrap(),
        )
        .dispatch();
    // re-renders the form rather than redirecting to a status page
    assert_eq!(response.status(), Status::Ok);

    let count: i64 =
        registrations::table.count().get_result(&mut conn).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn cron_endpoints_require_the_bearer_secret() {
    let (client, _conn) = get_test_rocket_instance();

    let response = client.get("/api/cron/process-payments").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    let response = client
        .get("/api/cron/process-payments")
        .header(Header::new("Authorization", "Bearer wrong-secret"))
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    let response = client
        .get("/api/cron/process-payments")
        .header(Header::new(
            "Authorization",
            format!("Bearer {CRON_SECRET}"),
        ))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = client
        .get("/api/cron/process-scheduled-tasks")
        .header(Header::new(
            "Authorization",
            format!("Bearer {CRON_SECRET}"),
        ))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn notifications_with_bad_signatures_are_rejected() {
    let (client, mut conn) = get_test_rocket_instance();

    let response = client
        .post("/api/payments/notification")
        .header(ContentType::JSON)
        .body(
            serde_json::json!({
                "order_id": "ORDER-1",
                "transaction_status": "settlement",
                "gross_amount": 750_000,
                "signature": "not-the-right-signature",
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    let count: i64 =
        transactions::table.count().get_result(&mut conn).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn settlement_notification_verifies_the_registration() {
    let (client, mut conn) = get_test_rocket_instance();

    let number = register_one_participant(&client);

    let signature =
        payments::notification_signature("ORDER-2", 750_000, GATEWAY_SERVER_KEY);
    let response = client
        .post("/api/payments/notification")
        .header(ContentType::JSON)
        .body(
            serde_json::json!({
                "order_id": "ORDER-2",
                "transaction_status": "settlement",
                "gross_amount": 750_000,
                "signature": signature,
                "registration_number": number,
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let registration: Registration = registrations::table
        .filter(Registration::with_number(&number))
        .first(&mut conn)
        .unwrap();
    assert_eq!(registration.payment_status, "verified");

    let transaction: Transaction = transactions::table
        .filter(Transaction::with_order_id("ORDER-2"))
        .first(&mut conn)
        .unwrap();
    assert_eq!(transaction.registration_id, Some(registration.id));
    assert_eq!(transaction.gateway_status, "settlement");
}

#[test]
fn matching_a_transaction_is_idempotent() {
    let (client, mut conn) = get_test_rocket_instance();

    create_admin_and_login(&client);
    let number = register_one_participant(&client);

    let registration: Registration = registrations::table
        .filter(Registration::with_number(&number))
        .first(&mut conn)
        .unwrap();

    let tx_public_id = Uuid::now_v7().to_string();
    diesel::insert_into(transactions::table)
        .values((
            transactions::public_id.eq(&tx_public_id),
            transactions::order_id.eq("ORDER-3"),
            transactions::gateway_status.eq("settlement"),
            transactions::gross_amount.eq(750_000),
            transactions::created_at.eq(diesel::dsl::now),
            transactions::updated_at.eq(diesel::dsl::now),
        ))
        .execute(&mut conn)
        .unwrap();

    for _ in 0..2 {
        let response = client
            .post("/api/admin/match-transaction")
            .header(ContentType::JSON)
            .body(
                serde_json::json!({
                    "registrationId": registration.public_id,
                    "transactionId": tx_public_id,
                })
                .to_string(),
            )
            .dispatch();
        assert_eq!(response.status(), Status::Ok);

        let transaction: Transaction = transactions::table
            .filter(Transaction::with_order_id("ORDER-3"))
            .first(&mut conn)
            .unwrap();
        assert_eq!(transaction.registration_id, Some(registration.id));

        let registration: Registration = registrations::table
            .filter(Registration::with_number(&number))
            .first(&mut conn)
            .unwrap();
        assert_eq!(registration.payment_status, "verified");
    }
}

#[test]
fn site_config_page_renders_for_admins() {
    let (client, _conn) = get_test_rocket_instance();

    create_admin_and_login(&client);

    let response = client.get("/admin/config").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response
        .into_string()
        .unwrap()
        .contains("Add new config item"));
}

#[test]
fn non_admin_sessions_still_see_the_login_page() {
    let (client, mut conn) = get_test_rocket_instance();

    create_admin_and_login(&client);
    // the session survives but its admin profile is gone
    diesel::delete(admin_profiles::table)
        .execute(&mut conn)
        .unwrap();

    let response = client.get("/admin").dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(
        response.headers().get_one("Location"),
        Some("/admin/login?error=unauthorized")
    );

    // the login page must render for this user, not bounce back to /admin
    let response = client.get("/admin/login?error=unauthorized").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response
        .into_string()
        .unwrap()
        .contains("does not have admin access"));
}

#[test]
fn repeated_pending_notifications_schedule_one_recheck() {
    let (client, mut conn) = get_test_rocket_instance();

    let number = register_one_participant(&client);

    let signature = payments::notification_signature(
        "ORDER-7",
        750_000,
        GATEWAY_SERVER_KEY,
    );
    for _ in 0..2 {
        let response = client
            .post("/api/payments/notification")
            .header(ContentType::JSON)
            .body(
                serde_json::json!({
                    "order_id": "ORDER-7",
                    "transaction_status": "pending",
                    "gross_amount": 750_000,
                    "signature": signature.clone(),
                    "registration_number": number,
                })
                .to_string(),
            )
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
    }

    let count: i64 = scheduled_checks::table
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn reconciliation_applies_the_latest_transaction_last() {
    use chrono::{Duration, Utc};

    let (client, mut conn) = get_test_rocket_instance();

    let number = register_one_participant(&client);
    let registration: Registration = registrations::table
        .filter(Registration::with_number(&number))
        .first(&mut conn)
        .unwrap();

    // a denied attempt mutated before a settled one, inserted in reverse so
    // rowid order and mutation order disagree
    let now = Utc::now().naive_utc();
    diesel::insert_into(transactions::table)
        .values((
            transactions::public_id.eq(Uuid::now_v7().to_string()),
            transactions::order_id.eq("ORDER-8"),
            transactions::gateway_status.eq("settlement"),
            transactions::gross_amount.eq(750_000),
            transactions::registration_id.eq(registration.id),
            transactions::created_at.eq(now - Duration::seconds(120)),
            transactions::updated_at.eq(now),
        ))
        .execute(&mut conn)
        .unwrap();
    diesel::insert_into(transactions::table)
        .values((
            transactions::public_id.eq(Uuid::now_v7().to_string()),
            transactions::order_id.eq("ORDER-9"),
            transactions::gateway_status.eq("deny"),
            transactions::gross_amount.eq(750_000),
            transactions::registration_id.eq(registration.id),
            transactions::created_at.eq(now - Duration::seconds(120)),
            transactions::updated_at.eq(now - Duration::seconds(60)),
        ))
        .execute(&mut conn)
        .unwrap();

    let response = client
        .get("/api/cron/process-payments")
        .header(Header::new(
            "Authorization",
            format!("Bearer {CRON_SECRET}"),
        ))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let registration: Registration = registrations::table
        .filter(Registration::with_number(&number))
        .first(&mut conn)
        .unwrap();
    assert_eq!(registration.payment_status, "verified");
}

#[test]
fn a_failed_admin_profile_insert_leaves_no_orphan_user() {
    use diesel_migrations::MigrationHarness;

    use crate::api::admins::{create_admin, CreateAdminError};

    let db_name = format!("{}.db", Uuid::now_v7());
    let mut conn = SqliteConnection::establish(&db_name).unwrap();
    conn.run_pending_migrations(crate::MIGRATIONS).unwrap();

    // make the profile insert fail after the user insert has succeeded
    diesel::sql_query("ALTER TABLE admin_profiles RENAME TO admin_profiles_x")
        .execute(&mut conn)
        .unwrap();

    let result = create_admin(
        &mut conn,
        "orphan@example.com",
        "password123",
        "Orphan Check",
    );
    assert!(matches!(result, Err(CreateAdminError::Db(_))));

    let user_count: i64 =
        users::table.count().get_result(&mut conn).unwrap();
    assert_eq!(user_count, 0);
}

#[test]
fn creating_an_admin_needs_every_field() {
    let (client, mut conn) = get_test_rocket_instance();

    create_admin_and_login(&client);

    let response = client
        .post("/api/admin/create")
        .header(ContentType::JSON)
        .body(
            serde_json::json!({
                "email": "second@example.com",
                "full_name": "Second Admin",
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let second: Option<User> = users::table
        .filter(User::with_email("second@example.com"))
        .first(&mut conn)
        .optional()
        .unwrap();
    assert!(second.is_none());
}

#[test]
fn checking_in_twice_records_one_check_in() {
    let (client, mut conn) = get_test_rocket_instance();

    create_admin_and_login(&client);
    let number = register_one_participant(&client);

    let registration: Registration = registrations::table
        .filter(Registration::with_number(&number))
        .first(&mut conn)
        .unwrap();
    let participant: Participant = participants::table
        .filter(Participant::of_registration(registration.id))
        .first(&mut conn)
        .unwrap();

    for _ in 0..2 {
        let response = client
            .post(format!(
                "/admin/participants/{}/checkin",
                participant.public_id
            ))
            .dispatch();
        assert_eq!(response.status(), Status::SeeOther);
    }

    let check_in_rows: Vec<CheckIn> = check_ins::table
        .filter(CheckIn::of_participant(participant.id))
        .load(&mut conn)
        .unwrap();
    assert_eq!(check_in_rows.len(), 1);

    let response = client
        .post(format!(
            "/admin/participants/{}/undo-checkin",
            participant.public_id
        ))
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let count: i64 = check_ins::table
        .filter(CheckIn::of_participant(participant.id))
        .count()
        .get_result(&mut conn)
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn signed_url_endpoint_validates_its_input() {
    let (client, _conn) = get_test_rocket_instance();

    create_admin_and_login(&client);

    let response = client.get("/api/sponsor-letter-signed-url").dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let response = client
        .get("/api/sponsor-letter-signed-url?path=../secrets.db")
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let response = client
        .get("/api/sponsor-letter-signed-url?path=letters/a.pdf")
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: serde_json::Value =
        serde_json::from_str(&response.into_string().unwrap()).unwrap();
    let url = body["url"].as_str().unwrap();
    assert!(url.contains("/files/sponsor-letter?path="));
    assert!(url.contains("expires="));
    assert!(url.contains("sig="));
}

#[test]
fn signed_url_endpoint_requires_an_admin() {
    let (client, _conn) = get_test_rocket_instance();

    let response = client
        .get("/api/sponsor-letter-signed-url?path=letters/a.pdf")
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn anonymous_session_endpoint_reports_unauthenticated() {
    let (client, _conn) = get_test_rocket_instance();

    let response = client.get("/api/admin/session").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: serde_json::Value =
        serde_json::from_str(&response.into_string().unwrap()).unwrap();
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["is_admin"], false);
}

#[test]
fn marking_a_registration_verified_from_the_dashboard() {
    let (client, mut conn) = get_test_rocket_instance();

    create_admin_and_login(&client);
    let number = register_one_participant(&client);

    let registration: Registration = registrations::table
        .filter(Registration::with_number(&number))
        .first(&mut conn)
        .unwrap();
    assert_eq!(registration.payment_status, "pending");

    let response = client
        .post(format!(
            "/admin/registrations/{}/verify",
            registration.public_id
        ))
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let registration: Registration = registrations::table
        .filter(Registration::with_number(&number))
        .first(&mut conn)
        .unwrap();
    assert_eq!(registration.payment_status, "verified");
}

#[test]
fn disabling_registrations_closes_the_form() {
    let (client, mut conn) = get_test_rocket_instance();

    diesel::insert_into(db::schema::config::table)
        .values((
            db::schema::config::public_id.eq(Uuid::now_v7().to_string()),
            db::schema::config::key.eq("disable_registrations"),
            db::schema::config::value.eq("true"),
        ))
        .execute(&mut conn)
        .unwrap();

    let response = client.get("/register").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response
        .into_string()
        .unwrap()
        .contains("Registrations are currently closed"));

    let response = client
        .post("/register")
        .header(ContentType::Form)
        .body(
            serde_urlencoded::to_string([
                ("contact_email", "late@example.com"),
                ("participants[0].full_name", "Dr. Late"),
                ("participants[0].email", "late@example.com"),
                ("participants[0].participant_type", "general"),
            ])
            .unwrap(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let count: i64 =
        registrations::table.count().get_result(&mut conn).unwrap();
    assert_eq!(count, 0);
}
