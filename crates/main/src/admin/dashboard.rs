use db::{
    admin::AdminProfile,
    check_in::CheckIn,
    participant::Participant,
    promotion::Promotion,
    registration::Registration,
    schema::{
        admin_profiles, check_ins, participants, promotions, registrations,
        transactions,
    },
    transaction::Transaction,
    user::User,
    DbConn,
};
use diesel::{connection::LoadConnection, prelude::*, sqlite::Sqlite};
use maud::{html, Markup};
use rocket::response::{Flash, Redirect};
use ui::{page_of_body, page_title};

use crate::admin::require_admin;
use crate::permissions::check_admin_access;

const TABS: &[(&str, &str)] = &[
    ("overview", "Overview"),
    ("participants", "Participants"),
    ("payments", "Payments"),
    ("checkin", "Check-in"),
    ("promotions", "Promotions"),
    ("sponsor-letters", "Sponsor letters"),
    ("admins", "Admins"),
];

fn tab_nav(active: &str) -> Markup {
    html! {
        ul class="nav nav-tabs mb-4" {
            @for (key, label) in TABS {
                li class="nav-item" {
                    @if *key == active {
                        a class="nav-link active" href=(format!("/admin?tab={key}")) { (label) }
                    } @else {
                        a class="nav-link" href=(format!("/admin?tab={key}")) { (label) }
                    }
                }
            }
            li class="nav-item" {
                a class="nav-link" href="/admin/config" { "Site config" }
            }
        }
    }
}

fn status_badge(status: &str) -> Markup {
    let class = match status {
        "verified" => "badge text-bg-success",
        "pending" => "badge text-bg-warning",
        _ => "badge text-bg-danger",
    };
    html! {
        span class=(class) { (status) }
    }
}

/// The tab state drives which management view is mounted; everything is
/// rendered server-side from a single transaction.
#[get("/admin?<tab>")]
pub async fn dashboard_page(
    user: Option<User>,
    tab: Option<String>,
    db: DbConn,
) -> Result<Markup, Flash<Redirect>> {
    db.run(move |conn| {
        conn.transaction(
            |conn| -> Result<_, diesel::result::Error> {
                let (user, _profile) = match require_admin(
                    check_admin_access(user.as_ref(), conn),
                ) {
                    Ok(t) => t,
                    Err(flash) => return Ok(Err(flash)),
                };

                let tab = tab.as_deref().unwrap_or("overview");
                let body = match tab {
                    "participants" => participants_tab(conn)?,
                    "payments" => payments_tab(conn)?,
                    "checkin" => checkin_tab(conn)?,
                    "promotions" => promotions_tab(conn)?,
                    "sponsor-letters" => sponsor_letters_tab(conn)?,
                    "admins" => admins_tab(conn)?,
                    _ => overview_tab(conn)?,
                };

                Ok(Ok(page_of_body(
                    html! {
                        (page_title("MCVU 2025 admin dashboard"))
                        (tab_nav(tab))
                        (body)
                    },
                    Some(user),
                )))
            },
        )
        .unwrap()
    })
    .await
}

fn overview_tab(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> Result<Markup, diesel::result::Error> {
    let total: i64 = registrations::table.count().get_result(conn)?;
    let verified: i64 = registrations::table
        .filter(registrations::payment_status.eq("verified"))
        .count()
        .get_result(conn)?;
    let participant_count: i64 =
        participants::table.count().get_result(conn)?;
    let checked_in: i64 = check_ins::table.count().get_result(conn)?;

    let recent: Vec<Registration> = registrations::table
        .order_by(registrations::created_at.desc())
        .limit(10)
        .load(conn)?;

    Ok(html! {
        div class="row mb-4" {
            @for (label, value) in [
                ("Registrations", total),
                ("Verified", verified),
                ("Participants", participant_count),
                ("Checked in", checked_in),
            ] {
                div class="col" {
                    div class="card text-center" {
                        div class="card-body" {
                            h2 { (value) }
                            p class="text-muted" { (label) }
                        }
                    }
                }
            }
        }
        h2 { "Recent registrations" }
        table class="table" {
            thead {
                tr {
                    th scope="col" { "Number" }
                    th scope="col" { "Status" }
                    th scope="col" { "Amount" }
                    th scope="col" { "Created" }
                }
            }
            tbody {
                @for registration in recent.iter() {
                    tr {
                        td { (registration.registration_number) }
                        td { (status_badge(&registration.payment_status)) }
                        td { (registration.final_amount) }
                        td { (registration.created_at) }
                    }
                }
            }
        }
    })
}

fn participants_tab(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> Result<Markup, diesel::result::Error> {
    let rows: Vec<(Participant, Registration)> = participants::table
        .inner_join(registrations::table)
        .order_by(registrations::created_at.desc())
        .load(conn)?;

    Ok(html! {
        h2 { "Participants" }
        table class="table" {
            thead {
                tr {
                    th scope="col" { "Name" }
                    th scope="col" { "Email" }
                    th scope="col" { "Type" }
                    th scope="col" { "Registration" }
                    th scope="col" { "Payment" }
                }
            }
            tbody {
                @for (participant, registration) in rows.iter() {
                    tr {
                        td { (participant.full_name) }
                        td { (participant.email) }
                        td { (participant.participant_type) }
                        td { (registration.registration_number) }
                        td { (status_badge(&registration.payment_status)) }
                    }
                }
            }
        }
    })
}

fn payments_tab(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> Result<Markup, diesel::result::Error> {
    let regs: Vec<Registration> = registrations::table
        .order_by(registrations::created_at.desc())
        .load(conn)?;

    let txs: Vec<Transaction> = transactions::table
        .order_by(transactions::created_at.desc())
        .load(conn)?;

    Ok(html! {
        h2 { "Registrations" }
        table class="table" {
            thead {
                tr {
                    th scope="col" { "Number" }
                    th scope="col" { "Status" }
                    th scope="col" { "Amount" }
                    th scope="col" { "Actions" }
                }
            }
            tbody {
                @for registration in regs.iter() {
                    tr {
                        td { (registration.registration_number) }
                        td { (status_badge(&registration.payment_status)) }
                        td { (registration.final_amount) }
                        td {
                            @if registration.payment_status != "verified" {
                                form method="post" action=(format!("/admin/registrations/{}/verify", registration.public_id)) {
                                    button type="submit" class="btn btn-sm btn-success" { "Mark verified" }
                                }
                            }
                        }
                    }
                }
            }
        }
        h2 { "Transactions" }
        table class="table" {
            thead {
                tr {
                    th scope="col" { "Order" }
                    th scope="col" { "Gateway status" }
                    th scope="col" { "Amount" }
                    th scope="col" { "Linked" }
                }
            }
            tbody {
                @for tx in txs.iter() {
                    tr {
                        td { (tx.order_id) }
                        td { (tx.gateway_status) }
                        td { (tx.gross_amount) }
                        td {
                            @if tx.registration_id.is_some() { "yes" } @else { "no" }
                        }
                    }
                }
            }
        }
        h2 { "Match a transaction" }
        form method="post" action="/admin/payments/match" {
            div class="mb-3" {
                label for="registration" class="form-label" { "Registration" }
                select class="form-select" id="registration" name="registration_id" {
                    @for registration in regs.iter() {
                        option value=(registration.public_id) { (registration.registration_number) }
                    }
                }
            }
            div class="mb-3" {
                label for="transaction" class="form-label" { "Transaction" }
                select class="form-select" id="transaction" name="transaction_id" {
                    @for tx in txs.iter() {
                        option value=(tx.public_id) { (tx.order_id) }
                    }
                }
            }
            button type="submit" class="btn btn-primary" { "Match" }
        }
    })
}

fn checkin_tab(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> Result<Markup, diesel::result::Error> {
    let rows: Vec<(Participant, Registration, Option<CheckIn>)> =
        participants::table
            .inner_join(registrations::table)
            .left_join(check_ins::table)
            .order_by(participants::full_name.asc())
            .load(conn)?;

    Ok(html! {
        h2 { "Check-in" }
        table class="table" {
            thead {
                tr {
                    th scope="col" { "Name" }
                    th scope="col" { "Registration" }
                    th scope="col" { "Checked in" }
                    th scope="col" { "" }
                }
            }
            tbody {
                @for (participant, registration, check_in) in rows.iter() {
                    tr {
                        td { (participant.full_name) }
                        td { (registration.registration_number) }
                        td {
                            @match check_in {
                                Some(check_in) => { (check_in.created_at) },
                                None => { "—" },
                            }
                        }
                        td {
                            @if check_in.is_none() {
                                form method="post" action=(format!("/admin/participants/{}/checkin", participant.public_id)) {
                                    button type="submit" class="btn btn-sm btn-primary" { "Check in" }
                                }
                            } @else {
                                form method="post" action=(format!("/admin/participants/{}/undo-checkin", participant.public_id)) {
                                    button type="submit" class="btn btn-sm btn-outline-danger" { "Undo" }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

fn promotions_tab(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> Result<Markup, diesel::result::Error> {
    let promos: Vec<Promotion> = promotions::table
        .order_by(promotions::created_at.desc())
        .load(conn)?;

    Ok(html! {
        h2 { "Promotions" }
        table class="table" {
            thead {
                tr {
                    th scope="col" { "Code" }
                    th scope="col" { "Discount" }
                    th scope="col" { "Active" }
                    th scope="col" { "" }
                }
            }
            tbody {
                @for promo in promos.iter() {
                    tr {
                        td { (promo.code) }
                        td { (promo.discount_percent) "%" }
                        td { @if promo.is_active { "yes" } @else { "no" } }
                        td {
                            form method="post" action=(format!("/admin/promotions/{}/toggle", promo.public_id)) {
                                button type="submit" class="btn btn-sm btn-secondary" {
                                    @if promo.is_active { "Deactivate" } @else { "Activate" }
                                }
                            }
                        }
                    }
                }
            }
        }
        h2 { "Add a promotion" }
        form method="post" action="/admin/promotions/new" {
            div class="mb-3" {
                label for="code" class="form-label" { "Code" }
                input type="text" class="form-control" id="code" name="code" required;
            }
            div class="mb-3" {
                label for="discount_percent" class="form-label" { "Discount (percent)" }
                input type="number" class="form-control" id="discount_percent" name="discount_percent" min="0" max="100" required;
            }
            button type="submit" class="btn btn-primary" { "Create" }
        }
    })
}

fn sponsor_letters_tab(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> Result<Markup, diesel::result::Error> {
    let regs: Vec<Registration> = registrations::table
        .filter(registrations::sponsor_letter_path.is_not_null())
        .order_by(registrations::created_at.desc())
        .load(conn)?;

    Ok(html! {
        h2 { "Sponsor letters" }
        p class="text-muted" {
            "Download links are signed and valid for seven days."
        }
        table class="table" {
            thead {
                tr {
                    th scope="col" { "Registration" }
                    th scope="col" { "Letter" }
                }
            }
            tbody {
                @for registration in regs.iter() {
                    tr {
                        td { (registration.registration_number) }
                        td {
                            @if let Some(path) = &registration.sponsor_letter_path {
                                a href=(format!("/api/sponsor-letter-signed-url?path={path}")) { "Generate link" }
                            }
                        }
                    }
                }
            }
        }
    })
}

fn admins_tab(
    conn: &mut (impl Connection<Backend = Sqlite> + LoadConnection),
) -> Result<Markup, diesel::result::Error> {
    let admins: Vec<AdminProfile> = admin_profiles::table
        .order_by(admin_profiles::created_at.asc())
        .load(conn)?;

    Ok(html! {
        h2 { "Admins" }
        table class="table" {
            thead {
                tr {
                    th scope="col" { "Name" }
                    th scope="col" { "Email" }
                    th scope="col" { "Role" }
                    th scope="col" { "Created" }
                }
            }
            tbody {
                @for admin in admins.iter() {
                    tr {
                        td { (admin.full_name) }
                        td { (admin.email) }
                        td { (admin.role) }
                        td { (admin.created_at) }
                    }
                }
            }
        }
        h2 { "Add an admin" }
        form method="post" action="/admin/admins/new" {
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
            button type="submit" class="btn btn-primary" { "Create admin" }
        }
    })
}
