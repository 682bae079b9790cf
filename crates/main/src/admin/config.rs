use db::config::ConfigItem;
use db::{schema::config, user::User, DbConn};
use diesel::prelude::*;
use maud::Markup;
use rocket::form::{Form, FromForm};
use rocket::response::{Flash, Redirect};
use ui::{page_of_body, page_title};
use uuid::Uuid;

use crate::admin::require_admin;
use crate::permissions::check_admin_access;

#[get("/admin/config")]
pub async fn config_page(
    user: Option<User>,
    db: DbConn,
) -> Result<Markup, Flash<Redirect>> {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            let (user, _profile) = match require_admin(check_admin_access(
                user.as_ref(),
                conn,
            )) {
                Ok(t) => t,
                Err(flash) => return Ok(Err(flash)),
            };

            let config_items = config::table
                .order_by(config::key.asc())
                .load::<ConfigItem>(conn)?;

            let markup = maud::html! {
                table class="table" {
                    thead {
                        tr {
                            th scope="col" { "Key" }
                            th scope="col" { "Value" }
                            th scope="col" { "Edit" }
                        }
                    }
                    tbody {
                        @for config in config_items.iter() {
                            tr {
                                td { (config.key) }
                                td { (config.value) }
                                td {
                                    a href=(format!("/admin/config/{}/edit", config.public_id)) {
                                        "Edit"
                                    }
                                }
                            }
                        }
                    }
                }
            };

            let create_form_markup = maud::html! {
                form action="/admin/config/upsert" method="post" {
                    div class="mb-3" {
                        label for="key" class="form-label" { "Key" }
                        input type="text" class="form-control" id="key" name="key" placeholder="key";
                    }
                    div class="mb-3" {
                        label for="value" class="form-label" { "Value" }
                        input type="text" class="form-control" id="value" name="value" placeholder="value";
                    }
                    button type="submit" class="btn btn-primary" { "Add Item" }
                }
            };

            Ok(Ok(page_of_body(
                maud::html! {
                    (page_title("Site configuration"))
                    p {
                        a href="/admin" { "Back to the dashboard" }
                    }
                    h2 { "Current config items" }
                    (markup)
                    h2 { "Add new config item" }
                    (create_form_markup)
                },
                Some(user),
            )))
        })
        .unwrap()
    })
    .await
}

#[get("/admin/config/<config_id>/edit")]
pub async fn edit_config_item_page(
    db: DbConn,
    user: Option<User>,
    config_id: &str,
) -> Result<Option<Markup>, Flash<Redirect>> {
    let config_id = config_id.to_string();

    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            let (user, _profile) = match require_admin(check_admin_access(
                user.as_ref(),
                conn,
            )) {
                Ok(t) => t,
                Err(flash) => return Ok(Err(flash)),
            };

            let config_item = config::table
                .filter(config::public_id.eq(config_id))
                .first::<ConfigItem>(conn)
                .optional()?;

            let config_item = match config_item {
                Some(item) => item,
                None => return Ok(Ok(None)),
            };

            let markup = maud::html! {
                form action=("/admin/config/upsert") method="post" {
                    div class="mb-3" {
                        label for="key" class="form-label" { "Key" }
                        input type="text" class="form-control" id="key" name="key" value=(config_item.key) readonly="readonly";
                    }
                    div class="mb-3" {
                        label for="value" class="form-label" { "Value" }
                        input type="text" class="form-control" id="value" name="value" value=(config_item.value);
                    }
                    button type="submit" class="btn btn-primary" { "Save changes" }
                }
            };

            Ok(Ok(Some(page_of_body(
                maud::html! {
                    (page_title("Edit config item"))
                    (markup)
                },
                Some(user),
            ))))
        })
        .unwrap()
    })
    .await
}

#[derive(FromForm)]
pub struct UpsertConfigForm {
    key: String,
    value: String,
}

#[post("/admin/config/upsert", data = "<form>")]
pub async fn do_upsert_config(
    db: DbConn,
    user: Option<User>,
    form: Form<UpsertConfigForm>,
) -> Result<Redirect, Flash<Redirect>> {
    db.run(move |conn| {
        conn.transaction(|conn| -> Result<_, diesel::result::Error> {
            if let Err(flash) =
                require_admin(check_admin_access(user.as_ref(), conn))
            {
                return Ok(Err(flash));
            }

            let n_updated = diesel::insert_into(config::table)
                .values((
                    config::public_id.eq(Uuid::now_v7().to_string()),
                    config::key.eq(&form.key),
                    config::value.eq(&form.value),
                ))
                .on_conflict(config::key)
                .do_update()
                .set(config::value.eq(&form.value))
                .execute(conn)?;
            assert_eq!(n_updated, 1);

            Ok(Ok(Redirect::to("/admin/config")))
        })
        .unwrap()
    })
    .await
}
