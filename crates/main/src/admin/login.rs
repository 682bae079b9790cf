use argon2::{Argon2, PasswordHash, PasswordVerifier};
use db::{
    schema::users,
    user::{set_login_cookie, User, LOGIN_COOKIE},
    DbConn,
};
use diesel::prelude::*;
use maud::Markup;
use rocket::{
    form::Form,
    http::CookieJar,
    response::{Flash, Redirect},
};
use serde::Serialize;
use ui::page_of_body;

use crate::permissions::{check_admin_access, AdminAccess};

fn login_form(error: Option<String>) -> Markup {
    maud::html! {
        div class="container" {
            h1 { "Admin login" }
            @if let Some(err) = error {
                div class="alert alert-danger" role="alert" {
                    (err)
                }
            }
            form method="post" action="/admin/login" {
                div class="mb-3" {
                    label for="email" class="form-label" { "Email address" }
                    input type="email" class="form-control" id="email" name="email" placeholder="Enter email";
                }
                div class="mb-3" {
                    label for="password" class="form-label" { "Password" }
                    input type="password" class="form-control" id="password" name="password" placeholder="Password";
                }
                button type="submit" class="btn btn-primary" { "Log in" }
            }
        }
    }
}

#[get("/admin/login?<error>")]
pub async fn login_page(
    user: Option<User>,
    error: Option<String>,
    db: DbConn,
) -> Result<Markup, Flash<Redirect>> {
    // only a full admin is sent on to the dashboard: a session without an
    // admin profile gets the dashboard's redirect straight back here, so
    // bouncing it to /admin again would loop
    let user = match db
        .run(move |conn| check_admin_access(user.as_ref(), conn))
        .await
    {
        AdminAccess::Admin(..) => {
            return Err(Flash::error(
                Redirect::to("/admin"),
                "You are already logged in!",
            ))
        }
        AdminAccess::NotAdmin(user) => Some(user),
        AdminAccess::Anonymous => None,
    };

    let message = error.map(|code| match code.as_str() {
        "unauthorized" => {
            "That account does not have admin access.".to_string()
        }
        other => other.to_string(),
    });

    Ok(page_of_body(login_form(message), user))
}

#[derive(FromForm, Serialize, Debug)]
pub struct AdminLoginForm {
    pub email: String,
    pub password: String,
}

#[post("/admin/login", data = "<form>")]
pub async fn do_login(
    user: Option<User>,
    form: Form<AdminLoginForm>,
    jar: &CookieJar<'_>,
    db: DbConn,
) -> Result<Redirect, Markup> {
    if user.is_some() {
        return Ok(Redirect::to("/admin"));
    }

    let (ret, set_cookie) = db
        .run(move |conn| {
            let user: Option<User> = users::table
                .filter(User::with_email(&form.email))
                .first::<User>(conn)
                .optional()
                .unwrap();

            let user = match user {
                Some(user) => user,
                None => {
                    return (
                        Err(page_of_body(
                            login_form(Some(
                                "No account with that email.".to_string(),
                            )),
                            None,
                        )),
                        None,
                    )
                }
            };

            let hash = match &user.password_hash {
                Some(hash) => hash.clone(),
                None => {
                    return (
                        Err(page_of_body(
                            login_form(Some(
                                "That account has no password set."
                                    .to_string(),
                            )),
                            None,
                        )),
                        None,
                    )
                }
            };

            let parsed_hash = PasswordHash::new(&hash).unwrap();
            if Argon2::default()
                .verify_password(form.password.as_bytes(), &parsed_hash)
                .is_err()
            {
                return (
                    Err(page_of_body(
                        login_form(Some("Incorrect password.".to_string())),
                        None,
                    )),
                    None,
                );
            }

            match check_admin_access(Some(&user), conn) {
                AdminAccess::Admin(user, _) => {
                    (Ok(Redirect::to("/admin")), Some(user.id))
                }
                _ => (
                    Ok(Redirect::to("/admin/login?error=unauthorized")),
                    None,
                ),
            }
        })
        .await;

    if let Some(id) = set_cookie {
        set_login_cookie(id, jar);
    }
    ret
}

#[get("/admin/logout")]
pub async fn logout(jar: &CookieJar<'_>) -> Redirect {
    jar.remove_private(LOGIN_COOKIE);
    Redirect::to("/")
}
