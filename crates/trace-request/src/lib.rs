//! Assigns every request an ID and wraps it in a `tracing` span, tagging
//! the sentry scope so errors can be tied back to a request.

use rocket::{
    Data, Response,
    fairing::{Fairing, Info, Kind},
    http::Status,
    request::{self, FromRequest, Request},
};
use sentry::configure_scope;
use tracing::Span;
use uuid::Uuid;

/// A type that represents a request's ID.
#[derive(Clone)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the current request's ID, assigning one only as necessary.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestId {
    type Error = ();

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, Self::Error> {
        // `local_cache` runs the closure at most once per request, so a
        // request keeps the same ID however many guards ask for it.
        request::Outcome::Success(
            request
                .local_cache(|| {
                    RequestId(
                        request
                            .headers()
                            .get_one("X-Request-Id")
                            .map(ToString::to_string)
                            .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    )
                })
                .clone(),
        )
    }
}

pub struct TracingSpan<T = tracing::Span>(pub T);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TracingSpan {
    type Error = ();

    async fn from_request(
        request: &'r Request<'_>,
    ) -> rocket::request::Outcome<Self, ()> {
        match request.local_cache(|| TracingSpan::<Option<Span>>(None)) {
            TracingSpan(Some(span)) => {
                rocket::request::Outcome::Success(TracingSpan(span.to_owned()))
            }
            TracingSpan(None) => rocket::request::Outcome::Error((
                Status::InternalServerError,
                (),
            )),
        }
    }
}

pub struct RequestIdFairing;

#[rocket::async_trait]
impl Fairing for RequestIdFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request ID fairing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let request_id = req.guard::<RequestId>().await;

        let _ = request_id.map(|request_id| {
            let span = tracing::info_span!(
                "request",
                http.method = %req.method(),
                http.uri = %req.uri().path(),
                http.status_code = tracing::field::Empty,
                http.request_id = %request_id,
            );
            span.in_scope(|| {
                tracing::info!("received request");
                configure_scope(|scope| {
                    scope.set_transaction(Some(&request_id.to_string()));
                });
            });
            req.local_cache(|| {
                TracingSpan::<Option<tracing::Span>>(Some(span))
            });
        });
    }

    async fn on_response<'r>(
        &self,
        req: &'r Request<'_>,
        res: &mut Response<'r>,
    ) {
        let request_id = req.guard::<RequestId>().await;

        if let Some(span) = req
            .local_cache(|| TracingSpan::<Option<Span>>(None))
            .0
            .to_owned()
        {
            let entered = span.entered();
            entered.record("http.status_code", res.status().code);

            let _ = request_id.as_ref().map(|request_id| {
                tracing::info!(
                    "returning request {} with {}",
                    request_id,
                    res.status()
                );
            });

            entered.exit();
        }

        let _ = request_id.map(|request_id| {
            res.set_raw_header("X-Request-Id", request_id.to_string())
        });
    }
}
