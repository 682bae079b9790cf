use main::make_rocket;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

fn main() {
    // the guard must outlive the server so buffered events are flushed
    let _sentry = sentry::init((
        std::env::var("SENTRY_DSN").ok(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ));

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    rocket::execute(async {
        if let Err(error) = make_rocket("mcvu.db").launch().await {
            tracing::error!("server failed to launch: {error}");
        }
    });
}
