use crate::cmd::{build_notifiers, connect_database};
use crate::modules::handlers::{
    admin::{check_admin, list_solutions, set_solution},
    bookmark::{add_bookmark, list_bookmarks, remove_bookmark},
    contest::{get_contest, list_contests},
    health, readiness,
    user::{get_preferences, save_preferences},
};
use crate::modules::extract::{USER_EMAIL_HEADER, USER_ID_HEADER};
use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    routing, Router, Server,
};
use clap::Args;
use contest_tracker_libs::{
    ingestion::IngestionCoordinator,
    reminder::ReminderScheduler,
    schedule::PeriodicTask,
    sources::{build_client, default_sources},
    storage::{PgStore, Storage},
};
use std::{env, net::SocketAddr, sync::Arc};
use tokio::{sync::watch, time::Duration};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

#[derive(Debug, Args)]
pub struct ServerArgs {
    #[arg(long)]
    port: Option<u16>,
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u64).range(1..=24 * 365))]
    ingest_interval_hours: u64,
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..=60 * 24 * 365))]
    reminder_interval_minutes: u64,
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    source_timeout_secs: u64,
}

pub async fn run(args: ServerArgs) -> Result<()> {
    let client_url = env::var("CLIENT_URL").unwrap_or_else(|_| {
        tracing::warn!("CLIENT_URL environment variable is not set. Default value `http://localhost:3000` will be used.");
        String::from("http://localhost:3000")
    });
    let origin: HeaderValue = client_url.parse().with_context(|| {
        let message = format!("CLIENT_URL `{}` is not a valid origin", client_url);
        tracing::error!(message);
        message
    })?;

    let pool = connect_database().await?;
    let store = Arc::new(PgStore::new(pool));

    let timeout = Duration::from_secs(args.source_timeout_secs);
    let client = build_client(timeout).with_context(|| {
        let message = "Failed to build HTTP client.";
        tracing::error!(message);
        message
    })?;
    let (email, sms) = build_notifiers(client.clone(), false)?;

    let coordinator = Arc::new(
        IngestionCoordinator::new(default_sources(client), store.clone()).with_timeout(timeout),
    );
    let scheduler = Arc::new(ReminderScheduler::new(store.clone(), email, sms));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingestion_task = PeriodicTask::new(
        coordinator,
        Duration::from_secs(args.ingest_interval_hours * 60 * 60),
    )
    .context("Invalid ingestion interval.")?
    .run_at_startup(true)
    .spawn(shutdown_rx.clone());
    let reminder_task = PeriodicTask::new(
        scheduler,
        Duration::from_secs(args.reminder_interval_minutes * 60),
    )
    .context("Invalid reminder interval.")?
    .spawn(shutdown_rx);

    let app = create_router(store, origin);
    let port = match args.port {
        Some(port) => port,
        None => {
            tracing::warn!("API server will be launched at default port number 8000");
            8000u16
        }
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server start at port {}", port);
    let served = Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    shutdown_tx.send(true).ok();
    let (ingestion, reminder) = tokio::join!(ingestion_task, reminder_task);
    if let Err(e) = ingestion.and(reminder) {
        tracing::error!("periodic task panicked: {:?}", e);
    }

    served.with_context(|| {
        let message = "Failed to bind server.";
        tracing::error!(message);
        message
    })
}

pub fn create_router(store: Arc<dyn Storage>, origin: HeaderValue) -> Router {
    Router::new()
        .route("/health", routing::get(health))
        .route("/api/readiness", routing::get(readiness))
        .route("/api/contests", routing::get(list_contests))
        .route("/api/contests/:id", routing::get(get_contest))
        .route(
            "/api/bookmarks",
            routing::get(list_bookmarks)
                .post(add_bookmark)
                .delete(remove_bookmark),
        )
        .route(
            "/api/users/preferences",
            routing::get(get_preferences).post(save_preferences),
        )
        .route("/api/admin/check", routing::get(check_admin))
        .route(
            "/api/admin/solutions",
            routing::get(list_solutions).post(set_solution),
        )
        .layer(Extension(store))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::exact(origin))
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([
                    CONTENT_TYPE,
                    HeaderName::from_static(USER_ID_HEADER),
                    HeaderName::from_static(USER_EMAIL_HEADER),
                ]),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown.");
}
