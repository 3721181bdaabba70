use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_page_routes;
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::telemetry;
use admissions::workflows::submission::{
    submission_router, EmailTemplates, FileIntake, IntakePolicy, Mailboxes, SmtpNotifier,
    SubmissionService,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let notifier = SmtpNotifier::from_config(&config.mail)?;
    if !args.skip_relay_check {
        match notifier.verify().await {
            Ok(()) => info!(host = %config.mail.relay_host, "mail relay reachable"),
            Err(err) => warn!(error = %err, "mail relay check failed; sends may fail"),
        }
    }

    tokio::fs::create_dir_all(&config.storage.upload_dir).await?;
    let intake = FileIntake::new(
        config.storage.upload_dir.clone(),
        IntakePolicy {
            sniff_content: config.storage.sniff_content,
            ..IntakePolicy::default()
        },
    );

    let service = Arc::new(SubmissionService::new(
        Arc::new(notifier),
        intake,
        EmailTemplates::new()?,
        Mailboxes {
            from: config.mail.from.clone(),
            admin: config.mail.admin.clone(),
        },
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        static_root: Arc::new(config.storage.static_root.clone()),
    };

    let app = with_page_routes(submission_router(service), &config.storage.static_root)
        .layer(Extension(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        upload_dir = %config.storage.upload_dir.display(),
        "admissions forms ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
