// Scheduler binary entry point

use common::bootstrap::{init_database_pool, load_settings, reference_timezone};
use common::clock::{Clock, SystemClock};
use common::db::{EventRepository, EventStore};
use common::dispatcher::Dispatcher;
use common::mail::{MailSender, SmtpMailSender};
use common::scheduler::{PollingScheduler, Scheduler, SchedulerConfig};
use common::telemetry;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings()?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.tracing_endpoint.as_deref(),
    )?;
    info!("Starting email scheduler");

    telemetry::init_metrics(settings.observability.metrics_port)?;

    let timezone = reference_timezone(&settings)?;
    info!(
        database_url = %redact_url(&settings.database.url),
        mail_host = %settings.mail.host,
        mail_port = settings.mail.port,
        timezone = %timezone,
        "Configuration loaded"
    );

    let db_pool = init_database_pool(&settings).await?;
    let store: Arc<dyn EventStore> = Arc::new(EventRepository::new(db_pool.clone()));

    let smtp = SmtpMailSender::new(&settings.mail).map_err(|e| {
        error!(error = %e, "Failed to build SMTP transport");
        e
    })?;
    if smtp.test_connection().await {
        info!("SMTP server reachable");
    } else {
        // Sends will fail and be recorded until the server comes back
        warn!(host = %settings.mail.host, "SMTP server not reachable at startup");
    }
    let sender: Arc<dyn MailSender> = Arc::new(smtp);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(timezone));
    let dispatcher = Dispatcher::new(store.clone(), sender, clock.clone());
    let scheduler = Arc::new(PollingScheduler::new(
        SchedulerConfig::from(&settings.scheduler),
        store,
        dispatcher,
        clock,
    ));
    info!("Polling scheduler created");

    let scheduler_for_shutdown = scheduler.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        scheduler_for_shutdown.stop().await;
    });

    let result = scheduler.start().await;
    if let Err(e) = &result {
        error!(error = %e, "Scheduler error");
    }

    db_pool.close().await;
    telemetry::shutdown_tracer();
    info!("Scheduler stopped");
    result
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM signal, initiating graceful shutdown"),
    }
}

/// Drop the password from a connection URL before logging it
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{}{}:***{}", &url[..scheme_end + 3], user, &url[at..])
        }
        _ => url.to_string(),
    }
}
