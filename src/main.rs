//! acmeter binary.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default config (~/.config/acmeter/config.toml)
//! acmeter
//!
//! # Develop without switching the real appliance
//! acmeter --config ./acmeter.toml --bind 127.0.0.1:8080 --dry-run
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use acmeter::billing::{BillingClock, PaymentTracker, Tariff};
use acmeter::button::ButtonSource;
use acmeter::config::Config;
use acmeter::dashboard::{DashboardServer, DashboardState};
use acmeter::device::{Appliance, HttpAppliance, TemperatureProbe};
use acmeter::display::{DisplaySink, FileSink, LogSink, OutputSerializer, Splash};
use acmeter::ledger::{Ledger, NodeLedger, NotificationFeed, Topics};
use acmeter::logging::init_tracing;
use acmeter::session::{self, SessionController};
use acmeter::shutdown::{ShutdownCoordinator, ShutdownPhase};
use acmeter::state::SharedState;

const TASK_GRACE: Duration = Duration::from_secs(10);

/// Pay-per-use metering for a networked air conditioner
#[derive(Parser, Debug)]
#[command(name = "acmeter")]
#[command(version)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dashboard bind address, overrides `[dashboard] bind_addr`
    #[arg(short, long)]
    bind: Option<String>,

    /// Log power commands instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.dashboard.bind_addr = bind;
    }
    if args.dry_run {
        config.appliance.enabled = false;
    }
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        appliance = %config.appliance.base_url,
        enabled = config.appliance.enabled,
        tick_cost = config.appliance.tick_cost,
        tick_ms = config.appliance.tick_duration_ms,
        rotation = ?config.ledger.rotation,
        "acmeter starting"
    );

    let shared = SharedState::new();
    let tariff = Tariff::from(&config.appliance);

    let sink: Arc<dyn DisplaySink> = match &config.display.frame_path {
        Some(path) => Arc::new(FileSink::new(path.clone(), config.display.render_delay())),
        None => Arc::new(LogSink::new(config.display.render_delay())),
    };
    let display = OutputSerializer::new(sink, shared.clone(), tariff);
    display.splash(Splash::logo());

    let appliance: Arc<dyn Appliance> =
        Arc::new(HttpAppliance::new(&config.appliance).context("Failed to build appliance client")?);
    let topics = Topics::new();
    let ledger: Arc<dyn Ledger> = Arc::new(
        NodeLedger::new(&config.ledger, topics.clone()).context("Failed to build ledger client")?,
    );

    let (session, events) = session::channel();
    let clock = BillingClock::new(tariff.tick_duration, &session);
    let tracker = PaymentTracker::new(
        ledger,
        shared.payment_writer(),
        display.clone(),
        tariff.tick_cost,
        config.ledger.rotation,
        clock,
    );
    let controller = SessionController::new(
        Arc::clone(&appliance),
        tracker,
        shared.status_writer(),
        display.clone(),
        events,
    );

    let coordinator = ShutdownCoordinator::new();
    // Collaborators and the dashboard stop in their own phases, after the
    // session has switched the appliance off.
    let collaborators = ShutdownCoordinator::new();
    let dashboard_stop = ShutdownCoordinator::new();

    let dashboard = DashboardServer::bind(
        &config.dashboard.bind_addr,
        DashboardState {
            shared: shared.clone(),
            session: session.clone(),
            tariff,
        },
    )
    .await
    .context("Failed to start dashboard")?;

    let controller_task = tokio::spawn(controller.run());

    let probe = TemperatureProbe::new(
        Arc::clone(&appliance),
        shared.temperature_writer(),
        display.clone(),
        config.probe.interval(),
    );
    let probe_task = tokio::spawn(probe.run(collaborators.handle()));

    let feed = NotificationFeed::new(&config.ledger, topics);
    let feed_task = tokio::spawn(feed.run(session.clone(), collaborators.handle()));

    let button_task = config.button.device.clone().map(|path| {
        tokio::spawn(ButtonSource::new(path).run(session.clone(), collaborators.handle()))
    });

    let dashboard_task = tokio::spawn(dashboard.run(dashboard_stop.handle()));

    coordinator.wait_for_signal().await;
    tracing::info!("Shutdown requested");

    // No state writes or renders once teardown has begun.
    shared.seal();
    display.close();

    coordinator.advance(ShutdownPhase::StoppingSession);
    match session.shutdown().await {
        Ok(()) => tracing::info!("Session stopped"),
        Err(e) => tracing::error!(error = %e, "Session did not stop cleanly"),
    }
    drop(session);
    await_task(&coordinator, "session controller", controller_task).await;

    coordinator.advance(ShutdownPhase::StoppingCollaborators);
    collaborators.signal();
    await_task(&coordinator, "temperature probe", probe_task).await;
    await_task(&coordinator, "notification feed", feed_task).await;
    if let Some(task) = button_task {
        await_task(&coordinator, "button source", task).await;
    }

    coordinator.advance(ShutdownPhase::ClosingDashboard);
    dashboard_stop.signal();
    match tokio::time::timeout(TASK_GRACE, dashboard_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Dashboard stopped with error"),
        Ok(Err(e)) => tracing::error!(error = %e, "Dashboard task panicked"),
        Err(_) => tracing::warn!("Dashboard did not close in time"),
    }

    coordinator.advance(ShutdownPhase::ClosingDisplay);
    if tokio::time::timeout(TASK_GRACE, display.idle()).await.is_err() {
        tracing::warn!("Display render still in flight at exit");
    }

    coordinator.advance(ShutdownPhase::Complete);
    tracing::info!("acmeter stopped");
    Ok(())
}

async fn await_task(
    coordinator: &ShutdownCoordinator,
    name: &str,
    task: tokio::task::JoinHandle<()>,
) {
    let phase = coordinator.phase();
    match tokio::time::timeout(TASK_GRACE, task).await {
        Ok(Ok(())) => tracing::debug!(?phase, "{} stopped", name),
        Ok(Err(e)) => tracing::error!(?phase, error = %e, "{} task failed", name),
        Err(_) => tracing::warn!(?phase, "{} did not stop in time", name),
    }
}
