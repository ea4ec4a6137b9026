//! # Lead Pipeline Engine
//!
//! Runs the automation engine as a standalone process: loads pipelines
//! and rules from disk, subscribes the stage-change bridge to the event
//! bus, and drives the periodic scheduler until shutdown.
//!
//! ## Usage
//!
//! ```bash
//! LEAD_PIPELINE__STORAGE__CATALOG_FILE=./data/pipelines.yaml \
//! LEAD_PIPELINE__STORAGE__RULES_FILE=./data/rules.yaml \
//! lead-pipeline
//! ```

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use lead_pipeline::adapters::{
    load_catalog, InMemoryAppointmentBook, InMemoryAutomationRuleRepository,
    InMemoryEventBus, InMemoryExecutionLedger, InMemoryLeadEntryRepository, InMemoryLeadFields,
    InMemoryNotificationSink, InMemoryPipelineCatalog, YamlRuleFile,
};
use lead_pipeline::application::{
    ActionExecutor, AutomationDispatcher, AutomationScheduler, AutomationSchedulerConfig,
    RetryPolicy, StageChangeTriggerBridge, StageTransitionManager, STAGE_CHANGED_EVENT,
};
use lead_pipeline::config::AppConfig;
use lead_pipeline::logging;
use lead_pipeline::ports::{AutomationRuleRepository, EventSubscriber, PipelineCatalog};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);
    config.validate()?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting lead pipeline engine");

    let catalog = match &config.storage.catalog_file {
        Some(path) => {
            info!(path = %path.display(), "loading pipeline catalog");
            Arc::new(load_catalog(path).await?)
        }
        None => Arc::new(InMemoryPipelineCatalog::new()),
    };
    let rules: Arc<dyn AutomationRuleRepository> = match &config.storage.rules_file {
        Some(path) => {
            info!(path = %path.display(), "opening rule file");
            Arc::new(YamlRuleFile::open(path).await?)
        }
        None => Arc::new(InMemoryAutomationRuleRepository::new()),
    };

    let bus = Arc::new(InMemoryEventBus::new());
    let entries = Arc::new(InMemoryLeadEntryRepository::new());
    let transitions = Arc::new(StageTransitionManager::new(
        catalog.clone(),
        entries.clone(),
        bus.clone(),
    ));

    let automation = &config.automation;
    let executor = Arc::new(
        ActionExecutor::new(
            transitions.clone(),
            entries.clone(),
            catalog.clone(),
            Arc::new(InMemoryLeadFields::new()),
            Arc::new(InMemoryAppointmentBook::new()),
            Arc::new(InMemoryNotificationSink::new()),
            Arc::new(InMemoryExecutionLedger::new()),
        )
        .with_retry_policy(RetryPolicy::new(
            automation.retry_max_attempts,
            automation.initial_backoff(),
            automation.max_backoff(),
        ))
        .with_execution_timeout(automation.execution_timeout()),
    );
    let dispatcher = Arc::new(
        AutomationDispatcher::new(rules.clone(), executor)
            .with_evaluation_order(automation.evaluation_order)
            .with_max_cascade_depth(automation.max_cascade_depth)
            .with_max_concurrent_executions(automation.max_concurrent_executions),
    );
    bus.subscribe(
        STAGE_CHANGED_EVENT,
        Arc::new(StageChangeTriggerBridge::new(dispatcher.clone())),
    );

    info!(
        pipelines = catalog.list_pipelines().await?.len(),
        rules = rules.load_all().await?.len(),
        order = ?automation.evaluation_order,
        max_cascade_depth = automation.max_cascade_depth,
        "engine wired"
    );

    if !config.scheduler.enabled {
        info!("scheduler disabled, waiting for shutdown");
        shutdown_signal().await;
        return Ok(());
    }

    let scheduler = Arc::new(AutomationScheduler::new(
        entries,
        catalog,
        transitions,
        dispatcher,
        AutomationSchedulerConfig::default()
            .with_poll_interval(config.scheduler.poll_interval())
            .with_inactivity_days(config.scheduler.inactivity_days)
            .with_refresh_health(config.scheduler.refresh_health),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run(shutdown_rx).await }
    });

    info!(
        poll_interval_secs = config.scheduler.poll_interval_secs,
        "scheduler running, press Ctrl+C to stop"
    );
    shutdown_signal().await;

    info!("shutdown signal received, stopping scheduler");
    if shutdown_tx.send(true).is_err() {
        error!("scheduler already stopped");
    }
    handle.await?;

    info!("lead pipeline engine stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
