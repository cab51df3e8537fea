//! `jobweave run`: drive the configured timers until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use jobweave_config::{Config, ConfigValidator, TimerSpec};
use jobweave_core::{set_default_lock_timeout, FnJob, JobLifecycleHook, LifecycleManager, Outcome};
use jobweave_protocols::{Job, StateEvent};
use jobweave_remote::{ClientProxy, LocalClientSession, ServerSession};
use jobweave_scheduling::{ScheduledExecutor, Timer, TokioScheduledExecutor};

/// The job a configured timer runs: log its message.
fn announce(spec: &TimerSpec) -> Arc<dyn Job> {
    let timer = spec.name.clone();
    let message = spec.message.clone();
    Arc::new(FnJob::new(format!("{} job", spec.name), move |_| {
        info!(timer = %timer, "{}", message);
        Ok(Outcome::Complete)
    }))
}

fn build_timers(config: &Config, executor: Arc<dyn ScheduledExecutor>) -> Result<Vec<Arc<Timer>>> {
    config
        .timers
        .iter()
        .map(|spec| {
            let timer = spec
                .build(announce(spec), executor.clone())
                .with_context(|| format!("building timer '{}'", spec.name))?;
            timer.set_stop_timeout(config.scheduling.stop_timeout());
            Ok(Arc::new(timer))
        })
        .collect()
}

/// Export every timer and follow its state through a client proxy.
fn mirror(timers: &[Arc<Timer>]) -> Result<(Arc<LocalClientSession>, Vec<Arc<ClientProxy>>)> {
    let server = Arc::new(ServerSession::new());
    let client = LocalClientSession::new(server.clone());
    let mut proxies = Vec::with_capacity(timers.len());
    for timer in timers {
        let id = server.export(timer.clone())?;
        let Some(proxy) = client.create(id) else {
            warn!(timer = %timer.name(), "No proxy for exported timer");
            continue;
        };
        if let Some(stateful) = proxy.as_stateful() {
            stateful.add_state_listener(Arc::new(|event: &StateEvent| {
                info!(source = %event.source, state = %event.state, "Mirrored state");
            }));
        }
        proxies.push(proxy);
    }
    Ok((client, proxies))
}

pub(crate) async fn run(config: Config, mirrored: bool) -> Result<()> {
    info!("Starting jobweave v{}", env!("CARGO_PKG_VERSION"));

    let validation = ConfigValidator::validate(&config)?;
    for warning in &validation.warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }
    if let Some(error) = validation.into_error() {
        return Err(error).context("invalid configuration");
    }

    set_default_lock_timeout(config.scheduling.lock_timeout());

    let executor: Arc<dyn ScheduledExecutor> = Arc::new(
        TokioScheduledExecutor::current().context("no tokio runtime to schedule on")?,
    );
    let timers = build_timers(&config, executor)?;
    let _mirror = if mirrored { Some(mirror(&timers)?) } else { None };

    let lifecycle = LifecycleManager::new(config.scheduling.stop_timeout() + Duration::from_secs(1));
    for timer in &timers {
        lifecycle
            .register_hook(Arc::new(JobLifecycleHook::new(timer.clone())))
            .await;
    }
    lifecycle.start().await?;
    info!("{} timer(s) running, press Ctrl-C to stop", timers.len());

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutting down");
    lifecycle.stop().await?;
    Ok(())
}
