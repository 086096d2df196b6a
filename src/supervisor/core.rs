use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::component::Component;
use super::errors::{ComponentError, SupervisorError};

// ============================================================================
// Supervisor - owns the lifetime of the health reporter and stream worker
// ============================================================================
//
//   Starting ──► Running ──► Stopping ──► Stopped
//
// Running ends on a shutdown request, an explicit cancel, or the first
// component error that is not shutdown-expected. Stopping cancels every
// component and waits for them up to the grace period; whatever is still
// running after that is aborted. Components are never restarted here.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How long components get to return after cancellation.
    pub grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(5),
        }
    }
}

/// Non-fatal findings collected while stopping.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub teardown_errors: Vec<(&'static str, ComponentError)>,
    pub grace_exceeded: Vec<&'static str>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.teardown_errors.is_empty() && self.grace_exceeded.is_empty()
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    token: CancellationToken,
    state: watch::Sender<SupervisorState>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let (state, _) = watch::channel(SupervisorState::Starting);
        Self {
            config,
            token: CancellationToken::new(),
            state,
        }
    }

    /// Cancelling this token stops the supervisor like a shutdown signal would.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SupervisorState) {
        let previous = self.state.send_replace(next);
        tracing::info!(from = ?previous, to = ?next, "Supervisor state changed");
    }

    /// Run `components` concurrently until `shutdown` resolves, the token is
    /// cancelled, or a component fails.
    pub async fn run<S>(
        self,
        components: Vec<Box<dyn Component>>,
        shutdown: S,
    ) -> Result<ShutdownReport, SupervisorError>
    where
        S: Future<Output = std::io::Result<()>>,
    {
        let mut set = JoinSet::new();
        let mut names = HashMap::new();

        for component in components {
            let name = component.name();
            let token = self.token.child_token();
            let handle = set.spawn(async move { component.run(token).await });
            names.insert(handle.id(), name);
            tracing::info!(component = name, "Started component");
        }
        self.transition(SupervisorState::Running);

        let mut report = ShutdownReport::default();
        let mut failure = None;
        tokio::pin!(shutdown);

        while !set.is_empty() {
            tokio::select! {
                signal = &mut shutdown => {
                    match signal {
                        Ok(()) => tracing::info!("Shutdown requested"),
                        Err(e) => {
                            tracing::error!(error = %e, "Could not wait for shutdown signal");
                            failure = Some(SupervisorError::Signal(e));
                        }
                    }
                    break;
                }
                _ = self.token.cancelled() => {
                    tracing::info!("Supervisor cancelled");
                    break;
                }
                Some(joined) = set.join_next_with_id() => {
                    if let Some(err) = settle(joined, &mut names, &mut report) {
                        failure = Some(err);
                        break;
                    }
                }
            }
        }

        self.transition(SupervisorState::Stopping);
        self.token.cancel();

        let deadline = Instant::now() + self.config.grace;
        loop {
            match tokio::time::timeout_at(deadline, set.join_next_with_id()).await {
                Ok(None) => break,
                Ok(Some(joined)) => {
                    if let Some(err) = settle(joined, &mut names, &mut report) {
                        failure.get_or_insert(err);
                    }
                }
                Err(_) => {
                    let stuck: Vec<&'static str> = names.values().copied().collect();
                    tracing::error!(
                        grace = ?self.config.grace,
                        stuck = ?stuck,
                        "Components did not stop within grace period, aborting"
                    );
                    set.abort_all();
                    report.grace_exceeded = stuck;
                    break;
                }
            }
        }

        self.transition(SupervisorState::Stopped);
        match failure {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

/// Record one finished component. Returns the error if it is fatal.
fn settle(
    joined: Result<(task::Id, Result<(), ComponentError>), JoinError>,
    names: &mut HashMap<task::Id, &'static str>,
    report: &mut ShutdownReport,
) -> Option<SupervisorError> {
    let (id, result) = match joined {
        Ok((id, result)) => (id, result),
        Err(e) if e.is_cancelled() => (e.id(), Err(ComponentError::Canceled)),
        Err(e) => (e.id(), Err(ComponentError::Panicked(e.to_string()))),
    };
    let component = names.remove(&id).unwrap_or("unknown");

    match result {
        Ok(()) => {
            tracing::info!(component, "Component stopped");
            None
        }
        Err(e) if e.is_shutdown_expected() => {
            tracing::info!(component, reason = e.as_label(), "Component stopped on shutdown");
            None
        }
        Err(e) if e.is_teardown() => {
            tracing::error!(component, error = %e, "Component shutdown failed");
            report.teardown_errors.push((component, e));
            None
        }
        Err(source) => {
            tracing::error!(component, reason = source.as_label(), error = %source, "Component failed");
            Some(SupervisorError::ComponentFailed { component, source })
        }
    }
}
