use crate::health::HealthError;
use crate::workers::WorkerError;

/// Error returned by a supervised component.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("component canceled")]
    Canceled,

    #[error("component panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl ComponentError {
    /// Errors that are the normal consequence of a shutdown request.
    pub fn is_shutdown_expected(&self) -> bool {
        matches!(
            self,
            ComponentError::Canceled | ComponentError::Health(HealthError::ListenerClosed)
        )
    }

    /// Errors raised while tearing down. Reported, never fatal.
    pub fn is_teardown(&self) -> bool {
        matches!(self, ComponentError::Health(HealthError::ShutdownExceeded { .. }))
    }

    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ComponentError::Canceled => "canceled",
            ComponentError::Panicked(_) => "panicked",
            ComponentError::Health(HealthError::Bind { .. }) => "health_bind",
            ComponentError::Health(HealthError::Serve(_)) => "health_serve",
            ComponentError::Health(HealthError::Stopped) => "health_stopped",
            ComponentError::Health(HealthError::ListenerClosed) => "health_listener_closed",
            ComponentError::Health(HealthError::ShutdownExceeded { .. }) => "health_shutdown_exceeded",
            ComponentError::Worker(WorkerError::Connect(_)) => "worker_connect",
            ComponentError::Worker(WorkerError::ChannelSetup { .. }) => "worker_channel_setup",
            ComponentError::Worker(WorkerError::Subscribe { .. }) => "worker_subscribe",
            ComponentError::Worker(WorkerError::SubscriptionClosed { .. }) => "worker_subscription_closed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("{component} failed: {source}")]
    ComponentFailed {
        component: &'static str,
        #[source]
        source: ComponentError,
    },

    #[error("could not listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}
