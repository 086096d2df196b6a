use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RelayConfig, Role};
use crate::health::{HealthError, HealthReporter, Readiness};
use crate::messaging::{Publisher, RedpandaPublisher, RedpandaSubscriber, Subscriber, TransportError};
use crate::metrics::RelayMetrics;
use crate::supervisor::{Component, ShutdownReport, Supervisor, SupervisorConfig, SupervisorError};
use crate::workers::{Emitter, Receiver};

// ============================================================================
// Relay - wires health reporter and stream worker under one supervisor
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("could not create metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("{role} role needs a {needs} transport")]
    RoleMismatch { role: &'static str, needs: &'static str },
}

/// The transport half a role talks to.
pub enum StreamTransport {
    Publisher(Arc<dyn Publisher>),
    Subscriber(Arc<dyn Subscriber>),
}

pub struct Relay {
    health: HealthReporter,
    worker: Box<dyn Component>,
    grace: Duration,
}

impl Relay {
    /// Build a relay backed by the Kafka-protocol transport.
    pub fn connect(config: RelayConfig) -> Result<Self, RelayError> {
        let transport = match &config.role {
            Role::Emit { .. } => {
                tracing::info!(brokers = %config.brokers, "Creating stream producer");
                StreamTransport::Publisher(Arc::new(RedpandaPublisher::connect(&config.brokers)?))
            }
            Role::Receive { group } => {
                tracing::info!(brokers = %config.brokers, group = %group, "Creating stream consumer");
                StreamTransport::Subscriber(Arc::new(RedpandaSubscriber::new(&config.brokers, group)))
            }
        };
        Self::with_transport(config, transport, Readiness::new())
    }

    /// Build a relay over an arbitrary transport. Binds the health address
    /// immediately so an occupied port fails here.
    pub fn with_transport(
        config: RelayConfig,
        transport: StreamTransport,
        readiness: Readiness,
    ) -> Result<Self, RelayError> {
        let grace = config.supervisor_grace();
        let metrics = Arc::new(RelayMetrics::new()?);
        let health = HealthReporter::bind(config.health.clone(), readiness.clone(), metrics.clone())?;

        let worker: Box<dyn Component> = match (config.role, transport) {
            (Role::Emit { interval }, StreamTransport::Publisher(publisher)) => Box::new(Emitter::new(
                publisher,
                config.topic,
                interval,
                readiness,
                metrics,
            )),
            (Role::Receive { .. }, StreamTransport::Subscriber(subscriber)) => {
                Box::new(Receiver::new(subscriber, config.topic, readiness, metrics))
            }
            (Role::Emit { .. }, _) => {
                return Err(RelayError::RoleMismatch {
                    role: "emit",
                    needs: "publisher",
                })
            }
            (Role::Receive { .. }, _) => {
                return Err(RelayError::RoleMismatch {
                    role: "receive",
                    needs: "subscriber",
                })
            }
        };

        Ok(Self {
            health,
            worker,
            grace,
        })
    }

    pub fn health_address(&self) -> std::io::Result<SocketAddr> {
        self.health.local_addr()
    }

    pub async fn run<S>(self, shutdown: S) -> Result<ShutdownReport, RelayError>
    where
        S: Future<Output = std::io::Result<()>>,
    {
        let supervisor = Supervisor::new(SupervisorConfig { grace: self.grace });
        let components: Vec<Box<dyn Component>> = vec![Box::new(self.health), self.worker];
        Ok(supervisor.run(components, shutdown).await?)
    }
}
