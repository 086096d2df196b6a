use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::errors::HealthError;
use super::readiness::Readiness;
use crate::metrics::RelayMetrics;
use crate::supervisor::{Component, ComponentError};

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub address: SocketAddr,
    pub path: String,
    /// Bound on draining in-flight requests once shutdown starts.
    pub shutdown_grace: Duration,
}

struct ProbeState {
    readiness: Readiness,
    metrics: Arc<RelayMetrics>,
}

/// HTTP health endpoint reflecting [`Readiness`], plus `/metrics`.
///
/// Binding happens in [`HealthReporter::bind`] so an occupied address fails
/// before anything else starts.
pub struct HealthReporter {
    listener: TcpListener,
    config: HealthConfig,
    readiness: Readiness,
    metrics: Arc<RelayMetrics>,
}

impl HealthReporter {
    pub fn bind(
        config: HealthConfig,
        readiness: Readiness,
        metrics: Arc<RelayMetrics>,
    ) -> Result<Self, HealthError> {
        let listener = TcpListener::bind(config.address).map_err(|source| HealthError::Bind {
            address: config.address,
            source,
        })?;

        Ok(Self {
            listener,
            config,
            readiness,
            metrics,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` is cancelled, then stop within the grace period.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), HealthError> {
        let address = self.local_addr().map_err(HealthError::Serve)?;
        let path = self.config.path.clone();
        let grace = self.config.shutdown_grace;
        tracing::info!(address = %address, path = %path, "Starting health server");

        let state = web::Data::new(ProbeState {
            readiness: self.readiness,
            metrics: self.metrics,
        });

        let mut server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .route(&path, web::get().to(probe))
                .route("/metrics", web::get().to(metrics_handler))
        })
        .workers(1)
        .disable_signals()
        .shutdown_timeout(grace.as_secs().max(1))
        .listen(self.listener)
        .map_err(HealthError::Serve)?
        .run();
        let handle = server.handle();

        tokio::select! {
            result = &mut server => {
                result.map_err(HealthError::Serve)?;
                return Err(if shutdown.is_cancelled() {
                    HealthError::ListenerClosed
                } else {
                    HealthError::Stopped
                });
            }
            _ = shutdown.cancelled() => {}
        }

        tracing::info!("Shutting down health server");
        // Workers force-close connections at `grace`; the extra second only
        // catches a server that ignores its own shutdown timeout.
        // The stop command is only processed while the server future is polled.
        let stopped = tokio::time::timeout(grace.saturating_add(Duration::from_secs(1)), async {
            let ((), result) = tokio::join!(handle.stop(true), server);
            result
        })
        .await;

        match stopped {
            Ok(result) => result.map_err(HealthError::Serve),
            Err(_) => {
                tracing::error!(grace = ?grace, "Could not shut down health server in time");
                Err(HealthError::ShutdownExceeded { grace })
            }
        }
    }
}

#[async_trait]
impl Component for HealthReporter {
    fn name(&self) -> &'static str {
        "health"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<(), ComponentError> {
        Ok(self.serve(shutdown).await?)
    }
}

async fn probe(state: web::Data<ProbeState>) -> impl Responder {
    if state.readiness.is_ready() {
        HttpResponse::Ok().json(serde_json::json!({ "status": "healthy" }))
    } else {
        HttpResponse::InternalServerError().json(serde_json::json!({ "status": "unhealthy" }))
    }
}

async fn metrics_handler(state: web::Data<ProbeState>) -> impl Responder {
    match state.metrics.encode(state.readiness.is_ready()) {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Could not encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
