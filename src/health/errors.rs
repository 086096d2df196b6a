use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("could not bind health server to {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("health server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("health server stopped without a shutdown request")]
    Stopped,

    #[error("health server listener closed")]
    ListenerClosed,

    #[error("health server did not stop within {grace:?}")]
    ShutdownExceeded { grace: Duration },
}
