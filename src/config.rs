use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::health::HealthConfig;

// ============================================================================
// Configuration - CLI flags with environment fallbacks
// ============================================================================

const MAX_SHUTDOWN_GRACE_SECS: u64 = 3600;

#[derive(Debug, Parser)]
#[command(name = "stream-relay", version, about = "Health-gated stream emitter and receiver")]
pub struct Cli {
    /// Comma-separated broker list of the stream transport
    #[arg(long, env = "STREAM_BROKERS")]
    pub brokers: String,

    /// Channel (topic) to emit to or receive from
    #[arg(long, env = "STREAM_TOPIC")]
    pub topic: String,

    /// Health server address (`host:port`); a bare ":port" listens on all
    /// IPv4 interfaces
    #[arg(long, env = "HEALTHZ_ADDRESS", default_value = ":8080")]
    pub healthz_address: String,

    #[arg(long, env = "HEALTHZ_PATH", default_value = "/healthz")]
    pub healthz_path: String,

    /// Seconds each component gets to stop after a shutdown request
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 3)]
    pub shutdown_grace_secs: u64,

    #[command(subcommand)]
    pub role: RoleCommand,
}

#[derive(Debug, Subcommand)]
pub enum RoleCommand {
    /// Publish one message per interval
    Emit {
        #[arg(long, env = "EMIT_INTERVAL_MS", default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Subscribe and log every delivery
    Receive {
        #[arg(long, env = "STREAM_CONSUMER_GROUP", default_value = "stream-relay")]
        group: String,
    },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("invalid health address {0:?}")]
    InvalidAddress(String),

    #[error("health path {0:?} must start with '/' and must not be /metrics")]
    InvalidPath(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must be at most {max}")]
    OutOfRange { field: &'static str, max: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Emit { interval: Duration },
    Receive { group: String },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub brokers: String,
    pub topic: String,
    pub health: HealthConfig,
    pub role: Role,
}

impl RelayConfig {
    /// Grace given to the supervisor as a whole; a little more than each
    /// component's own bound so their reports arrive first.
    pub fn supervisor_grace(&self) -> Duration {
        self.health.shutdown_grace.saturating_add(Duration::from_secs(2))
    }
}

impl TryFrom<Cli> for RelayConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let brokers = cli.brokers.trim().to_string();
        if brokers.is_empty() {
            return Err(ConfigError::Empty("brokers"));
        }
        let topic = cli.topic.trim().to_string();
        if topic.is_empty() {
            return Err(ConfigError::Empty("topic"));
        }

        let address = parse_address(&cli.healthz_address)?;
        if !cli.healthz_path.starts_with('/') || cli.healthz_path == "/metrics" {
            return Err(ConfigError::InvalidPath(cli.healthz_path));
        }
        if cli.shutdown_grace_secs == 0 {
            return Err(ConfigError::Zero("shutdown grace"));
        }
        if cli.shutdown_grace_secs > MAX_SHUTDOWN_GRACE_SECS {
            return Err(ConfigError::OutOfRange {
                field: "shutdown grace",
                max: MAX_SHUTDOWN_GRACE_SECS,
            });
        }

        let role = match cli.role {
            RoleCommand::Emit { interval_ms: 0 } => return Err(ConfigError::Zero("emit interval")),
            RoleCommand::Emit { interval_ms } => Role::Emit {
                interval: Duration::from_millis(interval_ms),
            },
            RoleCommand::Receive { group } if group.trim().is_empty() => {
                return Err(ConfigError::Empty("consumer group"))
            }
            RoleCommand::Receive { group } => Role::Receive { group },
        };

        Ok(Self {
            brokers,
            topic,
            health: HealthConfig {
                address,
                path: cli.healthz_path,
                shutdown_grace: Duration::from_secs(cli.shutdown_grace_secs),
            },
            role,
        })
    }
}

fn parse_address(raw: &str) -> Result<SocketAddr, ConfigError> {
    let raw = raw.trim();
    let candidate = match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => raw.to_string(),
    };
    if let Ok(address) = candidate.parse() {
        return Ok(address);
    }

    // Host names resolve once at startup; the first address wins.
    candidate
        .to_socket_addrs()
        .ok()
        .and_then(|mut addresses| addresses.next())
        .ok_or_else(|| ConfigError::InvalidAddress(raw.to_string()))
}
