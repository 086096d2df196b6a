use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::errors::ComponentError;

/// A long-running unit owned by the [`Supervisor`](super::Supervisor).
///
/// `run` must return promptly once `shutdown` is cancelled. Returning an
/// error that is not shutdown-expected makes the supervisor cancel every
/// sibling and fail the process.
#[async_trait]
pub trait Component: Send + 'static {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<(), ComponentError>;
}
