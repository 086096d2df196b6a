mod component;
mod core;
mod errors;
pub mod signals;

pub use component::Component;
pub use self::core::{ShutdownReport, Supervisor, SupervisorConfig, SupervisorState};
pub use errors::{ComponentError, SupervisorError};
