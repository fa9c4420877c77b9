//! roverlink-exec: Local process execution abstraction
//!
//! Provides the `CommandRunner` trait and a tokio-based implementation used to
//! invoke the tunnel status command and the external provisioning tool.

pub mod error;
pub mod local;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use local::LocalRunner;
pub use result::{CommandResult, CommandSpec};
pub use traits::CommandRunner;
