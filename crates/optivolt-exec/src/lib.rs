//! optivolt-exec: command execution abstraction
//!
//! Dispatches commands to named environments, running them locally or over
//! SSH with a timeout, and classifies every failure by stage.

pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod keys;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use dispatcher::{DEFAULT_TIMEOUT, Dispatcher};
pub use error::{ConnectFailure, ExecError, INTERNAL_EXIT_CODE, Stage};
pub use factory::DefaultChannelFactory;
pub use keys::CredentialSource;
pub use local::LocalExecutor;
pub use result::ExecutionResult;
pub use ssh::SshExecutor;
pub use traits::{ChannelFactory, Executor};
