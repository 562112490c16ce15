//! Process runtime for storedev.
//!
//! This crate owns everything that touches the operating system while a dev
//! session runs: port probing, child processes and their output, the
//! all-or-nothing process group and the reverse proxy that fronts it.
//!
//! # Structure
//!
//! - [`output`] - prefixed line output shared by every running task
//! - [`process`] - port allocation, process execution and shutdown
//! - [`group`] - run named actions concurrently with shared cancellation
//! - [`proxy`] - bind the reverse proxy and bind proxied targets to ports
//! - [`session`] - decide whether a proxy is needed and run everything

#![deny(unsafe_code)]

pub mod group;
pub mod output;
pub mod process;
pub mod proxy;
pub mod session;
pub mod target;

pub use group::{GroupError, run_all};
pub use output::{OutputLine, OutputMux, OutputSink, OutputStream};
pub use process::{
    DEFAULT_SHUTDOWN_GRACE, ExecError, ExecRequest, ExitReason, PortError, PortPlanner, ProcessEnv, exec,
    get_available_tcp_port, is_port_available, shutdown_child,
};
pub use proxy::{PROXY_PREFIX, PreparedProxy, ProxySupervisor, SupervisorConfig, SupervisorError};
pub use session::{
    DEFAULT_GROUP_DRAIN, PreparedSession, SessionConfig, SessionError, prepare_session, run_session,
};
pub use target::{ActionContext, ActionFuture, NamedAction, PlainProcess, ProxyTarget, Target};

// Re-exported so callers can share a preview URL without depending on the proxy crate.
pub use storedev_proxy::PreviewUrl;
