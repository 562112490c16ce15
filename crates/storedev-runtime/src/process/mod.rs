//! Child processes and the ports they listen on.
//!
//! - [`ports`] - probe and allocate local TCP ports
//! - [`exec`] - run a command with prefixed output until it exits or is cancelled
//! - [`shutdown`] - terminate a process group with SIGTERM, then SIGKILL

mod exec;
mod ports;
pub mod shutdown;
mod stream;

pub use exec::{DEFAULT_SHUTDOWN_GRACE, ExecError, ExecRequest, ExitReason, ProcessEnv, exec};
pub use ports::{PortError, PortPlanner, get_available_tcp_port, is_port_available};
pub use shutdown::shutdown_child;
pub(crate) use stream::spawn_stream_reader;
