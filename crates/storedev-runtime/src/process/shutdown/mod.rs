//! Graceful process shutdown.
//!
//! Every child is spawned as the leader of its own process group, so the
//! signals here reach the whole tree it started (a package manager running a
//! dev server, for instance).

mod child;

pub use child::shutdown_child;
#[cfg(unix)]
pub use child::signal_group;
