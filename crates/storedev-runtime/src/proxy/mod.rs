//! Reverse proxy integration.
//!
//! The HTTP server itself lives in `storedev-proxy`; this module allocates
//! the ports proxied targets listen on, validates the route table, binds the
//! listener and hands back the proxy and its targets as group actions.

pub mod supervisor;

pub use supervisor::{
    PROXY_PREFIX, PreparedProxy, ProxySupervisor, SupervisorConfig, SupervisorError,
};
