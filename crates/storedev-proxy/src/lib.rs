//! Path-routing reverse HTTP proxy.
//!
//! One listener fans requests out to several local upstreams by the longest
//! matching path prefix. Plain HTTP is forwarded with `reqwest`; connection
//! upgrades (WebSocket) are spliced at the byte level.
#![deny(unsafe_code)]

pub mod forward;
pub mod routing;
pub mod server;
pub mod upgrade;

pub use routing::{Route, RouteTable, RoutingError};
pub use server::{DEFAULT_DRAIN_TIMEOUT, PreviewUrl, ProxyConfig, serve};
