//! Port allocation utilities for process management.

use std::collections::BTreeMap;
use std::net::TcpListener;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

const MAX_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("No available port found after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Port {port} requested by {label} is not available")]
    Unavailable { label: String, port: u16 },

    #[error("Port {port} is assigned to both {first} and {second}")]
    AlreadyClaimed {
        port: u16,
        first: String,
        second: String,
    },

    #[error("Port 0 is not a valid port for {label}")]
    Invalid { label: String },
}

/// Check if a port is available by attempting to bind to it.
/// This method binds and immediately drops the listener, which releases the port.
pub fn is_port_available(port: u16) -> bool {
    if port == 0 {
        return false;
    }
    match TcpListener::bind(("127.0.0.1", port)) {
        Ok(listener) => listener.local_addr().is_ok(),
        Err(_) => false,
    }
}

/// Return `preferred` when it is free, otherwise a port chosen by the OS.
///
/// The port is not held once this returns, so another process can still take
/// it before it is bound. That race is accepted.
pub fn get_available_tcp_port(preferred: Option<u16>) -> Result<u16, PortError> {
    if let Some(port) = preferred {
        if is_port_available(port) {
            debug!(port, "Preferred port is available");
            return Ok(port);
        }
        debug!(port, "Preferred port unavailable, asking the OS");
    }

    for attempt in 1..=MAX_ATTEMPTS {
        match TcpListener::bind(("127.0.0.1", 0)).and_then(|listener| listener.local_addr()) {
            Ok(addr) => {
                let port = addr.port();
                // Double-check once the probe listener is gone
                if is_port_available(port) {
                    debug!(port, attempt, "Allocated available port");
                    return Ok(port);
                }
                debug!(port, "Port became unavailable, retrying");
            }
            Err(e) => debug!(attempt, error = %e, "Ephemeral bind failed"),
        }
        std::thread::sleep(RETRY_DELAY);
    }

    Err(PortError::Exhausted {
        attempts: MAX_ATTEMPTS,
    })
}

/// Ports handed out within one session.
///
/// Two targets never receive the same port, whether it was requested or
/// allocated.
#[derive(Debug, Default, Clone)]
pub struct PortPlanner {
    claims: BTreeMap<u16, String>,
}

impl PortPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `port` for `label` without probing it.
    pub fn claim(&mut self, label: &str, port: u16) -> Result<u16, PortError> {
        if port == 0 {
            return Err(PortError::Invalid {
                label: label.to_string(),
            });
        }
        if let Some(first) = self.claims.get(&port) {
            return Err(PortError::AlreadyClaimed {
                port,
                first: first.clone(),
                second: label.to_string(),
            });
        }
        self.claims.insert(port, label.to_string());
        Ok(port)
    }

    /// Claim a fixed port after checking nothing else listens on it.
    pub fn claim_fixed(&mut self, label: &str, port: u16) -> Result<u16, PortError> {
        if self.claims.contains_key(&port) {
            return self.claim(label, port);
        }
        if !is_port_available(port) {
            return Err(PortError::Unavailable {
                label: label.to_string(),
                port,
            });
        }
        self.claim(label, port)
    }

    /// Allocate and claim a free port, honouring `preferred` when possible.
    pub fn allocate(&mut self, label: &str, preferred: Option<u16>) -> Result<u16, PortError> {
        let mut preferred = preferred.filter(|port| !self.claims.contains_key(port));
        for _ in 0..MAX_ATTEMPTS {
            let port = get_available_tcp_port(preferred.take())?;
            if !self.claims.contains_key(&port) {
                return self.claim(label, port);
            }
        }
        Err(PortError::Exhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    pub fn label_of(&self, port: u16) -> Option<&str> {
        self.claims.get(&port).map(String::as_str)
    }

    pub fn claimed(&self) -> impl Iterator<Item = (u16, &str)> {
        self.claims.iter().map(|(port, label)| (*port, label.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_port_is_not_available() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!is_port_available(port));
        drop(listener);
        assert!(is_port_available(port));
    }

    #[test]
    fn port_zero_is_never_available() {
        assert!(!is_port_available(0));
    }

    #[test]
    fn falls_back_when_preferred_is_taken() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = listener.local_addr().unwrap().port();

        let port = get_available_tcp_port(Some(taken)).unwrap();
        assert_ne!(port, taken);
        assert!(port > 0);
    }

    #[test]
    fn returns_free_preferred_port() {
        let free = get_available_tcp_port(None).unwrap();
        assert_eq!(get_available_tcp_port(Some(free)).unwrap(), free);
    }

    #[test]
    fn planner_rejects_duplicate_claims() {
        let mut planner = PortPlanner::new();
        planner.claim("frontend", 3000).unwrap();

        let err = planner.claim("backend", 3000).unwrap_err();
        assert_eq!(
            err,
            PortError::AlreadyClaimed {
                port: 3000,
                first: "frontend".to_string(),
                second: "backend".to_string(),
            }
        );
        assert_eq!(planner.label_of(3000), Some("frontend"));
    }

    #[test]
    fn planner_rejects_busy_fixed_port() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = listener.local_addr().unwrap().port();

        let mut planner = PortPlanner::new();
        assert!(matches!(
            planner.claim_fixed("frontend", taken),
            Err(PortError::Unavailable { port, .. }) if port == taken
        ));
    }

    #[test]
    fn planner_never_hands_out_a_claimed_port() {
        let mut planner = PortPlanner::new();
        let first = planner.allocate("extensions", None).unwrap();
        let second = planner.allocate("frontend", Some(first)).unwrap();
        assert_ne!(first, second);
        assert_eq!(planner.claimed().count(), 2);
    }
}
