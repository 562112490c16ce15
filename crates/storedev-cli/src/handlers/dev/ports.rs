//! Checks on the ports a project pins in its web configuration.

use storedev_core::Web;
use storedev_runtime::is_port_available;

use super::DevError;

/// Reject fixed backend/frontend ports that collide or are already taken.
///
/// Runs before any process or listener starts.
pub fn validate_custom_ports(backend: Option<&Web>, frontend: Option<&Web>) -> Result<(), DevError> {
    let backend_port = backend.and_then(|web| web.configuration.port);
    let frontend_port = frontend.and_then(|web| web.configuration.port);

    if let (Some(backend_port), Some(frontend_port)) = (backend_port, frontend_port) {
        if backend_port == frontend_port {
            return Err(DevError::Configuration(format!(
                "Backend and frontend ports must be different. Found {frontend_port} for both."
            )));
        }
    }

    if let Some(port) = backend_port {
        if !is_port_available(port) {
            return Err(DevError::Configuration(format!(
                "Backend port {port} is not available, please choose a different one."
            )));
        }
    }

    if let Some(port) = frontend_port {
        if !is_port_available(port) {
            return Err(DevError::Configuration(format!(
                "Frontend port {port} is not available, please choose a different one."
            )));
        }
    }

    Ok(())
}
