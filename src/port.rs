//! Free loopback port allocation
//!
//! The port is found by binding to port 0 and reading back what the OS assigned. The socket is closed again
//! before returning, so another process may claim the port before the server binds it. That window is
//! accepted: the server reports a bind failure if it happens.

use std::net::{Ipv4Addr, SocketAddr, TcpListener};

use crate::error::HarnessResult;

/// Ask the OS for a currently unused TCP port on 127.0.0.1.
pub fn allocate_port() -> HarnessResult<u16> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    tracing::debug!(port, "allocated loopback port");
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_port_is_nonzero() {
        let port = allocate_port().unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn test_allocated_port_is_released() {
        let port = allocate_port().unwrap();
        // Nothing holds the port after allocation, so it can be bound again
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }
}
