//! TCP connection setup.
//!
//! Connection establishment is a thin wrapper around the session core: it
//! resolves the address, bounds the connect by the configured wait time,
//! and disables Nagle (the protocol sends one control byte per packet).

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Result, XmodemError};

/// Connect to `addr` (e.g. `"192.168.1.20:2222"`) within `wait`.
pub async fn connect(addr: &str, wait: Duration) -> Result<TcpStream> {
    let stream = timeout(wait, TcpStream::connect(addr))
        .await
        .map_err(|_| XmodemError::ConnectTimeout {
            addr: addr.to_string(),
            timeout: wait,
        })??;

    stream.set_nodelay(true)?;
    tracing::debug!(peer = %stream.peer_addr()?, "connected");

    Ok(stream)
}
