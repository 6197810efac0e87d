//! Transport session plumbing
//!
//! Bare point-to-point TCP: the receiver listens, the sender connects. No
//! signaling negotiation, no receiver-to-sender data plane.
//!
//! Socket buffers are sized small on purpose: when the peer cannot keep up,
//! TCP flow control backs the sender's writes up quickly, which stalls the
//! encoder drain loop instead of queueing seconds of stale video. Closing
//! the socket is the cancellation point that unblocks pending reads and
//! writes during teardown.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::error::Result;
use crate::session::SessionConfig;

/// Connect to a listening receiver (sender side)
pub async fn connect(addr: SocketAddr, config: &SessionConfig) -> Result<TcpStream> {
    let socket = new_socket(addr, config)?;
    let stream = socket.connect(addr).await?;
    stream.set_nodelay(config.tcp_nodelay)?;
    tracing::info!(peer = %addr, "Connected");
    Ok(stream)
}

/// Bind a listener for incoming sender connections (receiver side).
///
/// Backlog of 1: the engine serves a single peer per session.
pub async fn listen(addr: SocketAddr, config: &SessionConfig) -> Result<TcpListener> {
    let socket = new_socket(addr, config)?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1)?;
    tracing::info!(addr = %addr, "Listening");
    Ok(listener)
}

fn new_socket(addr: SocketAddr, config: &SessionConfig) -> Result<TcpSocket> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    if config.send_buffer_size > 0 {
        socket.set_send_buffer_size(config.send_buffer_size as u32)?;
    }
    if config.recv_buffer_size > 0 {
        socket.set_recv_buffer_size(config.recv_buffer_size as u32)?;
    }
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_listen_connect_round_trip() {
        let config = SessionConfig::default();
        let listener = listen("127.0.0.1:0".parse().unwrap(), &config)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut stream = connect(addr, &config).await.unwrap();
        stream.write_all(&[0xFF, 0x52, 0x54, 0x00, 0xAA]).await.unwrap();

        assert_eq!(accept.await.unwrap(), [0xFF, 0x52, 0x54, 0x00, 0xAA]);
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        let config = SessionConfig::default();
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = connect(addr, &config).await;
        assert!(matches!(result, Err(crate::Error::Transport(_))));
    }
}
