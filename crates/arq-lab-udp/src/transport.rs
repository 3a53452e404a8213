//! Frame-oriented UDP socket wrapper.
//!
//! Owns only byte I/O: encoding outbound frames, decoding inbound datagrams
//! and bounding every read with a deadline. Protocol logic lives in the
//! driver loops.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::warn;

use arq_lab_core::{Frame, FrameError};

/// Large enough for any text frame; datagrams here are tiny.
const MAX_DATAGRAM: usize = 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame encode error: {0}")]
    Encode(#[from] FrameError),
}

/// Result of one bounded read.
#[derive(Debug)]
pub enum RecvOutcome {
    /// A well-formed frame arrived.
    Frame(Frame, SocketAddr),
    /// The deadline passed with no (usable) datagram.
    Timeout,
}

/// A UDP socket speaking [`Frame`].
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to `local_addr`; `127.0.0.1:0` picks an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(local_addr).await?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Encode and send one frame to `peer`.
    pub async fn send(&self, frame: &Frame, peer: SocketAddr) -> Result<(), TransportError> {
        let bytes = frame.encode()?;
        self.socket.send_to(&bytes, peer).await?;
        Ok(())
    }

    /// Read one frame, waiting at most `deadline` (`None` waits forever).
    ///
    /// Malformed datagrams are logged and skipped without consuming the
    /// remaining wait; the peer's retransmission timer recovers the loss.
    pub async fn recv_deadline(
        &self,
        deadline: Option<Duration>,
    ) -> Result<RecvOutcome, TransportError> {
        let started = tokio::time::Instant::now();
        let mut buf = BytesMut::zeroed(MAX_DATAGRAM);
        loop {
            let remaining = match deadline {
                Some(total) => match total.checked_sub(started.elapsed()) {
                    Some(rest) => Some(rest),
                    None => return Ok(RecvOutcome::Timeout),
                },
                None => None,
            };

            let received = match remaining {
                Some(wait) => {
                    match tokio::time::timeout(wait, self.socket.recv_from(&mut buf)).await {
                        Ok(result) => result?,
                        Err(_elapsed) => return Ok(RecvOutcome::Timeout),
                    }
                }
                None => self.socket.recv_from(&mut buf).await?,
            };

            let (n, addr) = received;
            match Frame::decode(&buf[..n]) {
                Ok(frame) => return Ok(RecvOutcome::Frame(frame, addr)),
                Err(err) => {
                    // Discard and keep waiting; no ACK for garbage.
                    warn!("discarding malformed datagram from {addr}: {err}");
                }
            }
        }
    }
}
