use std::net::SocketAddr;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use crate::error::ForwardError;
use super::{ControlMessage, OutboundMessage, TelemetrySink};

const MAX_DATAGRAM: usize = 2048;

/// Sends each message as one JSON datagram.
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSink {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let target = tokio::net::lookup_host((host, port))
            .await
            .with_context(|| format!("Failed to resolve telemetry sink {}:{}", host, port))?
            .next()
            .with_context(|| format!("No address for telemetry sink {}:{}", host, port))?;

        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)
            .await
            .context("Failed to bind telemetry socket")?;
        socket
            .connect(target)
            .await
            .with_context(|| format!("Failed to connect telemetry socket to {}", target))?;

        info!(%target, "telemetry sink ready");
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl TelemetrySink for UdpSink {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ForwardError> {
        let bytes = serde_json::to_vec(message).map_err(|e| ForwardError::Sink(e.to_string()))?;
        self.socket
            .send(&bytes)
            .await
            .map(|_| ())
            .map_err(|e| ForwardError::Sink(e.to_string()))
    }
}

/// Receives JSON control datagrams and queues them for the control listener.
pub struct UdpControlSource {
    socket: UdpSocket,
}

impl UdpControlSource {
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((host, port))
            .await
            .with_context(|| format!("Failed to bind control socket {}:{}", host, port))?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Runs until shutdown is signalled or the listener's queue closes.
    pub async fn run(self, inbox: mpsc::Sender<ControlMessage>, mut shutdown: watch::Receiver<bool>) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(error = %e, "control socket receive failed");
                        continue;
                    }
                },
            };

            match serde_json::from_slice::<ControlMessage>(&buf[..len]) {
                Ok(message) => {
                    debug!(%peer, address = %message.address, "control message received");
                    if inbox.send(message).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(%peer, error = %e, "ignoring malformed control datagram"),
            }
        }
        debug!("control source stopped");
    }
}
