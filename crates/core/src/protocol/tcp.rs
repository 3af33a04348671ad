//! # TCP Probe Connector
//!
//! Transport-level client used when no game protocol implementation is
//! plugged in. It opens a TCP connection and holds it open; an established
//! transport counts as a joined session and every non-empty read counts as
//! one world-data unit.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use super::{ClientEvent, ClientHandle, Connector, DisconnectReason, EventSink};
use crate::config::ServerAddress;
use crate::error::SessionError;

const READ_BUFFER: usize = 8 * 1024;

/// Opens one TCP connection per session
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for TcpConnector {
    fn connect(&self, target: &ServerAddress, name: &str) -> ClientHandle {
        let (sink, handle) = ClientHandle::pair();
        let target = target.clone();
        let name = name.to_string();
        let connect_timeout = self.connect_timeout;

        tokio::spawn(async move {
            run_probe(sink, target, name, connect_timeout).await;
        });

        handle
    }
}

async fn run_probe(sink: EventSink, target: ServerAddress, name: String, connect_timeout: Duration) {
    let connect = TcpStream::connect((target.host.as_str(), target.port));
    let mut stream = tokio::select! {
        biased;
        _ = sink.stopped() => return,
        result = tokio::time::timeout(connect_timeout, connect) => match result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                sink.emit(ClientEvent::Error(SessionError::Connect(e.to_string()))).await;
                return;
            }
            Err(_) => {
                sink.emit(ClientEvent::Error(SessionError::Timeout(connect_timeout))).await;
                return;
            }
        },
    };
    let _ = stream.set_nodelay(true);
    trace!(session = %name, "transport established");

    if !sink.emit(ClientEvent::Connected).await || !sink.emit(ClientEvent::LoginSuccess).await {
        return;
    }

    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        tokio::select! {
            biased;
            _ = sink.stopped() => {
                let _ = stream.shutdown().await;
                return;
            }
            read = stream.read(&mut buf) => match read {
                Ok(0) => {
                    sink.emit(ClientEvent::Disconnected(DisconnectReason::StreamClosed)).await;
                    return;
                }
                Ok(_) => {
                    if !sink.emit(ClientEvent::WorldData(1)).await {
                        return;
                    }
                }
                Err(e) => {
                    sink.emit(ClientEvent::Disconnected(DisconnectReason::Server(e.to_string()))).await;
                    return;
                }
            },
        }
    }
}
