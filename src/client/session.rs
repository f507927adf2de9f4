use std::sync::Arc;
use std::time::Duration;

use tokio::io::Interest;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::container::{ClientCommand, ClientContainer, MAX_CONNECT_RETRIES};
use crate::protocol::{Frame, FrameDecoder, FrameKind, FrameWriter, Resolution};

const READ_BUF_LEN: usize = 4 * 1024;
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Why one connection of a logical client ended.
enum Outcome {
    /// The server named a different owner; reconnect straight to it.
    Redirect(String, u16),
    /// The server closed the connection (eviction or shutdown).
    ServerClosed,
    /// The connection failed mid-flight.
    Failed,
    /// The container asked the client to stop.
    Decommissioned,
}

/// Runs one logical client: connect, resolve, follow redirects, then sit in
/// steady state receiving payloads until closed.
pub(crate) async fn run(
    container: Arc<ClientContainer>,
    client_id: u32,
    mut host: String,
    mut port: u16,
    mut rx: mpsc::UnboundedReceiver<ClientCommand>,
) {
    let mut failures = 0u32;
    loop {
        tracing::info!("Client {} connecting to {}:{}", client_id, host, port);
        let target = (host.clone(), port);
        let stream = tokio::select! {
            connected = TcpStream::connect(target) => match connected {
                Ok(stream) => stream,
                Err(error) => {
                    failures += 1;
                    if failures >= MAX_CONNECT_RETRIES {
                        tracing::error!(
                            "Client {} giving up after {} failed connection attempts: {}",
                            client_id,
                            failures,
                            error
                        );
                        return;
                    }
                    tracing::warn!(
                        "Client {} failed to connect to {}:{}: {}",
                        client_id,
                        host,
                        port,
                        error
                    );
                    (host, port) = container.random_address();
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            },
            _ = rx.recv() => return,
        };
        failures = 0;

        match drive(client_id, &stream, &host, port, &mut rx).await {
            Outcome::Redirect(next_host, next_port) => {
                host = next_host;
                port = next_port;
            }
            Outcome::ServerClosed | Outcome::Failed => {
                (host, port) = container.random_address();
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
            Outcome::Decommissioned => return,
        }
    }
}

/// Drives one established connection through the resolve handshake and the
/// steady state that follows.
async fn drive(
    client_id: u32,
    stream: &TcpStream,
    connected_host: &str,
    connected_port: u16,
    rx: &mut mpsc::UnboundedReceiver<ClientCommand>,
) -> Outcome {
    let mut decoder = FrameDecoder::new();
    let mut writer = FrameWriter::new();
    let mut read_buf = [0u8; READ_BUF_LEN];
    let mut resolved = false;

    tracing::info!(
        "Client {} on {}:{} requests resolution",
        client_id,
        connected_host,
        connected_port
    );
    writer.queue(&Frame::resolve(client_id.to_string()));
    if let Err(error) = writer.write_to(stream) {
        tracing::warn!("Client {} write error: {}", client_id, error);
        return Outcome::Failed;
    }

    loop {
        let interest = if writer.has_pending() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };

        tokio::select! {
            _ = rx.recv() => return Outcome::Decommissioned,
            ready = stream.ready(interest) => {
                let ready = match ready {
                    Ok(ready) => ready,
                    Err(error) => {
                        tracing::warn!("Client {} readiness error: {}", client_id, error);
                        return Outcome::Failed;
                    }
                };
                if ready.is_readable() {
                    loop {
                        match stream.try_read(&mut read_buf) {
                            Ok(0) => {
                                tracing::info!(
                                    "Server closed connection of client {}",
                                    client_id
                                );
                                return Outcome::ServerClosed;
                            }
                            Ok(read) => decoder.extend(&read_buf[..read]),
                            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => break,
                            Err(error) => {
                                tracing::warn!("Client {} read error: {}", client_id, error);
                                return Outcome::Failed;
                            }
                        }
                    }
                    loop {
                        match decoder.next_frame() {
                            Ok(Some(frame)) => {
                                if let Some(outcome) = handle_frame(
                                    client_id,
                                    connected_host,
                                    connected_port,
                                    &mut writer,
                                    &mut resolved,
                                    frame,
                                ) {
                                    return outcome;
                                }
                            }
                            Ok(None) => break,
                            Err(error) if error.is_fatal() => {
                                tracing::warn!(
                                    "Client {} closing on malformed frame: {}",
                                    client_id,
                                    error
                                );
                                return Outcome::Failed;
                            }
                            Err(error) => {
                                tracing::warn!("Client {} dropping frame: {}", client_id, error)
                            }
                        }
                    }
                    if writer.has_pending() {
                        if let Err(error) = writer.write_to(stream) {
                            tracing::warn!("Client {} write error: {}", client_id, error);
                            return Outcome::Failed;
                        }
                    }
                }
                if ready.is_writable() && writer.has_pending() {
                    if let Err(error) = writer.write_to(stream) {
                        tracing::warn!("Client {} write error: {}", client_id, error);
                        return Outcome::Failed;
                    }
                }
            }
        }
    }
}

fn handle_frame(
    client_id: u32,
    connected_host: &str,
    connected_port: u16,
    writer: &mut FrameWriter,
    resolved: &mut bool,
    frame: Frame,
) -> Option<Outcome> {
    match frame.kind {
        FrameKind::Resolve => match Resolution::from_body(&frame.body) {
            Ok(Resolution::Unknown) => {
                tracing::info!("Owner of client {} unknown, retrying resolution", client_id);
                writer.queue(&Frame::resolve(client_id.to_string()));
                None
            }
            Ok(Resolution::Owner { host, port }) => {
                if host == connected_host && port == connected_port {
                    if !*resolved {
                        tracing::info!(
                            "Client {} resolved to connected node {}:{}",
                            client_id,
                            host,
                            port
                        );
                        *resolved = true;
                    }
                    None
                } else {
                    tracing::info!(
                        "Client {} should be redirected to {}:{} while connected to {}:{}",
                        client_id,
                        host,
                        port,
                        connected_host,
                        connected_port
                    );
                    Some(Outcome::Redirect(host, port))
                }
            }
            Err(error) => {
                tracing::warn!("Client {} dropping malformed resolution: {}", client_id, error);
                None
            }
        },
        FrameKind::Data => {
            tracing::info!("Client {} received message {}", client_id, frame.body);
            None
        }
    }
}
