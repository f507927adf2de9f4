use std::sync::Arc;

use tokio::io::Interest;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use super::listener::Server;
use super::registry::ConnCommand;
use crate::protocol::{Frame, FrameDecoder, FrameKind, FrameWriter, Resolution};

const READ_BUF_LEN: usize = 4 * 1024;

/// Drives one accepted client socket until it closes, errors, or is evicted.
///
/// The loop multiplexes the connection's command channel with socket
/// readiness. Write readiness is only part of the interest set while the
/// frame writer holds undrained bytes.
pub(crate) async fn run(stream: TcpStream, server: Arc<Server>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut decoder = FrameDecoder::new();
    let mut writer = FrameWriter::new();
    let mut read_buf = [0u8; READ_BUF_LEN];
    let mut registered: Option<u32> = None;

    'conn: loop {
        let interest = if writer.has_pending() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };

        tokio::select! {
            command = rx.recv() => match command {
                Some(ConnCommand::Send(frame)) => {
                    writer.queue(&frame);
                    if let Err(error) = writer.write_to(&stream) {
                        tracing::warn!("Write error on client connection: {}", error);
                        break;
                    }
                }
                Some(ConnCommand::Close) | None => {
                    tracing::debug!("Closing client connection on request");
                    break;
                }
            },
            ready = stream.ready(interest) => {
                let ready = match ready {
                    Ok(ready) => ready,
                    Err(error) => {
                        tracing::warn!("Readiness error on client connection: {}", error);
                        break;
                    }
                };
                if ready.is_readable() {
                    loop {
                        match stream.try_read(&mut read_buf) {
                            Ok(0) => {
                                tracing::debug!("Client connection closed by peer");
                                break 'conn;
                            }
                            Ok(read) => decoder.extend(&read_buf[..read]),
                            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => break,
                            Err(error) => {
                                tracing::warn!("Read error on client connection: {}", error);
                                break 'conn;
                            }
                        }
                    }
                    loop {
                        match decoder.next_frame() {
                            Ok(Some(frame)) => {
                                if let Some(reply) =
                                    handle_frame(&server, &tx, &mut registered, frame)
                                {
                                    writer.queue(&reply);
                                }
                            }
                            Ok(None) => break,
                            Err(error) if error.is_fatal() => {
                                tracing::warn!("Closing connection on malformed frame: {}", error);
                                break 'conn;
                            }
                            Err(error) => tracing::warn!("Dropping frame: {}", error),
                        }
                    }
                    if writer.has_pending() {
                        if let Err(error) = writer.write_to(&stream) {
                            tracing::warn!("Write error on client connection: {}", error);
                            break;
                        }
                    }
                }
                if ready.is_writable() && writer.has_pending() {
                    if let Err(error) = writer.write_to(&stream) {
                        tracing::warn!("Write error on client connection: {}", error);
                        break;
                    }
                }
            }
        }
    }

    if let Some(client_id) = registered {
        server.connections().remove_if_current(client_id, &tx);
    }
}

fn handle_frame(
    server: &Arc<Server>,
    tx: &mpsc::UnboundedSender<ConnCommand>,
    registered: &mut Option<u32>,
    frame: Frame,
) -> Option<Frame> {
    match frame.kind {
        FrameKind::Resolve => {
            let client_id = match frame.client_id() {
                Ok(client_id) => client_id,
                Err(error) => {
                    tracing::warn!("Dropping resolve request: {}", error);
                    return None;
                }
            };
            tracing::info!("Client {} requests resolution", client_id);
            match server.table().resolve(client_id) {
                None => {
                    tracing::info!("No owner known for client {} yet", client_id);
                    Some(Resolution::Unknown.to_frame())
                }
                Some(owner) => {
                    if owner.id == server.local().id {
                        server.connections().register(client_id, tx.clone());
                        *registered = Some(client_id);
                        tracing::info!(
                            "Client {} is now connected to node {}",
                            client_id,
                            server.local()
                        );
                    } else {
                        tracing::info!(
                            "Redirecting client {} to owning node {}",
                            client_id,
                            owner
                        );
                    }
                    Some(
                        Resolution::Owner {
                            host: owner.host,
                            port: owner.port,
                        }
                        .to_frame(),
                    )
                }
            }
        }
        FrameKind::Data => {
            tracing::debug!("Ignoring data frame from client: servers only accept resolve requests");
            None
        }
    }
}
