//! TCP accept loop and per-connection workers

use crate::session::{HandshakeMode, Registration, RelayConfig, RelaySession};
use log::{debug, error, info, warn};
use shared::framing::MAX_LINE_BYTES;
use shared::{LineFramer, Message, Role};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const READ_BUFFER_SIZE: usize = 4096;

/// The relay server: accepts connections and hands each one to a worker task.
pub struct Server {
    listener: TcpListener,
    session: Arc<RelaySession>,
}

impl Server {
    pub async fn bind(addr: &str, config: RelayConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            session: Arc::new(RelaySession::new(config)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn session(&self) -> Arc<RelaySession> {
        Arc::clone(&self.session)
    }

    /// Accepts connections until the task is cancelled.
    ///
    /// Roles are assigned here, in accept order, before the worker starts.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let registration = self.session.register(addr).await;
            let session = Arc::clone(&self.session);
            tokio::spawn(async move {
                handle_connection(session, stream, addr, registration).await;
            });
        }
    }
}

async fn handle_connection(
    session: Arc<RelaySession>,
    stream: TcpStream,
    addr: SocketAddr,
    registration: Registration,
) {
    let Registration {
        client_id,
        role,
        outbox,
    } = registration;

    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }

    let (mut reader, writer) = stream.into_split();
    tokio::spawn(write_lines(writer, outbox, client_id));

    match serve(&session, &mut reader, client_id, role).await {
        Ok(()) => debug!("Client {} closed the connection", client_id),
        Err(e) => debug!("Read error from client {}: {}", client_id, e),
    }

    // Dropping the registry's sender lets the writer task finish
    session.unregister(client_id).await;
}

/// Handshake, start gate, then relay until the peer goes away.
async fn serve(
    session: &RelaySession,
    reader: &mut OwnedReadHalf,
    client_id: u32,
    role: Role,
) -> io::Result<()> {
    let config = session.config().clone();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    if config.handshake == HandshakeMode::Immediate {
        session.send_to(client_id, &session.match_config(role)).await;
    }

    if !wait_for_start(session, reader, &mut buffer, client_id).await? {
        return Ok(());
    }

    if config.handshake == HandshakeMode::Rendezvous {
        session.send_to(client_id, &session.match_config(role)).await;
    }
    session.send_to(client_id, &Message::StartSignal).await;
    info!("Client {} ({}) started", client_id, role);

    if !config.settle_delay.is_zero() {
        tokio::time::sleep(config.settle_delay).await;
    }

    let mut framer = LineFramer::new();
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }
        for line in framer.feed(&buffer[..n]) {
            session.handle_line(client_id, &line).await;
        }
        let dropped = framer.take_dropped();
        if dropped > 0 {
            warn!(
                "Dropped {} oversized line(s) from client {} (limit {} bytes)",
                dropped, client_id, MAX_LINE_BYTES
            );
        }
    }
}

/// Waits for both players while still noticing an early disconnect.
///
/// Returns `false` if the peer closed first. Anything it sent before the start
/// is discarded.
async fn wait_for_start(
    session: &RelaySession,
    reader: &mut OwnedReadHalf,
    buffer: &mut [u8],
    client_id: u32,
) -> io::Result<bool> {
    loop {
        tokio::select! {
            biased;
            _ = session.wait_for_players() => return Ok(true),
            read = reader.read(buffer) => {
                let n = read?;
                if n == 0 {
                    return Ok(false);
                }
                debug!("Discarding {} bytes from client {} before start", n, client_id);
            }
        }
    }
}

/// Writes queued lines to the socket, one whole line at a time.
async fn write_lines(
    mut writer: OwnedWriteHalf,
    mut outbox: mpsc::Receiver<Arc<str>>,
    client_id: u32,
) {
    while let Some(line) = outbox.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            debug!("Write to client {} failed: {}", client_id, e);
            break;
        }
    }
}
