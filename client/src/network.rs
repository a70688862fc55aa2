use crate::audio::Sounds;
use crate::input::InputManager;
use crate::rendering::Renderer;
use crate::session::Session;
use crate::sync_graph::SyncGraph;
use log::{debug, info, warn};
use macroquad::prelude::{get_frame_time, next_frame, request_new_screen_size};
use shared::framing::MAX_LINE_BYTES;
use shared::{LineFramer, Message, TICK_SECONDS};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::time::sleep_until;

/// Upper bound on ticks simulated in one frame after a stall.
const MAX_TICKS_PER_FRAME: u32 = 5;
const READ_BUFFER_SIZE: usize = 4096;

#[derive(Debug)]
pub enum ConnectionError {
    /// The server closed the stream or the connection failed.
    Closed,
    Encode(serde_json::Error),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Closed => f.write_str("connection closed by server"),
            ConnectionError::Encode(e) => write!(f, "failed to encode message: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::Closed => None,
            ConnectionError::Encode(e) => Some(e),
        }
    }
}

/// A line paired with the moment it may leave or be delivered.
type Delayed<T> = (Instant, T);

/// Line connection to the relay, driven by a tokio runtime on its own thread.
///
/// The game thread never blocks on the socket: [`Connection::poll`] drains
/// whatever the background task has decoded so far, and [`Connection::send`]
/// only queues. Simulated latency holds each message back by half the fake
/// ping in each direction.
pub struct Connection {
    peer: SocketAddr,
    delay: Duration,
    outbound_tx: UnboundedSender<Delayed<String>>,
    inbound_rx: UnboundedReceiver<Message>,
}

impl Connection {
    /// Connects to `addr`; `fake_ping_ms` is split between both directions.
    ///
    /// Blocks until the TCP connection is established or has failed.
    pub fn connect(addr: &str, fake_ping_ms: u64) -> io::Result<Self> {
        let addr = addr.to_string();
        let delay = Duration::from_millis(fake_ping_ms / 2);
        let (outbound_tx, outbound_rx) = unbounded_channel();
        let (inbound_tx, inbound_rx) = unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel::<io::Result<SocketAddr>>();

        thread::Builder::new()
            .name("relay-connection".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let stream = match open(&addr).await {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    let peer = match stream.peer_addr() {
                        Ok(peer) => peer,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    if ready_tx.send(Ok(peer)).is_err() {
                        return;
                    }
                    drive(stream, peer, delay, outbound_rx, inbound_tx).await;
                });
            })?;

        let peer = ready_rx.blocking_recv().map_err(|_| {
            io::Error::new(io::ErrorKind::Other, "connection thread exited early")
        })??;

        Ok(Connection {
            peer,
            delay,
            outbound_tx,
            inbound_rx,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Returns every message delivered since the last call.
    ///
    /// Lines that fail to decode are logged and skipped. Once the connection
    /// has ended and everything it delivered has been returned, reports
    /// [`ConnectionError::Closed`].
    pub fn poll(&mut self) -> Result<Vec<Message>, ConnectionError> {
        let mut messages = Vec::new();
        loop {
            match self.inbound_rx.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Empty) => return Ok(messages),
                Err(TryRecvError::Disconnected) if messages.is_empty() => {
                    return Err(ConnectionError::Closed)
                }
                Err(TryRecvError::Disconnected) => return Ok(messages),
            }
        }
    }

    /// Queues `message` for the writer task.
    pub fn send(&mut self, message: &Message) -> Result<(), ConnectionError> {
        let line = message.to_line().map_err(ConnectionError::Encode)?;
        self.outbound_tx
            .send((Instant::now() + self.delay, line))
            .map_err(|_| ConnectionError::Closed)
    }
}

async fn open(addr: &str) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Pumps both directions until the server goes away or the game drops the
/// [`Connection`].
async fn drive(
    stream: TcpStream,
    peer: SocketAddr,
    delay: Duration,
    outbound_rx: UnboundedReceiver<Delayed<String>>,
    inbound_tx: UnboundedSender<Message>,
) {
    let (reader, writer) = stream.into_split();
    let (staged_tx, staged_rx) = unbounded_channel();

    let delivery = tokio::spawn(deliver(staged_rx, inbound_tx));
    let writing = tokio::spawn(write_lines(writer, outbound_rx, peer));

    tokio::select! {
        _ = read_lines(reader, peer, delay, staged_tx) => {
            // Hand over whatever is still in flight before reporting the close
            let _ = delivery.await;
        }
        _ = writing => {
            debug!("Connection to {} dropped by the game", peer);
        }
    }
}

async fn read_lines(
    mut reader: OwnedReadHalf,
    peer: SocketAddr,
    delay: Duration,
    staged: UnboundedSender<Delayed<Message>>,
) {
    let mut framer = LineFramer::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buffer).await {
            Ok(0) => {
                info!("Server at {} closed the connection", peer);
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Read from {} failed: {}", peer, e);
                return;
            }
        };

        let due = Instant::now() + delay;
        for line in framer.feed(&buffer[..n]) {
            match Message::from_line(&line) {
                Ok(message) => {
                    if staged.send((due, message)).is_err() {
                        return;
                    }
                }
                Err(e) => debug!("Skipping undecodable line from server: {}", e),
            }
        }
        let dropped = framer.take_dropped();
        if dropped > 0 {
            warn!(
                "Dropped {} oversized line(s) from {} (limit {} bytes)",
                dropped, peer, MAX_LINE_BYTES
            );
        }
    }
}

/// Releases inbound messages once their simulated latency has passed.
async fn deliver(
    mut staged: UnboundedReceiver<Delayed<Message>>,
    inbound: UnboundedSender<Message>,
) {
    while let Some((due, message)) = staged.recv().await {
        sleep_until(due.into()).await;
        if inbound.send(message).is_err() {
            return;
        }
    }
}

/// Writes each queued line whole, after its simulated latency.
async fn write_lines(
    mut writer: OwnedWriteHalf,
    mut outbound: UnboundedReceiver<Delayed<String>>,
    peer: SocketAddr,
) {
    while let Some((due, line)) = outbound.recv().await {
        sleep_until(due.into()).await;
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("Write to {} failed: {}", peer, e);
            return;
        }
    }
}

/// The running game: one connection, one session, one window.
pub struct Client {
    connection: Connection,
    session: Session,
    input_manager: InputManager,
    renderer: Renderer,
    sync_graph: SyncGraph,
    sounds: Sounds,

    accumulator: f32,
    pending_confirm: bool,
    window_sized: bool,
}

impl Client {
    pub fn new(server_addr: &str, fake_ping_ms: u64) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", server_addr);
        let connection = Connection::connect(server_addr, fake_ping_ms)?;
        info!("Connected to {}", connection.peer_addr());

        Ok(Client {
            connection,
            session: Session::new(),
            input_manager: InputManager::new(),
            renderer: Renderer::new(),
            sync_graph: SyncGraph::new(),
            sounds: Sounds::silent(),
            accumulator: 0.0,
            pending_confirm: false,
            window_sized: false,
        })
    }

    /// Runs fixed-rate ticks until the window closes or the server goes away.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.sounds = Sounds::load().await;

        loop {
            let frame = self.input_manager.update();
            if frame.quit {
                info!("Quit requested");
                return Ok(());
            }
            if frame.toggle_graph {
                self.sync_graph.toggle_visibility();
            }
            self.pending_confirm |= frame.confirm;

            self.accumulator += get_frame_time();
            let mut ticks = 0;
            while self.accumulator >= TICK_SECONDS {
                if ticks == MAX_TICKS_PER_FRAME {
                    debug!("Dropping {:.3}s of backlog", self.accumulator);
                    self.accumulator = 0.0;
                    break;
                }
                self.accumulator -= TICK_SECONDS;
                ticks += 1;

                let inbound = match self.connection.poll() {
                    Ok(messages) => messages,
                    Err(ConnectionError::Closed) => {
                        warn!("Server connection lost");
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };

                let mut input = frame.tick_input();
                input.confirm = std::mem::take(&mut self.pending_confirm);

                let output = self.session.tick(input, inbound);
                for message in &output.outgoing {
                    self.connection.send(message)?;
                }
                for lead in output.sync_leads {
                    self.sync_graph.record(lead);
                }
                self.renderer.note_events(&output.events);
                self.sounds.play(&output.events);
            }

            // Resize once the server has told us the field size
            if !self.window_sized && self.session.role().is_some() {
                let world = self.session.world();
                request_new_screen_size(world.width, world.height);
                self.window_sized = true;
            }

            self.renderer.render(&self.session);
            self.sync_graph.render();

            next_frame().await;
        }
    }
}
