//! Server network layer handling TCP sessions and game loop coordination

use crate::client_manager::{ClientManager, OUTGOING_QUEUE_LIMIT};
use log::{debug, error, info, warn};
use shared::{Game, DEFAULT_SEED};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Socket reads are handed to the main loop in chunks of at most this size.
const READ_CHUNK_SIZE: usize = 4096;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Accepted { stream: TcpStream, addr: SocketAddr },
    Received { session_id: u32, data: Vec<u8> },
    Closed { session_id: u32 },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    pub max_clients: usize,
    /// Seed of the game's random source
    pub seed: u64,
    /// Sessions silent for longer than this are dropped
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_millis(100),
            max_clients: 16,
            seed: DEFAULT_SEED,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Authoritative server: owns the game and every session, advances the
/// simulation at a fixed rate and sends each client a full snapshot per tick.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    game: Game,
    config: ServerConfig,
    tick: u64,

    // Communication channel from network tasks
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(config.max_clients),
            game: Game::with_seed(config.seed),
            config,
            tick: 0,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Spawns task that accepts connections and forwards them to the main loop
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if server_tx
                            .send(ServerMessage::Accepted { stream, addr })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns a player for a new connection and starts its socket tasks
    fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        if self.clients.is_full() {
            warn!(
                "Refusing connection from {}: server full ({} clients)",
                addr,
                self.clients.len()
            );
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to disable Nagle for {}: {}", addr, e);
        }

        let (read_half, write_half) = stream.into_split();
        let (out_tx, out_rx) = mpsc::channel(OUTGOING_QUEUE_LIMIT);

        let player = self.game.spawn_player();
        let Some(session_id) = self.clients.add_session(addr, player, out_tx) else {
            self.game.remove_player(player);
            return;
        };

        tokio::spawn(pump_outgoing(write_half, out_rx));
        let reader = tokio::spawn(pump_incoming(
            session_id,
            read_half,
            self.server_tx.clone(),
        ));
        self.clients.attach_reader(session_id, reader);
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Accepted { stream, addr } => self.handle_accept(stream, addr),
            ServerMessage::Received { session_id, data } => {
                if let Err(e) = self.clients.receive(session_id, &data, &mut self.game) {
                    warn!("Session {} sent a malformed message: {}", session_id, e);
                    self.close_session(session_id);
                }
            }
            ServerMessage::Closed { session_id } => self.close_session(session_id),
        }
    }

    fn close_session(&mut self, session_id: u32) {
        if let Some(session) = self.clients.remove_session(session_id) {
            self.game.remove_player(session.player);
        }
    }

    /// Advances the simulation one step and queues a snapshot for every session
    fn run_tick(&mut self, dt: f32) {
        for session_id in self.clients.timed_out(self.config.timeout) {
            info!("Session {} timed out", session_id);
            self.close_session(session_id);
        }

        self.game.update(dt);
        self.tick += 1;

        for (session_id, player) in self.clients.newly_eliminated(&self.game) {
            if let Some(player) = self.game.player(player) {
                info!(
                    "Player {} (session {}) has been eliminated",
                    player.name, session_id
                );
            }
        }

        self.clients.queue_state(&self.game);
        for session_id in self.clients.flush_all() {
            debug!("Writer for session {} stopped or fell behind", session_id);
            self.close_session(session_id);
        }

        // Periodic monitoring
        if self.tick % 60 == 0 && !self.clients.is_empty() {
            debug!(
                "Tick {}: {} sessions, {} players, {:.1}Hz",
                self.tick,
                self.clients.len(),
                self.game.players.len(),
                1.0 / dt.max(f32::EPSILON)
            );
        }
    }

    /// Main server loop: network events and fixed-rate ticks, one at a time
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_acceptor();

        let mut tick_interval = interval(self.config.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // never closes: the server holds a sender for new readers
                Some(message) = self.server_rx.recv() => self.handle_message(message),

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.run_tick(dt);
                },
            }
        }
    }
}

/// Writes queued snapshots to the socket until the session drops its sender
async fn pump_outgoing<W>(mut writer: W, mut outgoing: mpsc::Receiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(bytes) = outgoing.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            debug!("Socket write failed: {}", e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}

/// Forwards socket reads to the main loop, then reports the close
async fn pump_incoming<R>(
    session_id: u32,
    mut reader: R,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(len) => {
                let message = ServerMessage::Received {
                    session_id,
                    data: buffer[..len].to_vec(),
                };
                if server_tx.send(message).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!("Socket read for session {} failed: {}", session_id, e);
                break;
            }
        }
    }
    let _ = server_tx.send(ServerMessage::Closed { session_id });
}
