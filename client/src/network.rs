use crate::game::{ClientGameState, Outcome};
use crate::input::InputManager;
use log::{debug, error, info, warn};
use shared::Connection;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{interval, MissedTickBehavior};

pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

pub struct Client {
    stream: TcpStream,
    connection: Connection,
    tick_duration: Duration,

    game_state: ClientGameState,
    input_manager: InputManager,
    last_outcome: Outcome,
}

impl Client {
    pub async fn connect(server_addr: &str, tick_duration: Duration) -> Result<Self, ClientError> {
        info!("Connecting to {}...", server_addr);
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        info!("Connected from {}", stream.local_addr()?);

        Ok(Client {
            stream,
            connection: Connection::new(),
            tick_duration,
            game_state: ClientGameState::new(),
            input_manager: InputManager::new(),
            last_outcome: Outcome::Waiting,
        })
    }

    /// Queues this tick's controls and writes everything pending to the server
    async fn send_controls(&mut self) -> Result<(), ClientError> {
        self.input_manager
            .queue_controls(&mut self.connection.send_buffer);
        let bytes = self.connection.take_outgoing();
        self.stream.write_all(&bytes).await?;
        Ok(())
    }

    fn handle_data(&mut self, data: &[u8]) -> Result<(), ClientError> {
        self.connection.receive(data);
        let applied = self
            .game_state
            .apply_messages(&mut self.connection.recv_buffer)?;
        if applied == 0 {
            return Ok(());
        }

        let outcome = self.game_state.status();
        if outcome != self.last_outcome {
            match outcome {
                Outcome::Playing => {
                    if let Some(player) = self.game_state.local_player() {
                        info!("Playing as {}", player.name);
                    }
                }
                Outcome::Eliminated => info!("Out of lives, watching the rest of the game"),
                Outcome::Waiting => {}
            }
            self.last_outcome = outcome;
        }

        if let Some(player) = self.game_state.local_player() {
            debug!(
                "Snapshot: {} players, length {}, lives {}",
                self.game_state.game.players.len(),
                player.len,
                player.lives
            );
        }
        Ok(())
    }

    /// Runs until the server goes away or sends something undecodable
    pub async fn run(&mut self) -> Result<(), ClientError> {
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut commands = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        let mut buffer = [0u8; 4096];

        info!("Controls: type a/d/w/s to step once, +k to hold, -k to release");

        loop {
            tokio::select! {
                result = self.stream.read(&mut buffer) => {
                    match result {
                        Ok(0) => {
                            error!("Server closed the connection");
                            return Err("lost connection to server".into());
                        }
                        Ok(len) => {
                            if let Err(e) = self.handle_data(&buffer[..len]) {
                                error!("Malformed data from server: {}", e);
                                return Err(e);
                            }
                        }
                        Err(e) => {
                            error!("Error reading from server: {}", e);
                            return Err(e.into());
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.send_controls().await?;
                },

                line = commands.next_line(), if stdin_open => {
                    match line {
                        Ok(Some(line)) => {
                            if !line.trim().is_empty() && !self.input_manager.handle_command(&line) {
                                warn!("Unknown command '{}'", line.trim());
                            }
                        }
                        Ok(None) => {
                            debug!("Input closed");
                            stdin_open = false;
                        }
                        Err(e) => {
                            warn!("Error reading input: {}", e);
                            stdin_open = false;
                        }
                    }
                },
            }
        }
    }
}
