//! Session bookkeeping for connected clients
//!
//! Each accepted TCP connection becomes a `Session` that owns:
//! - the player it controls inside the authoritative `Game`
//! - the byte buffers of its stream (`Connection`)
//! - the channel feeding its socket writer task
//!
//! The manager lives inside the server's main loop and is never shared
//! across tasks, so it needs no locking.

use log::{debug, info, warn};
use shared::protocol::{drain_controls, Message};
use shared::{Connection, DecodeError, Game, PlayerId};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Snapshots a session may have waiting for its socket writer. A client that
/// falls further behind than this is disconnected.
pub const OUTGOING_QUEUE_LIMIT: usize = 8;

/// One connected client.
#[derive(Debug)]
pub struct Session {
    /// Server-assigned identifier, unique for the server's lifetime
    pub id: u32,
    pub addr: SocketAddr,
    /// Player steered by this session's Controls messages
    pub player: PlayerId,
    pub connection: Connection,
    /// Last time any bytes arrived from this client
    pub last_seen: Instant,
    /// Set once the player's elimination has been reported
    pub eliminated: bool,
    outgoing: mpsc::Sender<Vec<u8>>,
    reader: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(
        id: u32,
        addr: SocketAddr,
        player: PlayerId,
        outgoing: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        Self {
            id,
            addr,
            player,
            connection: Connection::new(),
            last_seen: Instant::now(),
            eliminated: false,
            outgoing,
            reader: None,
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Hands queued bytes to the writer task. Returns false once the writer is
    /// gone or has fallen `OUTGOING_QUEUE_LIMIT` snapshots behind.
    pub fn flush(&mut self) -> bool {
        if !self.connection.has_outgoing() {
            return true;
        }
        match self.outgoing.try_send(self.connection.take_outgoing()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Session {} from {} is not reading, {} snapshots pending",
                    self.id, self.addr, OUTGOING_QUEUE_LIMIT
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// All live sessions, ordered by id.
pub struct ClientManager {
    sessions: BTreeMap<u32, Session>,
    next_session_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_session_id: 1,
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_clients
    }

    /// Registers a session for an accepted connection.
    ///
    /// Returns None when the server is at capacity.
    pub fn add_session(
        &mut self,
        addr: SocketAddr,
        player: PlayerId,
        outgoing: mpsc::Sender<Vec<u8>>,
    ) -> Option<u32> {
        if self.is_full() {
            return None;
        }

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        info!("Session {} opened from {} as player {}", session_id, addr, player);
        self.sessions
            .insert(session_id, Session::new(session_id, addr, player, outgoing));
        Some(session_id)
    }

    /// Ties the socket reader task to a session so it is aborted with it.
    pub fn attach_reader(&mut self, session_id: u32, reader: JoinHandle<()>) {
        match self.sessions.get_mut(&session_id) {
            Some(session) => session.reader = Some(reader),
            None => reader.abort(),
        }
    }

    pub fn remove_session(&mut self, session_id: u32) -> Option<Session> {
        let session = self.sessions.remove(&session_id)?;
        info!("Session {} from {} closed", session.id, session.addr);
        Some(session)
    }

    pub fn get(&self, session_id: u32) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    /// Buffers received bytes and applies every complete Controls message to
    /// the session's player. Returns the number of messages applied.
    ///
    /// An error is a framing violation; the caller must end the session.
    pub fn receive(
        &mut self,
        session_id: u32,
        bytes: &[u8],
        game: &mut Game,
    ) -> Result<usize, DecodeError> {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            debug!("Dropping {} bytes for closed session {}", bytes.len(), session_id);
            return Ok(0);
        };
        session.last_seen = Instant::now();
        session.connection.receive(bytes);

        let Some(player) = game.player_mut(session.player) else {
            warn!("Session {} has no player in the game", session_id);
            return Ok(0);
        };
        drain_controls(&mut session.connection.recv_buffer, &mut player.controls)
    }

    /// Queues one State message per session, each listing its own player first.
    pub fn queue_state(&mut self, game: &Game) {
        for session in self.sessions.values_mut() {
            Message::State {
                game,
                viewer: Some(session.player),
            }
            .encode(&mut session.connection.send_buffer);
        }
    }

    /// Pushes every send buffer to its writer. Returns sessions whose writer has
    /// gone away or stopped keeping up.
    pub fn flush_all(&mut self) -> Vec<u32> {
        self.sessions
            .values_mut()
            .filter_map(|session| (!session.flush()).then_some(session.id))
            .collect()
    }

    /// Reports players newly eliminated since the last call, once each.
    pub fn newly_eliminated(&mut self, game: &Game) -> Vec<(u32, PlayerId)> {
        let mut eliminated = Vec::new();
        for session in self.sessions.values_mut() {
            if session.eliminated {
                continue;
            }
            if game
                .player(session.player)
                .is_some_and(|player| player.is_eliminated())
            {
                session.eliminated = true;
                eliminated.push((session.id, session.player));
            }
        }
        eliminated
    }

    /// Sessions that have been silent for longer than `timeout`.
    pub fn timed_out(&self, timeout: Duration) -> Vec<u32> {
        self.sessions
            .values()
            .filter(|session| session.is_timed_out(timeout))
            .map(|session| session.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::{decode_state, encode_controls};
    use shared::{Controls, Decoded};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn open_session(
        manager: &mut ClientManager,
        game: &mut Game,
        addr: SocketAddr,
    ) -> (u32, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(OUTGOING_QUEUE_LIMIT);
        let player = game.spawn_player();
        let session_id = manager.add_session(addr, player, tx).unwrap();
        (session_id, rx)
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_sessions() {
        let mut manager = ClientManager::new(3);
        let mut game = Game::new();

        let (first, _rx1) = open_session(&mut manager, &mut game, test_addr());
        let (second, _rx2) = open_session(&mut manager, &mut game, test_addr2());

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.get(first).unwrap().addr, test_addr());
    }

    #[test]
    fn test_add_session_max_capacity() {
        let mut manager = ClientManager::new(1);
        let mut game = Game::new();
        let (_first, _rx) = open_session(&mut manager, &mut game, test_addr());
        assert!(manager.is_full());

        let (tx, _rx2) = mpsc::channel(OUTGOING_QUEUE_LIMIT);
        assert!(manager.add_session(test_addr2(), PlayerId(99), tx).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_session() {
        let mut manager = ClientManager::new(2);
        let mut game = Game::new();
        let (session_id, _rx) = open_session(&mut manager, &mut game, test_addr());

        let session = manager.remove_session(session_id).unwrap();
        assert_eq!(session.id, session_id);
        assert!(manager.is_empty());
        assert!(manager.remove_session(session_id).is_none());
    }

    #[test]
    fn test_receive_applies_controls() {
        let mut manager = ClientManager::new(2);
        let mut game = Game::new();
        let (session_id, _rx) = open_session(&mut manager, &mut game, test_addr());

        let mut controls = Controls::new();
        controls.left.press();
        let mut bytes = Vec::new();
        encode_controls(&controls, &mut bytes);

        // split mid-frame: nothing applies until the rest arrives
        assert_eq!(manager.receive(session_id, &bytes[..5], &mut game), Ok(0));
        assert_eq!(manager.receive(session_id, &bytes[5..], &mut game), Ok(1));

        let player = game.player(manager.get(session_id).unwrap().player).unwrap();
        assert!(player.controls.left.pressed);
        assert_eq!(player.controls.left.downs, 1);
        assert!(manager.get(session_id).unwrap().connection.recv_buffer.is_empty());
    }

    #[test]
    fn test_receive_rejects_bad_frame() {
        let mut manager = ClientManager::new(2);
        let mut game = Game::new();
        let (session_id, _rx) = open_session(&mut manager, &mut game, test_addr());

        let result = manager.receive(session_id, &[b'c', 9, 0, 0], &mut game);
        assert_eq!(result, Err(DecodeError::ControlsSize(9)));

        let (other, _rx2) = open_session(&mut manager, &mut game, test_addr2());
        let result = manager.receive(other, &[b's', 0, 0, 0], &mut game);
        assert_eq!(result, Err(DecodeError::UnexpectedKind(b's')));
    }

    #[test]
    fn test_receive_for_unknown_session() {
        let mut manager = ClientManager::new(2);
        let mut game = Game::new();
        assert_eq!(manager.receive(42, &[1, 2, 3], &mut game), Ok(0));
    }

    #[test]
    fn test_queue_and_flush_state() {
        let mut manager = ClientManager::new(2);
        let mut game = Game::new();
        let (_first, mut rx1) = open_session(&mut manager, &mut game, test_addr());
        let (_second, mut rx2) = open_session(&mut manager, &mut game, test_addr2());

        manager.queue_state(&game);
        assert!(manager.flush_all().is_empty());

        let mut first_view = Game::new();
        let mut bytes = rx1.try_recv().unwrap();
        assert_eq!(decode_state(&mut bytes, &mut first_view), Ok(Decoded::Consumed));
        assert_eq!(first_view.players[0].name, "1");

        let mut second_view = Game::new();
        let mut bytes = rx2.try_recv().unwrap();
        assert_eq!(decode_state(&mut bytes, &mut second_view), Ok(Decoded::Consumed));
        assert_eq!(second_view.players[0].name, "2");
        assert_eq!(second_view.players[1].name, "1");

        // nothing queued, nothing sent
        assert!(manager.flush_all().is_empty());
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn test_flush_reports_closed_writer() {
        let mut manager = ClientManager::new(2);
        let mut game = Game::new();
        let (session_id, rx) = open_session(&mut manager, &mut game, test_addr());
        drop(rx);

        manager.queue_state(&game);
        assert_eq!(manager.flush_all(), vec![session_id]);
    }

    #[test]
    fn test_flush_drops_session_that_stops_reading() {
        let mut manager = ClientManager::new(2);
        let mut game = Game::new();
        let (session_id, mut rx) = open_session(&mut manager, &mut game, test_addr());
        let mut controls = Vec::new();
        encode_controls(&Controls::new(), &mut controls);

        for _ in 0..OUTGOING_QUEUE_LIMIT {
            manager.receive(session_id, &controls, &mut game).unwrap();
            manager.queue_state(&game);
            assert!(manager.flush_all().is_empty());
        }

        // still sending controls, but the writer queue is full
        manager.receive(session_id, &controls, &mut game).unwrap();
        manager.queue_state(&game);
        assert_eq!(manager.flush_all(), vec![session_id]);
        assert!(manager.timed_out(Duration::from_secs(1)).is_empty());

        let mut pending = 0;
        while rx.try_recv().is_ok() {
            pending += 1;
        }
        assert_eq!(pending, OUTGOING_QUEUE_LIMIT);
    }

    #[test]
    fn test_newly_eliminated_reports_once() {
        let mut manager = ClientManager::new(2);
        let mut game = Game::new();
        let (session_id, _rx) = open_session(&mut manager, &mut game, test_addr());
        let player = manager.get(session_id).unwrap().player;

        assert!(manager.newly_eliminated(&game).is_empty());

        game.player_mut(player).unwrap().lives = 0;
        assert_eq!(manager.newly_eliminated(&game), vec![(session_id, player)]);
        assert!(manager.newly_eliminated(&game).is_empty());
    }

    #[test]
    fn test_timed_out() {
        let mut manager = ClientManager::new(2);
        let mut game = Game::new();
        let (session_id, _rx) = open_session(&mut manager, &mut game, test_addr());

        assert!(manager.timed_out(Duration::from_secs(1)).is_empty());

        manager.sessions.get_mut(&session_id).unwrap().last_seen =
            Instant::now() - Duration::from_secs(2);

        assert_eq!(manager.timed_out(Duration::from_secs(1)), vec![session_id]);
    }
}
