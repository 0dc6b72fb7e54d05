use log::info;
use shared::protocol::drain_state;
use shared::{DecodeError, Game, Player};

/// Where the local player stands, as far as the last snapshot says
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No snapshot has listed us yet
    Waiting,
    Playing,
    Eliminated,
}

/// Client-side mirror of the server's game, rebuilt from each snapshot
#[derive(Debug)]
pub struct ClientGameState {
    pub game: Game,
    reported_elimination: bool,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            game: Game::new(),
            reported_elimination: false,
        }
    }

    /// Applies every complete State message in `recv`. Returns how many were applied.
    pub fn apply_messages(&mut self, recv: &mut Vec<u8>) -> Result<usize, DecodeError> {
        let applied = drain_state(recv, &mut self.game)?;

        if applied > 0 && !self.reported_elimination && self.status() == Outcome::Eliminated {
            if let Some(player) = self.local_player() {
                info!("Player {} has been eliminated", player.name);
            }
            self.reported_elimination = true;
        }

        Ok(applied)
    }

    /// The server lists the receiving player first
    pub fn local_player(&self) -> Option<&Player> {
        self.game.players.first()
    }

    pub fn status(&self) -> Outcome {
        match self.local_player() {
            None => Outcome::Waiting,
            Some(player) if player.is_eliminated() => Outcome::Eliminated,
            Some(_) => Outcome::Playing,
        }
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::encode_state;
    use shared::INITIAL_LIVES;

    #[test]
    fn test_waiting_before_first_snapshot() {
        let state = ClientGameState::new();
        assert_eq!(state.status(), Outcome::Waiting);
        assert!(state.local_player().is_none());
    }

    #[test]
    fn test_snapshot_puts_viewer_first() {
        let mut server = Game::with_seed(7);
        let _first = server.spawn_player();
        let second = server.spawn_player();

        let mut bytes = Vec::new();
        encode_state(&server, Some(second), &mut bytes);

        let mut state = ClientGameState::new();
        assert_eq!(state.apply_messages(&mut bytes), Ok(1));
        assert!(bytes.is_empty());

        assert_eq!(state.game.players.len(), 2);
        assert_eq!(state.local_player().map(|p| p.name.as_str()), Some("2"));
        assert_eq!(state.local_player().map(|p| p.lives), Some(INITIAL_LIVES));
        assert_eq!(state.status(), Outcome::Playing);
        assert_eq!(state.game.food, server.food);
    }

    #[test]
    fn test_eliminated_status() {
        let mut server = Game::with_seed(7);
        let id = server.spawn_player();
        if let Some(player) = server.player_mut(id) {
            player.lives = 0;
        }

        let mut bytes = Vec::new();
        encode_state(&server, Some(id), &mut bytes);

        let mut state = ClientGameState::new();
        state.apply_messages(&mut bytes).unwrap();

        assert_eq!(state.status(), Outcome::Eliminated);
        assert!(state.reported_elimination);
    }

    #[test]
    fn test_partial_snapshot_waits() {
        let mut server = Game::with_seed(7);
        let id = server.spawn_player();

        let mut bytes = Vec::new();
        encode_state(&server, Some(id), &mut bytes);
        let tail = bytes.split_off(bytes.len() / 2);

        let mut state = ClientGameState::new();
        assert_eq!(state.apply_messages(&mut bytes), Ok(0));
        assert_eq!(state.status(), Outcome::Waiting);

        bytes.extend_from_slice(&tail);
        assert_eq!(state.apply_messages(&mut bytes), Ok(1));
        assert_eq!(state.status(), Outcome::Playing);
    }

    #[test]
    fn test_wrong_kind_is_fatal() {
        let mut state = ClientGameState::new();
        let mut bytes = vec![b'c', 4, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            state.apply_messages(&mut bytes),
            Err(DecodeError::UnexpectedKind(b'c'))
        );
    }
}
