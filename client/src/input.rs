//! Client input layer turning key events into button state

use log::debug;
use shared::protocol::encode_controls;
use shared::{Button, Controls};

/// Keys the arena reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    A,
    D,
    W,
    S,
}

impl Key {
    /// Maps a typed character to a key, ignoring case
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'a' => Some(Key::A),
            'd' => Some(Key::D),
            'w' => Some(Key::W),
            's' => Some(Key::S),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down { key: Key, repeat: bool },
    Up { key: Key },
}

/// Collects key events into the controls sent to the server each tick
#[derive(Debug, Default)]
pub struct InputManager {
    controls: Controls,
    /// Tapped keys, released once the next Controls message is queued
    taps: Vec<Key>,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    fn button_mut(&mut self, key: Key) -> &mut Button {
        match key {
            Key::A => &mut self.controls.left,
            Key::D => &mut self.controls.right,
            Key::W => &mut self.controls.up,
            Key::S => &mut self.controls.down,
        }
    }

    /// Applies a key event. Returns whether the event was consumed.
    pub fn handle_event(&mut self, event: KeyEvent) -> bool {
        match event {
            // Auto-repeat is not a new press
            KeyEvent::Down { repeat: true, .. } => false,
            KeyEvent::Down { key, repeat: false } => {
                self.taps.retain(|tapped| *tapped != key);
                self.button_mut(key).press();
                true
            }
            KeyEvent::Up { key } => {
                self.taps.retain(|tapped| *tapped != key);
                self.button_mut(key).release();
                true
            }
        }
    }

    /// Applies one text command: `+k` presses `k`, `-k` releases it and a
    /// bare `k` taps it, holding it for exactly one sent Controls message.
    /// Returns false when the line is not a command.
    pub fn handle_command(&mut self, line: &str) -> bool {
        let line = line.trim();
        let mut chars = line.chars();
        let (first, rest) = match (chars.next(), chars.next(), chars.next()) {
            (Some(first), rest, None) => (first, rest),
            _ => return false,
        };

        match (first, rest) {
            ('+', Some(c)) => match Key::from_char(c) {
                Some(key) => self.handle_event(KeyEvent::Down { key, repeat: false }),
                None => false,
            },
            ('-', Some(c)) => match Key::from_char(c) {
                Some(key) => self.handle_event(KeyEvent::Up { key }),
                None => false,
            },
            (c, None) => match Key::from_char(c) {
                Some(key) => {
                    self.handle_event(KeyEvent::Down { key, repeat: false });
                    self.taps.push(key);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Encodes the current controls into `out` and starts a new press window
    pub fn queue_controls(&mut self, out: &mut Vec<u8>) {
        encode_controls(&self.controls, out);
        debug!("Queued controls {:?}", self.controls);
        self.controls.reset_downs();

        for key in std::mem::take(&mut self.taps) {
            self.button_mut(key).release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::{decode_controls, drain_controls};
    use shared::{Decoded, Game, STEP_SIZE};

    fn down(key: Key) -> KeyEvent {
        KeyEvent::Down { key, repeat: false }
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(Key::from_char('a'), Some(Key::A));
        assert_eq!(Key::from_char('D'), Some(Key::D));
        assert_eq!(Key::from_char('w'), Some(Key::W));
        assert_eq!(Key::from_char('s'), Some(Key::S));
        assert_eq!(Key::from_char('x'), None);
    }

    #[test]
    fn test_press_and_release() {
        let mut input = InputManager::new();

        assert!(input.handle_event(down(Key::A)));
        assert!(input.controls().left.pressed);
        assert_eq!(input.controls().left.downs, 1);

        assert!(input.handle_event(KeyEvent::Up { key: Key::A }));
        assert!(!input.controls().left.pressed);
        assert_eq!(input.controls().left.downs, 1);
    }

    #[test]
    fn test_repeat_is_ignored() {
        let mut input = InputManager::new();
        input.handle_event(down(Key::W));

        let consumed = input.handle_event(KeyEvent::Down {
            key: Key::W,
            repeat: true,
        });

        assert!(!consumed);
        assert_eq!(input.controls().up.downs, 1);
    }

    #[test]
    fn test_key_to_button_mapping() {
        let mut input = InputManager::new();
        input.handle_event(down(Key::D));
        input.handle_event(down(Key::S));

        let controls = input.controls();
        assert!(controls.right.pressed);
        assert!(controls.down.pressed);
        assert!(!controls.left.pressed);
        assert!(!controls.up.pressed);
    }

    #[test]
    fn test_commands() {
        let mut input = InputManager::new();

        assert!(input.handle_command("+a"));
        assert!(input.controls().left.pressed);

        assert!(input.handle_command(" -a \n"));
        assert!(!input.controls().left.pressed);

        assert!(input.handle_command("w"));
        assert!(input.controls().up.pressed);
        assert_eq!(input.controls().up.downs, 1);

        assert!(!input.handle_command(""));
        assert!(!input.handle_command("+x"));
        assert!(!input.handle_command("quit"));
        assert!(!input.handle_command("q"));
    }

    #[test]
    fn test_queue_controls_resets_downs() {
        let mut input = InputManager::new();
        input.handle_command("s");
        input.handle_command("s");
        input.handle_command("+d");

        let mut out = Vec::new();
        input.queue_controls(&mut out);

        assert_eq!(out, vec![b'c', 4, 0, 0, 0, 0x81, 0, 0x82]);
        assert_eq!(input.controls().down.downs, 0);
        assert!(!input.controls().down.pressed);
        assert!(input.controls().right.pressed);

        let mut decoded = Controls::default();
        assert_eq!(decode_controls(&mut out, &mut decoded), Ok(Decoded::Consumed));
        assert_eq!(decoded.down.downs, 2);
        assert_eq!(decoded.right.downs, 1);
    }

    #[test]
    fn test_hold_after_tap_keeps_button_down() {
        let mut input = InputManager::new();
        input.handle_command("a");
        input.handle_command("+a");

        let mut out = Vec::new();
        input.queue_controls(&mut out);

        assert!(input.controls().left.pressed);
        assert_eq!(out[4], 0x82);
    }

    #[test]
    fn test_tap_moves_player_one_step() {
        let mut game = Game::with_seed(5);
        let id = game.spawn_player();
        let start = game.player(id).unwrap().position;

        let mut input = InputManager::new();
        assert!(input.handle_command("d"));

        let mut wire = Vec::new();
        input.queue_controls(&mut wire);
        let player = game.player_mut(id).unwrap();
        assert_eq!(drain_controls(&mut wire, &mut player.controls), Ok(1));
        game.update(0.1);

        let moved = game.player(id).unwrap().position;
        assert!((moved.x - (start.x + STEP_SIZE)).abs() < 1e-6);
        assert!((moved.y - start.y).abs() < 1e-6);

        // released with the next message: no further movement
        input.queue_controls(&mut wire);
        let player = game.player_mut(id).unwrap();
        assert_eq!(drain_controls(&mut wire, &mut player.controls), Ok(1));
        game.update(0.1);

        let after = game.player(id).unwrap().position;
        assert!((after.x - moved.x).abs() < 1e-6);
    }
}
