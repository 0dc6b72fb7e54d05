//! Authoritative arena state and the per-tick update rule.

use crate::{
    mix, Color, Player, PlayerId, Vec2, ARENA_MAX, ARENA_MIN, DEFAULT_SEED, PICKUP_MARGIN,
    PLAYER_RADIUS, STEP_SIZE,
};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// The single food item in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Food {
    pub x: f32,
    pub y: f32,
}

impl Food {
    /// Uniform position on a 0.004 grid covering [-1, 1) on each axis.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            x: rng.gen_range(0..500) as f32 / 250.0 - 1.0,
            y: rng.gen_range(0..500) as f32 / 250.0 - 1.0,
        }
    }

    /// Square pickup zone: both axes must be within one step plus the margin.
    pub fn is_reached_by(&self, position: Vec2) -> bool {
        let reach = STEP_SIZE + PICKUP_MARGIN;
        (position.x - self.x).abs() < reach && (position.y - self.y).abs() < reach
    }
}

/// Players plus food, and the seeded generator behind every random choice.
///
/// Player order matters: State messages list the viewer first, so index 0 of a
/// mirrored game is the receiving client's own player.
#[derive(Debug, Clone)]
pub struct Game {
    pub players: Vec<Player>,
    pub food: Food,
    rng: StdRng,
    next_player_number: u32,
    next_player_id: u32,
}

impl Game {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(mut rng: StdRng) -> Self {
        let food = Food::random(&mut rng);
        Self {
            players: Vec::new(),
            food,
            rng,
            next_player_number: 1,
            next_player_id: 1,
        }
    }

    /// Adds a player near the middle of the arena and returns its handle.
    pub fn spawn_player(&mut self) -> PlayerId {
        let low = ARENA_MIN.x + 2.0 * PLAYER_RADIUS;
        let high = ARENA_MAX.x - 2.0 * PLAYER_RADIUS;
        let position = Vec2::new(
            mix(low, high, 0.4 + 0.2 * self.rng.gen::<f32>()),
            mix(
                ARENA_MIN.y + 2.0 * PLAYER_RADIUS,
                ARENA_MAX.y - 2.0 * PLAYER_RADIUS,
                0.4 + 0.2 * self.rng.gen::<f32>(),
            ),
        );

        let color = loop {
            let color = Color::new(self.rng.gen(), self.rng.gen(), self.rng.gen());
            if !color.is_black() {
                break color.normalized();
            }
        };

        let name = self.next_player_number.to_string();
        self.next_player_number += 1;

        let id = self.allocate_id();
        info!(
            "Spawned player {} ({}) at ({:.3}, {:.3})",
            name, id, position.x, position.y
        );
        self.players.push(Player::new(id, name, position, color));
        id
    }

    /// Removes a player. Panics if the handle is not in this game.
    pub fn remove_player(&mut self, id: PlayerId) {
        let index = self
            .players
            .iter()
            .position(|player| player.id == id)
            .unwrap_or_else(|| panic!("remove_player: no player with id {}", id));

        let player = self.players.remove(index);
        info!("Removed player {} ({})", player.name, id);
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    /// Replaces every player at once, as a full-state snapshot does.
    /// Handles issued before this call stop resolving.
    pub fn replace_players(&mut self, mut players: Vec<Player>) {
        for player in &mut players {
            player.id = self.allocate_id();
        }
        self.players = players;
    }

    /// Advances the world by one tick.
    ///
    /// Moves are a fixed step per tick, so `_elapsed` does not scale them.
    pub fn update(&mut self, _elapsed: f32) {
        for player in &mut self.players {
            player.apply_controls(STEP_SIZE);
            player.extend_trail();

            if self.food.is_reached_by(player.position) {
                player.grow();
                self.food = Food::random(&mut self.rng);
                debug!(
                    "Player {} ate food, len {}, food moved to ({:.3}, {:.3})",
                    player.name, player.len, self.food.x, self.food.y
                );
            }

            player.controls.reset_downs();
        }

        self.resolve_collisions();

        for player in &mut self.players {
            player.clamp_to_arena();
        }
    }

    /// Every ordered pair of distinct players: the first's head against the
    /// second's trail. Hits from earlier pairs are visible to later ones.
    fn resolve_collisions(&mut self) {
        for attacker in 0..self.players.len() {
            for victim in 0..self.players.len() {
                if attacker == victim {
                    continue;
                }
                let Some(head) = self.players[attacker].head() else {
                    continue;
                };

                if let Some(cut) = self.players[victim].take_hit(head) {
                    debug!(
                        "Player {} hit player {} at segment {}, {} lives left",
                        self.players[attacker].name,
                        self.players[victim].name,
                        cut,
                        self.players[victim].lives
                    );
                }
            }
        }
    }

    fn allocate_id(&mut self) -> PlayerId {
        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        id
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
