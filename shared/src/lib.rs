pub mod connection;
pub mod controls;
pub mod game;
pub mod player;
pub mod protocol;

pub use connection::Connection;
pub use controls::{Button, Controls};
pub use game::{Food, Game};
pub use player::{BodySegment, Player, PlayerId};
pub use protocol::{DecodeError, Decoded, MessageKind};

pub const ARENA_MIN: Vec2 = Vec2 { x: -1.0, y: -1.0 };
pub const ARENA_MAX: Vec2 = Vec2 { x: 1.0, y: 1.0 };
pub const PLAYER_RADIUS: f32 = 0.02;

/// Distance covered by one pressed direction in one tick.
pub const STEP_SIZE: f32 = 2.0 * PLAYER_RADIUS;
pub const PICKUP_MARGIN: f32 = 0.008;
/// Per-axis distance, in quantized body units, below which a head hits a segment.
pub const HIT_THRESHOLD: f32 = 0.021;

pub const BODY_SCALE: f32 = 50.0;
pub const BODY_OFFSET: f32 = 50.0;

pub const INITIAL_LEN: u8 = 4;
pub const INITIAL_LIVES: u8 = 3;
pub const DEFAULT_SEED: u64 = 0x1546_6666;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn is_black(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }

    pub fn length(&self) -> f32 {
        (self.r * self.r + self.g * self.g + self.b * self.b).sqrt()
    }

    /// Scales the color to unit length. Black stays black.
    pub fn normalized(self) -> Self {
        let length = self.length();
        if length > 0.0 {
            Self::new(self.r / length, self.g / length, self.b / length)
        } else {
            self
        }
    }
}

/// Maps a world coordinate onto the byte grid used by body trails.
pub fn quantize(coord: f32) -> u8 {
    // `as` saturates, so anything outside [-1, 4.1] pins to 0 or 255
    (coord * BODY_SCALE + BODY_OFFSET) as u8
}

/// Linear blend between `a` and `b`.
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
