use crate::{
    quantize, Color, Controls, Vec2, ARENA_MAX, ARENA_MIN, HIT_THRESHOLD, INITIAL_LEN,
    INITIAL_LIVES, PLAYER_RADIUS,
};
use std::collections::VecDeque;
use std::fmt;

/// Stable handle to a player inside one `Game`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One trail entry on the quantized byte grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BodySegment {
    pub x: u8,
    pub y: u8,
}

impl BodySegment {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    pub fn at(position: Vec2) -> Self {
        Self::new(quantize(position.x), quantize(position.y))
    }

    /// True when both axis distances fall below the hit threshold.
    pub fn overlaps(&self, other: &BodySegment) -> bool {
        (self.x as f32 - other.x as f32).abs() < HIT_THRESHOLD
            && (self.y as f32 - other.y as f32).abs() < HIT_THRESHOLD
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub position: Vec2,
    pub color: Color,
    /// Trail of past positions, oldest first, never longer than `len` after a tick.
    pub body: VecDeque<BodySegment>,
    pub len: u8,
    pub lives: u8,
    pub name: String,
    pub controls: Controls,
}

impl Player {
    pub fn new(id: PlayerId, name: String, position: Vec2, color: Color) -> Self {
        let mut body = VecDeque::with_capacity(INITIAL_LEN as usize + 1);
        body.push_back(BodySegment::at(position));

        Self {
            id,
            position,
            color,
            body,
            len: INITIAL_LEN,
            lives: INITIAL_LIVES,
            name,
            controls: Controls::default(),
        }
    }

    /// Trail entry used as the head when resolving hits.
    pub fn head(&self) -> Option<BodySegment> {
        self.body.front().copied()
    }

    pub fn is_eliminated(&self) -> bool {
        self.lives == 0
    }

    /// Moves one step per pressed direction. Opposite presses cancel out.
    pub fn apply_controls(&mut self, step: f32) {
        if self.controls.left.pressed {
            self.position.x -= step;
        }
        if self.controls.right.pressed {
            self.position.x += step;
        }
        if self.controls.down.pressed {
            self.position.y -= step;
        }
        if self.controls.up.pressed {
            self.position.y += step;
        }
    }

    /// Appends the current position to the trail and drops the oldest entries
    /// beyond `len`.
    pub fn extend_trail(&mut self) {
        self.body.push_back(BodySegment::at(self.position));
        while self.body.len() > self.len as usize {
            self.body.pop_front();
        }
    }

    pub fn grow(&mut self) {
        self.len = self.len.saturating_add(1);
    }

    /// Checks `head` against this player's segments `1..len` and, on the first
    /// overlap, cuts the trail there and costs one life. Returns the cut index.
    pub fn take_hit(&mut self, head: BodySegment) -> Option<usize> {
        let reach = (self.len as usize).min(self.body.len());
        let index = (1..reach).find(|&i| head.overlaps(&self.body[i]))?;

        self.body.truncate(index);
        self.lives = self.lives.saturating_sub(1);
        self.len = index as u8;
        Some(index)
    }

    /// Hard clamp into the arena, inset by the player radius.
    pub fn clamp_to_arena(&mut self) {
        self.position.x = self
            .position
            .x
            .clamp(ARENA_MIN.x + PLAYER_RADIUS, ARENA_MAX.x - PLAYER_RADIUS);
        self.position.y = self
            .position
            .y
            .clamp(ARENA_MIN.y + PLAYER_RADIUS, ARENA_MAX.y - PLAYER_RADIUS);
    }
}
