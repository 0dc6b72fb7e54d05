//! Binary message framing shared by client and server.
//!
//! Every message is framed as
//!
//! ```text
//! ┌────────┬─────────────────────┬──────────────────┐
//! │ kind 1B│ size 3B little-end. │ payload size B   │
//! └────────┴─────────────────────┴──────────────────┘
//! ```
//!
//! `size` counts payload bytes only. Clients send `C2S_CONTROLS`, the server
//! answers with `S2C_STATE` snapshots. Decoders never consume a partial
//! message: until a whole frame is buffered they report `Decoded::Incomplete`
//! and leave the buffer untouched.

use crate::{BodySegment, Button, Color, Controls, Food, Game, Player, PlayerId, Vec2};
use log::warn;
use std::collections::VecDeque;
use thiserror::Error;

pub const HEADER_SIZE: usize = 4;
pub const CONTROLS_PAYLOAD_SIZE: u32 = 4;
/// Largest payload a 24-bit size field can describe.
pub const MAX_PAYLOAD_SIZE: usize = 0x00FF_FFFF;
/// Cap on every u8-counted list: players, name bytes, body entries.
pub const MAX_LIST_LEN: usize = 255;

const PRESSED_BIT: u8 = 0x80;
const DOWNS_MASK: u8 = 0x7F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    C2SControls = b'c',
    S2CState = b's',
}

impl MessageKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'c' => Some(MessageKind::C2SControls),
            b's' => Some(MessageKind::S2CState),
            _ => None,
        }
    }
}

/// Outcome of one decode attempt that did not hit a framing violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Header or payload not fully buffered yet; nothing consumed.
    Incomplete,
    /// The next message has a different kind tag; nothing consumed.
    OtherKind(u8),
    /// One whole message was applied and removed from the buffer.
    Consumed,
}

/// Framing violations. Any of these ends the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("controls message with size {0} != {CONTROLS_PAYLOAD_SIZE}")]
    ControlsSize(u32),

    #[error("ran out of bytes reading state message: need {need} at offset {offset}, payload is {size}")]
    Truncated {
        offset: usize,
        need: usize,
        size: usize,
    },

    #[error("trailing data in state message: read {read} of {size} bytes")]
    TrailingData { read: usize, size: usize },

    #[error("unexpected message kind 0x{0:02x}")]
    UnexpectedKind(u8),
}

/// Kind tag and declared payload size at the front of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: u8,
    pub size: u32,
}

impl FrameHeader {
    /// Reads the header without consuming it. `None` until 4 bytes are buffered.
    pub fn peek(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let size = u32::from(buf[1]) | (u32::from(buf[2]) << 8) | (u32::from(buf[3]) << 16);
        Some(Self { tag: buf[0], size })
    }

    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_tag(self.tag)
    }

    /// Header plus payload.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.size as usize
    }
}

/// Writes the kind byte and a zeroed size; returns the payload start mark.
pub fn begin_frame(out: &mut Vec<u8>, kind: MessageKind) -> usize {
    out.push(kind.tag());
    out.extend_from_slice(&[0, 0, 0]);
    out.len()
}

/// Patches the size placeholder written by `begin_frame`.
pub fn finish_frame(out: &mut Vec<u8>, mark: usize) {
    let size = out.len() - mark;
    debug_assert!(size <= MAX_PAYLOAD_SIZE, "payload of {} bytes", size);
    out[mark - 3] = size as u8;
    out[mark - 2] = (size >> 8) as u8;
    out[mark - 1] = (size >> 16) as u8;
}

/// A message ready to be framed onto a send buffer.
#[derive(Debug, Clone, Copy)]
pub enum Message<'a> {
    Controls(&'a Controls),
    State {
        game: &'a Game,
        viewer: Option<PlayerId>,
    },
}

impl Message<'_> {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Controls(_) => MessageKind::C2SControls,
            Message::State { .. } => MessageKind::S2CState,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Message::Controls(controls) => encode_controls(controls, out),
            Message::State { game, viewer } => encode_state(game, viewer, out),
        }
    }
}

// ----- controls ---------------------------------------------------------

pub fn encode_controls(controls: &Controls, out: &mut Vec<u8>) {
    let mark = begin_frame(out, MessageKind::C2SControls);
    for button in controls.buttons() {
        out.push(button_byte(button));
    }
    finish_frame(out, mark);
}

fn button_byte(button: &Button) -> u8 {
    if button.downs & PRESSED_BIT != 0 {
        warn!(
            "Button pressed {} times in one tick, sending only the low 7 bits",
            button.downs
        );
    }
    let pressed = if button.pressed { PRESSED_BIT } else { 0 };
    pressed | (button.downs & DOWNS_MASK)
}

fn apply_button_byte(button: &mut Button, byte: u8) {
    button.pressed = byte & PRESSED_BIT != 0;
    let downs = u32::from(button.downs) + u32::from(byte & DOWNS_MASK);
    if downs > u32::from(u8::MAX) {
        warn!("Got a whole lot of downs ({}), saturating at 255", downs);
    }
    button.downs = downs.min(u32::from(u8::MAX)) as u8;
}

/// Decodes one Controls message into `controls`, adding to its `downs`.
pub fn decode_controls(recv: &mut Vec<u8>, controls: &mut Controls) -> Result<Decoded, DecodeError> {
    let Some(header) = FrameHeader::peek(recv) else {
        return Ok(Decoded::Incomplete);
    };
    if header.tag != MessageKind::C2SControls.tag() {
        return Ok(Decoded::OtherKind(header.tag));
    }
    if header.size != CONTROLS_PAYLOAD_SIZE {
        return Err(DecodeError::ControlsSize(header.size));
    }
    if recv.len() < header.frame_len() {
        return Ok(Decoded::Incomplete);
    }

    let payload = &recv[HEADER_SIZE..header.frame_len()];
    for (button, &byte) in controls.buttons_mut().into_iter().zip(payload) {
        apply_button_byte(button, byte);
    }

    recv.drain(..header.frame_len());
    Ok(Decoded::Consumed)
}

/// Decodes Controls messages until the buffer runs dry. Returns how many were applied.
pub fn drain_controls(recv: &mut Vec<u8>, controls: &mut Controls) -> Result<usize, DecodeError> {
    let mut handled = 0;
    loop {
        match decode_controls(recv, controls)? {
            Decoded::Consumed => handled += 1,
            Decoded::Incomplete => return Ok(handled),
            Decoded::OtherKind(tag) => return Err(DecodeError::UnexpectedKind(tag)),
        }
    }
}

// ----- state ------------------------------------------------------------

/// Encodes a full snapshot, listing `viewer`'s player first when given.
pub fn encode_state(game: &Game, viewer: Option<PlayerId>, out: &mut Vec<u8>) {
    let mark = begin_frame(out, MessageKind::S2CState);

    let viewer_player = viewer.and_then(|id| game.player(id));
    let others = game
        .players
        .iter()
        .filter(|player| Some(player.id) != viewer);
    let records: Vec<&Player> = viewer_player
        .into_iter()
        .chain(others)
        .take(MAX_LIST_LEN)
        .collect();
    if game.players.len() > MAX_LIST_LEN {
        warn!(
            "State message truncated to {} of {} players",
            MAX_LIST_LEN,
            game.players.len()
        );
    }

    out.push(records.len() as u8);
    for player in records {
        write_player(out, player, &game.food);
    }

    finish_frame(out, mark);
}

fn write_player(out: &mut Vec<u8>, player: &Player, food: &Food) {
    put_f32(out, player.position.x);
    put_f32(out, player.position.y);
    put_f32(out, player.color.r);
    put_f32(out, player.color.g);
    put_f32(out, player.color.b);
    out.push(player.len);
    out.push(player.lives);

    put_list(out, player.name.as_bytes().iter().copied());
    put_list(out, player.body.iter().map(|segment| segment.x));
    put_list(out, player.body.iter().map(|segment| segment.y));

    // food rides along in every record
    put_f32(out, food.x);
    put_f32(out, food.y);
}

fn put_f32(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// u8 count then up to 255 bytes; longer input is silently cut.
fn put_list(out: &mut Vec<u8>, bytes: impl ExactSizeIterator<Item = u8>) {
    let len = bytes.len().min(MAX_LIST_LEN);
    out.push(len as u8);
    out.extend(bytes.take(len));
}

/// Decodes one State message, replacing every player in `game`.
///
/// Handles from before the call no longer resolve afterwards.
pub fn decode_state(recv: &mut Vec<u8>, game: &mut Game) -> Result<Decoded, DecodeError> {
    let Some(header) = FrameHeader::peek(recv) else {
        return Ok(Decoded::Incomplete);
    };
    if header.tag != MessageKind::S2CState.tag() {
        return Ok(Decoded::OtherKind(header.tag));
    }
    if recv.len() < header.frame_len() {
        return Ok(Decoded::Incomplete);
    }

    let (players, food) = {
        let mut reader = PayloadReader::new(&recv[HEADER_SIZE..header.frame_len()]);
        let count = reader.read_u8()?;
        let mut players = Vec::with_capacity(count as usize);
        let mut food = None;
        for _ in 0..count {
            let (player, record_food) = read_player(&mut reader)?;
            players.push(player);
            food = Some(record_food);
        }
        reader.finish()?;
        (players, food)
    };

    game.replace_players(players);
    if let Some(food) = food {
        game.food = food;
    }

    recv.drain(..header.frame_len());
    Ok(Decoded::Consumed)
}

/// Decodes State messages until the buffer runs dry. Returns how many were applied.
pub fn drain_state(recv: &mut Vec<u8>, game: &mut Game) -> Result<usize, DecodeError> {
    let mut handled = 0;
    loop {
        match decode_state(recv, game)? {
            Decoded::Consumed => handled += 1,
            Decoded::Incomplete => return Ok(handled),
            Decoded::OtherKind(tag) => return Err(DecodeError::UnexpectedKind(tag)),
        }
    }
}

fn read_player(reader: &mut PayloadReader<'_>) -> Result<(Player, Food), DecodeError> {
    let position = Vec2::new(reader.read_f32()?, reader.read_f32()?);
    let color = Color::new(reader.read_f32()?, reader.read_f32()?, reader.read_f32()?);
    let len = reader.read_u8()?;
    let lives = reader.read_u8()?;
    let name = String::from_utf8_lossy(reader.read_list()?).into_owned();
    let body_x = reader.read_list()?;
    let body_y = reader.read_list()?;
    if body_x.len() != body_y.len() {
        warn!(
            "Player {} has {} body x entries but {} y entries",
            name,
            body_x.len(),
            body_y.len()
        );
    }
    let body: VecDeque<BodySegment> = body_x
        .iter()
        .zip(body_y)
        .map(|(&x, &y)| BodySegment::new(x, y))
        .collect();
    let food = Food {
        x: reader.read_f32()?,
        y: reader.read_f32()?,
    };

    let player = Player {
        // replaced by Game::replace_players
        id: PlayerId(0),
        position,
        color,
        body,
        len,
        lives,
        name,
        controls: Controls::default(),
    };
    Ok((player, food))
}

/// Bounds-checked cursor over one payload.
struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_bytes(&mut self, need: usize) -> Result<&'a [u8], DecodeError> {
        if self.pos + need > self.data.len() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                need,
                size: self.data.len(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + need];
        self.pos += need;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// u8 count followed by that many bytes.
    fn read_list(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_u8()? as usize;
        self.read_bytes(len)
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.pos != self.data.len() {
            return Err(DecodeError::TrailingData {
                read: self.pos,
                size: self.data.len(),
            });
        }
        Ok(())
    }
}
