//! Directional button state carried from the input layer to the simulation.

/// One directional button.
///
/// `downs` counts press transitions since the counter was last consumed and
/// saturates at 255 instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Button {
    pub pressed: bool,
    pub downs: u8,
}

impl Button {
    /// Records a press transition.
    pub fn press(&mut self) {
        self.pressed = true;
        self.downs = self.downs.saturating_add(1);
    }

    pub fn release(&mut self) {
        self.pressed = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub left: Button,
    pub right: Button,
    pub up: Button,
    pub down: Button,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buttons in wire order: left, right, up, down.
    pub fn buttons(&self) -> [&Button; 4] {
        [&self.left, &self.right, &self.up, &self.down]
    }

    pub fn buttons_mut(&mut self) -> [&mut Button; 4] {
        [
            &mut self.left,
            &mut self.right,
            &mut self.up,
            &mut self.down,
        ]
    }

    /// Closes the per-tick edge-count window.
    pub fn reset_downs(&mut self) {
        for button in self.buttons_mut() {
            button.downs = 0;
        }
    }
}
