use serde::{Deserialize, Serialize};

pub const DEFAULT_DISPLAY: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl Rotation {
    fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Rotation90 | Rotation::Rotation270)
    }
}

/// Current size and orientation of the display the transform runs on.
///
/// `width` and `height` are in the current orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLayout {
    pub display_id: i32,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
}

impl Default for DisplayLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY, 1080, 2340)
    }
}

impl DisplayLayout {
    pub fn new(display_id: i32, width: u32, height: u32) -> Self {
        Self {
            display_id,
            width,
            height,
            rotation: Rotation::Rotation0,
        }
    }

    /// Returns the layout after rotating to `rotation`, swapping the
    /// dimensions when the orientation flips.
    pub fn rotated(&self, rotation: Rotation) -> Self {
        let mut next = *self;
        if self.rotation.is_quarter_turn() != rotation.is_quarter_turn() {
            std::mem::swap(&mut next.width, &mut next.height);
        }
        next.rotation = rotation;
        next
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Vertical shift applied while the mode is active.
    pub fn transform_offset(&self, percentage: u8) -> i32 {
        let fraction = f32::from(percentage.min(100)) / 100.0;
        (self.height as f32 * fraction).round() as i32
    }
}
