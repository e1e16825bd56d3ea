//! Pointer and analog control mapping for the shader canvas.
//!
//! The renderer only ever sees a pointer position and two button flags.
//! Micro:bit inputs (tilt angles, 10-bit knob readings) are mapped onto the
//! same pointer so a shader written for the mouse reacts to the device.
//!
//! Coordinates are canvas-local pixels with y growing downwards, as the
//! browser reports them; the shader flips y itself.

/// Full-scale reading of a micro:bit analog pin.
pub const KNOB_FULL_SCALE: f32 = 1023.0;

/// Tilt beyond this many degrees is treated as fully tilted.
pub const TILT_LIMIT_DEG: f32 = 90.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

/// Pointer uniforms fed to the renderer each frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub left_down: bool,
    pub right_down: bool,
}

/// Mouse button as reported by a DOM mouse event's `button` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Other,
}

impl MouseButton {
    pub fn from_dom(button: i16) -> Self {
        match button {
            0 => Self::Left,
            2 => Self::Right,
            _ => Self::Other,
        }
    }
}

impl PointerState {
    /// Track the mouse, but only while the left button is held; hovering
    /// leaves the last position in place.  Returns whether it moved.
    pub fn move_to(&mut self, x: f32, y: f32) -> bool {
        if !self.left_down {
            return false;
        }
        self.x = x;
        self.y = y;
        true
    }

    pub fn set_button(&mut self, button: MouseButton, down: bool) {
        match button {
            MouseButton::Left => self.left_down = down,
            MouseButton::Right => self.right_down = down,
            MouseButton::Other => {}
        }
    }

    /// Button press at `(x, y)`.  A left press also grabs the pointer there.
    pub fn press_at(&mut self, button: MouseButton, x: f32, y: f32) {
        self.set_button(button, true);
        self.move_to(x, y);
    }

    /// Re-sync button flags from a DOM `buttons` bitmask when the pointer
    /// re-enters the canvas.  Only a lone left or lone right press counts.
    pub fn enter_with_buttons(&mut self, buttons: u16) {
        self.left_down = buttons == 1;
        self.right_down = buttons == 2;
    }

    /// Knob 0 drives x across the full width.
    pub fn knob_x(&mut self, reading: f32, canvas: CanvasSize) {
        self.x = knob_fraction(reading) * canvas.width;
    }

    /// Knob 1 drives y, full scale at the top.
    pub fn knob_y(&mut self, reading: f32, canvas: CanvasSize) {
        self.y = canvas.height * (1.0 - knob_fraction(reading));
    }

    /// Roll (degrees) tilts x about the horizontal centre.
    pub fn tilt_roll(&mut self, degrees: f32, canvas: CanvasSize) {
        self.x = canvas.width / 2.0 + tilt_fraction(degrees) * canvas.width / 2.0;
    }

    /// Pitch (degrees) tilts y about the vertical centre, nose-up moving up.
    pub fn tilt_pitch(&mut self, degrees: f32, canvas: CanvasSize) {
        self.y = canvas.height / 2.0 - tilt_fraction(degrees) * canvas.height / 2.0;
    }
}

fn knob_fraction(reading: f32) -> f32 {
    (reading / KNOB_FULL_SCALE).clamp(0.0, 1.0)
}

fn tilt_fraction(degrees: f32) -> f32 {
    degrees.clamp(-TILT_LIMIT_DEG, TILT_LIMIT_DEG) / TILT_LIMIT_DEG
}
