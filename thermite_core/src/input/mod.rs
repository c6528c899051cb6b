//! Input device event payloads and their `winit` conversions.

pub mod keyboard;
pub mod mouse;
