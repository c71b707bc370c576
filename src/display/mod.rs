// Display module - Presentation surface and window host
//
// This module provides:
// - RGBA frame buffer implementing the scheduler's `Surface`
// - Window creation with scaling support using winit + pixels
// - Heartbeat delivery from redraws and timer deadlines
// - Demo key bindings (pause, fast-forward, reset, save/load, mute, capture)

pub mod framebuffer;
pub mod window;

pub use framebuffer::{FrameBuffer, SharedFrameBuffer};
pub use window::{key_action, run_window, KeyAction, PacerWindow, WindowConfig};
