// Window module - Hosts a session in a winit window
//
// The window is the heartbeat host: display-synchronized heartbeats are
// delivered on every redraw, interval-timer heartbeats by sleeping the event
// loop until the armed deadline. Presented frames land in a shared frame
// buffer which is blitted with pixels whenever it changed.

use super::framebuffer::{FrameBuffer, SharedFrameBuffer};
use crate::core::{EmulationCore, TEST_PATTERN_HEIGHT, TEST_PATTERN_WIDTH};
use crate::scheduler::{HeartbeatHandle, PolledHeartbeat, TimingMode};
use crate::session::Session;
use crate::timing::{Clock, MonotonicClock};
use pixels::{Pixels, SurfaceTexture};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

/// Save-state slot used by the quick save/load keys
const QUICK_SLOT: u8 = 0;

/// Window configuration
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Scale factor (1x, 2x, 3x, 4x, etc.)
    pub scale: u32,
    /// Core frame width in pixels
    pub width: u32,
    /// Core frame height in pixels
    pub height: u32,
    /// Show the measured frame rate in the title
    pub show_fps: bool,
}

impl WindowConfig {
    /// Create a new window configuration with default values
    ///
    /// Default: 3x scale, 160×144 frames, no FPS display
    pub fn new() -> Self {
        Self {
            title: "emu-pacer".to_string(),
            scale: 3,
            width: TEST_PATTERN_WIDTH as u32,
            height: TEST_PATTERN_HEIGHT as u32,
            show_fps: false,
        }
    }

    /// Set the window title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the scale factor
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale.clamp(1, 8); // Clamp between 1x and 8x
        self
    }

    /// Set the core frame size
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Enable or disable the FPS title display
    pub fn with_show_fps(mut self, show_fps: bool) -> Self {
        self.show_fps = show_fps;
        self
    }

    /// Get the window width in pixels
    pub fn window_width(&self) -> u32 {
        self.width * self.scale
    }

    /// Get the window height in pixels
    pub fn window_height(&self) -> u32 {
        self.height * self.scale
    }

    /// Title shown for a measured frame rate
    pub fn title_with_fps(&self, fps: u32) -> String {
        if self.show_fps {
            format!("{} - {} fps", self.title, fps)
        } else {
            self.title.clone()
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Actions bound to keys in the demo window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Pause or resume emulation
    TogglePause,
    /// Hold (true) or release (false) fast-forward
    FastForward(bool),
    /// Reset the core
    Reset,
    /// Save to slot 0
    QuickSave,
    /// Load from slot 0
    QuickLoad,
    /// Mute or unmute sound
    ToggleMute,
    /// Start or stop WAV capture
    ToggleCapture,
    /// Switch between display-synchronized and interval-timer pacing
    ToggleTimingMode,
    /// Close the window
    Quit,
}

/// Map a key event to an action
///
/// Auto-repeated presses are ignored; only fast-forward reacts to release.
pub fn key_action(code: KeyCode, state: ElementState, repeat: bool) -> Option<KeyAction> {
    if repeat {
        return None;
    }
    match (code, state) {
        (KeyCode::Tab, ElementState::Pressed) => Some(KeyAction::FastForward(true)),
        (KeyCode::Tab, ElementState::Released) => Some(KeyAction::FastForward(false)),
        (_, ElementState::Released) => None,
        (KeyCode::KeyP, _) => Some(KeyAction::TogglePause),
        (KeyCode::KeyR, _) => Some(KeyAction::Reset),
        (KeyCode::F5, _) => Some(KeyAction::QuickSave),
        (KeyCode::F7, _) => Some(KeyAction::QuickLoad),
        (KeyCode::KeyM, _) => Some(KeyAction::ToggleMute),
        (KeyCode::KeyC, _) => Some(KeyAction::ToggleCapture),
        (KeyCode::KeyT, _) => Some(KeyAction::ToggleTimingMode),
        (KeyCode::Escape, _) => Some(KeyAction::Quit),
        _ => None,
    }
}

/// Window hosting a session
pub struct PacerWindow<C: EmulationCore> {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    config: WindowConfig,
    frame_buffer: SharedFrameBuffer,
    session: Session<C, PolledHeartbeat>,
    clock: MonotonicClock,
    reported_fps: Rc<Cell<Option<u32>>>,
}

impl<C: EmulationCore + 'static> PacerWindow<C> {
    /// Create a window for `session`
    ///
    /// `clock` must be the clock the session's heartbeat source was built
    /// with, so timer deadlines line up.
    pub fn new(
        config: WindowConfig,
        mut session: Session<C, PolledHeartbeat>,
        clock: MonotonicClock,
    ) -> Self {
        let frame_buffer =
            FrameBuffer::new(config.width as usize, config.height as usize).into_shared();
        session.set_surface(Rc::clone(&frame_buffer));

        let reported_fps = Rc::new(Cell::new(None));
        let sink = Rc::clone(&reported_fps);
        session
            .scheduler_mut()
            .on_rate_changed(move |fps| sink.set(Some(fps)));

        Self {
            window: None,
            pixels: None,
            config,
            frame_buffer,
            session,
            clock,
            reported_fps,
        }
    }

    /// The hosted session
    pub fn session(&self) -> &Session<C, PolledHeartbeat> {
        &self.session
    }

    fn create_surface(
        &mut self,
        event_loop: &ActiveEventLoop,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(
                self.config.window_width(),
                self.config.window_height(),
            ))
            .with_resizable(false);

        // Wrap window in Arc for shared ownership
        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let window_size = window.inner_size();

        let surface_texture =
            SurfaceTexture::new(window_size.width, window_size.height, Arc::clone(&window));
        let pixels = Pixels::new(self.config.width, self.config.height, surface_texture)?;

        self.window = Some(window);
        self.pixels = Some(pixels);
        Ok(())
    }

    fn deliver(&mut self, handle: HeartbeatHandle, event_loop: &ActiveEventLoop) {
        match self.session.heartbeat(handle) {
            Ok(tick) => {
                if tick.rendered {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Heartbeat failed, exiting");
                event_loop.exit();
            }
        }
    }

    /// Blit the frame buffer if it changed since the last draw
    fn draw(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(pixels) = self.pixels.as_mut() else {
            return Ok(());
        };

        let mut buffer = self.frame_buffer.borrow_mut();
        if !buffer.take_dirty() {
            return Ok(());
        }
        let (width, height) = (buffer.width() as u32, buffer.height() as u32);
        if width != self.config.width || height != self.config.height {
            self.config.width = width;
            self.config.height = height;
            pixels.resize_buffer(self.config.width, self.config.height)?;
        }
        buffer.to_rgba(pixels.frame_mut());
        drop(buffer);

        pixels.render()?;
        Ok(())
    }

    fn update_title(&mut self) {
        if let Some(fps) = self.reported_fps.take() {
            if let Some(window) = &self.window {
                window.set_title(&self.config.title_with_fps(fps));
            }
        }
    }

    fn handle_action(&mut self, action: KeyAction, event_loop: &ActiveEventLoop) {
        match action {
            KeyAction::TogglePause => self.session.toggle_pause(),
            KeyAction::FastForward(enabled) => self.session.set_fast_forward(enabled),
            KeyAction::Reset => self.session.reset(),
            KeyAction::QuickSave => {
                if let Err(err) = self.session.save_state(QUICK_SLOT) {
                    tracing::warn!(error = %err, "Quick save failed");
                }
            }
            KeyAction::QuickLoad => {
                if let Err(err) = self.session.load_state(QUICK_SLOT) {
                    tracing::warn!(error = %err, "Quick load failed");
                }
            }
            KeyAction::ToggleMute => {
                let muted = self.session.toggle_mute();
                tracing::info!(muted, "Mute toggled");
            }
            KeyAction::ToggleCapture => {
                let result = if self.session.is_capturing() {
                    self.session.stop_capture()
                } else {
                    self.session.start_capture_timestamped().map(|_| ())
                };
                if let Err(err) = result {
                    tracing::warn!(error = %err, "Capture toggle failed");
                }
            }
            KeyAction::ToggleTimingMode => {
                let mode = match self.session.scheduler().timing_mode() {
                    TimingMode::DisplaySynchronized => TimingMode::IntervalTimer,
                    TimingMode::IntervalTimer => TimingMode::DisplaySynchronized,
                };
                if let Err(err) = self.session.set_timing_mode(mode) {
                    tracing::error!(error = %err, "Timing mode switch failed, exiting");
                    event_loop.exit();
                }
            }
            KeyAction::Quit => {
                self.session.stop();
                event_loop.exit();
            }
        }
    }
}

impl<C: EmulationCore + 'static> ApplicationHandler for PacerWindow<C> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(err) = self.create_surface(event_loop) {
            tracing::error!(error = %err, "Failed to create window");
            event_loop.exit();
            return;
        }

        if let Err(err) = self.session.start() {
            tracing::error!(error = %err, "Failed to start session");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested, exiting");
                self.session.stop();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if let Some(action) = key_action(code, state, repeat) {
                    tracing::debug!(?action, "Key action");
                    self.handle_action(action, event_loop);
                }
            }
            WindowEvent::RedrawRequested => {
                let display_handle = self.session.scheduler().heartbeat_source().display_handle();
                if let Some(handle) = display_handle {
                    self.deliver(handle, event_loop);
                }

                if let Err(err) = self.draw() {
                    tracing::error!(error = %err, "Render error, exiting");
                    event_loop.exit();
                }
                self.update_title();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = self.clock.now_ms();
        let due = self
            .session
            .scheduler_mut()
            .heartbeat_source_mut()
            .poll_due(now);
        if let Some(handle) = due {
            self.deliver(handle, event_loop);
        }

        let source = self.session.scheduler().heartbeat_source();
        if source.display_handle().is_some() {
            // Redraws are the heartbeat; the compositor paces them
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            event_loop.set_control_flow(ControlFlow::Wait);
        } else if let Some(deadline) = source.next_deadline() {
            event_loop.set_control_flow(ControlFlow::WaitUntil(self.clock.instant_at(deadline)));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}

/// Run `session` in a window until it is closed
pub fn run_window<C: EmulationCore + 'static>(
    config: WindowConfig,
    session: Session<C, PolledHeartbeat>,
    clock: MonotonicClock,
) -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    tracing::info!(
        width = config.width,
        height = config.height,
        scale = config.scale,
        "Starting window"
    );

    let mut window = PacerWindow::new(config, session, clock);
    event_loop.run_app(&mut window)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_config_defaults() {
        let config = WindowConfig::new();
        assert_eq!(config.scale, 3);
        assert_eq!(config.width, 160);
        assert_eq!(config.height, 144);
        assert!(!config.show_fps);
    }

    #[test]
    fn test_window_dimensions() {
        let config = WindowConfig::new().with_scale(2);
        assert_eq!(config.window_width(), 320);
        assert_eq!(config.window_height(), 288);
    }

    #[test]
    fn test_scale_clamping() {
        let config = WindowConfig::new().with_scale(100);
        assert_eq!(config.scale, 8); // Should be clamped to max 8x

        let config = WindowConfig::new().with_scale(0);
        assert_eq!(config.scale, 1); // Should be clamped to min 1x
    }

    #[test]
    fn test_title_with_fps() {
        let config = WindowConfig::new().with_title("demo");
        assert_eq!(config.title_with_fps(59), "demo");

        let config = config.with_show_fps(true);
        assert_eq!(config.title_with_fps(59), "demo - 59 fps");
    }

    #[test]
    fn test_key_bindings() {
        use ElementState::{Pressed, Released};

        assert_eq!(
            key_action(KeyCode::KeyP, Pressed, false),
            Some(KeyAction::TogglePause)
        );
        assert_eq!(key_action(KeyCode::KeyP, Pressed, true), None);
        assert_eq!(key_action(KeyCode::KeyP, Released, false), None);
        assert_eq!(
            key_action(KeyCode::Tab, Released, false),
            Some(KeyAction::FastForward(false))
        );
        assert_eq!(
            key_action(KeyCode::F5, Pressed, false),
            Some(KeyAction::QuickSave)
        );
        assert_eq!(key_action(KeyCode::KeyZ, Pressed, false), None);
    }
}
