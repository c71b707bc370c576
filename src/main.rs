// Emulator Pacer - Main Entry Point
//
// Runs the built-in test pattern core in a window, paced by the frame
// scheduler, with sound streamed to the default audio device.

use emu_pacer::config::CONFIG_FILE;
use emu_pacer::core::TestPatternCore;
use emu_pacer::display::{run_window, WindowConfig};
use emu_pacer::scheduler::PolledHeartbeat;
use emu_pacer::timing::MonotonicClock;
use emu_pacer::{PacerConfig, Session};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "emu-pacer starting");

    // Load or create configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_FILE.to_string());
    let config = PacerConfig::load_or_default(&config_path);
    tracing::info!(path = %config_path, "Configuration loaded");

    let clock = MonotonicClock::new();
    let core = TestPatternCore::new(config.sound.sample_rate);
    let window_config = WindowConfig::new()
        .with_title("emu-pacer - test pattern")
        .with_show_fps(config.speed.show_fps);
    let session = Session::new(
        core,
        "test_pattern",
        PolledHeartbeat::new(clock),
        clock,
        config.clone(),
    );

    // Keep the device stream alive for the lifetime of the window
    #[cfg(feature = "audio")]
    let _audio = {
        let audio_config = emu_pacer::AudioConfig::new()
            .with_sample_rate(config.sound.sample_rate)
            .with_buffer_frames(config.sound.buffer_frames);
        match emu_pacer::AudioOutput::new(audio_config, session.pipeline()) {
            Ok(output) => Some(output),
            Err(err) => {
                tracing::warn!(error = %err, "Audio unavailable, continuing without sound");
                None
            }
        }
    };

    tracing::info!(
        "Keys: P pause, Tab fast-forward, R reset, F5/F7 save/load, M mute, \
         C capture, T timing mode, Esc quit"
    );

    run_window(window_config, session, clock)?;

    tracing::info!("Window closed");
    Ok(())
}
