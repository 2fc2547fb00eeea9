//! Gamepad monitor
//!
//! Opens a joystick device, logs every change, and prints each change as one
//! JSON line on stdout until the device stream ends.
//!
//! Usage: gamepad-monitor [DEVICE_PATH]

use anyhow::Context;
use gamepad_decoder::{Config, EventLogger, GamepadDecoder, LoopState};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = if Path::new("configs/default.toml").exists() {
        Config::load_default().context("loading configs/default.toml")?
    } else {
        warn!("configs/default.toml not found, using defaults");
        Config::default()
    };

    if let Some(device_path) = std::env::args().nth(1) {
        config.controller.device_path = device_path;
    }

    let mut decoder = GamepadDecoder::from_config(&config)
        .with_context(|| format!("opening {}", config.controller.device_path))?;
    decoder.attach(Arc::new(EventLogger::new(decoder.name())));
    let events = decoder.subscribe();

    info!("Monitoring '{}' on {}", decoder.name(), config.controller.device_path);

    loop {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => println!("{}", serde_json::to_string(&event)?),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if decoder.state() == LoopState::Stopped {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Flush anything raised just before the loop stopped
    for event in events.try_iter() {
        println!("{}", serde_json::to_string(&event)?);
    }

    info!("Final state: {}", serde_json::to_string(&decoder.snapshot())?);
    decoder.join().context("device read loop terminated")?;
    Ok(())
}
