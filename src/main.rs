mod emulator;
mod settings;

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use env_logger::{Env, Target};

use crate::emulator::Emulator;
use crate::settings::{
    DEFAULT_BEEP_FREQUENCY, DEFAULT_FRAME_RATE, DEFAULT_INSTRUCTIONS_PER_SECOND, Settings,
};

/// Run a CHIP-8 program in the terminal.
///
/// Keypad: 1234 / QWER / ASDF / ZXCV map to keys 0-F. Esc quits.
/// Logs are off unless RUST_LOG is set or --log-file is given, since stderr
/// shares the terminal with the display.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the program image
    rom: PathBuf,

    /// Frames rendered per second
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
    fps: u64,

    /// Machine cycles per second; the timers tick once per cycle
    #[arg(long, default_value_t = DEFAULT_INSTRUCTIONS_PER_SECOND)]
    ips: u64,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// Buzzer tone in Hz
    #[arg(long, default_value_t = DEFAULT_BEEP_FREQUENCY)]
    beep_frequency: f32,

    /// Write logs to this file (default level: info)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Default log filter when RUST_LOG is unset.
fn default_log_filter(log_file: Option<&Path>) -> &'static str {
    match log_file {
        Some(_) => "info",
        None => "off",
    }
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_log_filter(log_file)));
    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("failed to create log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let settings = Settings::new(
        args.fps,
        args.ips,
        args.rom,
        args.seed,
        args.beep_frequency,
    )?;

    let mut emulator = Emulator::new(settings);
    emulator.run()
}
