use std::path::PathBuf;

use anyhow::bail;

pub const DEFAULT_FRAME_RATE: u64 = 60;
pub const DEFAULT_INSTRUCTIONS_PER_SECOND: u64 = 700;
pub const DEFAULT_BEEP_FREQUENCY: f32 = 440.0;

pub struct Settings {
    pub frame_rate: u64,
    pub ips: u64,
    pub rom: PathBuf,
    pub seed: Option<u64>,
    pub beep_frequency: f32,
}
impl Settings {
    pub fn new(
        frame_rate: u64,
        ips: u64,
        rom: PathBuf,
        seed: Option<u64>,
        beep_frequency: f32,
    ) -> anyhow::Result<Self> {
        if frame_rate == 0 {
            bail!("frame rate must be at least 1");
        }
        if ips == 0 {
            bail!("instructions per second must be at least 1");
        }
        Ok(Settings {
            frame_rate,
            ips,
            rom,
            seed,
            beep_frequency,
        })
    }

    /// Machine cycles run between two rendered frames. Never zero.
    pub fn cycles_per_frame(&self) -> u64 {
        (self.ips / self.frame_rate).max(1)
    }

    pub fn rom_name(&self) -> String {
        self.rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string())
    }
}
