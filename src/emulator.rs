use std::time::{Duration, Instant};

use anyhow::Context;
use chip8vm::{Chip8, DISPLAY_HEIGHT, DISPLAY_WIDTH, Display};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Paragraph};
use rodio::{OutputStream, Sink, Source, source::SineWave};

use crate::settings::Settings;

const BEEP_DURATION: Duration = Duration::from_millis(120);

/// Host keys for keypad 0x0 through 0xF, in order.
const KEYMAP: [char; 16] = [
    '1', '2', '3', '4', //
    'q', 'w', 'e', 'r', //
    'a', 's', 'd', 'f', //
    'z', 'x', 'c', 'v', //
];

pub fn keypad_index(key: char) -> Option<u8> {
    let key = key.to_ascii_lowercase();
    KEYMAP.iter().position(|&k| k == key).map(|i| i as u8)
}

pub struct Beep {
    sink: Sink,
    #[allow(dead_code)]
    stream: OutputStream,
    freq: f32,
}

impl Beep {
    pub fn new(freq: f32) -> anyhow::Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()?;
        let sink = Sink::try_new(&stream_handle)?;

        Ok(Self { sink, stream, freq })
    }

    pub fn play(&self) {
        let tone = SineWave::new(self.freq)
            .take_duration(BEEP_DURATION)
            .amplify(0.25);
        self.sink.append(tone);
    }
}

pub fn render(display: &Display) -> String {
    let mut row_string = String::with_capacity(DISPLAY_WIDTH * DISPLAY_HEIGHT + DISPLAY_HEIGHT);
    for row in display.rows() {
        row_string.extend(row.map(|pixel| if pixel { '█' } else { ' ' }));
        row_string.push('\n');
    }
    row_string
}

pub struct Emulator {
    chip8: Chip8<StdRng>,
    settings: Settings,
    beeper: Option<Beep>,
    frame: String,
}

impl Emulator {
    pub fn new(settings: Settings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let beeper = match Beep::new(settings.beep_frequency) {
            Ok(beeper) => Some(beeper),
            Err(err) => {
                warn!("no audio output, running silent: {err}");
                None
            }
        };

        Emulator {
            chip8: Chip8::new(rng),
            settings,
            beeper,
            frame: String::new(),
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame, rom_name: &str) {
        let paragraph = Paragraph::new(self.frame.as_str())
            .block(Block::default().borders(Borders::ALL).title(rom_name))
            .style(Style::default().fg(Color::White));
        frame.render_widget(paragraph, frame.area());
    }

    /// Loads the ROM and runs until `Esc` is pressed or the machine faults.
    pub fn run(&mut self) -> anyhow::Result<()> {
        self.chip8.reset();
        self.chip8
            .load_file(&self.settings.rom)
            .with_context(|| format!("failed to load {}", self.settings.rom.display()))?;
        info!(
            "running {} at {} cycles per frame",
            self.settings.rom.display(),
            self.settings.cycles_per_frame()
        );

        enable_raw_mode().context("failed to enable raw mode")?;
        let result = self.main_loop();
        disable_raw_mode().context("failed to disable raw mode")?;
        result
    }

    fn main_loop(&mut self) -> anyhow::Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.settings.frame_rate as f64);
        let cycles_per_frame = self.settings.cycles_per_frame();
        let rom_name = self.settings.rom_name();

        let backend = CrosstermBackend::new(std::io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        loop {
            let frame_start = Instant::now();

            while event::poll(Duration::ZERO)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match key.code {
                        KeyCode::Esc => {
                            terminal.clear()?;
                            return Ok(());
                        }
                        KeyCode::Char(c) => {
                            if let Some(index) = keypad_index(c) {
                                self.chip8.set_key(index, true);
                            }
                        }
                        _ => {}
                    }
                }
            }

            for _ in 0..cycles_per_frame {
                if let Err(err) = self.chip8.cycle() {
                    terminal.clear()?;
                    return Err(err).with_context(|| {
                        format!("machine fault at {:#06X}", self.chip8.pc())
                    });
                }
            }

            if self.chip8.take_beep()
                && let Some(beeper) = &self.beeper
            {
                beeper.play();
            }
            if self.chip8.take_redraw() {
                self.frame = render(self.chip8.display());
            }
            terminal.draw(|frame| self.draw(frame, &rom_name))?;

            // Keys are held for one frame; the terminal reports presses only.
            self.chip8.release_all_keys();

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keymap_follows_rows() {
        assert_eq!(keypad_index('1'), Some(0x0));
        assert_eq!(keypad_index('4'), Some(0x3));
        assert_eq!(keypad_index('Q'), Some(0x4));
        assert_eq!(keypad_index('f'), Some(0xB));
        assert_eq!(keypad_index('v'), Some(0xF));
        assert_eq!(keypad_index('p'), None);
    }

    #[test]
    fn test_render_blank_display() {
        let display = Display::new();
        let frame = render(&display);
        assert_eq!(frame.lines().count(), DISPLAY_HEIGHT);
        assert!(frame.lines().all(|line| line.chars().count() == DISPLAY_WIDTH));
        assert!(!frame.contains('█'));
    }

    #[test]
    fn test_render_lit_pixel() {
        let mut display = Display::new();
        display.draw_sprite(1, 0, &[0x80]);
        let frame = render(&display);
        let first = frame.lines().next().unwrap();
        assert_eq!(first.chars().nth(1), Some('█'));
        assert_eq!(first.chars().next(), Some(' '));
    }
}
