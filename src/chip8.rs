use std::path::Path;

use log::{debug, trace, warn};
use rand::RngCore;

use crate::display::Display;
use crate::error::Result;
use crate::instruction::{Instruction, decode};
use crate::state::{Address, Chip8State, Mode, Register, Timer};

/// What a single call to [`Chip8::cycle`] did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Executed(Instruction),
    /// Parked on `FX0A` with no key pressed; the program counter did not move.
    AwaitingKey,
    /// A key arrived while parked on `FX0A` and was stored in the waiting register.
    KeyReceived(u8),
    /// The word at the program counter has no defined operation. The program
    /// counter is not advanced, so the machine stalls on it.
    Unknown(u16),
}

/// A CHIP-8 machine with its random source.
///
/// The machine has no loop of its own: a driver calls [`Chip8::cycle`]
/// repeatedly, updates the keypad in between, and consumes the redraw and
/// beep flags.
pub struct Chip8<R> {
    state: Chip8State,
    rng: R,
}

impl<R: RngCore> Chip8<R> {
    pub fn new(rng: R) -> Self {
        Chip8 {
            state: Chip8State::new(),
            rng,
        }
    }

    /// Puts the machine back in its power-on state.
    pub fn reset(&mut self) {
        self.state.reset();
        debug!("machine reset");
    }

    /// Copies a program image to the program area. Other state is untouched.
    pub fn load(&mut self, rom: &[u8]) -> Result<()> {
        self.state.memory.load_rom(rom)?;
        debug!("loaded {} byte program", rom.len());
        Ok(())
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let rom = std::fs::read(path.as_ref())?;
        self.load(&rom)
    }

    /// Runs one instruction and one timer tick.
    ///
    /// A fault leaves the machine exactly as it was before the call.
    pub fn cycle(&mut self) -> Result<Step> {
        let step = match self.state.mode {
            Mode::AwaitingKey { register } => match self.state.poll_key(register) {
                Some(key) => {
                    trace!("key {key:X} stored in {register:?}");
                    Step::KeyReceived(key)
                }
                None => Step::AwaitingKey,
            },
            Mode::Running => self.execute_next()?,
        };

        if self.state.timers.tick() {
            self.state.beep = true;
        }
        Ok(step)
    }

    fn execute_next(&mut self) -> Result<Step> {
        let pc = self.state.pc;
        let raw = self.state.memory.read_word(usize::from(pc))?;

        let Some(instruction) = decode(raw) else {
            // Only report the first cycle of a stall.
            if self.state.opcode != raw {
                warn!("unknown opcode {raw:#06X} at {pc:#06X}");
            }
            self.state.opcode = raw;
            return Ok(Step::Unknown(raw));
        };

        trace!("{pc:#06X} {raw:04X} {instruction:?}");
        if let Err(err) = instruction.execute(&mut self.state, &mut self.rng) {
            warn!("fault at {pc:#06X} executing {raw:04X}: {err}");
            return Err(err);
        }
        self.state.opcode = raw;

        if let Mode::AwaitingKey { .. } = self.state.mode {
            return Ok(Step::AwaitingKey);
        }
        Ok(Step::Executed(instruction))
    }

    pub fn display(&self) -> &Display {
        &self.state.display
    }

    pub fn redraw_requested(&self) -> bool {
        self.state.redraw
    }

    /// Returns the redraw flag and clears it.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.state.redraw)
    }

    pub fn beep_requested(&self) -> bool {
        self.state.beep
    }

    /// Returns the beep flag and clears it.
    pub fn take_beep(&mut self) -> bool {
        std::mem::take(&mut self.state.beep)
    }

    /// Sets keypad key `key` (0x0 to 0xF). Other values are ignored.
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        self.state.keypad.set_key(key, pressed);
    }

    pub fn release_all_keys(&mut self) {
        self.state.keypad.release_all();
    }

    pub fn is_awaiting_key(&self) -> bool {
        matches!(self.state.mode, Mode::AwaitingKey { .. })
    }

    pub fn pc(&self) -> Address {
        self.state.pc
    }

    pub fn index(&self) -> Address {
        self.state.index
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.state.registers.read(reg)
    }

    pub fn delay_timer(&self) -> Timer {
        self.state.timers.delay
    }

    pub fn sound_timer(&self) -> Timer {
        self.state.timers.sound
    }

    /// The most recently fetched instruction word.
    pub fn opcode(&self) -> u16 {
        self.state.opcode
    }

    pub fn memory(&self) -> &[u8] {
        self.state.memory.as_slice()
    }

    pub fn state(&self) -> &Chip8State {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Chip8Error;
    use crate::state::{MEM_SIZE, PC_START_ADDR};
    use crate::testing::FixedRng;

    fn chip8_with(program: &[u8]) -> Chip8<FixedRng> {
        let mut chip8 = Chip8::new(FixedRng(0));
        chip8.load(program).unwrap();
        chip8
    }

    #[test]
    fn test_new_machine_requests_redraw() {
        let mut chip8 = Chip8::new(FixedRng(0));
        assert_eq!(chip8.pc(), PC_START_ADDR);
        assert!(chip8.take_redraw());
        assert!(!chip8.redraw_requested());
    }

    #[test]
    fn test_cycle_fetches_big_endian() {
        let mut chip8 = chip8_with(&[0x61, 0x2A]);
        let step = chip8.cycle().unwrap();
        assert_eq!(
            step,
            Step::Executed(Instruction::SetImmediate {
                x: Register::V1,
                nn: 0x2A
            })
        );
        assert_eq!(chip8.opcode(), 0x612A);
        assert_eq!(chip8.register(Register::V1), 0x2A);
        assert_eq!(chip8.pc(), PC_START_ADDR + 2);
    }

    #[test]
    fn test_load_max_size_succeeds() {
        let mut chip8 = Chip8::new(FixedRng(0));
        chip8.load(&vec![0x12; MEM_SIZE - 512]).unwrap();
        assert_eq!(chip8.memory()[MEM_SIZE - 1], 0x12);
    }

    #[test]
    fn test_load_too_large_leaves_memory() {
        let mut chip8 = Chip8::new(FixedRng(0));
        let before = chip8.memory().to_vec();
        let err = chip8.load(&vec![0x12; MEM_SIZE - 511]).unwrap_err();
        assert!(matches!(err, Chip8Error::RomTooLarge { .. }));
        assert_eq!(chip8.memory(), &before[..]);
    }

    #[test]
    fn test_load_does_not_reset() {
        let mut chip8 = chip8_with(&[0x63, 0x07]);
        chip8.cycle().unwrap();
        chip8.load(&[0x00, 0xE0]).unwrap();
        assert_eq!(chip8.register(Register::V3), 7);
        assert_eq!(chip8.pc(), PC_START_ADDR + 2);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let mut chip8 = Chip8::new(FixedRng(0));
        let err = chip8
            .load_file("/definitely/not/a/real/rom.ch8")
            .unwrap_err();
        assert!(matches!(err, Chip8Error::Io(_)));
    }

    #[test]
    fn test_reset_restores_power_on_state() {
        #[rustfmt::skip]
        let program = [
            0x22, 0x04, // call 0x204
            0x00, 0x00,
            0x60, 0x05, // V0 = 5
            0xF0, 0x15, // delay = V0
            0xF0, 0x18, // sound = V0
            0xD0, 0x05, // draw glyph 0 at (5, 5)
            0xF1, 0x0A, // V1 = key
        ];
        let mut chip8 = chip8_with(&program);
        for _ in 0..6 {
            chip8.cycle().unwrap();
        }
        chip8.take_redraw();
        chip8.set_key(0x4, true);

        assert_eq!(chip8.state().stack.depth(), 1);
        assert!(!chip8.display().is_clear());
        assert_eq!(chip8.delay_timer(), 1);
        assert_eq!(chip8.sound_timer(), 2);
        assert!(chip8.is_awaiting_key());

        chip8.reset();

        assert_eq!(chip8.pc(), PC_START_ADDR);
        assert_eq!(chip8.index(), 0);
        assert_eq!(chip8.register(Register::V0), 0);
        assert_eq!(chip8.state().stack.depth(), 0);
        assert!(chip8.display().is_clear());
        assert_eq!(chip8.delay_timer(), 0);
        assert_eq!(chip8.sound_timer(), 0);
        assert!(!chip8.is_awaiting_key());
        assert!(chip8.redraw_requested());
        assert!(!chip8.beep_requested());
        assert!(!chip8.state().keypad.is_key_pressed(0x4));
        assert!(chip8.memory()[0x200..].iter().all(|&b| b == 0));
        assert_eq!(chip8.memory()[0], 0xF0);
    }

    #[test]
    fn test_unknown_opcode_stalls() {
        let mut chip8 = chip8_with(&[0x81, 0x2F]);
        for _ in 0..3 {
            assert_eq!(chip8.cycle().unwrap(), Step::Unknown(0x812F));
            assert_eq!(chip8.pc(), PC_START_ADDR);
        }
    }

    #[test]
    fn test_timers_run_while_stalled_on_unknown_opcode() {
        // 6004 F015 812F
        let mut chip8 = chip8_with(&[0x60, 0x04, 0xF0, 0x15, 0x81, 0x2F]);
        chip8.cycle().unwrap();
        chip8.cycle().unwrap();
        assert_eq!(chip8.delay_timer(), 3);

        for expected in [2, 1, 0, 0] {
            assert_eq!(chip8.cycle().unwrap(), Step::Unknown(0x812F));
            assert_eq!(chip8.pc(), PC_START_ADDR + 4);
            assert_eq!(chip8.delay_timer(), expected);
        }
    }

    #[test]
    fn test_set_key_ignores_out_of_range_keys() {
        let mut chip8 = Chip8::new(FixedRng(0));
        chip8.set_key(0x13, true);
        assert!((0..16).all(|key| !chip8.state().keypad.is_key_pressed(key)));
        chip8.set_key(0x3, true);
        assert!(chip8.state().keypad.is_key_pressed(0x3));
    }

    #[test]
    fn test_timers_tick_once_per_cycle() {
        // 6005 F015 F018 1206
        let mut chip8 = chip8_with(&[0x60, 0x05, 0xF0, 0x15, 0xF0, 0x18, 0x12, 0x06]);
        chip8.cycle().unwrap();
        chip8.cycle().unwrap();
        assert_eq!(chip8.delay_timer(), 4);
        chip8.cycle().unwrap();
        assert_eq!(chip8.delay_timer(), 3);
        assert_eq!(chip8.sound_timer(), 4);
    }

    #[test]
    fn test_beep_fires_once_when_sound_runs_out() {
        // 6002 F018 1204
        let mut chip8 = chip8_with(&[0x60, 0x02, 0xF0, 0x18, 0x12, 0x04]);
        chip8.cycle().unwrap();
        chip8.cycle().unwrap();
        assert_eq!(chip8.sound_timer(), 1);
        assert!(!chip8.beep_requested());

        chip8.cycle().unwrap();
        assert_eq!(chip8.sound_timer(), 0);
        assert!(chip8.take_beep());
        assert!(!chip8.beep_requested());

        chip8.cycle().unwrap();
        assert!(!chip8.beep_requested());
    }

    #[test]
    fn test_key_wait_spans_cycles() {
        // F30A 6001
        let mut chip8 = chip8_with(&[0xF3, 0x0A, 0x60, 0x01]);
        for _ in 0..5 {
            assert_eq!(chip8.cycle().unwrap(), Step::AwaitingKey);
            assert_eq!(chip8.pc(), PC_START_ADDR);
            assert!(chip8.is_awaiting_key());
        }

        chip8.set_key(0x7, true);
        assert_eq!(chip8.cycle().unwrap(), Step::KeyReceived(0x7));
        assert_eq!(chip8.register(Register::V3), 0x7);
        assert_eq!(chip8.pc(), PC_START_ADDR + 2);
        assert!(!chip8.is_awaiting_key());

        chip8.cycle().unwrap();
        assert_eq!(chip8.register(Register::V0), 0x1);
    }

    #[test]
    fn test_timers_run_while_waiting_for_key() {
        // 6003 F015 F00A
        let mut chip8 = chip8_with(&[0x60, 0x03, 0xF0, 0x15, 0xF0, 0x0A]);
        for _ in 0..5 {
            chip8.cycle().unwrap();
        }
        assert_eq!(chip8.delay_timer(), 0);
        assert!(chip8.is_awaiting_key());
    }

    #[test]
    fn test_fault_skips_timer_tick() {
        // 6005 F015 00EE
        let mut chip8 = chip8_with(&[0x60, 0x05, 0xF0, 0x15, 0x00, 0xEE]);
        chip8.cycle().unwrap();
        chip8.cycle().unwrap();
        assert_eq!(chip8.delay_timer(), 4);

        assert!(chip8.cycle().is_err());
        assert_eq!(chip8.delay_timer(), 4);
        assert_eq!(chip8.pc(), PC_START_ADDR + 4);
    }

    #[test]
    fn test_fetch_past_end_of_memory_faults() {
        // 1FFF
        let mut chip8 = chip8_with(&[0x1F, 0xFF]);
        chip8.cycle().unwrap();
        assert_eq!(chip8.pc(), 0xFFF);
        assert!(matches!(
            chip8.cycle(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        ));
    }

    #[test]
    fn test_random_uses_injected_source() {
        // C0F0
        let mut chip8 = Chip8::new(FixedRng(0x5A));
        chip8.load(&[0xC0, 0xF0]).unwrap();
        chip8.cycle().unwrap();
        assert_eq!(chip8.register(Register::V0), 0x50);
    }
}
