use crate::display::Display;
use crate::error::{Chip8Error, Result};

pub type Timer = u8;
pub type Address = u16;

pub const MEM_SIZE: usize = 4096;
pub const FONT_ADDR: Address = 0x000;
pub const FONT_HEIGHT: Address = 5;
pub const PC_START_ADDR: Address = 0x200;
pub const NUM_REGISTERS: usize = 16;
pub const NUM_KEYS: usize = 16;
pub const STACK_SIZE: usize = 16;

pub const FONT_SET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Flat 4KB address space. The font lives at `FONT_ADDR`, programs at `PC_START_ADDR`.
pub struct Memory {
    data: [u8; MEM_SIZE],
}
impl Memory {
    pub fn new() -> Self {
        let data = {
            let mut data = [0; MEM_SIZE];
            let font_start = usize::from(FONT_ADDR);
            data[font_start..font_start + FONT_SET.len()].copy_from_slice(&FONT_SET);
            data
        };

        Memory { data }
    }

    pub fn read(&self, addr: usize) -> Result<u8> {
        self.data
            .get(addr)
            .copied()
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })
    }

    pub fn write(&mut self, addr: usize, value: u8) -> Result<()> {
        let cell = self
            .data
            .get_mut(addr)
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })?;
        *cell = value;
        Ok(())
    }

    /// Reads the big-endian instruction word at `addr`.
    pub fn read_word(&self, addr: usize) -> Result<u16> {
        let high = u16::from(self.read(addr)?);
        let low = u16::from(self.read(addr + 1)?);
        Ok((high << 8) | low)
    }

    /// Borrows `len` bytes starting at `start`. Nothing is returned unless the
    /// whole range is addressable.
    pub fn read_block(&self, start: usize, len: usize) -> Result<&[u8]> {
        let end = start + len;
        if end > MEM_SIZE {
            return Err(Chip8Error::MemoryOutOfBounds {
                address: end - 1,
            });
        }
        Ok(&self.data[start..end])
    }

    /// Copies `bytes` to `start`. Memory is left untouched when any byte would
    /// land out of bounds.
    pub fn write_block(&mut self, start: usize, bytes: &[u8]) -> Result<()> {
        let end = start + bytes.len();
        if end > MEM_SIZE {
            return Err(Chip8Error::MemoryOutOfBounds {
                address: end - 1,
            });
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        let start = usize::from(PC_START_ADDR);
        if rom.len() > MEM_SIZE - start {
            return Err(Chip8Error::rom_too_large(rom.len()));
        }
        self.data[start..start + rom.len()].copy_from_slice(rom);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
impl Register {
    /// Maps the low nibble of `value` to a register.
    pub fn from_nibble(value: u8) -> Self {
        match value & 0x0F {
            0x0 => Register::V0,
            0x1 => Register::V1,
            0x2 => Register::V2,
            0x3 => Register::V3,
            0x4 => Register::V4,
            0x5 => Register::V5,
            0x6 => Register::V6,
            0x7 => Register::V7,
            0x8 => Register::V8,
            0x9 => Register::V9,
            0xA => Register::VA,
            0xB => Register::VB,
            0xC => Register::VC,
            0xD => Register::VD,
            0xE => Register::VE,
            _ => Register::VF,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}
impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg.index()]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg.index()] = value;
    }

    /// VF doubles as the carry, borrow and collision flag.
    pub fn set_flag(&mut self, set: bool) {
        self.write(Register::VF, u8::from(set));
    }

    /// V0 through `last`, inclusive.
    pub fn up_to(&self, last: Register) -> &[u8] {
        &self.registers[..=last.index()]
    }

    /// Fills V0 onwards from `values`.
    pub fn fill_from(&mut self, values: &[u8]) {
        self.registers[..values.len()].copy_from_slice(values);
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-depth return address stack.
pub struct CallStack {
    frames: [Address; STACK_SIZE],
    sp: usize,
}
impl CallStack {
    pub fn new() -> Self {
        CallStack {
            frames: [0; STACK_SIZE],
            sp: 0,
        }
    }

    pub fn push(&mut self, return_addr: Address) -> Result<()> {
        let frame = self
            .frames
            .get_mut(self.sp)
            .ok_or(Chip8Error::StackOverflow { pc: return_addr })?;
        *frame = return_addr;
        self.sp += 1;
        Ok(())
    }

    /// `pc` is only used to report an underflow.
    pub fn pop(&mut self, pc: Address) -> Result<Address> {
        if self.sp == 0 {
            return Err(Chip8Error::StackUnderflow { pc });
        }
        self.sp -= 1;
        Ok(self.frames[self.sp])
    }

    pub fn depth(&self) -> usize {
        self.sp
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Keypad {
    keys: [bool; NUM_KEYS],
}
impl Keypad {
    pub fn new() -> Self {
        Keypad {
            keys: [false; NUM_KEYS],
        }
    }

    /// Keys outside 0x0..=0xF are ignored.
    pub fn set_key(&mut self, key: u8, pressed: bool) {
        if let Some(slot) = self.keys.get_mut(usize::from(key)) {
            *slot = pressed;
        }
    }

    pub fn press_key(&mut self, key: u8) {
        self.set_key(key, true);
    }

    pub fn release_key(&mut self, key: u8) {
        self.set_key(key, false);
    }

    pub fn release_all(&mut self) {
        self.keys = [false; NUM_KEYS];
    }

    /// Only the low nibble of `key` selects a key.
    pub fn is_key_pressed(&self, key: u8) -> bool {
        self.keys[usize::from(key & 0x0F)]
    }

    pub fn highest_pressed(&self) -> Option<u8> {
        (0..NUM_KEYS as u8).rev().find(|&key| self.is_key_pressed(key))
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
pub struct Timers {
    pub delay: Timer,
    pub sound: Timer,
}
impl Timers {
    /// Decrements both timers. Returns true on the cycle the sound timer
    /// runs out.
    pub fn tick(&mut self) -> bool {
        self.delay = self.delay.saturating_sub(1);

        let beep = self.sound == 1;
        self.sound = self.sound.saturating_sub(1);
        beep
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Running,
    /// Halted on `FX0A` until a key is pressed.
    AwaitingKey { register: Register },
}

pub struct Chip8State {
    pub memory: Memory,
    pub registers: RegisterBank,
    pub pc: Address,
    pub index: Address,
    pub stack: CallStack,
    pub timers: Timers,
    pub display: Display,
    pub keypad: Keypad,
    pub opcode: u16,
    pub mode: Mode,
    pub redraw: bool,
    pub beep: bool,
}
impl Chip8State {
    pub fn new() -> Self {
        Chip8State {
            memory: Memory::new(),
            registers: RegisterBank::new(),
            pc: PC_START_ADDR,
            index: 0,
            stack: CallStack::new(),
            timers: Timers::default(),
            display: Display::new(),
            keypad: Keypad::new(),
            opcode: 0,
            mode: Mode::Running,
            // Force the first frame to be drawn.
            redraw: true,
            beep: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Chip8State::new();
    }

    pub fn advance(&mut self) {
        self.pc += 2;
    }

    pub fn skip_if(&mut self, condition: bool) {
        self.pc += if condition { 4 } else { 2 };
    }

    /// Stores the highest pressed key in `register` and moves on, or parks the
    /// machine until a key arrives.
    pub fn poll_key(&mut self, register: Register) -> Option<u8> {
        match self.keypad.highest_pressed() {
            Some(key) => {
                self.registers.write(register, key);
                self.mode = Mode::Running;
                self.advance();
                Some(key)
            }
            None => {
                self.mode = Mode::AwaitingKey { register };
                None
            }
        }
    }
}

impl Default for Chip8State {
    fn default() -> Self {
        Self::new()
    }
}
