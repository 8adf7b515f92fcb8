//! A CHIP-8 virtual machine.
//!
//! [`Chip8`] owns the whole machine: 4KB of memory with the built-in font,
//! sixteen byte registers, the index register, a sixteen deep call stack,
//! the delay and sound timers, a 64x32 monochrome display and the keypad.
//! Each call to [`Chip8::cycle`] executes one instruction and ticks the timers
//! once. Pacing, rendering, input and audio belong to the caller.

pub mod chip8;
pub mod display;
pub mod error;
pub mod instruction;
pub mod state;

pub use chip8::{Chip8, Step};
pub use display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Display};
pub use error::{Chip8Error, Result};
pub use instruction::{Instruction, decode};
pub use state::Register;
