use crate::state::{Address, MEM_SIZE, PC_START_ADDR};

pub type Result<T> = std::result::Result<T, Chip8Error>;

/// Faults raised by the machine. A faulting cycle leaves the state untouched.
#[derive(Debug, thiserror::Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomTooLarge { size: usize, max_size: usize },

    #[error("failed to read ROM: {0}")]
    Io(#[from] std::io::Error),

    #[error("stack overflow: subroutine call at {pc:#06X} with a full call stack")]
    StackOverflow { pc: Address },

    #[error("stack underflow: return at {pc:#06X} with an empty call stack")]
    StackUnderflow { pc: Address },

    #[error("memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: usize },
}

impl Chip8Error {
    pub(crate) fn rom_too_large(size: usize) -> Self {
        Chip8Error::RomTooLarge {
            size,
            max_size: MEM_SIZE - PC_START_ADDR as usize,
        }
    }
}
