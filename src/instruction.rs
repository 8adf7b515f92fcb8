use rand::{Rng, RngCore};

use crate::error::Result;
use crate::state::{Address, Chip8State, FONT_ADDR, FONT_HEIGHT, Register};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// `00E0`
    ClearScreen,
    /// `00EE`
    SubroutineReturn,
    /// `1NNN`
    Jump(Address),
    /// `2NNN`
    SubroutineCall(Address),
    /// `3XNN`
    SkipEqX { x: Register, nn: u8 },
    /// `4XNN`
    SkipNeqX { x: Register, nn: u8 },
    /// `5XY0`
    SkipXEqY { x: Register, y: Register },
    /// `6XNN`
    SetImmediate { x: Register, nn: u8 },
    /// `7XNN`
    Add { x: Register, nn: u8 },
    /// `8XY0`
    SetXToY { x: Register, y: Register },
    /// `8XY1`
    BinaryOr { x: Register, y: Register },
    /// `8XY2`
    BinaryAnd { x: Register, y: Register },
    /// `8XY3`
    LogicalXor { x: Register, y: Register },
    /// `8XY4`
    BinaryAdd { x: Register, y: Register },
    /// `8XY5`
    SubtractYFromX { x: Register, y: Register },
    /// `8XY6`
    RightShift { x: Register },
    /// `8XY7`
    SubtractXFromY { x: Register, y: Register },
    /// `8XYE`
    LeftShift { x: Register },
    /// `9XY0`
    SkipXNeqY { x: Register, y: Register },
    /// `ANNN`
    SetIndex(Address),
    /// `BNNN`
    JumpWithOffset(Address),
    /// `CXNN`
    Random { x: Register, nn: u8 },
    /// `DXYN`
    Draw { x: Register, y: Register, n: u8 },
    /// `EX9E`
    SkipIfKeyPressed { x: Register },
    /// `EXA1`
    SkipIfKeyNotPressed { x: Register },
    /// `FX07`
    SetVxFromTimer { x: Register },
    /// `FX0A`
    GetKey { x: Register },
    /// `FX15`
    SetDelayTimer { x: Register },
    /// `FX18`
    SetSoundTimer { x: Register },
    /// `FX1E`
    AddToIndex { x: Register },
    /// `FX29`
    FontChar { x: Register },
    /// `FX33`
    BinaryCodedDecimal { x: Register },
    /// `FX55`
    Store { x: Register },
    /// `FX65`
    Load { x: Register },
}

struct DecodedInstruction {
    /// First nibble. Represents the operation family.
    opcode: u8,
    /// Second nibble. Used to look up one of the 16 registers.
    x: Register,
    /// Third nibble. Used to look up one of the 16 registers.
    y: Register,
    /// Fourth nibble. A 4-bit number.
    n: u8,
    /// The second byte (third and fourth nibbles). An 8-bit immediate number.
    nn: u8,
    /// The second, third, and fourth nibbles. A 12-bit immediate address.
    nnn: Address,
}
impl DecodedInstruction {
    fn new(raw: u16) -> Self {
        DecodedInstruction {
            opcode: (raw >> 12) as u8,
            x: Register::from_nibble((raw >> 8) as u8),
            y: Register::from_nibble((raw >> 4) as u8),
            n: (raw & 0x000F) as u8,
            nn: (raw & 0x00FF) as u8,
            nnn: raw & 0x0FFF,
        }
    }
}

/// Decodes a raw instruction word. Returns `None` for bit patterns with no
/// defined operation.
///
/// The `0` family only looks at the low nibble and the `5`/`9` families ignore
/// it entirely, so e.g. `0x0000` decodes as a clear screen.
pub fn decode(raw: u16) -> Option<Instruction> {
    let DecodedInstruction {
        opcode,
        x,
        y,
        n,
        nn,
        nnn,
    } = DecodedInstruction::new(raw);

    let instruction = match opcode {
        0x0 => match n {
            0x0 => Instruction::ClearScreen,
            0xE => Instruction::SubroutineReturn,
            _ => return None,
        },
        0x1 => Instruction::Jump(nnn),
        0x2 => Instruction::SubroutineCall(nnn),
        0x3 => Instruction::SkipEqX { x, nn },
        0x4 => Instruction::SkipNeqX { x, nn },
        0x5 => Instruction::SkipXEqY { x, y },
        0x6 => Instruction::SetImmediate { x, nn },
        0x7 => Instruction::Add { x, nn },
        0x8 => match n {
            0x0 => Instruction::SetXToY { x, y },
            0x1 => Instruction::BinaryOr { x, y },
            0x2 => Instruction::BinaryAnd { x, y },
            0x3 => Instruction::LogicalXor { x, y },
            0x4 => Instruction::BinaryAdd { x, y },
            0x5 => Instruction::SubtractYFromX { x, y },
            0x6 => Instruction::RightShift { x },
            0x7 => Instruction::SubtractXFromY { x, y },
            0xE => Instruction::LeftShift { x },
            _ => return None,
        },
        0x9 => Instruction::SkipXNeqY { x, y },
        0xA => Instruction::SetIndex(nnn),
        0xB => Instruction::JumpWithOffset(nnn),
        0xC => Instruction::Random { x, nn },
        0xD => Instruction::Draw { x, y, n },
        0xE => match nn {
            0x9E => Instruction::SkipIfKeyPressed { x },
            0xA1 => Instruction::SkipIfKeyNotPressed { x },
            _ => return None,
        },
        _ => match nn {
            0x07 => Instruction::SetVxFromTimer { x },
            0x0A => Instruction::GetKey { x },
            0x15 => Instruction::SetDelayTimer { x },
            0x18 => Instruction::SetSoundTimer { x },
            0x1E => Instruction::AddToIndex { x },
            0x29 => Instruction::FontChar { x },
            0x33 => Instruction::BinaryCodedDecimal { x },
            0x55 => Instruction::Store { x },
            0x65 => Instruction::Load { x },
            _ => return None,
        },
    };
    Some(instruction)
}

impl Instruction {
    /// Applies the instruction to `state`, including its effect on the program
    /// counter. On error nothing in `state` has been modified.
    pub fn execute<R: RngCore + ?Sized>(
        &self,
        state: &mut Chip8State,
        rng: &mut R,
    ) -> Result<()> {
        match *self {
            Instruction::ClearScreen => {
                state.display.clear();
                state.redraw = true;
                state.advance();
            }
            Instruction::SubroutineReturn => {
                let return_address = state.stack.pop(state.pc)?;
                state.pc = return_address + 2;
            }
            Instruction::Jump(nnn) => {
                state.pc = nnn;
            }
            Instruction::SubroutineCall(nnn) => {
                state.stack.push(state.pc)?;
                state.pc = nnn;
            }
            Instruction::SkipEqX { x, nn } => {
                let skip = state.registers.read(x) == nn;
                state.skip_if(skip);
            }
            Instruction::SkipNeqX { x, nn } => {
                let skip = state.registers.read(x) != nn;
                state.skip_if(skip);
            }
            Instruction::SkipXEqY { x, y } => {
                let skip = state.registers.read(x) == state.registers.read(y);
                state.skip_if(skip);
            }
            Instruction::SkipXNeqY { x, y } => {
                let skip = state.registers.read(x) != state.registers.read(y);
                state.skip_if(skip);
            }
            Instruction::SetImmediate { x, nn } => {
                state.registers.write(x, nn);
                state.advance();
            }
            Instruction::Add { x, nn } => {
                let value_x = state.registers.read(x);
                state.registers.write(x, value_x.wrapping_add(nn));
                state.advance();
            }
            Instruction::SetXToY { x, y } => {
                let value_y = state.registers.read(y);
                state.registers.write(x, value_y);
                state.advance();
            }
            Instruction::BinaryOr { x, y } => {
                let value = state.registers.read(x) | state.registers.read(y);
                state.registers.write(x, value);
                state.advance();
            }
            Instruction::BinaryAnd { x, y } => {
                let value = state.registers.read(x) & state.registers.read(y);
                state.registers.write(x, value);
                state.advance();
            }
            Instruction::LogicalXor { x, y } => {
                let value = state.registers.read(x) ^ state.registers.read(y);
                state.registers.write(x, value);
                state.advance();
            }
            // The flag is written before the result, so a VF destination ends
            // up holding the sum.
            Instruction::BinaryAdd { x, y } => {
                let value_x = state.registers.read(x);
                let (sum, carry) = value_x.overflowing_add(state.registers.read(y));
                state.registers.set_flag(carry);
                state.registers.write(x, sum);
                state.advance();
            }
            // For the subtractions and shifts VF is written first and the
            // operands are read again afterwards.
            Instruction::SubtractYFromX { x, y } => {
                let no_borrow = state.registers.read(y) <= state.registers.read(x);
                state.registers.set_flag(no_borrow);
                let value = state
                    .registers
                    .read(x)
                    .wrapping_sub(state.registers.read(y));
                state.registers.write(x, value);
                state.advance();
            }
            Instruction::SubtractXFromY { x, y } => {
                let no_borrow = state.registers.read(x) <= state.registers.read(y);
                state.registers.set_flag(no_borrow);
                let value = state
                    .registers
                    .read(y)
                    .wrapping_sub(state.registers.read(x));
                state.registers.write(x, value);
                state.advance();
            }
            Instruction::RightShift { x } => {
                let lsb = state.registers.read(x) & 0x01;
                state.registers.write(Register::VF, lsb);
                let value = state.registers.read(x) >> 1;
                state.registers.write(x, value);
                state.advance();
            }
            Instruction::LeftShift { x } => {
                let msb = state.registers.read(x) >> 7;
                state.registers.write(Register::VF, msb);
                let value = state.registers.read(x) << 1;
                state.registers.write(x, value);
                state.advance();
            }
            Instruction::SetIndex(nnn) => {
                state.index = nnn;
                state.advance();
            }
            Instruction::JumpWithOffset(nnn) => {
                state.pc = Address::from(state.registers.read(Register::V0)) + nnn;
            }
            Instruction::Random { x, nn } => {
                let random_value = rng.random::<u8>() & nn;
                state.registers.write(x, random_value);
                state.advance();
            }
            Instruction::Draw { x, y, n } => {
                let sprite = state
                    .memory
                    .read_block(usize::from(state.index), usize::from(n))?;

                // Coordinates are sampled once, after VF is cleared.
                state.registers.set_flag(false);
                let pixel_x = usize::from(state.registers.read(x));
                let pixel_y = usize::from(state.registers.read(y));
                let collision = state.display.draw_sprite(pixel_x, pixel_y, sprite);
                state.registers.set_flag(collision);
                state.redraw = true;
                state.advance();
            }
            Instruction::SkipIfKeyPressed { x } => {
                let skip = state.keypad.is_key_pressed(state.registers.read(x));
                state.skip_if(skip);
            }
            Instruction::SkipIfKeyNotPressed { x } => {
                let skip = !state.keypad.is_key_pressed(state.registers.read(x));
                state.skip_if(skip);
            }
            Instruction::SetVxFromTimer { x } => {
                state.registers.write(x, state.timers.delay);
                state.advance();
            }
            Instruction::GetKey { x } => {
                state.poll_key(x);
            }
            Instruction::SetDelayTimer { x } => {
                state.timers.delay = state.registers.read(x);
                state.advance();
            }
            Instruction::SetSoundTimer { x } => {
                state.timers.sound = state.registers.read(x);
                state.advance();
            }
            // Overflow is measured against 0xFFF and the result reduced modulo
            // 0xFFF, not 0x1000.
            Instruction::AddToIndex { x } => {
                let sum = u32::from(state.index) + u32::from(state.registers.read(x));
                state.registers.set_flag(sum > 0xFFF);
                state.index = (sum % 0xFFF) as Address;
                state.advance();
            }
            Instruction::FontChar { x } => {
                state.index = FONT_ADDR + Address::from(state.registers.read(x)) * FONT_HEIGHT;
                state.advance();
            }
            Instruction::BinaryCodedDecimal { x } => {
                let value_x = state.registers.read(x);
                let bcd = [value_x / 100, (value_x / 10) % 10, value_x % 10];
                state.memory.write_block(usize::from(state.index), &bcd)?;
                state.advance();
            }
            Instruction::Store { x } => {
                let registers = state.registers.up_to(x);
                state
                    .memory
                    .write_block(usize::from(state.index), registers)?;
                state.index = state.index.wrapping_add(x.index() as Address + 1);
                state.advance();
            }
            Instruction::Load { x } => {
                let values = state
                    .memory
                    .read_block(usize::from(state.index), x.index() + 1)?;
                state.registers.fill_from(values);
                state.index = state.index.wrapping_add(x.index() as Address + 1);
                state.advance();
            }
        }
        Ok(())
    }
}
