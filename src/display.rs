use bitvec::{BitArr, array::BitArray};

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const DISPLAY_SIZE: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT;
pub const SPRITE_WIDTH: usize = 8;

/// Monochrome 64x32 framebuffer, row-major.
pub struct Display {
    pixels: BitArr!(for DISPLAY_SIZE),
}

impl Display {
    pub fn new() -> Self {
        Display {
            pixels: BitArray::ZERO,
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[(y * DISPLAY_WIDTH + x) % DISPLAY_SIZE]
    }

    pub fn is_clear(&self) -> bool {
        self.pixels.not_any()
    }

    /// Yields each row as an iterator of pixel states.
    pub fn rows(&self) -> impl Iterator<Item = impl Iterator<Item = bool> + '_> + '_ {
        self.pixels[..DISPLAY_SIZE]
            .chunks(DISPLAY_WIDTH)
            .map(|row| row.iter().by_vals())
    }

    /// XORs `sprite` onto the display with its top-left corner at (x, y).
    ///
    /// Pixels are addressed linearly, so columns past the right edge land on
    /// the start of the next row and rows past the bottom wrap to the top.
    /// Returns true if any touched pixel is left on.
    pub fn draw_sprite(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        let mut collision = false;

        for (row, &byte) in sprite.iter().enumerate() {
            for bit in 0..SPRITE_WIDTH {
                if byte & (0x80 >> bit) == 0 {
                    continue;
                }

                let index = ((y + row) * DISPLAY_WIDTH + x + bit) % DISPLAY_SIZE;
                let pixel = !self.pixels[index];
                self.pixels.set(index, pixel);
                if pixel {
                    collision = true;
                }
            }
        }
        collision
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
