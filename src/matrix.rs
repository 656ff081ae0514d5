//! A rendered symbol as a plain grid of bits.

use std::fmt;

use crate::qrcode::QrCode;

/// A `width × height` grid of bits, `true` meaning dark.
///
/// This is what the connector hands to its host: the encoded symbol scaled into the requested
/// pixel dimensions, quiet zone included. Coordinates are `(x, y)` with the origin at the
/// top-left corner.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitMatrix {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl BitMatrix {
    /// Creates an all-light matrix.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Renders `qr` into at least `width × height` pixels.
    ///
    /// The symbol plus `quiet_zone` modules on each side is scaled by the largest whole factor
    /// that fits both dimensions (at least 1) and centred. When the requested size is smaller
    /// than the symbol and its quiet zone, the matrix grows to fit them.
    pub fn from_qr(qr: &QrCode, width: u32, height: u32, quiet_zone: u32) -> Self {
        let symbol = qr.size() as u32;
        let full = symbol + quiet_zone * 2;
        let out_width = width.max(full);
        let out_height = height.max(full);
        let scale = (out_width / full).min(out_height / full);
        let left = (out_width - symbol * scale) / 2;
        let top = (out_height - symbol * scale) / 2;

        let mut matrix = Self::new(out_width, out_height);
        for y in 0..qr.size() {
            for x in 0..qr.size() {
                if qr.get_module(x, y) {
                    matrix.set_region(left + x as u32 * scale, top + y as u32 * scale, scale, scale);
                }
            }
        }
        matrix
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the bit at `(x, y)`; out-of-bounds coordinates read as light.
    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.bits[self.index(x, y)]
    }

    /// Sets the bit at `(x, y)`. Out-of-bounds coordinates are ignored.
    pub fn set(&mut self, x: u32, y: u32, dark: bool) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.bits[index] = dark;
        }
    }

    /// Darkens a rectangle, clipped to the matrix.
    pub fn set_region(&mut self, left: u32, top: u32, width: u32, height: u32) {
        for y in top..top.saturating_add(height).min(self.height) {
            for x in left..left.saturating_add(width).min(self.width) {
                let index = self.index(x, y);
                self.bits[index] = true;
            }
        }
    }

    /// Flips the bit at `(x, y)`.
    pub fn flip(&mut self, x: u32, y: u32) {
        let dark = self.get(x, y);
        self.set(x, y, !dark);
    }

    /// Number of dark bits.
    pub fn count_dark(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Coordinates of the first dark bit in row-major order.
    pub fn top_left_on_bit(&self) -> Option<(u32, u32)> {
        self.bits.iter().position(|&b| b).map(|i| self.coords(i))
    }

    /// Coordinates of the last dark bit in row-major order.
    pub fn bottom_right_on_bit(&self) -> Option<(u32, u32)> {
        self.bits.iter().rposition(|&b| b).map(|i| self.coords(i))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn coords(&self, index: usize) -> (u32, u32) {
        let width = self.width as usize;
        ((index % width) as u32, (index / width) as u32)
    }
}

impl fmt::Debug for BitMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitMatrix")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("dark", &self.count_dark())
            .finish()
    }
}

/// One character per bit: `█` for dark, a space for light.
impl fmt::Display for BitMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                f.write_str(if self.get(x, y) { "█" } else { " " })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qrcode::QrCodeEcc;

    fn version_one() -> QrCode {
        let qr = QrCode::encode_text("HELLO WORLD", QrCodeEcc::Low).unwrap();
        assert_eq!(qr.size(), 21);
        qr
    }

    #[test]
    fn test_from_qr_scales_and_centres() {
        let matrix = BitMatrix::from_qr(&version_one(), 256, 256, 4);
        assert_eq!((matrix.width(), matrix.height()), (256, 256));

        // 29 modules with quiet zone fit 8 times; 21 * 8 = 168 centred in 256
        assert_eq!(matrix.top_left_on_bit(), Some((44, 44)));
        assert!(!matrix.get(43, 44));
        assert!(matrix.get(44 + 7 * 8 - 1, 44));
        assert!(!matrix.get(44 + 7 * 8, 44));
        assert_eq!(matrix.bottom_right_on_bit().map(|(_, y)| y), Some(44 + 168 - 1));
    }

    #[test]
    fn test_from_qr_grows_to_fit() {
        let matrix = BitMatrix::from_qr(&version_one(), 10, 10, 4);
        assert_eq!((matrix.width(), matrix.height()), (29, 29));
        assert_eq!(matrix.top_left_on_bit(), Some((4, 4)));
    }

    #[test]
    fn test_from_qr_uneven_dimensions() {
        let matrix = BitMatrix::from_qr(&version_one(), 100, 60, 4);
        assert_eq!((matrix.width(), matrix.height()), (100, 60));
        // min(100 / 29, 60 / 29) = 2
        assert_eq!(matrix.top_left_on_bit(), Some(((100 - 42) / 2, (60 - 42) / 2)));
    }

    #[test]
    fn test_set_region_clips() {
        let mut matrix = BitMatrix::new(4, 3);
        matrix.set_region(2, 1, 10, 10);
        assert_eq!(matrix.count_dark(), 4);
        assert!(matrix.get(3, 2));
        assert!(!matrix.get(4, 2));
        matrix.flip(3, 2);
        assert!(!matrix.get(3, 2));
        matrix.set(100, 100, true);
        assert_eq!(matrix.count_dark(), 3);
    }

    #[test]
    fn test_display_renders_rows() {
        let mut matrix = BitMatrix::new(3, 2);
        matrix.set(1, 0, true);
        assert_eq!(matrix.to_string(), " █ \n   \n");
    }
}
