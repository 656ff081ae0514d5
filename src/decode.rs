//! Reading rendered symbols back to text.
//!
//! This is a pure-barcode reader: it expects a single unrotated, axis-aligned symbol with a light
//! quiet zone, such as [`QrCodeWriter`](crate::QrCodeWriter) produces or a PNG written by
//! [`render`](crate::render). Codewords are checked against their Reed–Solomon blocks but not
//! corrected.

use image::GrayImage;
use thiserror::Error;

use crate::matrix::BitMatrix;
use crate::qrcode::{
    format_bits, format_info_positions, placement_order, BlockLayout, Mask, QrCode, QrCodeEcc,
    QrSegmentMode, ReedSolomonGenerator, Version, ALPHANUMERIC_CHARSET, UTF8_ECI,
};

/// Luma below this reads as a dark pixel.
const LUMA_THRESHOLD: u8 = 128;

/// Format words further than this from every valid word are rejected.
const MAX_FORMAT_DISTANCE: u32 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no QR symbol found")]
    NotFound,
    #[error("symbol is {0} modules wide, which is not a QR version")]
    InvalidDimension(i32),
    #[error("format information is unreadable")]
    FormatInfo,
    #[error("error correction block {0} does not match its data")]
    Checksum(usize),
    #[error("data ended in the middle of a segment")]
    Truncated,
    #[error("unsupported segment mode {0:#x}")]
    UnsupportedMode(u32),
    #[error("unsupported ECI assignment {0}")]
    UnsupportedEci(u32),
    #[error("{0}")]
    Malformed(&'static str),
    #[error("byte segment is not valid UTF-8")]
    InvalidUtf8,
}

/// Metadata of a successfully read symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo {
    pub version: Version,
    pub ecc: QrCodeEcc,
    pub mask: Mask,
}

/// Decodes the symbol in `matrix`.
pub fn decode_matrix(matrix: &BitMatrix) -> Result<String, DecodeError> {
    read_matrix(matrix).map(|(_, text)| text)
}

/// Decodes the symbol in a grayscale image, dark pixels being those below mid-gray.
pub fn decode_image(image: &GrayImage) -> Result<String, DecodeError> {
    let mut matrix = BitMatrix::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        matrix.set(x, y, pixel.0[0] < LUMA_THRESHOLD);
    }
    decode_matrix(&matrix)
}

/// Decodes the symbol in `matrix`, also reporting its version, level and mask.
pub fn read_matrix(matrix: &BitMatrix) -> Result<(SymbolInfo, String), DecodeError> {
    let symbol = Symbol::sample(matrix)?;
    let (ecc, mask) = symbol.read_format()?;
    let info = SymbolInfo { version: symbol.version, ecc, mask };
    let codewords = symbol.read_codewords(mask);
    let data = deinterleave(&codewords, symbol.version, ecc)?;
    let text = parse_segments(&data, symbol.version)?;
    Ok((info, text))
}

/// The module grid of a located symbol.
struct Symbol {
    version: Version,
    size: i32,
    modules: Vec<bool>,
}

impl Symbol {
    fn sample(matrix: &BitMatrix) -> Result<Self, DecodeError> {
        let (left, top) = matrix.top_left_on_bit().ok_or(DecodeError::NotFound)?;
        let (_, bottom) = matrix.bottom_right_on_bit().ok_or(DecodeError::NotFound)?;

        // The top edge of the top-left finder is 7 dark modules
        let run = (left..matrix.width()).take_while(|&x| matrix.get(x, top)).count();
        if run < 7 || bottom <= top {
            return Err(DecodeError::NotFound);
        }
        let pitch = run as f64 / 7.0;

        let mut dimension = (f64::from(bottom - top + 1) / pitch).round() as i32;
        match dimension & 3 {
            0 => dimension += 1,
            2 => dimension -= 1,
            3 => return Err(DecodeError::InvalidDimension(dimension)),
            _ => {}
        }
        let version = Version::from_size(dimension).ok_or(DecodeError::InvalidDimension(dimension))?;
        if f64::from(left) + f64::from(dimension) * pitch > f64::from(matrix.width()) + pitch / 2.0 {
            return Err(DecodeError::NotFound);
        }

        let centre = |origin: u32, index: i32| (f64::from(origin) + (f64::from(index) + 0.5) * pitch) as u32;
        let mut modules = Vec::with_capacity((dimension * dimension) as usize);
        for y in 0..dimension {
            for x in 0..dimension {
                modules.push(matrix.get(centre(left, x), centre(top, y)));
            }
        }
        Ok(Self { version, size: dimension, modules })
    }

    fn get(&self, x: i32, y: i32) -> bool {
        self.modules[(y * self.size + x) as usize]
    }

    fn read_format(&self) -> Result<(QrCodeEcc, Mask), DecodeError> {
        let copies = format_info_positions(self.size).map(|positions| {
            positions
                .iter()
                .enumerate()
                .fold(0u32, |acc, (i, &(x, y))| acc | (u32::from(self.get(x, y)) << i))
        });

        let mut best = None;
        let mut best_distance = u32::MAX;
        for ecc in QrCodeEcc::ALL {
            for m in 0..8 {
                let mask = Mask::new(m);
                let expected = format_bits(ecc, mask);
                let distance = copies.iter().map(|&c| (c ^ expected).count_ones()).min().unwrap_or(u32::MAX);
                if distance < best_distance {
                    best = Some((ecc, mask));
                    best_distance = distance;
                }
            }
        }
        match best {
            Some(found) if best_distance <= MAX_FORMAT_DISTANCE => Ok(found),
            _ => Err(DecodeError::FormatInfo),
        }
    }

    /// Unmasks and reads all codewords in placement order.
    fn read_codewords(&self, mask: Mask) -> Vec<u8> {
        let function = QrCode::function_modules(self.version);
        let rawcodewords = QrCode::get_num_raw_data_modules(self.version) / 8;
        let mut codewords = vec![0u8; rawcodewords];
        let order = placement_order(self.size, &function);
        for (i, (x, y)) in order.into_iter().take(rawcodewords * 8).enumerate() {
            if self.get(x, y) ^ mask.inverts(x, y) {
                codewords[i >> 3] |= 0x80 >> (i & 7);
            }
        }
        codewords
    }
}

/// Splits interleaved codewords back into blocks, checks each block's error correction
/// codewords and returns the concatenated data codewords.
fn deinterleave(codewords: &[u8], version: Version, ecc: QrCodeEcc) -> Result<Vec<u8>, DecodeError> {
    let layout = BlockLayout::new(version, ecc);
    let lens: Vec<usize> = (0..layout.num_blocks).map(|b| layout.data_len(b)).collect();
    let mut blocks: Vec<Vec<u8>> = lens.iter().map(|&n| Vec::with_capacity(n + layout.ecc_len)).collect();

    let mut next = codewords.iter().copied();
    for i in 0..=layout.short_data_len {
        for (block, &len) in blocks.iter_mut().zip(&lens) {
            if i < len {
                block.push(next.next().ok_or(DecodeError::Truncated)?);
            }
        }
    }
    for _ in 0..layout.ecc_len {
        for block in blocks.iter_mut() {
            block.push(next.next().ok_or(DecodeError::Truncated)?);
        }
    }

    let rs = ReedSolomonGenerator::new(layout.ecc_len);
    let mut data = Vec::with_capacity(lens.iter().sum());
    for (index, (block, &len)) in blocks.iter().zip(&lens).enumerate() {
        let (dat, ecc) = block.split_at(len);
        if rs.compute_remainder(dat) != ecc {
            return Err(DecodeError::Checksum(index));
        }
        data.extend_from_slice(dat);
    }
    Ok(data)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Charset {
    /// No ECI seen: UTF-8 when valid, ISO-8859-1 otherwise.
    Unspecified,
    Latin1,
    Utf8,
}

impl Charset {
    fn from_eci(value: u32) -> Result<Self, DecodeError> {
        match value {
            1 | 3 => Ok(Charset::Latin1),
            UTF8_ECI => Ok(Charset::Utf8),
            other => Err(DecodeError::UnsupportedEci(other)),
        }
    }

    fn decode(self, bytes: Vec<u8>) -> Result<String, DecodeError> {
        match self {
            Charset::Unspecified => Ok(String::from_utf8(bytes).unwrap_or_else(|e| latin1(e.as_bytes()))),
            Charset::Latin1 => Ok(latin1(&bytes)),
            Charset::Utf8 => String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8),
        }
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    fn read(&mut self, len: u8) -> Result<u32, DecodeError> {
        if usize::from(len) > self.remaining() {
            return Err(DecodeError::Truncated);
        }
        let mut value = 0u32;
        for _ in 0..len {
            let bit = (self.data[self.pos >> 3] >> (7 - (self.pos & 7))) & 1;
            value = (value << 1) | u32::from(bit);
            self.pos += 1;
        }
        Ok(value)
    }
}

fn parse_segments(data: &[u8], version: Version) -> Result<String, DecodeError> {
    let mut reader = BitReader::new(data);
    let mut text = String::new();
    let mut charset = Charset::Unspecified;

    while reader.remaining() >= 4 {
        match reader.read(4)? {
            0x0 => break,
            0x1 => {
                let mut count = reader.read(QrSegmentMode::Numeric.num_char_count_bits(version))?;
                while count > 0 {
                    let (bits, digits) = match count {
                        1 => (4, 1),
                        2 => (7, 2),
                        _ => (10, 3),
                    };
                    let value = reader.read(bits)?;
                    if value >= 10u32.pow(digits as u32) {
                        return Err(DecodeError::Malformed("numeric group out of range"));
                    }
                    text.push_str(&format!("{value:0width$}", width = digits));
                    count -= digits as u32;
                }
            }
            0x2 => {
                let mut count = reader.read(QrSegmentMode::Alphanumeric.num_char_count_bits(version))?;
                while count >= 2 {
                    let value = reader.read(11)? as usize;
                    text.push(alphanumeric_char(value / 45)?);
                    text.push(alphanumeric_char(value % 45)?);
                    count -= 2;
                }
                if count == 1 {
                    text.push(alphanumeric_char(reader.read(6)? as usize)?);
                }
            }
            0x4 => {
                let count = reader.read(QrSegmentMode::Byte.num_char_count_bits(version))?;
                let bytes = (0..count)
                    .map(|_| reader.read(8).map(|b| b as u8))
                    .collect::<Result<Vec<u8>, _>>()?;
                text.push_str(&charset.decode(bytes)?);
            }
            0x7 => {
                let first = reader.read(8)?;
                let value = if first & 0x80 == 0 {
                    first
                } else if first & 0xc0 == 0x80 {
                    ((first & 0x3f) << 8) | reader.read(8)?
                } else if first & 0xe0 == 0xc0 {
                    ((first & 0x1f) << 16) | reader.read(16)?
                } else {
                    return Err(DecodeError::Malformed("bad ECI designator"));
                };
                charset = Charset::from_eci(value)?;
            }
            other => return Err(DecodeError::UnsupportedMode(other)),
        }
    }
    Ok(text)
}

fn alphanumeric_char(index: usize) -> Result<char, DecodeError> {
    ALPHANUMERIC_CHARSET
        .chars()
        .nth(index)
        .ok_or(DecodeError::Malformed("alphanumeric value out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{BarcodeFormat, Encoder, QrCodeWriter};
    use crate::qrcode::QrSegment;

    fn render(text: &str, width: u32, height: u32) -> BitMatrix {
        QrCodeWriter::new().encode(text, BarcodeFormat::QrCode, width, height).unwrap()
    }

    #[test]
    fn test_round_trip_modes() {
        for text in ["0123456789", "HELLO WORLD", "example@test.com", "line one\nline two", "ù$*µ!§é"] {
            assert_eq!(decode_matrix(&render(text, 256, 256)).unwrap(), text);
        }
    }

    #[test]
    fn test_round_trip_multiple_blocks() {
        // Version 7 and above carry version information and many blocks
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(8);
        let (info, decoded) = read_matrix(&render(&text, 256, 256)).unwrap();
        assert!(info.version.value() >= 7);
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_round_trip_high_level() {
        let matrix = QrCodeWriter::new()
            .with_ecc(QrCodeEcc::High)
            .encode("example@test.com", BarcodeFormat::QrCode, 300, 200)
            .unwrap();
        let (info, text) = read_matrix(&matrix).unwrap();
        assert_eq!(info.ecc, QrCodeEcc::High);
        assert_eq!(text, "example@test.com");
    }

    #[test]
    fn test_round_trip_unscaled() {
        let matrix = render("testQREncoderConnector", 1, 1);
        assert_eq!(decode_matrix(&matrix).unwrap(), "testQREncoderConnector");
    }

    #[test]
    fn test_reports_symbol_info() {
        let segs = QrSegment::make_segments("HELLO WORLD");
        let qr = QrCode::encode_segments(&segs, QrCodeEcc::Medium, Version::MIN, Version::MAX, Some(Mask::new(2)), false).unwrap();
        let matrix = BitMatrix::from_qr(&qr, 100, 100, 4);
        let (info, text) = read_matrix(&matrix).unwrap();
        assert_eq!(info, SymbolInfo { version: Version::new(1), ecc: QrCodeEcc::Medium, mask: Mask::new(2) });
        assert_eq!(text, "HELLO WORLD");
    }

    #[test]
    fn test_corrupted_data_module() {
        let qr = QrCode::encode_text("example@test.com", QrCodeEcc::Low).unwrap();
        let mut matrix = BitMatrix::from_qr(&qr, 29 * 4, 29 * 4, 4);
        // The bottom-right module holds the first data bit
        let (left, top) = matrix.top_left_on_bit().unwrap();
        let last = qr.size() as u32 - 1;
        for dy in 0..4 {
            for dx in 0..4 {
                matrix.flip(left + last * 4 + dx, top + last * 4 + dy);
            }
        }
        assert!(matches!(decode_matrix(&matrix), Err(DecodeError::Checksum(_))));
    }

    #[test]
    fn test_blank_matrix() {
        assert_eq!(decode_matrix(&BitMatrix::new(64, 64)), Err(DecodeError::NotFound));
    }

    #[test]
    fn test_eci_latin1() {
        let segs = [QrSegment::make_eci(3), QrSegment::make_bytes(&[0x63, 0x61, 0x66, 0xe9])];
        let qr = QrCode::encode_segments(&segs, QrCodeEcc::Low, Version::MIN, Version::MAX, None, true).unwrap();
        assert_eq!(decode_matrix(&BitMatrix::from_qr(&qr, 0, 0, 4)).unwrap(), "café");
    }

    #[test]
    fn test_unspecified_charset_falls_back_to_latin1() {
        let qr = QrCode::encode_binary(&[0x63, 0x61, 0x66, 0xe9], QrCodeEcc::Low).unwrap();
        assert_eq!(decode_matrix(&BitMatrix::from_qr(&qr, 0, 0, 4)).unwrap(), "café");
    }

    #[test]
    fn test_decode_image() {
        let matrix = render("example@test.com", 256, 256);
        let image = crate::render::to_image(&matrix);
        assert_eq!(decode_image(&image).unwrap(), "example@test.com");
    }
}
