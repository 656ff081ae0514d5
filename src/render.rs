//! Rendering bit matrices to images, streams, files and SVG.

use std::fs;
use std::io::{Seek, Write};
use std::path::Path;

use image::{GrayImage, ImageBuffer, ImageFormat, Luma};
use thiserror::Error;
use tracing::debug;

use crate::matrix::BitMatrix;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts a matrix to a grayscale image, one pixel per bit.
///
/// # Example
///
/// ```
/// use qrconnector::{render::to_image, BarcodeFormat, Encoder, QrCodeWriter};
///
/// let matrix = QrCodeWriter::new().encode("Hello, World!", BarcodeFormat::QrCode, 256, 256).unwrap();
/// let img = to_image(&matrix);
/// assert_eq!(img.dimensions(), (256, 256));
/// ```
pub fn to_image(matrix: &BitMatrix) -> GrayImage {
    ImageBuffer::from_fn(matrix.width(), matrix.height(), |x, y| {
        if matrix.get(x, y) {
            Luma([0u8]) // Black
        } else {
            Luma([255u8]) // White
        }
    })
}

/// Writes the matrix as an image file, the format taken from the extension.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// Returns a [`RenderError`] if the directory cannot be created or the image cannot be encoded
/// or saved.
pub fn write_to_file(matrix: &BitMatrix, path: impl AsRef<Path>) -> Result<(), RenderError> {
    let path = path.as_ref();
    if let Some(directory) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !directory.exists() {
            fs::create_dir_all(directory)?;
        }
    }
    to_image(matrix).save(path)?;
    debug!(path = %path.display(), "wrote QR code image");
    Ok(())
}

/// Encodes the matrix as an image in `format` into `writer`.
pub fn write_to_stream<W: Write + Seek>(
    matrix: &BitMatrix,
    format: ImageFormat,
    writer: &mut W,
) -> Result<(), RenderError> {
    to_image(matrix).write_to(writer, format)?;
    Ok(())
}

/// Returns a string of SVG code depicting the matrix, one unit per bit.
///
/// Dark bits are merged into horizontal runs. The string always uses Unix newlines (\n),
/// regardless of the platform.
pub fn to_svg_string(matrix: &BitMatrix) -> String {
    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    result += "<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n";
    result += &format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" viewBox=\"0 0 {} {}\" stroke=\"none\">\n",
        matrix.width(),
        matrix.height()
    );
    result += "\t<rect width=\"100%\" height=\"100%\" fill=\"#FFFFFF\"/>\n";
    result += "\t<path d=\"";
    let mut first = true;
    for y in 0..matrix.height() {
        let mut x = 0;
        while x < matrix.width() {
            if !matrix.get(x, y) {
                x += 1;
                continue;
            }
            let start = x;
            while x < matrix.width() && matrix.get(x, y) {
                x += 1;
            }
            if !first {
                result += " ";
            }
            first = false;
            result += &format!("M{},{}h{}v1h-{}z", start, y, x - start, x - start);
        }
    }
    result += "\" fill=\"#000000\"/>\n";
    result += "</svg>\n";
    result
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::decode::decode_image;
    use crate::encoder::{BarcodeFormat, Encoder, QrCodeWriter};

    fn sample() -> BitMatrix {
        QrCodeWriter::new().encode("example@test.com", BarcodeFormat::QrCode, 256, 256).unwrap()
    }

    #[test]
    fn test_to_svg_string() {
        let svg = to_svg_string(&sample());
        assert!(svg.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(svg.contains("viewBox=\"0 0 256 256\""));
        assert!(svg.ends_with("</svg>\n"));
    }

    #[test]
    fn test_to_svg_string_merges_runs() {
        let mut matrix = BitMatrix::new(4, 2);
        matrix.set_region(1, 0, 2, 1);
        matrix.set(3, 1, true);
        let svg = to_svg_string(&matrix);
        assert!(svg.contains("d=\"M1,0h2v1h-2z M3,1h1v1h-1z\""));
    }

    #[test]
    fn test_to_image() {
        let matrix = sample();
        let img = to_image(&matrix);
        assert_eq!(img.dimensions(), (256, 256));
        let (x, y) = matrix.top_left_on_bit().unwrap();
        assert_eq!(img.get_pixel(x, y), &Luma([0u8]));
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
    }

    #[test]
    fn test_write_to_stream_png() {
        let mut buffer = Cursor::new(Vec::new());
        write_to_stream(&sample(), ImageFormat::Png, &mut buffer).unwrap();
        let bytes = buffer.into_inner();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        let loaded = image::load_from_memory(&bytes).unwrap().to_luma8();
        assert_eq!(decode_image(&loaded).unwrap(), "example@test.com");
    }

    #[test]
    fn test_write_to_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("qr.png");
        write_to_file(&sample(), &path).unwrap();

        let loaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(loaded.dimensions(), (256, 256));
        assert_eq!(decode_image(&loaded).unwrap(), "example@test.com");
    }

    #[test]
    fn test_write_to_file_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_to_file(&sample(), dir.path().join("qr.unknown")).unwrap_err();
        assert!(matches!(err, RenderError::Image(_)));
    }
}
