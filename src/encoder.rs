//! The seam between the connector and the symbol encoder.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::matrix::BitMatrix;
use crate::qrcode::{DataTooLong, QrCode, QrCodeEcc, QrSegment, Version};

/// Quiet zone around a QR symbol, in modules.
pub const DEFAULT_QUIET_ZONE: u32 = 4;

/// Largest accepted output width or height, in pixels.
pub const MAX_DIMENSION: u32 = 4096;

/// Barcode symbologies a host may ask for.
///
/// Only [`BarcodeFormat::QrCode`] can be encoded by [`QrCodeWriter`]; the other names exist so a
/// host asking for them gets a precise rejection instead of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarcodeFormat {
    Aztec,
    #[serde(rename = "CODE_128")]
    Code128,
    DataMatrix,
    #[serde(rename = "PDF_417")]
    Pdf417,
    #[default]
    #[serde(alias = "qr_code", alias = "QR", alias = "qr")]
    QrCode,
}

impl BarcodeFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            BarcodeFormat::Aztec => "AZTEC",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::DataMatrix => "DATA_MATRIX",
            BarcodeFormat::Pdf417 => "PDF_417",
            BarcodeFormat::QrCode => "QR_CODE",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of an [`Encoder`].
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("found empty contents")]
    EmptyContents,
    #[error("can only encode QR_CODE, but got {0}")]
    UnsupportedFormat(BarcodeFormat),
    #[error(
        "invalid dimensions {width}x{height}, each must be between 1 and {max}",
        max = MAX_DIMENSION
    )]
    InvalidDimensions { width: u32, height: u32 },
    #[error(transparent)]
    DataTooLong(#[from] DataTooLong),
    /// Failure reported by a third-party engine behind the [`Encoder`] trait.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Turns text into a rendered symbol.
///
/// Implementations are expected to be deterministic: the same arguments always produce the same
/// matrix or the same error.
pub trait Encoder {
    fn encode(
        &self,
        text: &str,
        format: BarcodeFormat,
        width: u32,
        height: u32,
    ) -> Result<BitMatrix, EncoderError>;

    /// Whether `format` can be encoded at all.
    fn supports(&self, format: BarcodeFormat) -> bool;
}

/// The default [`Encoder`], backed by [`QrCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrCodeWriter {
    ecc: QrCodeEcc,
    boost_ecc: bool,
    quiet_zone: u32,
}

impl Default for QrCodeWriter {
    fn default() -> Self {
        Self {
            ecc: QrCodeEcc::Low,
            boost_ecc: true,
            quiet_zone: DEFAULT_QUIET_ZONE,
        }
    }
}

impl QrCodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum error correction level. It is still raised when that costs no extra version,
    /// unless [`QrCodeWriter::with_boost_ecc`] turned boosting off.
    pub fn with_ecc(mut self, ecc: QrCodeEcc) -> Self {
        self.ecc = ecc;
        self
    }

    pub fn with_boost_ecc(mut self, boost_ecc: bool) -> Self {
        self.boost_ecc = boost_ecc;
        self
    }

    pub fn with_quiet_zone(mut self, quiet_zone: u32) -> Self {
        self.quiet_zone = quiet_zone;
        self
    }

    pub fn ecc(&self) -> QrCodeEcc {
        self.ecc
    }

    pub fn quiet_zone(&self) -> u32 {
        self.quiet_zone
    }
}

impl Encoder for QrCodeWriter {
    fn encode(
        &self,
        text: &str,
        format: BarcodeFormat,
        width: u32,
        height: u32,
    ) -> Result<BitMatrix, EncoderError> {
        if text.is_empty() {
            return Err(EncoderError::EmptyContents);
        }
        if !self.supports(format) {
            return Err(EncoderError::UnsupportedFormat(format));
        }
        if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
            return Err(EncoderError::InvalidDimensions { width, height });
        }

        let segments = QrSegment::make_segments(text);
        let qr = QrCode::encode_segments(
            &segments,
            self.ecc,
            Version::MIN,
            Version::MAX,
            None,
            self.boost_ecc,
        )?;
        debug!(
            version = qr.version().value(),
            ecc = ?qr.error_correction_level(),
            mask = qr.mask().value(),
            "encoded QR symbol"
        );
        Ok(BitMatrix::from_qr(&qr, width, height, self.quiet_zone))
    }

    fn supports(&self, format: BarcodeFormat) -> bool {
        format == BarcodeFormat::QrCode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_default_dimensions() {
        let matrix = QrCodeWriter::new()
            .encode("example@test.com", BarcodeFormat::QrCode, 256, 256)
            .unwrap();
        assert_eq!((matrix.width(), matrix.height()), (256, 256));
        assert!(matrix.count_dark() > 0);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let writer = QrCodeWriter::new();
        let a = writer.encode("testQREncoderConnector", BarcodeFormat::QrCode, 256, 256).unwrap();
        let b = writer.encode("testQREncoderConnector", BarcodeFormat::QrCode, 256, 256).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode_rejects_empty_contents() {
        let err = QrCodeWriter::new().encode("", BarcodeFormat::QrCode, 256, 256).unwrap_err();
        assert!(matches!(err, EncoderError::EmptyContents));
    }

    #[test]
    fn test_encode_rejects_other_formats() {
        let writer = QrCodeWriter::new();
        assert!(!writer.supports(BarcodeFormat::DataMatrix));
        let err = writer.encode("text", BarcodeFormat::DataMatrix, 256, 256).unwrap_err();
        assert!(matches!(err, EncoderError::UnsupportedFormat(BarcodeFormat::DataMatrix)));
        assert_eq!(err.to_string(), "can only encode QR_CODE, but got DATA_MATRIX");
    }

    #[test]
    fn test_encode_rejects_zero_dimensions() {
        let err = QrCodeWriter::new().encode("text", BarcodeFormat::QrCode, 0, 256).unwrap_err();
        assert!(matches!(err, EncoderError::InvalidDimensions { width: 0, height: 256 }));
    }

    #[test]
    fn test_encode_rejects_oversize_dimensions() {
        let writer = QrCodeWriter::new();
        let err = writer.encode("hi", BarcodeFormat::QrCode, u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(
            err,
            EncoderError::InvalidDimensions { width: u32::MAX, height: u32::MAX }
        ));
        assert!(writer.encode("hi", BarcodeFormat::QrCode, MAX_DIMENSION + 1, 256).is_err());

        let matrix = writer.encode("hi", BarcodeFormat::QrCode, MAX_DIMENSION, 1).unwrap();
        assert_eq!((matrix.width(), matrix.height()), (MAX_DIMENSION, 29));
    }

    #[test]
    fn test_encode_over_capacity() {
        let text = "x".repeat(5000);
        let err = QrCodeWriter::new().encode(&text, BarcodeFormat::QrCode, 256, 256).unwrap_err();
        assert!(matches!(err, EncoderError::DataTooLong(DataTooLong::DataOverCapacity(_, _))));
    }

    #[test]
    fn test_quiet_zone_setting() {
        let matrix = QrCodeWriter::new()
            .with_quiet_zone(0)
            .encode("HELLO WORLD", BarcodeFormat::QrCode, 21, 21)
            .unwrap();
        assert_eq!((matrix.width(), matrix.height()), (21, 21));
        assert!(matrix.get(0, 0));
    }

    #[test]
    fn test_format_names() {
        let format: BarcodeFormat = serde_json::from_str("\"qr_code\"").unwrap();
        assert_eq!(format, BarcodeFormat::QrCode);
        let format: BarcodeFormat = serde_json::from_str("\"PDF_417\"").unwrap();
        assert_eq!(format, BarcodeFormat::Pdf417);
        assert_eq!(serde_json::to_string(&BarcodeFormat::Code128).unwrap(), "\"CODE_128\"");
        assert!(serde_json::from_str::<BarcodeFormat>("\"EAN_13\"").is_err());
    }
}
