//! Recognised connector options and parameter names.

use serde::{Deserialize, Serialize};

use crate::encoder::{BarcodeFormat, MAX_DIMENSION};
use crate::error::ValidationError;

/// Parameter carrying the text to encode.
pub const TEXT: &str = "text";
/// Parameter carrying the pixel width of the output matrix.
pub const WIDTH: &str = "width";
/// Parameter carrying the pixel height of the output matrix.
pub const HEIGHT: &str = "height";
/// Parameter carrying the symbology name.
pub const FORMAT: &str = "format";

/// The default generated QR code width, in pixels.
pub const DEFAULT_WIDTH: u32 = 256;
/// The default generated QR code height, in pixels.
pub const DEFAULT_HEIGHT: u32 = 256;

/// Output options of the connector.
///
/// Every field is optional in serialized form:
///
/// ```rust
/// use qrconnector::{BarcodeFormat, EncodeOptions};
///
/// let options = EncodeOptions::from_json(r#"{ "width": 512 }"#).unwrap();
/// assert_eq!(options.width, 512);
/// assert_eq!(options.height, 256);
/// assert_eq!(options.format, BarcodeFormat::QrCode);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeOptions {
    pub width: u32,
    pub height: u32,
    pub format: BarcodeFormat,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            format: BarcodeFormat::QrCode,
        }
    }
}

impl EncodeOptions {
    /// Parses options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Checks the dimensions lie in `1..=MAX_DIMENSION`. Format support depends on the encoder
    /// and is checked by the connector.
    pub fn validate(&self) -> Vec<ValidationError> {
        [(WIDTH, self.width), (HEIGHT, self.height)]
            .into_iter()
            .filter_map(|(name, value)| match value {
                0 => Some(ValidationError::new(name, format!("{name} must be greater than zero"))),
                v if v > MAX_DIMENSION => Some(ValidationError::new(
                    name,
                    format!("{name} must be at most {MAX_DIMENSION}"),
                )),
                _ => None,
            })
            .collect()
    }
}
