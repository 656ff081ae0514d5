//! The QR encoding connector and the capability interface hosts drive it through.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{EncodeOptions, FORMAT, HEIGHT, TEXT, WIDTH};
use crate::encoder::{BarcodeFormat, Encoder, QrCodeWriter};
use crate::error::{EncodingError, ValidationError};
use crate::matrix::BitMatrix;

/// Identifier of [`EncodeQrCode`] in host registries and logs.
pub const NAME: &str = "encode-qr-code";

/// Untyped parameters as a host hands them over.
pub type Parameters = serde_json::Map<String, Value>;

/// A single-operation unit of work driven by a host workflow engine.
///
/// The host adapter calls [`configure`](Connector::configure), then
/// [`validate`](Connector::validate), and only when that returned no errors,
/// [`execute`](Connector::execute). Implementations do not enforce that order.
pub trait Connector {
    type Output;
    type Error: std::error::Error + 'static;

    /// Stable identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Accepts untrusted parameters. Problems are reported by the next `validate`.
    fn configure(&mut self, params: &Parameters);

    /// Checks every rule and reports all failures at once. Has no side effects.
    fn validate(&self) -> Vec<ValidationError>;

    fn execute(&mut self) -> Result<(), Self::Error>;

    /// Output of the most recent successful `execute`.
    fn result(&self) -> Option<&Self::Output>;
}

/// A [`Connector`] that encodes its `text` parameter as a QR code.
///
/// Not meant to be shared between threads; hosts use one instance per invocation.
///
/// ```rust
/// use qrconnector::EncodeQrCode;
///
/// let mut connector = EncodeQrCode::new();
/// connector.set_text("example@test.com");
/// assert!(connector.validate().is_empty());
/// connector.execute().unwrap();
/// let matrix = connector.matrix().unwrap();
/// assert_eq!((matrix.width(), matrix.height()), (256, 256));
/// ```
#[derive(Debug, Clone)]
pub struct EncodeQrCode<E = QrCodeWriter> {
    text: Option<String>,
    options: EncodeOptions,
    rejected: Vec<ValidationError>,
    matrix: Option<BitMatrix>,
    encoder: E,
}

impl EncodeQrCode {
    pub fn new() -> Self {
        Self::with_encoder(QrCodeWriter::default())
    }
}

impl Default for EncodeQrCode {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Encoder> EncodeQrCode<E> {
    pub fn with_encoder(encoder: E) -> Self {
        Self {
            text: None,
            options: EncodeOptions::default(),
            rejected: Vec::new(),
            matrix: None,
            encoder,
        }
    }

    /// Sets the text to be encoded as a QR code.
    ///
    /// Only the text changes: values [`configure`](Self::configure) rejected stay reported until
    /// the next `configure`.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// The value of the text to be encoded as a QR code.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_options(&mut self, options: EncodeOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    /// Accepts untyped parameters by name.
    ///
    /// Recognised names are `text`, `width`, `height` and `format`; absent names keep their
    /// current value and a JSON `null` text clears it. Values of the wrong type and unknown names
    /// are recorded and reported by [`validate`](Self::validate). Each call replaces what the
    /// previous one recorded.
    pub fn configure(&mut self, params: &Parameters) {
        self.rejected.clear();
        for (name, value) in params {
            match name.as_str() {
                TEXT => match value {
                    Value::String(text) => self.text = Some(text.clone()),
                    Value::Null => self.text = None,
                    other => self.reject(TEXT, format!("text must be a string, got {}", kind(other))),
                },
                WIDTH => match dimension(value) {
                    Some(width) => self.options.width = width,
                    None => self.reject(WIDTH, format!("width must be a pixel count, got {value}")),
                },
                HEIGHT => match dimension(value) {
                    Some(height) => self.options.height = height,
                    None => self.reject(HEIGHT, format!("height must be a pixel count, got {value}")),
                },
                FORMAT => match serde_json::from_value::<BarcodeFormat>(value.clone()) {
                    Ok(format) => self.options.format = format,
                    Err(_) => self.reject(FORMAT, format!("unknown barcode format {value}")),
                },
                other => self.reject(other, "unknown parameter"),
            }
        }
        debug!(
            connector = NAME,
            parameters = params.len(),
            rejected = self.rejected.len(),
            "configured"
        );
    }

    /// Validates the input values.
    ///
    /// The text must be set and not empty, both dimensions must be non-zero, the format must be
    /// supported by the encoder, and every parameter `configure` could not accept is reported.
    /// An empty result means the connector is safe to execute.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.text.as_deref().map_or(true, str::is_empty) {
            errors.push(ValidationError::new(TEXT, "text must not be empty"));
        }
        errors.extend(self.options.validate());
        if !self.encoder.supports(self.options.format) {
            errors.push(ValidationError::new(
                FORMAT,
                format!("unsupported barcode format {}", self.options.format),
            ));
        }
        errors.extend(self.rejected.iter().cloned());

        if !errors.is_empty() {
            debug!(connector = NAME, errors = errors.len(), "validation failed");
        }
        errors
    }

    /// Encodes the value of `text` as a QR code.
    ///
    /// The previous matrix is dropped first, so a failed run never leaves a stale result. The
    /// text is not re-validated: an absent text is handed to the encoder as an empty string.
    pub fn execute(&mut self) -> Result<(), EncodingError> {
        self.encode().map(|_| ())
    }

    /// Runs [`execute`](Self::execute) and returns the new matrix directly.
    pub fn encode(&mut self) -> Result<&BitMatrix, EncodingError> {
        self.matrix = None;
        let matrix = self.generate()?;
        Ok(&*self.matrix.insert(matrix))
    }

    /// The resulting matrix of the last successful `execute`.
    ///
    /// It can be rendered with the [`render`](crate::render) functions:
    ///
    /// ```rust,no_run
    /// # let mut connector = qrconnector::EncodeQrCode::new();
    /// # connector.set_text("text");
    /// # connector.execute().unwrap();
    /// let matrix = connector.matrix().unwrap();
    /// qrconnector::render::write_to_file(matrix, "some/path.png").unwrap();
    /// let image = qrconnector::render::to_image(matrix);
    /// ```
    pub fn matrix(&self) -> Option<&BitMatrix> {
        self.matrix.as_ref()
    }

    pub fn into_matrix(self) -> Option<BitMatrix> {
        self.matrix
    }

    fn generate(&self) -> Result<BitMatrix, EncodingError> {
        let text = self.text.as_deref().unwrap_or_default();
        let EncodeOptions { width, height, format } = self.options;
        debug!(connector = NAME, bytes = text.len(), %format, width, height, "encoding");

        let matrix = self
            .encoder
            .encode(text, format, width, height)
            .map_err(|cause| {
                warn!(connector = NAME, error = %cause, "failed generating QR code");
                EncodingError::new(cause)
            })?;
        info!(
            connector = NAME,
            width = matrix.width(),
            height = matrix.height(),
            "generated QR code"
        );
        Ok(matrix)
    }

    fn reject(&mut self, name: &str, cause: impl Into<String>) {
        self.rejected.push(ValidationError::new(name, cause));
    }
}

impl<E: Encoder> Connector for EncodeQrCode<E> {
    type Output = BitMatrix;
    type Error = EncodingError;

    fn name(&self) -> &'static str {
        NAME
    }

    fn configure(&mut self, params: &Parameters) {
        Self::configure(self, params)
    }

    fn validate(&self) -> Vec<ValidationError> {
        Self::validate(self)
    }

    fn execute(&mut self) -> Result<(), EncodingError> {
        Self::execute(self)
    }

    fn result(&self) -> Option<&BitMatrix> {
        self.matrix()
    }
}

fn dimension(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|v| u32::try_from(v).ok())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::error::Error as _;

    use serde_json::json;

    use super::*;
    use crate::decode::decode_matrix;
    use crate::encoder::EncoderError;
    use crate::qrcode::DataTooLong;

    /// Counts calls and fails on demand.
    struct ScriptedEncoder {
        calls: Cell<usize>,
        fail: bool,
    }

    impl ScriptedEncoder {
        fn failing() -> Self {
            Self { calls: Cell::new(0), fail: true }
        }
    }

    impl Encoder for ScriptedEncoder {
        fn encode(
            &self,
            _text: &str,
            _format: BarcodeFormat,
            width: u32,
            height: u32,
        ) -> Result<BitMatrix, EncoderError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(EncoderError::Other("engine exploded".into()))
            } else {
                Ok(BitMatrix::new(width, height))
            }
        }

        fn supports(&self, _format: BarcodeFormat) -> bool {
            true
        }
    }

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_validate_text_not_set() {
        let errors = EncodeQrCode::new().validate();
        assert_eq!(errors, [ValidationError::new("text", "text must not be empty")]);
    }

    #[test]
    fn test_validate_text_blank() {
        let mut connector = EncodeQrCode::new();
        connector.set_text("");
        let errors = connector.validate();
        assert!(errors.iter().any(|e| e.parameter_name == "text"));
    }

    #[test]
    fn test_validate_valid_parameters() {
        let mut connector = EncodeQrCode::new();
        connector.set_text("text");
        assert!(connector.validate().is_empty());
    }

    #[test]
    fn test_validate_is_repeatable() {
        let mut connector = EncodeQrCode::new();
        connector.configure(&params(json!({ "width": 0, "color": "red" })));
        let first = connector.validate();
        let second = connector.validate();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|e| !e.parameter_name.is_empty() && !e.cause.is_empty()));
    }

    #[test]
    fn test_set_text_last_write_wins() {
        let mut connector = EncodeQrCode::new();
        connector.set_text("first");
        connector.set_text("second");
        assert_eq!(connector.text(), Some("second"));
    }

    #[test]
    fn test_execute_round_trip() {
        for text in [
            "testQREncoderConnector",
            "test QR Encoder Connector with spaces",
            "test QR Encoder Connector \n with new lines",
            "test QR Encoder Connector with special characters: ù$*µ!§é",
            "example@test.com",
        ] {
            let mut connector = EncodeQrCode::new();
            connector.set_text(text);
            connector.execute().unwrap();
            let matrix = connector.matrix().expect("matrix after successful execute");
            assert_eq!(decode_matrix(matrix).unwrap(), text);
        }
    }

    #[test]
    fn test_failed_execute_clears_previous_matrix() {
        let mut connector = EncodeQrCode::new();
        connector.set_text("example@test.com");
        connector.execute().unwrap();
        assert!(connector.matrix().is_some());

        connector.set_text("x".repeat(5000));
        let err = connector.execute().unwrap_err();
        assert_eq!(err.to_string(), "Failed generating QR code");
        assert!(matches!(
            err.cause(),
            EncoderError::DataTooLong(DataTooLong::DataOverCapacity(_, _))
        ));
        assert!(err.source().is_some());
        assert!(connector.matrix().is_none());
    }

    #[test]
    fn test_execute_without_text_fails() {
        let mut connector = EncodeQrCode::new();
        let err = connector.execute().unwrap_err();
        assert!(matches!(err.cause(), EncoderError::EmptyContents));
        assert!(connector.matrix().is_none());
    }

    #[test]
    fn test_execute_calls_encoder_once() {
        let mut connector = EncodeQrCode::with_encoder(ScriptedEncoder::failing());
        connector.set_text("text");
        assert!(connector.execute().is_err());
        assert!(connector.execute().is_err());
        assert_eq!(connector.encoder().calls.get(), 2);
        assert!(connector.result().is_none());
    }

    #[test]
    fn test_execute_passes_options() {
        let encoder = ScriptedEncoder { calls: Cell::new(0), fail: false };
        let mut connector = EncodeQrCode::with_encoder(encoder);
        connector.set_text("text");
        connector.set_options(EncodeOptions { width: 64, height: 32, ..EncodeOptions::default() });
        let matrix = connector.encode().unwrap();
        assert_eq!((matrix.width(), matrix.height()), (64, 32));
        assert_eq!(connector.into_matrix().map(|m| m.width()), Some(64));
    }

    #[test]
    fn test_configure_accepts_known_parameters() {
        let mut connector = EncodeQrCode::new();
        connector.configure(&params(json!({
            "text": "example@test.com",
            "width": 128,
            "height": 96,
            "format": "qr_code",
        })));
        assert!(connector.validate().is_empty());
        assert_eq!(connector.text(), Some("example@test.com"));
        assert_eq!(connector.options().width, 128);
        assert_eq!(connector.options().height, 96);

        connector.execute().unwrap();
        let matrix = connector.matrix().unwrap();
        assert_eq!((matrix.width(), matrix.height()), (128, 96));
    }

    #[test]
    fn test_configure_reports_bad_values() {
        let mut connector = EncodeQrCode::new();
        connector.configure(&params(json!({
            "text": 42,
            "width": -5,
            "height": "tall",
            "format": "EAN_13",
            "colour": "red",
        })));
        let errors = connector.validate();
        let named = |name: &str| errors.iter().filter(|e| e.parameter_name == name).count();
        // Missing text plus wrong type
        assert_eq!(named("text"), 2);
        assert_eq!(named("width"), 1);
        assert_eq!(named("height"), 1);
        assert_eq!(named("format"), 1);
        assert_eq!(named("colour"), 1);
        assert!(errors.contains(&ValidationError::new("text", "text must be a string, got a number")));
    }

    #[test]
    fn test_configure_replaces_previous_rejections() {
        let mut connector = EncodeQrCode::new();
        connector.configure(&params(json!({ "text": true })));
        assert_eq!(connector.validate().len(), 2);

        connector.set_text("fixed");
        assert_eq!(
            connector.validate(),
            [ValidationError::new("text", "text must be a string, got a boolean")]
        );

        connector.configure(&params(json!({ "bogus": 1 })));
        assert_eq!(connector.validate().len(), 1);
        connector.configure(&params(json!({})));
        assert!(connector.validate().is_empty());
    }

    #[test]
    fn test_oversize_dimensions_are_rejected() {
        let mut connector = EncodeQrCode::new();
        connector.configure(&params(json!({
            "text": "hi",
            "width": 4294967295u64,
            "height": 4294967295u64,
        })));
        let errors = connector.validate();
        let names: Vec<&str> = errors.iter().map(|e| e.parameter_name.as_str()).collect();
        assert_eq!(names, ["width", "height"]);

        // Executing anyway stays an error value
        let err = connector.execute().unwrap_err();
        assert!(matches!(
            err.cause(),
            EncoderError::InvalidDimensions { width: u32::MAX, height: u32::MAX }
        ));
        assert!(connector.matrix().is_none());
    }

    #[test]
    fn test_configure_null_text_clears_it() {
        let mut connector = EncodeQrCode::new();
        connector.set_text("text");
        connector.configure(&params(json!({ "text": null })));
        assert_eq!(connector.text(), None);
    }

    #[test]
    fn test_unsupported_format_fails_validation() {
        let mut connector = EncodeQrCode::new();
        connector.set_text("text");
        connector.configure(&params(json!({ "format": "DATA_MATRIX" })));
        assert_eq!(
            connector.validate(),
            [ValidationError::new("format", "unsupported barcode format DATA_MATRIX")]
        );
        let err = connector.execute().unwrap_err();
        assert!(matches!(err.cause(), EncoderError::UnsupportedFormat(BarcodeFormat::DataMatrix)));
    }

    #[test]
    fn test_connector_trait_object() {
        let mut connector: Box<dyn Connector<Output = BitMatrix, Error = EncodingError>> =
            Box::new(EncodeQrCode::new());
        assert_eq!(connector.name(), "encode-qr-code");
        connector.configure(&params(json!({ "text": "HELLO WORLD" })));
        assert!(connector.validate().is_empty());
        connector.execute().unwrap();
        assert_eq!(decode_matrix(connector.result().unwrap()).unwrap(), "HELLO WORLD");
    }
}
