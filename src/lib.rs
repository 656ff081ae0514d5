//! # qrconnector
//!
//! A workflow connector that encodes text into a QR code bit matrix.
//!
//! A host workflow engine drives an [`EncodeQrCode`] connector through the [`Connector`]
//! interface: it configures the `text` parameter (and optionally `width`, `height` and
//! `format`), validates, and only when validation reports no errors, executes. The resulting
//! [`BitMatrix`] can then be rendered to an image, a stream or SVG with [`render`].
//!
//! ## Features
//!
//! - Validation reported as data: every failed rule is a [`ValidationError`] naming its parameter.
//! - Encoding failures as values: [`EncodingError`] always carries the engine error as its source.
//! - QR Code Model 2 encoder: numeric, alphanumeric, byte and ECI modes, versions 1 to 40.
//! - Rendering to PNG files, arbitrary streams, in-memory image buffers and SVG.
//! - A pure-barcode reader to check rendered output.
//! - Safe Rust implementation with no unsafe code.
//!
//! ## Example
//!
//! ```rust
//! use qrconnector::{decode::decode_matrix, Connector, EncodeQrCode};
//! use serde_json::json;
//!
//! let mut connector = EncodeQrCode::new();
//! let params = json!({ "text": "example@test.com", "width": 128, "height": 128 });
//! connector.configure(params.as_object().unwrap());
//!
//! assert!(connector.validate().is_empty());
//! connector.execute().unwrap();
//!
//! let matrix = connector.result().unwrap();
//! assert_eq!(decode_matrix(matrix).unwrap(), "example@test.com");
//! ```
//!
//! ## Modules
//!
//! - [`connector`]: The connector and its capability interface.
//! - [`config`]: Recognised options and their defaults.
//! - [`encoder`]: The encoder seam and the default QR writer.
//! - [`qrcode`]: Core QR code encoding functionality.
//! - [`render`]: Utilities for rendering matrices in various formats.
//! - [`decode`]: Reading rendered symbols back to text.

#![forbid(unsafe_code)]

pub mod config;
pub mod connector;
pub mod decode;
pub mod encoder;
pub mod error;
pub mod matrix;
pub mod qrcode;
pub mod render;

pub use config::EncodeOptions;
pub use connector::{Connector, EncodeQrCode, Parameters};
pub use encoder::{BarcodeFormat, Encoder, EncoderError, QrCodeWriter};
pub use error::{EncodingError, ValidationError};
pub use matrix::BitMatrix;
