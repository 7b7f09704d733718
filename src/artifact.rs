//! Artifact encoding: payload string -> QR matrix -> PNG raster -> data URI.
//!
//! The symbol version and error-correction level are chosen automatically by
//! the `qrcode` crate to fit the payload; the raster geometry is fixed by
//! `EncodeConfig` (300 px wide, 2-module quiet zone, black on white).
//! Encoding is a pure function of (payload, config): identical inputs yield
//! byte-identical PNG output, so artifacts are safe to compare and cache.

use base64::Engine;
use image::{GrayImage, ImageFormat, Luma};
use qrcode::types::QrError;
use qrcode::QrCode;
use serde::Serialize;
use thiserror::Error;

/// Fixed raster geometry and color pair applied to every artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeConfig {
    /// Output raster width (and height) in pixels.
    pub width: u32,
    /// Quiet-zone margin around the symbol, in modules.
    pub margin: u32,
    /// Foreground (module) luma value.
    pub dark: u8,
    /// Background luma value.
    pub light: u8,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self { width: 300, margin: 2, dark: 0x00, light: 0xFF }
    }
}

/// A self-contained, embeddable image artifact. Immutable once produced;
/// owned by the caller for the duration of a single render/response cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedArtifact {
    /// `data:image/png;base64,...` URI, consumable by markup and client code.
    pub data_uri: String,
    pub mime_type: String,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload exceeds the maximum symbol capacity")]
    PayloadTooLong,
    #[error("symbology rejected the payload: {0}")]
    Symbology(String),
    #[error("raster serialization failed: {0}")]
    Raster(String),
}

/// Encode `payload` into a PNG raster at the configured geometry.
///
/// The symbol is scaled with integer nearest-neighbor mapping onto an exact
/// `config.width`-pixel square so output bytes are reproducible. Payloads
/// beyond the maximum symbol capacity fail with `PayloadTooLong`; nothing is
/// ever truncated to fit.
pub fn encode_png(payload: &str, config: &EncodeConfig) -> Result<Vec<u8>, EncodeError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| match e {
        QrError::DataTooLong => EncodeError::PayloadTooLong,
        other => EncodeError::Symbology(other.to_string()),
    })?;

    let n = code.width() as u32;
    let colors = code.to_colors();
    let total = n + 2 * config.margin;
    // Never drop below one pixel per module, even for a degenerate config.
    let width = config.width.max(total);

    let img = GrayImage::from_fn(width, width, |x, y| {
        let mx = x * total / width;
        let my = y * total / width;
        let inside = mx >= config.margin
            && mx < config.margin + n
            && my >= config.margin
            && my < config.margin + n;
        let value = if inside {
            let cx = (mx - config.margin) as usize;
            let cy = (my - config.margin) as usize;
            colors[cy * n as usize + cx].select(config.dark, config.light)
        } else {
            config.light
        };
        Luma([value])
    });

    let mut png: Vec<u8> = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| EncodeError::Raster(e.to_string()))?;
    Ok(png)
}

/// Encode `payload` and wrap the raster as an embeddable data URI.
pub fn encode(payload: &str, config: &EncodeConfig) -> Result<EncodedArtifact, EncodeError> {
    let png = encode_png(payload, config)?;
    let data_uri = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&png)
    );
    Ok(EncodedArtifact { data_uri, mime_type: "image/png".to_string() })
}
