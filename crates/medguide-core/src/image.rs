//! Prescription image payloads and input validation.
//!
//! A [`PrescriptionImage`] can only be built from bytes that pass validation,
//! so every later stage can assume a non-empty payload in a supported format.

use crate::config::LimitsConfig;
use crate::error::ExtractionError;
use std::fmt;

/// Encodings accepted by the vision upstreams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// Sniff the format from magic bytes.
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.len() < 4 {
            return None;
        }

        // JPEG: FF D8 FF
        if header[0] == 0xFF && header[1] == 0xD8 && header[2] == 0xFF {
            return Some(Self::Jpeg);
        }

        // PNG: 89 50 4E 47
        if header[0] == 0x89 && header[1] == b'P' && header[2] == b'N' && header[3] == b'G' {
            return Some(Self::Png);
        }

        // GIF: GIF8
        if header.starts_with(b"GIF8") {
            return Some(Self::Gif);
        }

        // WebP: RIFF....WEBP
        if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WEBP" {
            return Some(Self::Webp);
        }

        None
    }

    /// Format identifier as used by the LLM layer.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated prescription photo. Never persisted.
#[derive(Clone)]
pub struct PrescriptionImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl PrescriptionImage {
    /// Validate raw bytes without a size limit.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::InvalidImage("image is empty".to_string()));
        }
        let format = ImageFormat::detect(&bytes).ok_or_else(|| {
            ExtractionError::InvalidImage(
                "unrecognized image format (expected JPEG, PNG, WebP or GIF)".to_string(),
            )
        })?;
        Ok(Self { bytes, format })
    }

    /// Validate raw bytes against the configured limits.
    pub fn with_limits(bytes: Vec<u8>, limits: &LimitsConfig) -> Result<Self, ExtractionError> {
        let max_bytes = limits.max_image_size_mb * 1024 * 1024;
        if bytes.len() as u64 > max_bytes {
            return Err(ExtractionError::InvalidImage(format!(
                "image too large ({}MB > {}MB)",
                bytes.len() as u64 / (1024 * 1024),
                limits.max_image_size_mb
            )));
        }
        Self::from_bytes(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for PrescriptionImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrescriptionImage")
            .field("format", &self.format)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_jpeg_and_png() {
        assert_eq!(
            ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::detect(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]),
            Some(ImageFormat::Png)
        );
    }

    #[test]
    fn test_detect_webp_requires_full_header() {
        let webp = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'E', b'B', b'P'];
        assert_eq!(ImageFormat::detect(&webp), Some(ImageFormat::Webp));
        let wav = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'A', b'V', b'E'];
        assert_eq!(ImageFormat::detect(&wav), None);
    }

    #[test]
    fn test_detect_rejects_unknown_and_short() {
        assert_eq!(ImageFormat::detect(b"%PDF-1.7"), None);
        assert_eq!(ImageFormat::detect(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn test_empty_image_rejected() {
        let err = PrescriptionImage::from_bytes(Vec::new()).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidImage(_)));
    }

    #[test]
    fn test_text_file_rejected() {
        let err = PrescriptionImage::from_bytes(b"hello world".to_vec()).unwrap_err();
        assert!(err.to_string().contains("unrecognized image format"));
    }

    #[test]
    fn test_size_limit_enforced() {
        let limits = LimitsConfig {
            max_image_size_mb: 1,
        };
        let mut bytes = fixtures::jpeg_bytes();
        bytes.resize(2 * 1024 * 1024, 0);
        let err = PrescriptionImage::with_limits(bytes, &limits).unwrap_err();
        assert!(err.to_string().contains("too large"));

        let ok = PrescriptionImage::with_limits(fixtures::jpeg_bytes(), &limits).unwrap();
        assert_eq!(ok.format(), ImageFormat::Jpeg);
    }
}
