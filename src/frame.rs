use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::CameraError;

/// Pixel layout of a raw frame delivered by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Packed 8-bit RGB
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Rgb24 => 3,
        }
    }

    fn color_type(&self) -> image::ColorType {
        match self {
            FrameFormat::Rgb24 => image::ColorType::Rgb8,
        }
    }
}

/// Uncompressed frame at the stream's native dimensions
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Monotonic frame number within the stream
    pub sequence: u64,
    /// Pixel data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl RawFrame {
    pub fn new(sequence: u64, data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Self {
        Self {
            sequence,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Expected buffer length for the declared dimensions
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_size()
    }

    /// Encode the frame as a JPEG still
    pub fn encode_jpeg(&self, quality: u8) -> Result<CapturedFrame, CameraError> {
        if !self.validate_size() {
            return Err(CameraError::Render {
                details: format!(
                    "frame {} has {} bytes, expected {} for {}x{}",
                    self.sequence,
                    self.data.len(),
                    self.expected_size(),
                    self.width,
                    self.height
                ),
            });
        }

        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        encoder
            .encode(&self.data, self.width, self.height, self.format.color_type())
            .map_err(|e| CameraError::Render {
                details: format!("JPEG encoding failed: {}", e),
            })?;

        Ok(CapturedFrame {
            id: uuid::Uuid::new_v4().to_string(),
            captured_at: Utc::now(),
            jpeg: Arc::new(buf),
            width: self.width,
            height: self.height,
        })
    }
}

/// Immutable encoded still produced by a capture
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub id: String,
    pub captured_at: DateTime<Utc>,
    /// JPEG bytes, shared read-only across a batch
    pub jpeg: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    pub const MIME_TYPE: &'static str = "image/jpeg";

    /// Base64 of the JPEG payload
    pub fn base64(&self) -> String {
        STANDARD.encode(self.jpeg.as_slice())
    }

    /// `data:image/jpeg;base64,...` form of the still
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", Self::MIME_TYPE, self.base64())
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}

/// Split a base64 data URL into its MIME type and payload
pub fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    if mime.is_empty() || payload.is_empty() {
        return None;
    }
    Some((mime, payload))
}
