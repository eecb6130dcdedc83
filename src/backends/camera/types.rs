// SPDX-License-Identifier: GPL-3.0-only

//! Payload and geometry types shared with the camera layer

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Encoded image bytes, shared zero-copy between callbacks and workers
pub type FrameData = Arc<[u8]>;

/// Camera field-of-view axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewAxis {
    /// Horizontal field of view
    Horizontal,
    /// Vertical field of view (panorama shoots in portrait)
    #[default]
    Vertical,
}

/// A JPEG payload delivered by the camera
#[derive(Debug, Clone)]
pub struct JpegImage {
    /// Encoded JPEG bytes
    pub data: FrameData,
    /// When the capture was requested
    pub captured_at: DateTime<Local>,
}

impl JpegImage {
    pub fn new(data: impl Into<FrameData>) -> Self {
        Self {
            data: data.into(),
            captured_at: Local::now(),
        }
    }

    /// Size of the encoded payload in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A RAW (DNG source) payload delivered by the camera
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Raw sensor bytes
    pub data: FrameData,
    pub width: u32,
    pub height: u32,
    /// When the capture was requested
    pub captured_at: DateTime<Local>,
}

impl RawImage {
    pub fn new(data: impl Into<FrameData>, width: u32, height: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            captured_at: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_payload_shares_data() {
        let image = JpegImage::new(vec![0xFFu8, 0xD8, 0xFF]);
        let copy = image.clone();
        assert_eq!(image.len(), 3);
        assert!(Arc::ptr_eq(&image.data, &copy.data));
    }
}
