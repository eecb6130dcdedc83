// SPDX-License-Identifier: GPL-3.0-only

//! Directory-backed sinks for the save queue
//!
//! These stand in for the platform storage layer and the image processing
//! engine when running the CLI: singletons are written as-is and batches are
//! written as a manifest plus whichever input frames the save-base policy
//! asks for. No pixel processing happens here.

use crate::backends::camera::{JpegImage, RawImage};
use crate::errors::SaveQueueError;
use crate::pipelines::photo::{
    BatchRequest, ImageProcessor, ImageStore, ProcessType, SaveBase,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S_%3f").to_string()
}

fn suffix_text(suffix: Option<u32>) -> String {
    suffix.map(|s| format!("_{}", s)).unwrap_or_default()
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), SaveQueueError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    debug!(path = %path.display(), bytes = data.len(), "File written");
    Ok(())
}

/// Writes single images into a directory
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a JPEG; HDR-tagged singletons (DRO) get an `_HDR` marker
    pub fn jpeg_name(image: &JpegImage, process_type: ProcessType, suffix: Option<u32>) -> String {
        let marker = match process_type {
            ProcessType::Hdr => "_HDR",
            ProcessType::XNight => "_NIGHT",
            _ => "",
        };
        format!(
            "IMG_{}{}{}.jpg",
            timestamp(&image.captured_at),
            suffix_text(suffix),
            marker
        )
    }

    pub fn raw_name(image: &RawImage, suffix: Option<u32>) -> String {
        format!(
            "IMG_{}{}.dng",
            timestamp(&image.captured_at),
            suffix_text(suffix)
        )
    }
}

impl ImageStore for DirectoryStore {
    fn store_jpeg(
        &self,
        image: &JpegImage,
        process_type: ProcessType,
        suffix: Option<u32>,
    ) -> Result<(), SaveQueueError> {
        let path = self.dir.join(Self::jpeg_name(image, process_type, suffix));
        write_file(&path, &image.data)?;
        info!(path = %path.display(), "Photo saved");
        Ok(())
    }

    fn store_raw(&self, image: &RawImage, suffix: Option<u32>) -> Result<(), SaveQueueError> {
        let path = self.dir.join(Self::raw_name(image, suffix));
        write_file(&path, &image.data)?;
        info!(path = %path.display(), width = image.width, height = image.height, "RAW saved");
        Ok(())
    }
}

/// Batch description written next to the saved frames
#[derive(Debug, Serialize)]
pub struct BatchManifest {
    pub id: String,
    pub mode: String,
    pub process_type: ProcessType,
    pub save_base: SaveBase,
    pub frames: usize,
    pub bracket_images: Option<u32>,
    pub bracket_stops: Option<f64>,
    pub panorama_left_to_right: Option<bool>,
    pub view_angle_x: Option<f32>,
    pub view_angle_y: Option<f32>,
    /// Row-major gyro rotation per frame (panorama only)
    pub rotations: Vec<Option<[f32; 9]>>,
    pub started_at: String,
}

impl From<&BatchRequest> for BatchManifest {
    fn from(batch: &BatchRequest) -> Self {
        Self {
            id: batch.id.to_string(),
            mode: batch.mode.display_name().to_string(),
            process_type: batch.process_type,
            save_base: batch.save_base,
            frames: batch.len(),
            bracket_images: batch.bracket.map(|b| b.n_images),
            bracket_stops: batch.bracket.and_then(|b| b.stops),
            panorama_left_to_right: batch.panorama.map(|p| p.left_to_right),
            view_angle_x: batch.panorama.map(|p| p.view_angle_x),
            view_angle_y: batch.panorama.map(|p| p.view_angle_y),
            rotations: batch
                .frames
                .iter()
                .map(|f| f.metadata.rotation.map(|r| r.0))
                .collect(),
            started_at: batch.started_at.to_rfc3339(),
        }
    }
}

/// Receives finished batches and writes them into per-batch directories
#[derive(Debug, Clone)]
pub struct FileProcessor {
    dir: PathBuf,
}

impl FileProcessor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Indices of the input frames to keep for a save-base policy
    pub fn saved_frames(save_base: SaveBase, frames: usize) -> std::ops::Range<usize> {
        match save_base {
            SaveBase::None => 0..0,
            SaveBase::First => 0..frames.min(1),
            SaveBase::All | SaveBase::AllPlusDebug => 0..frames,
        }
    }
}

impl ImageProcessor for FileProcessor {
    fn submit_batch(&self, batch: BatchRequest) -> Result<(), SaveQueueError> {
        let batch_dir = self
            .dir
            .join(format!("BATCH_{}", timestamp(&batch.started_at)));
        let manifest = BatchManifest::from(&batch);
        let text = serde_json::to_string_pretty(&manifest)
            .map_err(|e| SaveQueueError::Sink(e.to_string()))?;
        write_file(&batch_dir.join("manifest.json"), text.as_bytes())?;

        for index in Self::saved_frames(batch.save_base, batch.len()) {
            let frame = &batch.frames[index];
            write_file(
                &batch_dir.join(format!("base_{}.jpg", index)),
                &frame.image.data,
            )?;
        }

        info!(
            dir = %batch_dir.display(),
            mode = ?batch.mode,
            frames = batch.len(),
            "Batch submitted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_in_file_name() {
        let image = JpegImage::new(vec![1u8]);
        let name = DirectoryStore::jpeg_name(&image, ProcessType::Normal, Some(2));
        assert!(name.starts_with("IMG_"));
        assert!(name.ends_with("_2.jpg"));
        let hdr = DirectoryStore::jpeg_name(&image, ProcessType::Hdr, None);
        assert!(hdr.ends_with("_HDR.jpg"));
    }

    #[test]
    fn test_saved_frames_policy() {
        assert_eq!(FileProcessor::saved_frames(SaveBase::None, 8), 0..0);
        assert_eq!(FileProcessor::saved_frames(SaveBase::First, 8), 0..1);
        assert_eq!(FileProcessor::saved_frames(SaveBase::All, 8), 0..8);
        assert_eq!(FileProcessor::saved_frames(SaveBase::First, 0), 0..0);
    }
}
