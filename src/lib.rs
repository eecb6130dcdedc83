// SPDX-License-Identifier: GPL-3.0-only

//! Capture Control - admission, batching and panorama sequencing for a
//! camera capture pipeline
//!
//! This library decides, for every capture trigger, whether a new capture
//! may start given the background save queue's load, groups multi-frame
//! captures into batches for the image processing engine, and drives the
//! gyroscope-guided panorama session.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: camera control contract and the sensor delivery loop
//! - [`pipelines`]: admission, batch assembly, save queue and panorama
//! - [`config`]: user configuration handling
//! - [`storage`]: directory-backed sinks for the save queue
//!
//! # Example
//!
//! ```ignore
//! let queue = Arc::new(SaveQueue::start(&config.queue, store, processor));
//! let pipeline = CapturePipeline::new(&config, queue, camera);
//!
//! if pipeline.request_capture().is_admitted() {
//!     // camera callbacks feed pipeline.on_picture_taken(...) etc.
//! }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use backends::camera::{CameraControl, JpegImage, RawImage, ViewAxis};
pub use config::Config;
pub use errors::{PipelineError, PipelineResult};
pub use pipelines::panorama::{PanoramaSession, RotationMatrix, SessionStep, Vec3};
pub use pipelines::photo::{
    Admission, AdmissionController, BatchAssembler, BatchRequest, CaptureCostModel, CaptureMode,
    CapturePipeline, SaveJob, SaveQueue,
};
