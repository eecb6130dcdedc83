// SPDX-License-Identifier: GPL-3.0-only

//! Multi-frame batch assembly
//!
//! A batch is the set of frames that becomes one output artifact (an HDR
//! merge, a noise reduction average, a stitched panorama, a saved bracket).
//!
//! ```text
//!             start_batch                 add_frame (count reached)
//!   Empty ───────────────▶ Accumulating ───────────────────────────▶ Complete
//!     ▲                        │   │                                   │
//!     │          flush         │   │ finish (explicit termination)     │ finish
//!     └────────────────────────┘   └──────────────▶ forwarded ◀───────┘
//! ```
//!
//! Burst-delivered modes (HDR and the brackets) go through
//! [`BatchAssembler::assemble_burst`], which performs the whole
//! start/add/finish sequence under one lock.

use super::mode::{Bracket, CaptureMode, ProcessType, SaveBase};
use crate::backends::camera::JpegImage;
use crate::errors::BatchError;
use crate::pipelines::panorama::RotationMatrix;
use chrono::{DateTime, Local};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Per-frame auxiliary data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameMetadata {
    /// Device orientation when the frame was captured (panorama)
    pub rotation: Option<RotationMatrix>,
}

/// One frame of a batch
#[derive(Debug, Clone)]
pub struct BatchFrame {
    pub image: JpegImage,
    pub metadata: FrameMetadata,
}

/// Panorama-specific batch data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanoramaInfo {
    /// Sweep direction, fixed after the second shot
    pub left_to_right: bool,
    /// Horizontal field of view in degrees
    pub view_angle_x: f32,
    /// Vertical field of view in degrees
    pub view_angle_y: f32,
}

/// How a new batch should be tagged
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPolicy {
    pub process_type: ProcessType,
    pub save_base: SaveBase,
    /// Expected frame count when known up front
    pub expected_frames: Option<usize>,
    pub bracket: Option<Bracket>,
    pub panorama: Option<PanoramaInfo>,
}

impl BatchPolicy {
    /// Policy for a batch whose length is decided by an explicit finish
    pub fn open_ended(process_type: ProcessType, save_base: SaveBase) -> Self {
        Self {
            process_type,
            save_base,
            expected_frames: None,
            bracket: None,
            panorama: None,
        }
    }
}

/// A complete or in-progress multi-frame capture
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub id: Uuid,
    pub mode: CaptureMode,
    pub process_type: ProcessType,
    pub save_base: SaveBase,
    /// Frames in arrival order
    pub frames: Vec<BatchFrame>,
    pub expected_frames: Option<usize>,
    pub bracket: Option<Bracket>,
    pub panorama: Option<PanoramaInfo>,
    pub started_at: DateTime<Local>,
}

impl BatchRequest {
    fn new(mode: CaptureMode, policy: BatchPolicy) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            process_type: policy.process_type,
            save_base: policy.save_base,
            frames: Vec::with_capacity(policy.expected_frames.unwrap_or(0)),
            expected_frames: policy.expected_frames,
            bracket: policy.bracket,
            panorama: policy.panorama,
            started_at: Local::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn is_full(&self) -> bool {
        self.expected_frames
            .is_some_and(|expected| self.frames.len() >= expected)
    }
}

/// Public view of the assembler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Empty,
    Accumulating,
    Complete,
}

#[derive(Debug)]
enum BatchState {
    Empty,
    Accumulating(BatchRequest),
    Complete(BatchRequest),
}

impl BatchState {
    fn phase(&self) -> BatchPhase {
        match self {
            BatchState::Empty => BatchPhase::Empty,
            BatchState::Accumulating(_) => BatchPhase::Accumulating,
            BatchState::Complete(_) => BatchPhase::Complete,
        }
    }

    fn request(&self) -> Option<&BatchRequest> {
        match self {
            BatchState::Empty => None,
            BatchState::Accumulating(request) | BatchState::Complete(request) => Some(request),
        }
    }
}

/// Accumulates frames into a single batch
///
/// All operations lock one mutex, so frames from the camera callback thread
/// and flushes from the control thread are serialized and appended in
/// arrival order.
pub struct BatchAssembler {
    state: Mutex<BatchState>,
}

impl BatchAssembler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BatchState::Empty),
        }
    }

    fn state(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Begin a new batch
    ///
    /// Fails if a batch is already in progress: the previous batch must be
    /// finished or flushed first.
    pub fn start_batch(&self, mode: CaptureMode, policy: BatchPolicy) -> Result<(), BatchError> {
        let mut state = self.state();
        Self::start_locked(&mut state, mode, policy)
    }

    fn start_locked(
        state: &mut BatchState,
        mode: CaptureMode,
        policy: BatchPolicy,
    ) -> Result<(), BatchError> {
        if let Some(active) = state.request() {
            return Err(BatchError::BatchInProgress {
                active: active.mode,
                requested: mode,
            });
        }
        let request = BatchRequest::new(mode, policy);
        info!(
            id = %request.id,
            ?mode,
            process_type = ?request.process_type,
            save_base = ?request.save_base,
            expected = ?request.expected_frames,
            "Batch started"
        );
        *state = BatchState::Accumulating(request);
        Ok(())
    }

    /// Append a frame to the active batch, returning the new frame count
    ///
    /// A frame with no active batch is a trigger/delivery desync: it is
    /// logged and rejected.
    pub fn add_frame(
        &self,
        mode: CaptureMode,
        image: JpegImage,
        metadata: FrameMetadata,
    ) -> Result<usize, BatchError> {
        let mut state = self.state();
        Self::add_locked(&mut state, mode, image, metadata)
    }

    fn add_locked(
        state: &mut BatchState,
        mode: CaptureMode,
        image: JpegImage,
        metadata: FrameMetadata,
    ) -> Result<usize, BatchError> {
        let mut request = match std::mem::replace(state, BatchState::Empty) {
            BatchState::Empty => {
                error!(?mode, "Frame delivered with no active batch, discarding");
                return Err(BatchError::NoActiveBatch { mode });
            }
            BatchState::Complete(request) => {
                let expected = request.frames.len();
                *state = BatchState::Complete(request);
                return Err(BatchError::BatchFull { expected });
            }
            BatchState::Accumulating(request) => request,
        };

        if request.mode != mode {
            error!(batch = ?request.mode, frame = ?mode, "Frame mode doesn't match batch");
            let batch = request.mode;
            *state = BatchState::Accumulating(request);
            return Err(BatchError::ModeMismatch { batch, frame: mode });
        }

        request.frames.push(BatchFrame { image, metadata });
        let count = request.frames.len();
        debug!(id = %request.id, count, "Frame added to batch");

        *state = if request.is_full() {
            BatchState::Complete(request)
        } else {
            BatchState::Accumulating(request)
        };
        Ok(count)
    }

    /// Record the panorama sweep direction on the active batch
    pub fn set_panorama_direction(&self, left_to_right: bool) -> Result<(), BatchError> {
        let mut state = self.state();
        match &mut *state {
            BatchState::Accumulating(request) | BatchState::Complete(request) => {
                if let Some(info) = request.panorama.as_mut() {
                    info.left_to_right = left_to_right;
                }
                Ok(())
            }
            BatchState::Empty => Err(BatchError::NoActiveBatch {
                mode: CaptureMode::Panorama,
            }),
        }
    }

    /// Whether the active batch holds all expected frames
    pub fn is_complete(&self) -> bool {
        matches!(*self.state(), BatchState::Complete(_))
    }

    pub fn phase(&self) -> BatchPhase {
        self.state().phase()
    }

    /// Mode of the active batch, if any
    pub fn active_mode(&self) -> Option<CaptureMode> {
        self.state().request().map(|request| request.mode)
    }

    /// Frames held by the active batch
    pub fn frame_count(&self) -> usize {
        self.state().request().map_or(0, BatchRequest::len)
    }

    /// Take the batch for forwarding, leaving the assembler empty
    ///
    /// Accumulating batches may be finished early (explicit termination).
    /// An active batch with no frames is discarded and reported as
    /// [`BatchError::EmptyBatch`].
    pub fn finish(&self) -> Result<BatchRequest, BatchError> {
        let mut state = self.state();
        Self::finish_locked(&mut state)
    }

    fn finish_locked(state: &mut BatchState) -> Result<BatchRequest, BatchError> {
        let request = match std::mem::replace(state, BatchState::Empty) {
            BatchState::Empty => {
                return Err(BatchError::NoActiveBatch {
                    mode: CaptureMode::Standard,
                });
            }
            BatchState::Accumulating(request) | BatchState::Complete(request) => request,
        };
        if request.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        info!(
            id = %request.id,
            mode = ?request.mode,
            frames = request.len(),
            "Batch finished"
        );
        Ok(request)
    }

    /// Discard the active batch without forwarding it
    ///
    /// Returns the number of frames dropped.
    pub fn flush(&self) -> usize {
        let mut state = self.state();
        match std::mem::replace(&mut *state, BatchState::Empty) {
            BatchState::Empty => 0,
            BatchState::Accumulating(request) | BatchState::Complete(request) => {
                info!(id = %request.id, mode = ?request.mode, frames = request.len(), "Batch flushed");
                request.len()
            }
        }
    }

    /// Assemble a burst delivered all at once into a complete batch
    pub fn assemble_burst(
        &self,
        mode: CaptureMode,
        policy: BatchPolicy,
        images: Vec<JpegImage>,
    ) -> Result<BatchRequest, BatchError> {
        let mut state = self.state();
        let policy = BatchPolicy {
            expected_frames: Some(images.len()),
            ..policy
        };
        Self::start_locked(&mut state, mode, policy)?;
        for image in images {
            Self::add_locked(&mut state, mode, image, FrameMetadata::default())?;
        }
        Self::finish_locked(&mut state)
    }
}

impl Default for BatchAssembler {
    fn default() -> Self {
        Self::new()
    }
}
