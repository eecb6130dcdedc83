// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture control layer
//!
//! Backpressure refusals, rejected panorama shots and panorama exhaustion are
//! not errors and never appear here: they are ordinary values returned by
//! the admission controller and the panorama session.

use crate::pipelines::photo::CaptureMode;
use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Top-level error type
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Batch assembly errors
    Batch(BatchError),
    /// Panorama session errors
    Panorama(PanoramaError),
    /// Save queue errors
    Queue(SaveQueueError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
}

/// Batch assembly errors
#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    /// A frame arrived with no batch accumulating (trigger/delivery desync)
    NoActiveBatch { mode: CaptureMode },
    /// A batch is already in progress
    BatchInProgress {
        active: CaptureMode,
        requested: CaptureMode,
    },
    /// Frame mode doesn't match the batch mode
    ModeMismatch {
        batch: CaptureMode,
        frame: CaptureMode,
    },
    /// Batch already holds its expected frame count
    BatchFull { expected: usize },
    /// Finishing a batch that holds no frames
    EmptyBatch,
    /// The first frame of this capture was refused, so the rest is too
    CaptureRefused { mode: CaptureMode },
}

/// Panorama session errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanoramaError {
    /// Session is not recording
    NotRecording,
    /// Event not valid in the current phase
    IllegalTransition {
        from: &'static str,
        event: &'static str,
    },
}

/// Save queue errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveQueueError {
    /// Queue has been shut down
    Closed,
    /// Sink failed to persist or process a job
    Sink(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Batch(e) => write!(f, "Batch error: {}", e),
            PipelineError::Panorama(e) => write!(f, "Panorama error: {}", e),
            PipelineError::Queue(e) => write!(f, "Save queue error: {}", e),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PipelineError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::NoActiveBatch { mode } => {
                write!(f, "Frame for {:?} arrived with no active batch", mode)
            }
            BatchError::BatchInProgress { active, requested } => write!(
                f,
                "Cannot start {:?} batch while {:?} batch is in progress",
                requested, active
            ),
            BatchError::ModeMismatch { batch, frame } => {
                write!(f, "Frame mode {:?} doesn't match batch mode {:?}", frame, batch)
            }
            BatchError::BatchFull { expected } => {
                write!(f, "Batch already holds all {} frames", expected)
            }
            BatchError::EmptyBatch => write!(f, "Batch holds no frames"),
            BatchError::CaptureRefused { mode } => {
                write!(f, "Frame belongs to a {:?} capture that was already refused", mode)
            }
        }
    }
}

impl fmt::Display for PanoramaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanoramaError::NotRecording => write!(f, "Panorama is not recording"),
            PanoramaError::IllegalTransition { from, event } => {
                write!(f, "Illegal panorama transition: {} in {}", event, from)
            }
        }
    }
}

impl fmt::Display for SaveQueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveQueueError::Closed => write!(f, "Save queue is closed"),
            SaveQueueError::Sink(msg) => write!(f, "Sink failed: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for BatchError {}
impl std::error::Error for PanoramaError {}
impl std::error::Error for SaveQueueError {}

impl From<BatchError> for PipelineError {
    fn from(err: BatchError) -> Self {
        PipelineError::Batch(err)
    }
}

impl From<PanoramaError> for PipelineError {
    fn from(err: PanoramaError) -> Self {
        PipelineError::Panorama(err)
    }
}

impl From<SaveQueueError> for PipelineError {
    fn from(err: SaveQueueError) -> Self {
        PipelineError::Queue(err)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<std::io::Error> for SaveQueueError {
    fn from(err: std::io::Error) -> Self {
        SaveQueueError::Sink(err.to_string())
    }
}
