// SPDX-License-Identifier: GPL-3.0-only

//! Camera-side contract consumed by the capture control layer
//!
//! The actual camera pipeline lives outside this crate. The control layer
//! only needs to ask it to fire a capture, to query its field of view for
//! panorama stepping, and to know whether it is mid-burst for file naming.

pub mod types;

pub use types::{FrameData, JpegImage, RawImage, ViewAxis};

/// Operations the capture-session controller exposes to this crate
///
/// Implementations are called from sensor and camera callback threads, so
/// they must be cheap. `trigger_capture` is never called with session state
/// locked and may deliver the resulting frame synchronously.
pub trait CameraControl: Send + Sync {
    /// Request a new capture (as if the shutter were pressed)
    fn trigger_capture(&self);

    /// Current field of view in degrees along the given axis
    fn current_view_angle(&self, axis: ViewAxis) -> f32;

    /// Whether the camera pipeline is currently delivering a burst
    fn camera_is_capturing_burst(&self) -> bool;
}
