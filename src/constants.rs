// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Save queue sizing
pub mod queue {
    /// Hard ceiling on in-flight cost units (large-heap devices)
    pub const DEFAULT_CAPACITY: u32 = 30;

    /// Number of background save workers
    pub const DEFAULT_WORKERS: usize = 2;

    /// Cost of one JPEG payload
    pub const JPEG_COST: u32 = 1;

    /// Cost of one RAW payload
    pub const RAW_COST: u32 = 1;
}

/// Admission policy multipliers
///
/// These are the empirically tuned limits on how many captures of a given
/// kind may be resident in the save queue at once. The order in which they
/// are evaluated lives in [`crate::pipelines::photo::admission`].
pub mod admission {
    /// Noise reduction: at most two batches resident
    pub const NOISE_REDUCTION_MULTIPLIER: u32 = 2;

    /// Multi-frame bursts and brackets
    pub const BURST_MULTIPLIER: u32 = 3;

    /// Captures that include RAW
    pub const RAW_MULTIPLIER: u32 = 3;

    /// Single-frame captures
    pub const SINGLE_MULTIPLIER: u32 = 5;

    /// Load at or below which single-frame captures are still admitted on
    /// devices that support noise reduction (one NR batch worth of frames)
    pub const NR_DRAIN_ALLOWANCE: u32 = 8;
}

/// Frame counts used by multi-frame modes
pub mod frames {
    /// Frames averaged for standard noise reduction
    pub const NR_DARK: u32 = 8;

    /// Frames averaged for low-light noise reduction
    pub const NR_DARK_LOW_LIGHT: u32 = 15;

    /// HDR always captures exactly this many frames
    pub const HDR_IMAGES: u32 = 3;

    /// HDR always uses this exposure separation
    pub const HDR_STOPS: f64 = 2.0;

    /// Default expo/focus bracket size
    pub const DEFAULT_BRACKET_IMAGES: u32 = 3;

    /// Default expo bracket separation
    pub const DEFAULT_BRACKET_STOPS: f64 = 2.0;

    /// Default fast burst size
    pub const DEFAULT_FAST_BURST_IMAGES: u32 = 5;
}

/// Panorama acquisition geometry
pub mod panorama {
    /// Controls overlap between successive shots
    pub const PICS_PER_SCREEN: f32 = 3.33333;

    /// Session finishes once this many shots have been accepted
    pub const MAX_PICS: u32 = 10;

    /// Target counts as achieved within this many degrees
    pub const TARGET_ANGLE_DEG: f32 = 1.0;

    /// Device must be within this many degrees of upright
    pub const UPRIGHT_TOLERANCE_DEG: f32 = 3.0;

    /// Straying further than this from the target fires a "too far" event
    pub const TOO_FAR_ANGLE_DEG: f32 = 45.0;

    /// Fallback field of view when the camera reports none
    pub const FALLBACK_VIEW_ANGLE_DEG: f32 = 50.0;
}

/// Timing constants for the sensor loop
pub mod timing {
    /// Default interval between orientation samples fed to a panorama session
    pub const SENSOR_SAMPLE_INTERVAL_MS: u64 = 5;

    /// Timeout when waiting for the save queue to drain
    pub const DRAIN_TIMEOUT_SECS: u64 = 10;
}
