// SPDX-License-Identifier: GPL-3.0-only

//! JPEG/RAW frame counting and burst filename suffixes
//!
//! RAW frames come through their own callback path, so they are counted
//! separately from JPEGs. Both counters reset on every capture start.

use super::mode::CaptureMode;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Counts frames received since the last capture-started event
#[derive(Debug, Default)]
pub struct RawBurstTracker {
    jpeg_count: AtomicU32,
    raw_count: AtomicU32,
}

impl RawBurstTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether frames of this capture get sequential suffixes
    ///
    /// Some camera pipelines deliver a burst as separate single-frame
    /// events, so the camera's own burst flag counts too.
    pub fn force_suffix(mode: CaptureMode, camera_is_capturing_burst: bool) -> bool {
        matches!(
            mode,
            CaptureMode::FocusBracketing | CaptureMode::FastBurst
        ) || camera_is_capturing_burst
    }

    /// Reset both counters for a new capture
    pub fn capture_started(&self) {
        self.jpeg_count.store(0, Ordering::Release);
        self.raw_count.store(0, Ordering::Release);
    }

    /// Count a JPEG and return its filename suffix, if any
    pub fn jpeg_received(&self, force_suffix: bool) -> Option<u32> {
        let count = self.jpeg_count.fetch_add(1, Ordering::AcqRel) + 1;
        let suffix = force_suffix.then(|| count - 1);
        debug!(count, ?suffix, "JPEG received");
        suffix
    }

    /// Count a single RAW and return its filename suffix, if any
    pub fn raw_received(&self, force_suffix: bool) -> Option<u32> {
        let count = self.raw_count.fetch_add(1, Ordering::AcqRel) + 1;
        let suffix = force_suffix.then(|| count - 1);
        debug!(count, ?suffix, "RAW received");
        suffix
    }

    /// Count a RAW burst array; every image is suffixed from 0
    pub fn raw_burst_received(&self, len: usize) -> Vec<u32> {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        self.raw_count.fetch_add(len, Ordering::AcqRel);
        debug!(len, "RAW burst received");
        (0..len).collect()
    }

    /// JPEGs received since the last capture start
    pub fn jpeg_count(&self) -> u32 {
        self.jpeg_count.load(Ordering::Acquire)
    }

    /// RAWs received since the last capture start
    pub fn raw_count(&self) -> u32 {
        self.raw_count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_suffix_policy() {
        assert!(RawBurstTracker::force_suffix(CaptureMode::FocusBracketing, false));
        assert!(RawBurstTracker::force_suffix(CaptureMode::FastBurst, false));
        assert!(RawBurstTracker::force_suffix(CaptureMode::Standard, true));
        assert!(!RawBurstTracker::force_suffix(CaptureMode::Standard, false));
        assert!(!RawBurstTracker::force_suffix(CaptureMode::Hdr, false));
    }

    #[test]
    fn test_suffixes_start_at_zero_and_reset() {
        let tracker = RawBurstTracker::new();
        tracker.capture_started();
        assert_eq!(tracker.jpeg_received(true), Some(0));
        assert_eq!(tracker.jpeg_received(true), Some(1));
        assert_eq!(tracker.raw_received(true), Some(0));
        assert_eq!(tracker.jpeg_received(false), None);
        assert_eq!((tracker.jpeg_count(), tracker.raw_count()), (3, 1));

        tracker.capture_started();
        assert_eq!(tracker.jpeg_count(), 0);
        assert_eq!(tracker.jpeg_received(true), Some(0));
    }

    #[test]
    fn test_raw_burst_counted_separately() {
        let tracker = RawBurstTracker::new();
        tracker.capture_started();
        assert_eq!(tracker.raw_burst_received(3), vec![0, 1, 2]);
        assert_eq!(tracker.raw_count(), 3);
        assert_eq!(tracker.jpeg_count(), 0);
    }
}
