// SPDX-License-Identifier: GPL-3.0-only

//! Queue cost of a capture
//!
//! Cost units approximate the memory a capture's decoded outputs will pin
//! while they wait in the save queue.

use super::mode::{CaptureMode, CapturePlan};
use crate::config::QueueSettings;

/// Queue-capacity currency
pub type CaptureCost = u32;

/// Maps a capture to its queue cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureCostModel {
    jpeg_cost: CaptureCost,
    raw_cost: CaptureCost,
}

impl CaptureCostModel {
    pub fn new(jpeg_cost: CaptureCost, raw_cost: CaptureCost) -> Self {
        Self {
            jpeg_cost,
            raw_cost,
        }
    }

    pub fn from_settings(settings: &QueueSettings) -> Self {
        Self::new(settings.jpeg_cost, settings.raw_cost)
    }

    /// Cost of a capture producing `jpeg_count` JPEGs and `raw_count` RAWs
    ///
    /// RAW is only charged for modes that can carry it. The result is never
    /// below one.
    pub fn cost(&self, mode: CaptureMode, raw_count: u32, jpeg_count: u32) -> CaptureCost {
        let jpeg = jpeg_count.saturating_mul(self.jpeg_cost);
        let raw = if mode.permits_raw() {
            raw_count.saturating_mul(self.raw_cost)
        } else {
            0
        };
        jpeg.saturating_add(raw).max(1)
    }

    /// Cost of a resolved capture plan
    pub fn plan_cost(&self, plan: &CapturePlan) -> CaptureCost {
        self.cost(plan.mode, plan.raw_count, plan.jpeg_count)
    }
}

impl Default for CaptureCostModel {
    fn default() -> Self {
        Self::from_settings(&QueueSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_never_below_one() {
        let model = CaptureCostModel::default();
        for mode in CaptureMode::ALL {
            for raw in 0..4 {
                for jpeg in 0..4 {
                    let cost = model.cost(mode, raw, jpeg);
                    assert!(cost >= 1);
                    assert_eq!(cost, model.cost(mode, raw, jpeg));
                }
            }
        }
    }

    #[test]
    fn test_raw_ignored_where_not_permitted() {
        let model = CaptureCostModel::new(1, 6);
        assert_eq!(model.cost(CaptureMode::Standard, 1, 1), 7);
        assert_eq!(model.cost(CaptureMode::Panorama, 1, 1), 1);
        assert_eq!(model.cost(CaptureMode::XBokeh, 2, 1), 1);
    }

    #[test]
    fn test_burst_cost_is_frame_count() {
        let model = CaptureCostModel::default();
        assert_eq!(model.cost(CaptureMode::FastBurst, 0, 5), 5);
        assert_eq!(model.cost(CaptureMode::ExpoBracketing, 3, 3), 6);
    }
}
