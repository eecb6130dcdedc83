// SPDX-License-Identifier: GPL-3.0-only

//! Capture admission (backpressure) policy
//!
//! Decides whether a new capture may be triggered given the current save
//! queue load. Rules are evaluated in order and the first refusal wins:
//!
//! | # | Condition                     | Refuse when                      |
//! |---|-------------------------------|----------------------------------|
//! | 1 | any                           | queue would exceed hard capacity |
//! | 2 | FastBurst / Panorama          | load > 0                         |
//! | 3 | NoiseReduction                | load >= 2 * cost                 |
//! | 4 | more than one JPEG            | load >= 3 * cost                 |
//! | 5 | any RAW                       | load >= 3 * cost                 |
//! | 6 | single frame                  | load >= 5 * cost, unless NR is supported and load <= 8 |
//!
//! Refusal is not an error. Callers re-poll before the next attempt.

use super::cost::{CaptureCost, CaptureCostModel};
use super::mode::{CaptureMode, CapturePlan};
use super::save_queue::QueueLoad;
use crate::constants::admission;
use std::fmt;
use tracing::debug;

/// Why a capture was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    /// Admitting would exceed the queue's hard capacity
    QueueFull,
    /// An exclusive burst mode needs an empty queue
    ExclusiveModeBusy,
    /// Noise reduction batches already resident
    NoiseReductionBacklog,
    /// Multi-frame capture backlog
    BurstBacklog,
    /// RAW capture backlog
    RawBacklog,
    /// Single-frame capture backlog
    Backlog,
}

impl fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RefusalReason::QueueFull => "save queue full",
            RefusalReason::ExclusiveModeBusy => "exclusive mode waits for an empty queue",
            RefusalReason::NoiseReductionBacklog => "too many noise reduction batches pending",
            RefusalReason::BurstBacklog => "too many burst images pending",
            RefusalReason::RawBacklog => "too many RAW images pending",
            RefusalReason::Backlog => "too many images pending",
        };
        f.write_str(text)
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    Refuse(RefusalReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit)
    }
}

/// Admission policy over a queue load
#[derive(Debug, Clone, Copy)]
pub struct AdmissionController {
    cost_model: CaptureCostModel,
    supports_noise_reduction: bool,
}

impl AdmissionController {
    pub fn new(cost_model: CaptureCostModel, supports_noise_reduction: bool) -> Self {
        Self {
            cost_model,
            supports_noise_reduction,
        }
    }

    pub fn cost_model(&self) -> &CaptureCostModel {
        &self.cost_model
    }

    /// Evaluate the policy for one capture
    pub fn evaluate(
        &self,
        mode: CaptureMode,
        raw_count: u32,
        jpeg_count: u32,
        queue: &dyn QueueLoad,
    ) -> Admission {
        let cost = self.cost_model.cost(mode, raw_count, jpeg_count);
        let result = if queue.would_block(cost) {
            Admission::Refuse(RefusalReason::QueueFull)
        } else {
            self.evaluate_load(mode, raw_count, jpeg_count, cost, queue.current_load())
        };

        if let Admission::Refuse(reason) = result {
            debug!(
                ?mode,
                cost,
                load = queue.current_load(),
                %reason,
                "Capture refused"
            );
        }
        result
    }

    fn evaluate_load(
        &self,
        mode: CaptureMode,
        raw_count: u32,
        jpeg_count: u32,
        cost: CaptureCost,
        load: CaptureCost,
    ) -> Admission {
        let threshold = |multiplier: u32| cost.saturating_mul(multiplier);

        if mode.is_exclusive() {
            if load > 0 {
                return Admission::Refuse(RefusalReason::ExclusiveModeBusy);
            }
        } else if mode == CaptureMode::NoiseReduction {
            if load >= threshold(admission::NOISE_REDUCTION_MULTIPLIER) {
                return Admission::Refuse(RefusalReason::NoiseReductionBacklog);
            }
        } else if jpeg_count > 1 {
            if load >= threshold(admission::BURST_MULTIPLIER) {
                return Admission::Refuse(RefusalReason::BurstBacklog);
            }
        } else if raw_count > 0 {
            if load >= threshold(admission::RAW_MULTIPLIER) {
                return Admission::Refuse(RefusalReason::RawBacklog);
            }
        } else if load >= threshold(admission::SINGLE_MULTIPLIER)
            && !(self.supports_noise_reduction && load <= admission::NR_DRAIN_ALLOWANCE)
        {
            // Leaving NR mode must not strand the user behind its backlog
            return Admission::Refuse(RefusalReason::Backlog);
        }
        Admission::Admit
    }

    /// Evaluate the policy for a resolved capture plan
    pub fn admit_plan(&self, plan: &CapturePlan, queue: &dyn QueueLoad) -> Admission {
        self.evaluate(plan.mode, plan.raw_count, plan.jpeg_count, queue)
    }

    /// Whether a capture of `plan` may start right now
    pub fn can_admit_new_capture(&self, plan: &CapturePlan, queue: &dyn QueueLoad) -> bool {
        self.admit_plan(plan, queue).is_admitted()
    }
}
