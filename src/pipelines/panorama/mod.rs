// SPDX-License-Identifier: GPL-3.0-only

//! Gyroscope-driven panorama capture
//!
//! - [`target`]: orientation math and target acquisition
//! - [`session`]: the point-to-point capture state machine

pub mod session;
pub mod target;

pub use session::{FrameDecision, PanoramaSession, SessionPhase, SessionStep};
pub use target::{RotationMatrix, TargetEvent, TargetTracker, Vec3};
