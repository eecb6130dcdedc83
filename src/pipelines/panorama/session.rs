// SPDX-License-Identifier: GPL-3.0-only

//! Panorama capture session
//!
//! ```text
//!            start                  target achieved
//!   Idle ───────────▶ AwaitingTarget ───────────────▶ CaptureInFlight
//!                        ▲     │                            │
//!                        │     │ finish / cancel            │ picture completed
//!                        │     ▼                            │
//!                        │  Finished | Cancelled            │
//!                        └──────────────────────────────────┘
//!                           (next or same target armed,
//!                            or Finished at the shot limit)
//! ```
//!
//! Every event reads, decides and mutates under the state mutex. The capture
//! trigger runs after that mutex is released, so a camera may deliver the
//! frame synchronously from inside `trigger_capture`. A separate trigger
//! mutex is held across the decision and the camera call; `finish` and
//! `cancel` take it too, so a stop that returns has no trigger left behind
//! it.

use super::target::{RotationMatrix, TargetEvent, TargetTracker, Vec3};
use crate::backends::camera::CameraControl;
use crate::config::PanoramaSettings;
use crate::constants::panorama::FALLBACK_VIEW_ANGLE_DEG;
use crate::errors::PanoramaError;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// Waiting for the device to reach the armed target
    AwaitingTarget,
    /// A capture has been triggered and not yet completed
    CaptureInFlight,
    Finished,
    Cancelled,
}

impl SessionPhase {
    pub fn is_recording(&self) -> bool {
        matches!(
            self,
            SessionPhase::AwaitingTarget | SessionPhase::CaptureInFlight
        )
    }

    fn name(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::AwaitingTarget => "awaiting-target",
            SessionPhase::CaptureInFlight => "capture-in-flight",
            SessionPhase::Finished => "finished",
            SessionPhase::Cancelled => "cancelled",
        }
    }
}

/// Whether a delivered frame belongs in the panorama
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameDecision {
    /// Keep the frame, tagged with the orientation it was taken at
    Accept {
        rotation: RotationMatrix,
        /// First frame of the session (starts the batch)
        first: bool,
    },
    /// The device drifted off target before the shot; the frame is dropped
    Reject,
}

/// What happened after a capture completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// The next target is armed
    NextTarget { shots: u32 },
    /// The previous shot was rejected and its target re-armed
    Repeat { shots: u32 },
    /// The shot limit was reached; the batch should be forwarded
    Finished { left_to_right: bool },
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    /// Accepted shots so far
    shots: u32,
    left_to_right: bool,
    last_accepted: bool,
    rotation: RotationMatrix,
    tracker: TargetTracker,
}

/// Gyroscope-driven panorama state machine
pub struct PanoramaSession {
    state: Mutex<SessionState>,
    /// Lock order: trigger, then state
    trigger: Mutex<()>,
    camera: Arc<dyn CameraControl>,
    settings: PanoramaSettings,
}

impl PanoramaSession {
    pub fn new(settings: PanoramaSettings, camera: Arc<dyn CameraControl>) -> Self {
        let settings = settings.sanitized();
        Self {
            state: Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                shots: 0,
                left_to_right: true,
                last_accepted: false,
                rotation: RotationMatrix::IDENTITY,
                tracker: TargetTracker::new(&settings),
            }),
            trigger: Mutex::new(()),
            camera,
            settings,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn trigger_guard(&self) -> MutexGuard<'_, ()> {
        self.trigger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Begin recording and arm the straight-ahead target
    pub fn start(&self) -> Result<(), PanoramaError> {
        let mut state = self.state();
        if state.phase.is_recording() {
            return Err(PanoramaError::IllegalTransition {
                from: state.phase.name(),
                event: "start",
            });
        }
        state.phase = SessionPhase::AwaitingTarget;
        state.shots = 0;
        state.left_to_right = true;
        state.last_accepted = false;
        state.tracker.set_target(Vec3::FORWARD);
        info!("Panorama started");
        Ok(())
    }

    /// Feed a gyroscope orientation sample
    ///
    /// Returns true if this sample triggered a capture.
    pub fn on_orientation(&self, rotation: RotationMatrix) -> bool {
        let _trigger = self.trigger_guard();
        if !self.advance_on_orientation(rotation) {
            return false;
        }
        self.camera.trigger_capture();
        true
    }

    /// Update tracking; true if the armed target was just reached
    fn advance_on_orientation(&self, rotation: RotationMatrix) -> bool {
        let mut state = self.state();
        state.rotation = rotation;
        if !state.phase.is_recording() {
            return false;
        }

        match state.tracker.update(&rotation) {
            Some(TargetEvent::Achieved(index)) if state.phase == SessionPhase::AwaitingTarget => {
                // Keep tracking so a drift before the frame arrives is noticed
                state.tracker.disable_callback();
                if state.shots == 1 {
                    state.left_to_right = index == 0;
                    info!(left_to_right = state.left_to_right, "Panorama direction set");
                }
                state.phase = SessionPhase::CaptureInFlight;
                debug!(shots = state.shots, target = index, "Panorama target achieved");
                true
            }
            Some(TargetEvent::Achieved(_)) => false,
            Some(TargetEvent::TooFar) => {
                // Lenient: over-rotation never aborts the panorama
                warn!(shots = state.shots, "Panorama target too far");
                false
            }
            None => false,
        }
    }

    /// Decide whether a delivered frame is part of the panorama
    ///
    /// Frame-to-target association is by sequence: the frame belongs to the
    /// most recently triggered capture.
    pub fn on_frame(&self) -> Result<FrameDecision, PanoramaError> {
        let mut state = self.state();
        if !state.phase.is_recording() {
            return Err(PanoramaError::NotRecording);
        }

        if state.shots > 0 && state.tracker.has_target() && !state.tracker.is_target_achieved() {
            state.last_accepted = false;
            info!(shots = state.shots, "Panorama shot rejected, target no longer achieved");
            return Ok(FrameDecision::Reject);
        }

        state.last_accepted = true;
        Ok(FrameDecision::Accept {
            rotation: state.rotation,
            first: state.shots == 0,
        })
    }

    /// Advance after a capture has fully completed
    pub fn on_picture_completed(&self) -> Result<SessionStep, PanoramaError> {
        let mut state = self.state();
        if !state.phase.is_recording() {
            return Err(PanoramaError::NotRecording);
        }

        let repeat = !state.last_accepted;
        state.last_accepted = false;
        if !repeat {
            state.shots += 1;
        }
        debug!(shots = state.shots, repeat, "Panorama picture completed");

        if state.shots >= self.settings.max_pics {
            info!(shots = state.shots, "Panorama reached shot limit");
            state.phase = SessionPhase::Finished;
            state.tracker.clear();
            return Ok(SessionStep::Finished {
                left_to_right: state.left_to_right,
            });
        }

        let shots = state.shots;
        let mut angle = self.view_angle().to_radians() * shots as f32;
        if shots > 1 && !state.left_to_right {
            angle = -angle;
        }
        let pics_per_screen = self.settings.pics_per_screen;
        state
            .tracker
            .set_target(Vec3::from_sweep_angle(angle / pics_per_screen));
        if shots == 1 {
            // Either direction may be chosen after the first shot
            state
                .tracker
                .add_target(Vec3::from_sweep_angle(-angle / pics_per_screen));
        }
        state.phase = SessionPhase::AwaitingTarget;

        Ok(if repeat {
            SessionStep::Repeat { shots }
        } else {
            SessionStep::NextTarget { shots }
        })
    }

    /// Stop recording on user request; returns the sweep direction
    pub fn finish(&self) -> Result<bool, PanoramaError> {
        let _trigger = self.trigger_guard();
        let mut state = self.state();
        if !state.phase.is_recording() {
            return Err(PanoramaError::NotRecording);
        }
        state.phase = SessionPhase::Finished;
        state.tracker.clear();
        info!(shots = state.shots, "Panorama finished");
        Ok(state.left_to_right)
    }

    /// Abort recording; returns false if nothing was recording
    pub fn cancel(&self) -> bool {
        let _trigger = self.trigger_guard();
        let mut state = self.state();
        if !state.phase.is_recording() {
            return false;
        }
        state.phase = SessionPhase::Cancelled;
        state.tracker.clear();
        info!(shots = state.shots, "Panorama cancelled");
        true
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    pub fn is_recording(&self) -> bool {
        self.state().phase.is_recording()
    }

    /// Accepted shots so far
    pub fn shots(&self) -> u32 {
        self.state().shots
    }

    pub fn left_to_right(&self) -> bool {
        self.state().left_to_right
    }

    /// Currently armed targets
    pub fn targets(&self) -> Vec<Vec3> {
        self.state().tracker.targets().to_vec()
    }

    fn view_angle(&self) -> f32 {
        let angle = self.camera.current_view_angle(self.settings.view_axis);
        if angle.is_finite() && angle > 0.0 {
            angle
        } else {
            FALLBACK_VIEW_ANGLE_DEG
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::ViewAxis;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeCamera {
        triggers: AtomicU32,
    }

    impl CameraControl for FakeCamera {
        fn trigger_capture(&self) {
            self.triggers.fetch_add(1, Ordering::SeqCst);
        }

        fn current_view_angle(&self, _axis: ViewAxis) -> f32 {
            60.0
        }

        fn camera_is_capturing_burst(&self) -> bool {
            false
        }
    }

    fn session() -> (PanoramaSession, Arc<FakeCamera>) {
        let camera = Arc::new(FakeCamera {
            triggers: AtomicU32::new(0),
        });
        (
            PanoramaSession::new(PanoramaSettings::default(), camera.clone()),
            camera,
        )
    }

    #[test]
    fn test_start_arms_forward_target() {
        let (session, camera) = session();
        session.start().unwrap();
        assert_eq!(session.targets(), vec![Vec3::FORWARD]);
        assert!(session.on_orientation(RotationMatrix::IDENTITY));
        assert_eq!(session.phase(), SessionPhase::CaptureInFlight);
        // Callback disabled: no double trigger
        assert!(!session.on_orientation(RotationMatrix::IDENTITY));
        assert_eq!(camera.triggers.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_shot_arms_both_candidates() {
        let (session, _camera) = session();
        session.start().unwrap();
        session.on_orientation(RotationMatrix::IDENTITY);
        assert!(matches!(session.on_frame(), Ok(FrameDecision::Accept { first: true, .. })));
        assert_eq!(
            session.on_picture_completed(),
            Ok(SessionStep::NextTarget { shots: 1 })
        );
        let targets = session.targets();
        assert_eq!(targets.len(), 2);
        assert!((targets[0].x + targets[1].x).abs() < 1e-6);
        assert!(targets[0].x > 0.0);
    }

    #[test]
    fn test_start_twice_is_illegal() {
        let (session, _camera) = session();
        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(PanoramaError::IllegalTransition { event: "start", .. })
        ));
    }

    #[test]
    fn test_cancel_stops_triggers() {
        let (session, camera) = session();
        session.start().unwrap();
        assert!(session.cancel());
        assert!(!session.on_orientation(RotationMatrix::IDENTITY));
        assert_eq!(camera.triggers.load(Ordering::SeqCst), 0);
        assert_eq!(session.on_frame(), Err(PanoramaError::NotRecording));
        assert!(!session.cancel());
    }

    #[test]
    fn test_zero_pics_per_screen_still_gives_reachable_targets() {
        let settings = PanoramaSettings {
            pics_per_screen: 0.0,
            max_pics: 0,
            ..Default::default()
        };
        let session = PanoramaSession::new(settings, Arc::new(FakeCamera {
            triggers: AtomicU32::new(0),
        }));
        session.start().unwrap();
        session.on_orientation(RotationMatrix::IDENTITY);
        session.on_frame().unwrap();
        assert_eq!(
            session.on_picture_completed(),
            Ok(SessionStep::NextTarget { shots: 1 })
        );
        assert!(session.targets().iter().all(|t| t.x.is_finite() && t.z.is_finite()));
    }
}
