// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the panorama session state machine

use capture_control::backends::camera::{CameraControl, ViewAxis};
use capture_control::config::PanoramaSettings;
use capture_control::pipelines::panorama::{
    FrameDecision, PanoramaSession, RotationMatrix, SessionPhase, SessionStep, Vec3,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

const VIEW_ANGLE_DEG: f32 = 50.0;

struct FakeCamera {
    triggers: AtomicU32,
}

impl CameraControl for FakeCamera {
    fn trigger_capture(&self) {
        self.triggers.fetch_add(1, Ordering::SeqCst);
    }

    fn current_view_angle(&self, _axis: ViewAxis) -> f32 {
        VIEW_ANGLE_DEG
    }

    fn camera_is_capturing_burst(&self) -> bool {
        false
    }
}

fn session() -> (PanoramaSession, Arc<FakeCamera>) {
    let camera = Arc::new(FakeCamera {
        triggers: AtomicU32::new(0),
    });
    let session = PanoramaSession::new(PanoramaSettings::default(), camera.clone());
    (session, camera)
}

/// Yaw at which shot `n` is taken (signed by direction)
fn yaw_for(shot: u32, left_to_right: bool) -> f32 {
    let yaw = VIEW_ANGLE_DEG.to_radians() * shot as f32 / 3.33333;
    if left_to_right { yaw } else { -yaw }
}

/// Aim, shoot and complete one accepted shot
fn take_shot(session: &PanoramaSession, yaw: f32) -> SessionStep {
    assert!(session.on_orientation(RotationMatrix::from_yaw(yaw)));
    assert!(matches!(
        session.on_frame(),
        Ok(FrameDecision::Accept { .. })
    ));
    session.on_picture_completed().unwrap()
}

#[test]
fn test_second_shot_fixes_direction_left_to_right() {
    let (session, _camera) = session();
    session.start().unwrap();
    take_shot(&session, 0.0);

    // The "left" candidate is the first one armed
    assert_eq!(
        take_shot(&session, yaw_for(1, true)),
        SessionStep::NextTarget { shots: 2 }
    );
    assert!(session.left_to_right());

    for shot in 2..5 {
        take_shot(&session, yaw_for(shot, true));
        assert!(session.left_to_right(), "changed at shot {}", shot);
    }
}

#[test]
fn test_second_shot_fixes_direction_right_to_left() {
    let (session, _camera) = session();
    session.start().unwrap();
    take_shot(&session, 0.0);
    take_shot(&session, yaw_for(1, false));
    assert!(!session.left_to_right());

    // Next target continues in the same direction
    let targets = session.targets();
    assert_eq!(targets.len(), 1);
    assert!(targets[0].x < 0.0);
    take_shot(&session, yaw_for(2, false));
    assert!(!session.left_to_right());
}

#[test]
fn test_drifted_shot_rearms_same_target() {
    let (session, camera) = session();
    session.start().unwrap();
    take_shot(&session, 0.0);
    take_shot(&session, yaw_for(1, true));
    let armed = session.targets();

    // Reach the target, then drift away before the frame arrives
    assert!(session.on_orientation(RotationMatrix::from_yaw(yaw_for(2, true))));
    session.on_orientation(RotationMatrix::from_yaw(yaw_for(2, true) + 0.1));
    assert_eq!(session.on_frame(), Ok(FrameDecision::Reject));
    assert_eq!(
        session.on_picture_completed(),
        Ok(SessionStep::Repeat { shots: 2 })
    );
    assert_eq!(session.shots(), 2);
    assert_eq!(session.targets(), armed);
    assert_eq!(session.phase(), SessionPhase::AwaitingTarget);

    // Re-armed target can be taken again
    assert_eq!(
        take_shot(&session, yaw_for(2, true)),
        SessionStep::NextTarget { shots: 3 }
    );
    assert_eq!(camera.triggers.load(Ordering::SeqCst), 4);
}

#[test]
fn test_first_shot_is_never_rejected() {
    let (session, _camera) = session();
    session.start().unwrap();
    session.on_orientation(RotationMatrix::IDENTITY);
    session.on_orientation(RotationMatrix::from_yaw(0.5));
    assert!(matches!(
        session.on_frame(),
        Ok(FrameDecision::Accept { first: true, .. })
    ));
}

#[test]
fn test_session_finishes_at_shot_limit() {
    let (session, camera) = session();
    session.start().unwrap();
    let mut last = take_shot(&session, 0.0);
    for shot in 1..10 {
        last = take_shot(&session, yaw_for(shot, true));
    }
    assert_eq!(last, SessionStep::Finished { left_to_right: true });
    assert_eq!(session.phase(), SessionPhase::Finished);
    assert_eq!(session.shots(), 10);

    // No further triggers once finished
    assert!(!session.on_orientation(RotationMatrix::IDENTITY));
    assert_eq!(camera.triggers.load(Ordering::SeqCst), 10);
    assert!(session.on_picture_completed().is_err());
}

#[test]
fn test_too_far_does_not_cancel() {
    let (session, _camera) = session();
    session.start().unwrap();
    assert!(!session.on_orientation(RotationMatrix::from_yaw(80f32.to_radians())));
    assert!(session.is_recording());
    assert!(session.on_orientation(RotationMatrix::IDENTITY));
}

#[test]
fn test_upright_required_for_acquisition() {
    let (session, _camera) = session();
    session.start().unwrap();
    let rolled = RotationMatrix::from_roll(10f32.to_radians());
    assert!(!session.on_orientation(rolled));
    assert_eq!(session.targets(), vec![Vec3::FORWARD]);
}

#[test]
fn test_cancel_from_another_thread_stops_triggers() {
    let (session, camera) = session();
    let session = Arc::new(session);
    session.start().unwrap();

    let canceller = Arc::clone(&session);
    std::thread::spawn(move || assert!(canceller.cancel()))
        .join()
        .unwrap();

    assert_eq!(session.phase(), SessionPhase::Cancelled);
    assert!(!session.on_orientation(RotationMatrix::IDENTITY));
    assert_eq!(camera.triggers.load(Ordering::SeqCst), 0);
}

/// Camera that delivers and completes the shot from inside the trigger
struct InlineCamera {
    session: std::sync::Mutex<Option<Arc<PanoramaSession>>>,
    decisions: std::sync::Mutex<Vec<FrameDecision>>,
}

impl CameraControl for InlineCamera {
    fn trigger_capture(&self) {
        let session = self.session.lock().unwrap().clone();
        if let Some(session) = session {
            let decision = session.on_frame().unwrap();
            self.decisions.lock().unwrap().push(decision);
            session.on_picture_completed().unwrap();
        }
    }

    fn current_view_angle(&self, _axis: ViewAxis) -> f32 {
        VIEW_ANGLE_DEG
    }

    fn camera_is_capturing_burst(&self) -> bool {
        false
    }
}

#[test]
fn test_camera_may_deliver_inside_trigger() {
    let camera = Arc::new(InlineCamera {
        session: std::sync::Mutex::new(None),
        decisions: std::sync::Mutex::new(Vec::new()),
    });
    let session = Arc::new(PanoramaSession::new(
        PanoramaSettings::default(),
        camera.clone(),
    ));
    *camera.session.lock().unwrap() = Some(Arc::clone(&session));
    session.start().unwrap();

    assert!(session.on_orientation(RotationMatrix::IDENTITY));
    assert!(session.on_orientation(RotationMatrix::from_yaw(yaw_for(1, true))));
    assert_eq!(session.shots(), 2);
    assert_eq!(session.phase(), SessionPhase::AwaitingTarget);
    assert_eq!(camera.decisions.lock().unwrap().len(), 2);

    // Break the reference cycle
    camera.session.lock().unwrap().take();
}
