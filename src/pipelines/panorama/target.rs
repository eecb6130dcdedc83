// SPDX-License-Identifier: GPL-3.0-only

//! Gyroscope target acquisition
//!
//! Orientation arrives as a device-to-world rotation matrix. The camera looks
//! down the device's negative Z axis, so a world-space target `t` is achieved
//! when `Rᵀ·t` points along `(0, 0, -1)` within the target tolerance while the
//! device is held upright.

use crate::config::PanoramaSettings;
use tracing::{debug, warn};

/// A 3D direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Straight ahead of a device held in its reference pose
    pub const FORWARD: Vec3 = Vec3::new(0.0, 0.0, -1.0);

    /// World up
    pub const UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; zero stays zero
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len <= f32::EPSILON {
            return *self;
        }
        Vec3::new(self.x / len, self.y / len, self.z / len)
    }

    /// Panorama target for a horizontal sweep angle in radians
    pub fn from_sweep_angle(angle: f32) -> Vec3 {
        Vec3::new(angle.sin(), 0.0, -angle.cos())
    }
}

/// Row-major 3×3 rotation mapping device coordinates to world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(pub [f32; 9]);

impl RotationMatrix {
    pub const IDENTITY: RotationMatrix =
        RotationMatrix([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    /// Rotation about the world Y axis (the sweep axis) by `angle` radians
    ///
    /// A positive angle turns the camera towards +X, matching
    /// [`Vec3::from_sweep_angle`].
    pub fn from_yaw(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        RotationMatrix([c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c])
    }

    /// Rotation about the device Z axis (roll) by `angle` radians
    pub fn from_roll(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        RotationMatrix([c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0])
    }

    /// Matrix product `self · other`
    pub fn mul(&self, other: &RotationMatrix) -> RotationMatrix {
        let a = &self.0;
        let b = &other.0;
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = (0..3).map(|k| a[row * 3 + k] * b[k * 3 + col]).sum();
            }
        }
        RotationMatrix(out)
    }

    /// Device-to-world: `R·v`
    pub fn apply(&self, v: &Vec3) -> Vec3 {
        let m = &self.0;
        Vec3::new(
            m[0] * v.x + m[1] * v.y + m[2] * v.z,
            m[3] * v.x + m[4] * v.y + m[5] * v.z,
            m[6] * v.x + m[7] * v.y + m[8] * v.z,
        )
    }

    /// World-to-device: `Rᵀ·v`
    pub fn apply_inverse(&self, v: &Vec3) -> Vec3 {
        let m = &self.0;
        Vec3::new(
            m[0] * v.x + m[3] * v.y + m[6] * v.z,
            m[1] * v.x + m[4] * v.y + m[7] * v.z,
            m[2] * v.x + m[5] * v.y + m[8] * v.z,
        )
    }
}

impl Default for RotationMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Event raised by [`TargetTracker::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetEvent {
    /// Target at this index (in arming order) was reached
    Achieved(usize),
    /// Device strayed beyond the too-far angle from every target
    TooFar,
}

/// Tracks a set of candidate targets against the device orientation
#[derive(Debug, Clone)]
pub struct TargetTracker {
    targets: Vec<Vec3>,
    target_angle: f32,
    upright_tolerance: f32,
    too_far_angle: f32,
    callback_enabled: bool,
    achieved: bool,
    too_far: bool,
}

impl TargetTracker {
    pub fn new(settings: &PanoramaSettings) -> Self {
        Self {
            targets: Vec::new(),
            target_angle: settings.target_angle_deg.to_radians(),
            upright_tolerance: settings.upright_tolerance_deg.to_radians(),
            too_far_angle: settings.too_far_angle_deg.to_radians(),
            callback_enabled: false,
            achieved: false,
            too_far: false,
        }
    }

    /// Replace all targets with `target` and re-enable events
    pub fn set_target(&mut self, target: Vec3) {
        debug!(x = target.x, y = target.y, z = target.z, "Target set");
        self.targets.clear();
        self.targets.push(target.normalized());
        self.callback_enabled = true;
        self.achieved = false;
        self.too_far = false;
    }

    /// Arm an additional candidate target
    pub fn add_target(&mut self, target: Vec3) {
        debug!(x = target.x, y = target.y, z = target.z, "Target added");
        self.targets.push(target.normalized());
    }

    /// Drop all targets
    pub fn clear(&mut self) {
        self.targets.clear();
        self.callback_enabled = false;
        self.achieved = false;
        self.too_far = false;
    }

    /// Stop raising events while still tracking whether the target is held
    pub fn disable_callback(&mut self) {
        self.callback_enabled = false;
    }

    pub fn has_target(&self) -> bool {
        !self.targets.is_empty()
    }

    /// Whether the last orientation had a target achieved
    pub fn is_target_achieved(&self) -> bool {
        self.achieved
    }

    pub fn targets(&self) -> &[Vec3] {
        &self.targets
    }

    /// Angle in radians between the camera axis and `target`
    pub fn angle_to(rotation: &RotationMatrix, target: &Vec3) -> f32 {
        let in_device = rotation.apply_inverse(target).normalized();
        (-in_device.z).clamp(-1.0, 1.0).acos()
    }

    /// Roll of the device away from upright, in radians
    pub fn tilt(rotation: &RotationMatrix) -> f32 {
        let up = rotation.apply_inverse(&Vec3::UP);
        up.x.atan2(up.y).abs()
    }

    /// Feed a new orientation sample
    pub fn update(&mut self, rotation: &RotationMatrix) -> Option<TargetEvent> {
        let nearest = self
            .targets
            .iter()
            .enumerate()
            .map(|(index, target)| (index, Self::angle_to(rotation, target)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let Some((index, angle)) = nearest else {
            self.achieved = false;
            return None;
        };

        let upright = Self::tilt(rotation) <= self.upright_tolerance;
        self.achieved = upright && angle <= self.target_angle;

        if !self.callback_enabled {
            return None;
        }

        if self.achieved {
            return Some(TargetEvent::Achieved(index));
        }

        let too_far = angle > self.too_far_angle;
        let newly_too_far = too_far && !self.too_far;
        self.too_far = too_far;
        if newly_too_far {
            warn!(
                angle_deg = angle.to_degrees(),
                limit_deg = self.too_far_angle.to_degrees(),
                "Device moved too far from panorama target"
            );
            return Some(TargetEvent::TooFar);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> TargetTracker {
        TargetTracker::new(&PanoramaSettings::default())
    }

    #[test]
    fn test_yaw_points_camera_at_sweep_target() {
        let angle = 0.3;
        let rotation = RotationMatrix::from_yaw(angle);
        let target = Vec3::from_sweep_angle(angle);
        assert!(TargetTracker::angle_to(&rotation, &target) < 1e-3);
        assert!(TargetTracker::angle_to(&RotationMatrix::IDENTITY, &target) > 0.29);
    }

    #[test]
    fn test_forward_target_achieved_at_identity() {
        let mut tracker = tracker();
        tracker.set_target(Vec3::FORWARD);
        assert_eq!(
            tracker.update(&RotationMatrix::IDENTITY),
            Some(TargetEvent::Achieved(0))
        );
        assert!(tracker.is_target_achieved());
    }

    #[test]
    fn test_tilted_device_does_not_achieve() {
        let mut tracker = tracker();
        tracker.set_target(Vec3::FORWARD);
        let tilted = RotationMatrix::from_roll(5f32.to_radians());
        assert_eq!(tracker.update(&tilted), None);
        assert!(!tracker.is_target_achieved());

        let slight = RotationMatrix::from_roll(2f32.to_radians());
        assert_eq!(tracker.update(&slight), Some(TargetEvent::Achieved(0)));
    }

    #[test]
    fn test_disabled_callback_still_tracks() {
        let mut tracker = tracker();
        tracker.set_target(Vec3::FORWARD);
        tracker.disable_callback();
        assert_eq!(tracker.update(&RotationMatrix::IDENTITY), None);
        assert!(tracker.is_target_achieved());
        tracker.update(&RotationMatrix::from_yaw(0.2));
        assert!(!tracker.is_target_achieved());
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let mut tracker = tracker();
        tracker.set_target(Vec3::from_sweep_angle(0.2));
        tracker.add_target(Vec3::from_sweep_angle(-0.2));
        assert_eq!(
            tracker.update(&RotationMatrix::from_yaw(-0.2)),
            Some(TargetEvent::Achieved(1))
        );
    }

    #[test]
    fn test_too_far_reported_once_per_excursion() {
        let mut tracker = tracker();
        tracker.set_target(Vec3::FORWARD);
        let far = RotationMatrix::from_yaw(60f32.to_radians());
        assert_eq!(tracker.update(&far), Some(TargetEvent::TooFar));
        assert_eq!(tracker.update(&far), None);
        tracker.update(&RotationMatrix::from_yaw(10f32.to_radians()));
        assert_eq!(tracker.update(&far), Some(TargetEvent::TooFar));
    }
}
