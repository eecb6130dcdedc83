// SPDX-License-Identifier: GPL-3.0-only

//! Boundary to the camera and motion sensors
//!
//! ```text
//! ┌──────────────────┐  payloads   ┌──────────────────────┐
//! │  Camera pipeline │ ──────────▶ │   CapturePipeline    │
//! │ (CameraControl)  │ ◀────────── │  (admission, batch)  │
//! └──────────────────┘  triggers   └──────────┬───────────┘
//!                                             │
//! ┌──────────────────┐  rotation   ┌──────────┴───────────┐
//! │   Gyro sensor    │ ──────────▶ │   PanoramaSession    │
//! │  (sensor_loop)   │             │                      │
//! └──────────────────┘             └──────────────────────┘
//! ```
//!
//! - [`camera`]: camera control contract and payload types
//! - [`sensor_loop`]: background thread delivering sensor samples

pub mod camera;
pub mod sensor_loop;
