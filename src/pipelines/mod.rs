// SPDX-License-Identifier: GPL-3.0-only

//! Capture control pipelines
//!
//! ```text
//! trigger ──▶ AdmissionController ──(admit)──▶ camera
//!                   ▲                            │ frames
//!                   │ load                       ▼
//!               SaveQueue ◀──── jobs ──── CapturePipeline ──▶ BatchAssembler
//!                                                │
//!                                                └──▶ PanoramaSession ──▶ trigger
//! ```
//!
//! # Modules
//!
//! - [`photo`]: admission, batching and the background save queue
//! - [`panorama`]: gyro target tracking and the panorama session

pub mod panorama;
pub mod photo;
