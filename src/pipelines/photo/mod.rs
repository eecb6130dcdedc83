// SPDX-License-Identifier: GPL-3.0-only

//! Photo capture routing
//!
//! [`CapturePipeline`] sits between the camera callbacks and the rest of the
//! control layer:
//!
//! ```text
//! trigger ──▶ admission ──▶ camera
//!                             │
//!     ┌───────────────────────┼──────────────────────────┐
//!     ▼                       ▼                          ▼
//! single JPEG/RAW      NR / panorama frames      HDR / bracket burst
//!     │                       │                          │
//!     │                 BatchAssembler ◀─────────────────┘
//!     ▼                       │ (finish)
//! SaveQueue ◀─────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`mode`]: shooting modes and capture plan resolution
//! - [`cost`]: queue cost of a capture
//! - [`admission`]: backpressure policy
//! - [`save_queue`]: background persistence
//! - [`batch`]: multi-frame batch assembly
//! - [`raw_burst`]: frame counting and filename suffixes

pub mod admission;
pub mod batch;
pub mod cost;
pub mod mode;
pub mod raw_burst;
pub mod save_queue;

pub use admission::{Admission, AdmissionController, RefusalReason};
pub use batch::{
    BatchAssembler, BatchFrame, BatchPhase, BatchPolicy, BatchRequest, FrameMetadata,
    PanoramaInfo,
};
pub use cost::{CaptureCost, CaptureCostModel};
pub use mode::{Bracket, CaptureMode, CapturePlan, ProcessType, SaveBase};
pub use raw_burst::RawBurstTracker;
pub use save_queue::{ImageProcessor, ImageStore, QueueLoad, QueueStats, SaveJob, SaveQueue};

use crate::backends::camera::{CameraControl, JpegImage, RawImage, ViewAxis};
use crate::config::{CaptureSettings, Config, DeviceCapabilities};
use crate::errors::{BatchError, PanoramaError, PipelineResult};
use crate::pipelines::panorama::{FrameDecision, PanoramaSession, SessionPhase, SessionStep};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

/// Where the current noise reduction capture stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoiseReductionCapture {
    /// No capture started since the last completion, flush or mode switch
    Idle,
    /// Capture started; its first frame opens the batch
    AwaitingFirstFrame,
    /// Frames go into the open batch
    Collecting,
    /// The first frame could not open a batch; the rest of the capture is dropped
    Refused,
}

/// State guarded by the routing mutex
#[derive(Debug)]
struct RoutingState {
    noise_reduction: NoiseReductionCapture,
}

/// Routes camera callbacks into batches, the save queue and the panorama
/// session
///
/// Callbacks may arrive on different threads. Frame routing, panorama
/// completion and cancellation are serialized so that a cancel observed by
/// one callback is observed by all that follow it.
pub struct CapturePipeline {
    settings: RwLock<CaptureSettings>,
    device: DeviceCapabilities,
    admission: AdmissionController,
    queue: Arc<SaveQueue>,
    batch: BatchAssembler,
    frames: RawBurstTracker,
    panorama: Arc<PanoramaSession>,
    camera: Arc<dyn CameraControl>,
    sequence: Mutex<RoutingState>,
}

impl CapturePipeline {
    /// Build a pipeline around a running save queue
    pub fn new(config: &Config, queue: Arc<SaveQueue>, camera: Arc<dyn CameraControl>) -> Self {
        let cost_model = CaptureCostModel::from_settings(&config.queue);
        let panorama = Arc::new(PanoramaSession::new(
            config.panorama.clone(),
            Arc::clone(&camera),
        ));
        Self {
            settings: RwLock::new(config.capture.clone()),
            device: config.device.clone(),
            admission: AdmissionController::new(
                cost_model,
                config.device.supports_noise_reduction,
            ),
            queue,
            batch: BatchAssembler::new(),
            frames: RawBurstTracker::new(),
            panorama,
            camera,
            sequence: Mutex::new(RoutingState {
                noise_reduction: NoiseReductionCapture::Idle,
            }),
        }
    }

    /// Lock order: routing state, then session or batch. Panorama
    /// `cancel`/`finish` are called before this lock is taken.
    fn sequence(&self) -> MutexGuard<'_, RoutingState> {
        self.sequence.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the current capture preferences
    pub fn settings(&self) -> CaptureSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the capture preferences
    ///
    /// A mode change goes through [`CapturePipeline::set_mode`] first.
    pub fn update_settings(&self, settings: CaptureSettings) {
        self.set_mode(settings.mode);
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    /// What the next capture will produce
    pub fn plan(&self) -> CapturePlan {
        CapturePlan::resolve(&self.settings(), &self.device)
    }

    /// Effective mode of the next capture
    pub fn mode(&self) -> CaptureMode {
        self.plan().mode
    }

    pub fn queue(&self) -> &Arc<SaveQueue> {
        &self.queue
    }

    pub fn panorama(&self) -> &Arc<PanoramaSession> {
        &self.panorama
    }

    pub fn batch(&self) -> &BatchAssembler {
        &self.batch
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn frames(&self) -> &RawBurstTracker {
        &self.frames
    }

    /// Switch shooting mode
    ///
    /// A batch still accumulating is flushed and a running panorama is
    /// cancelled, so the new mode always starts from a clean state.
    pub fn set_mode(&self, mode: CaptureMode) {
        let previous = {
            let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut settings.mode, mode)
        };
        if previous == mode {
            return;
        }
        info!(from = ?previous, to = ?mode, "Capture mode changed");

        if self.panorama.cancel() {
            info!("Panorama cancelled by mode switch");
        }
        let mut sequence = self.sequence();
        sequence.noise_reduction = NoiseReductionCapture::Idle;
        let dropped = self.batch.flush();
        if dropped > 0 {
            warn!(?previous, dropped, "Mode switch discarded an unfinished batch");
        }
    }

    /// Check the admission policy for the next capture
    pub fn can_take_photo(&self) -> Admission {
        let plan = self.plan();
        self.admission.admit_plan(&plan, self.queue.as_ref())
    }

    /// Trigger a capture if admission allows it
    pub fn request_capture(&self) -> Admission {
        let admission = self.can_take_photo();
        if admission.is_admitted() {
            self.camera.trigger_capture();
        }
        admission
    }

    /// The camera started delivering a new capture
    ///
    /// A noise reduction batch still open at this point belongs to a capture
    /// whose completion never arrived. It is discarded rather than merged
    /// with the new capture.
    pub fn on_capture_started(&self) {
        let mut sequence = self.sequence();
        self.frames.capture_started();
        if sequence.noise_reduction == NoiseReductionCapture::Collecting {
            let dropped = self.batch.flush();
            error!(
                dropped,
                "Noise reduction capture started before the previous one completed"
            );
        }
        sequence.noise_reduction = NoiseReductionCapture::AwaitingFirstFrame;
    }

    /// A single JPEG was delivered
    pub fn on_picture_taken(&self, image: JpegImage) -> PipelineResult<()> {
        let plan = self.plan();
        match plan.mode {
            CaptureMode::Panorama => self.add_panorama_frame(image),
            CaptureMode::NoiseReduction => self.add_noise_reduction_frame(image),
            mode => {
                let force = self.force_suffix(mode);
                let suffix = self.frames.jpeg_received(force);
                self.enqueue_jpeg(image, plan.process_type, suffix)
            }
        }
    }

    /// A whole burst of JPEGs was delivered in one callback
    pub fn on_burst_picture_taken(&self, images: Vec<JpegImage>) -> PipelineResult<()> {
        let settings = self.settings();
        let plan = CapturePlan::resolve(&settings, &self.device);
        if images.is_empty() {
            warn!(mode = ?plan.mode, "Empty burst delivered");
            return Ok(());
        }

        if plan.mode.is_burst_delivered() {
            if images.len() != plan.jpeg_count as usize {
                warn!(
                    mode = ?plan.mode,
                    expected = plan.jpeg_count,
                    received = images.len(),
                    "Burst size differs from plan"
                );
            }
            let policy = BatchPolicy {
                process_type: plan.process_type,
                save_base: SaveBase::for_mode(plan.mode, &settings),
                expected_frames: None,
                bracket: plan.bracket,
                panorama: None,
            };
            let request = {
                let _sequence = self.sequence();
                self.batch.assemble_burst(plan.mode, policy, images)?
            };
            return self.forward_batch(request);
        }

        // Fast burst and friends: every frame is saved on its own
        for image in images {
            let suffix = self.frames.jpeg_received(true);
            self.enqueue_jpeg(image, plan.process_type, suffix)?;
        }
        Ok(())
    }

    /// A single RAW was delivered
    pub fn on_raw_picture_taken(&self, image: RawImage) -> PipelineResult<()> {
        let force = self.force_suffix(self.mode());
        let suffix = self.frames.raw_received(force);
        self.enqueue_raw(image, suffix)
    }

    /// A burst of RAWs was delivered in one callback
    pub fn on_raw_burst_picture_taken(&self, images: Vec<RawImage>) -> PipelineResult<()> {
        let suffixes = self.frames.raw_burst_received(images.len());
        for (image, suffix) in images.into_iter().zip(suffixes) {
            self.enqueue_raw(image, Some(suffix))?;
        }
        Ok(())
    }

    /// The camera finished a capture (all frames delivered)
    ///
    /// Returns the panorama step when a panorama is recording.
    pub fn on_picture_completed(&self) -> PipelineResult<Option<SessionStep>> {
        match self.mode() {
            CaptureMode::NoiseReduction => {
                let request = {
                    let mut sequence = self.sequence();
                    let capture = std::mem::replace(
                        &mut sequence.noise_reduction,
                        NoiseReductionCapture::Idle,
                    );
                    match capture {
                        NoiseReductionCapture::Collecting => self.batch.finish(),
                        NoiseReductionCapture::AwaitingFirstFrame => Err(BatchError::EmptyBatch),
                        NoiseReductionCapture::Refused => {
                            debug!("Refused noise reduction capture completed");
                            return Ok(None);
                        }
                        NoiseReductionCapture::Idle => {
                            debug!("Noise reduction completion with no capture started");
                            return Ok(None);
                        }
                    }
                };
                match request {
                    Ok(request) => self.forward_batch(request)?,
                    Err(BatchError::EmptyBatch) => {
                        warn!("Noise reduction capture produced no frames")
                    }
                    Err(e) => return Err(e.into()),
                }
                Ok(None)
            }
            CaptureMode::Panorama => {
                let _sequence = self.sequence();
                let step = match self.panorama.on_picture_completed() {
                    Ok(step) => step,
                    Err(PanoramaError::NotRecording) => {
                        debug!(
                            phase = ?self.panorama.phase(),
                            "Capture completed outside a panorama"
                        );
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                };
                if let SessionStep::Finished { left_to_right } = step {
                    self.forward_panorama(left_to_right)?;
                }
                Ok(Some(step))
            }
            _ => Ok(None),
        }
    }

    /// Begin a panorama session
    pub fn start_panorama(&self) -> PipelineResult<()> {
        let _sequence = self.sequence();
        if let Some(active) = self.batch.active_mode() {
            return Err(BatchError::BatchInProgress {
                active,
                requested: CaptureMode::Panorama,
            }
            .into());
        }
        self.panorama.start()?;
        Ok(())
    }

    /// Stop the panorama on user request and forward what was captured
    pub fn finish_panorama(&self) -> PipelineResult<()> {
        let left_to_right = self.panorama.finish()?;
        let _sequence = self.sequence();
        self.forward_panorama(left_to_right)
    }

    /// Abort the panorama, discarding its frames
    ///
    /// Returns false if no panorama was recording.
    pub fn cancel_panorama(&self) -> bool {
        if !self.panorama.cancel() {
            return false;
        }
        let _sequence = self.sequence();
        let dropped = self.batch.flush();
        info!(dropped, "Panorama frames discarded");
        true
    }

    /// The camera was closed unexpectedly
    pub fn camera_closed(&self) {
        debug!("Camera closed");
        self.panorama.cancel();
        let mut sequence = self.sequence();
        sequence.noise_reduction = NoiseReductionCapture::Idle;
        let dropped = self.batch.flush();
        if dropped > 0 {
            info!(dropped, "Unfinished batch discarded on camera close");
        }
    }

    fn force_suffix(&self, mode: CaptureMode) -> bool {
        RawBurstTracker::force_suffix(mode, self.camera.camera_is_capturing_burst())
    }

    fn add_panorama_frame(&self, image: JpegImage) -> PipelineResult<()> {
        let _sequence = self.sequence();
        let decision = match self.panorama.on_frame() {
            Ok(decision) => decision,
            Err(e) => {
                let phase = self.panorama.phase();
                if matches!(phase, SessionPhase::Cancelled | SessionPhase::Finished) {
                    debug!(?phase, "Late panorama frame discarded");
                    return Ok(());
                }
                error!(error = %e, "Panorama frame delivered outside a session, discarding");
                return Err(e.into());
            }
        };

        let FrameDecision::Accept { rotation, first } = decision else {
            return Ok(());
        };

        if first {
            let settings = self.settings();
            let policy = BatchPolicy {
                panorama: Some(PanoramaInfo {
                    left_to_right: true,
                    view_angle_x: self.camera.current_view_angle(ViewAxis::Horizontal),
                    view_angle_y: self.camera.current_view_angle(ViewAxis::Vertical),
                }),
                ..BatchPolicy::open_ended(
                    ProcessType::Panorama,
                    SaveBase::for_mode(CaptureMode::Panorama, &settings),
                )
            };
            self.batch.start_batch(CaptureMode::Panorama, policy)?;
        }

        let metadata = FrameMetadata {
            rotation: Some(rotation),
        };
        self.batch
            .add_frame(CaptureMode::Panorama, image, metadata)?;
        Ok(())
    }

    fn add_noise_reduction_frame(&self, image: JpegImage) -> PipelineResult<()> {
        let mut sequence = self.sequence();
        self.frames.jpeg_received(false);
        let mode = CaptureMode::NoiseReduction;
        let capture = sequence.noise_reduction;
        match capture {
            NoiseReductionCapture::Idle => {
                error!("Noise reduction frame delivered with no capture started");
                return Err(BatchError::NoActiveBatch { mode }.into());
            }
            NoiseReductionCapture::Refused => {
                debug!("Frame of refused noise reduction capture discarded");
                return Err(BatchError::CaptureRefused { mode }.into());
            }
            NoiseReductionCapture::AwaitingFirstFrame => {
                let settings = self.settings();
                let policy = BatchPolicy::open_ended(
                    ProcessType::Average,
                    SaveBase::for_mode(mode, &settings),
                );
                if let Err(e) = self.batch.start_batch(mode, policy) {
                    error!(error = %e, "Noise reduction capture refused");
                    sequence.noise_reduction = NoiseReductionCapture::Refused;
                    return Err(e.into());
                }
                sequence.noise_reduction = NoiseReductionCapture::Collecting;
            }
            NoiseReductionCapture::Collecting => {}
        }
        self.batch.add_frame(mode, image, FrameMetadata::default())?;
        Ok(())
    }

    fn forward_panorama(&self, left_to_right: bool) -> PipelineResult<()> {
        if self.batch.active_mode().is_none() {
            info!("Panorama finished without frames");
            return Ok(());
        }
        self.batch.set_panorama_direction(left_to_right)?;
        match self.batch.finish() {
            Ok(request) => self.forward_batch(request),
            Err(BatchError::EmptyBatch) => {
                info!("Panorama finished without frames");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn forward_batch(&self, request: BatchRequest) -> PipelineResult<()> {
        let frames = u32::try_from(request.len()).unwrap_or(u32::MAX);
        let cost = self.admission.cost_model().cost(request.mode, 0, frames);
        info!(
            id = %request.id,
            mode = ?request.mode,
            frames,
            save_base = ?request.save_base,
            "Forwarding batch"
        );
        self.queue.enqueue(SaveJob::Batch(request), cost)?;
        Ok(())
    }

    fn enqueue_jpeg(
        &self,
        image: JpegImage,
        process_type: ProcessType,
        suffix: Option<u32>,
    ) -> PipelineResult<()> {
        let cost = self.admission.cost_model().cost(CaptureMode::Standard, 0, 1);
        self.queue.enqueue(
            SaveJob::Jpeg {
                image,
                process_type,
                suffix,
            },
            cost,
        )?;
        Ok(())
    }

    fn enqueue_raw(&self, image: RawImage, suffix: Option<u32>) -> PipelineResult<()> {
        let cost = self.admission.cost_model().cost(CaptureMode::Standard, 1, 0);
        self.queue.enqueue(SaveJob::Raw { image, suffix }, cost)?;
        Ok(())
    }
}
