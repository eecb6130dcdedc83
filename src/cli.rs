// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands driving the control layer with a simulated camera
//!
//! This module provides command-line functionality for:
//! - Simulating shutter presses against the admission policy
//! - Running a synthetic panorama sweep
//! - Printing the effective configuration

use capture_control::backends::camera::{CameraControl, JpegImage, RawImage, ViewAxis};
use capture_control::backends::sensor_loop::SensorLoopController;
use capture_control::config::Config;
use capture_control::constants::timing;
use capture_control::errors::SaveQueueError;
use capture_control::pipelines::panorama::{RotationMatrix, SessionPhase, SessionStep};
use capture_control::pipelines::photo::{
    Admission, BatchRequest, CaptureMode, CapturePipeline, ImageProcessor, ImageStore,
    ProcessType, SaveQueue,
};
use capture_control::storage::{DirectoryStore, FileProcessor};
use futures::StreamExt;
use futures::channel::mpsc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Smallest byte sequence that looks like a JPEG
const FAKE_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

/// Camera that turns capture triggers into channel messages
struct SimulatedCamera {
    triggers: mpsc::UnboundedSender<()>,
    view_angle_x: f32,
    view_angle_y: f32,
}

impl SimulatedCamera {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (triggers, receiver) = mpsc::unbounded();
        let camera = Arc::new(Self {
            triggers,
            view_angle_x: 66.0,
            view_angle_y: 50.0,
        });
        (camera, receiver)
    }
}

impl CameraControl for SimulatedCamera {
    fn trigger_capture(&self) {
        // Receiver only goes away at shutdown
        let _ = self.triggers.unbounded_send(());
    }

    fn current_view_angle(&self, axis: ViewAxis) -> f32 {
        match axis {
            ViewAxis::Horizontal => self.view_angle_x,
            ViewAxis::Vertical => self.view_angle_y,
        }
    }

    fn camera_is_capturing_burst(&self) -> bool {
        false
    }
}

/// Save sink that optionally writes to disk and optionally takes its time
struct SimulatedSink {
    delay: Duration,
    store: Option<DirectoryStore>,
    processor: Option<FileProcessor>,
    batches: AtomicU32,
}

impl SimulatedSink {
    fn new(delay_ms: u64, output: Option<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            store: output.clone().map(DirectoryStore::new),
            processor: output.map(FileProcessor::new),
            batches: AtomicU32::new(0),
        })
    }

    fn pause(&self) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

impl ImageStore for SimulatedSink {
    fn store_jpeg(
        &self,
        image: &JpegImage,
        process_type: ProcessType,
        suffix: Option<u32>,
    ) -> Result<(), SaveQueueError> {
        self.pause();
        match &self.store {
            Some(store) => store.store_jpeg(image, process_type, suffix),
            None => Ok(()),
        }
    }

    fn store_raw(&self, image: &RawImage, suffix: Option<u32>) -> Result<(), SaveQueueError> {
        self.pause();
        match &self.store {
            Some(store) => store.store_raw(image, suffix),
            None => Ok(()),
        }
    }
}

impl ImageProcessor for SimulatedSink {
    fn submit_batch(&self, batch: BatchRequest) -> Result<(), SaveQueueError> {
        self.pause();
        self.batches.fetch_add(1, Ordering::SeqCst);
        println!(
            "  batch {}: {} x{} ({:?}, save base {:?})",
            batch.id,
            batch.mode.display_name(),
            batch.len(),
            batch.process_type,
            batch.save_base
        );
        match &self.processor {
            Some(processor) => processor.submit_batch(batch),
            None => Ok(()),
        }
    }
}

/// Load config from an explicit path or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    })
}

/// Print the effective configuration
pub fn print_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = Config::path() {
        println!("// {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Deliver everything the camera would produce for one admitted capture
fn deliver_capture(
    pipeline: &CapturePipeline,
) -> Result<Option<SessionStep>, Box<dyn std::error::Error>> {
    let plan = pipeline.plan();
    let jpegs: Vec<JpegImage> = (0..plan.jpeg_count)
        .map(|_| JpegImage::new(FAKE_JPEG.to_vec()))
        .collect();
    let raws: Vec<RawImage> = (0..plan.raw_count)
        .map(|_| RawImage::new(vec![0u8; 64], 8, 4))
        .collect();

    pipeline.on_capture_started();
    if plan.mode.is_burst_delivered() || plan.mode == CaptureMode::FastBurst {
        pipeline.on_burst_picture_taken(jpegs)?;
        if !raws.is_empty() {
            pipeline.on_raw_burst_picture_taken(raws)?;
        }
    } else {
        for image in jpegs {
            pipeline.on_picture_taken(image)?;
        }
        for raw in raws {
            pipeline.on_raw_picture_taken(raw)?;
        }
    }
    Ok(pipeline.on_picture_completed()?)
}

/// Fire shutter presses and report what the admission policy did
pub fn simulate(
    mut config: Config,
    mode: CaptureMode,
    shots: u32,
    save_delay_ms: u64,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    config.capture.mode = mode;
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let sink = SimulatedSink::new(save_delay_ms, output);
        let queue = Arc::new(SaveQueue::start(&config.queue, sink.clone(), sink.clone()));
        let (camera, mut triggers) = SimulatedCamera::new();
        let pipeline = CapturePipeline::new(&config, Arc::clone(&queue), camera);

        let plan = pipeline.plan();
        let cost = pipeline.admission().cost_model().plan_cost(&plan);
        println!(
            "Mode: {} ({} JPEG, {} RAW, cost {})",
            plan.mode.display_name(),
            plan.jpeg_count,
            plan.raw_count,
            cost
        );

        let mut admitted = 0u32;
        let mut refused = 0u32;
        for shot in 1..=shots {
            let load = queue.stats().load;
            match pipeline.request_capture() {
                Admission::Admit => {
                    admitted += 1;
                    if triggers.next().await.is_some() {
                        deliver_capture(&pipeline)?;
                    }
                    println!("  shot {:>3}: admitted at load {}", shot, load);
                }
                Admission::Refuse(reason) => {
                    refused += 1;
                    println!("  shot {:>3}: refused at load {} ({})", shot, load, reason);
                }
            }
        }

        let drain = Duration::from_secs(timing::DRAIN_TIMEOUT_SECS);
        if tokio::time::timeout(drain, queue.wait_idle()).await.is_err() {
            eprintln!("Save queue did not drain within {:?}", drain);
        }
        queue.shutdown().await;

        let stats = queue.stats();
        println!();
        println!("Admitted: {}", admitted);
        println!("Refused:  {}", refused);
        println!(
            "Saved jobs: {} ({} failed, {} batches)",
            stats.completed,
            stats.failed,
            sink.batches.load(Ordering::SeqCst)
        );
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Sweep a simulated device through a panorama
pub fn panorama(
    mut config: Config,
    sweep_deg: f32,
    reverse: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    config.capture.mode = CaptureMode::Panorama;
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async move {
        let sink = SimulatedSink::new(0, output);
        let queue = Arc::new(SaveQueue::start(&config.queue, sink.clone(), sink.clone()));
        let (camera, mut triggers) = SimulatedCamera::new();
        let pipeline = CapturePipeline::new(&config, Arc::clone(&queue), camera);

        if !pipeline.request_capture().is_admitted() {
            return Err("panorama refused: save queue busy".into());
        }
        // The shutter press only starts the session; the sensor takes the pictures
        let _ = triggers.next().await;
        pipeline.start_panorama()?;
        println!("Panorama started, sweeping {:.0}°", sweep_deg);

        let session = Arc::clone(pipeline.panorama());
        let step = 0.25f32.to_radians() * if reverse { -1.0 } else { 1.0 };
        let limit = sweep_deg.to_radians();
        let mut yaw = 0.0f32;
        let mut next_yaw = 0.0f32;
        let mut sensor = SensorLoopController::start("gyro", Arc::clone(&session), move || {
            // Hold still while a picture is being taken
            if session.phase() != SessionPhase::CaptureInFlight {
                yaw = next_yaw;
                next_yaw += step;
            }
            (yaw.abs() <= limit).then(|| RotationMatrix::from_yaw(yaw))
        })?;

        let poll = Duration::from_millis(50);
        loop {
            match tokio::time::timeout(poll, triggers.next()).await {
                Ok(Some(())) => match deliver_capture(&pipeline)? {
                    Some(SessionStep::NextTarget { shots }) => println!("  shot {} accepted", shots),
                    Some(SessionStep::Repeat { shots }) => {
                        println!("  shot {} rejected, retrying", shots + 1)
                    }
                    Some(SessionStep::Finished { .. }) => println!("  shot limit reached"),
                    None => {}
                },
                Ok(None) => break,
                Err(_) if !sensor.is_running() => break,
                Err(_) => {}
            }
        }
        sensor.stop();

        if pipeline.panorama().is_recording() {
            pipeline.finish_panorama()?;
        }
        println!(
            "Panorama done: {} shots, {}",
            pipeline.panorama().shots(),
            if pipeline.panorama().left_to_right() {
                "left to right"
            } else {
                "right to left"
            }
        );

        let drain = Duration::from_secs(timing::DRAIN_TIMEOUT_SECS);
        if tokio::time::timeout(drain, queue.wait_idle()).await.is_err() {
            eprintln!("Save queue did not drain within {:?}", drain);
        }
        queue.shutdown().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
