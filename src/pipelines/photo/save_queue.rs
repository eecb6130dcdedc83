// SPDX-License-Identifier: GPL-3.0-only

//! Bounded background save queue
//!
//! Capture callbacks hand finished payloads to the queue and return
//! immediately; tokio workers drain it, running the blocking encode/persist
//! step on the blocking pool. The in-flight cost is a single atomic counter
//! so that admission checks never wait on the workers.
//!
//! ```text
//! camera callback ──enqueue──▶ [ load += cost ] ──▶ worker ──▶ ImageStore / ImageProcessor
//!                                                     │
//!                                                     └──▶ [ load -= cost ]
//! ```

use super::batch::BatchRequest;
use super::cost::CaptureCost;
use super::mode::ProcessType;
use crate::backends::camera::{JpegImage, RawImage};
use crate::config::QueueSettings;
use crate::errors::SaveQueueError;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Read-only view of queue load used by admission decisions
pub trait QueueLoad {
    /// Cost units currently enqueued or being persisted
    fn current_load(&self) -> CaptureCost;

    /// Whether admitting `cost` more units would exceed the hard capacity
    fn would_block(&self, cost: CaptureCost) -> bool;
}

/// Persists single images (storage collaborator)
pub trait ImageStore: Send + Sync {
    /// Persist a JPEG; `suffix` is the sequential index within a burst
    fn store_jpeg(
        &self,
        image: &JpegImage,
        process_type: ProcessType,
        suffix: Option<u32>,
    ) -> Result<(), SaveQueueError>;

    /// Persist a RAW image as DNG
    fn store_raw(&self, image: &RawImage, suffix: Option<u32>) -> Result<(), SaveQueueError>;
}

/// Combines batches into output images (image processing collaborator)
pub trait ImageProcessor: Send + Sync {
    /// Atomic hand-off of a complete, ordered batch
    fn submit_batch(&self, batch: BatchRequest) -> Result<(), SaveQueueError>;
}

/// Unit of background work
#[derive(Debug)]
pub enum SaveJob {
    Jpeg {
        image: JpegImage,
        process_type: ProcessType,
        suffix: Option<u32>,
    },
    Raw {
        image: RawImage,
        suffix: Option<u32>,
    },
    Batch(BatchRequest),
}

impl SaveJob {
    fn kind(&self) -> &'static str {
        match self {
            SaveJob::Jpeg { .. } => "jpeg",
            SaveJob::Raw { .. } => "raw",
            SaveJob::Batch(_) => "batch",
        }
    }

    fn run(self, store: &dyn ImageStore, processor: &dyn ImageProcessor) -> Result<(), SaveQueueError> {
        match self {
            SaveJob::Jpeg {
                image,
                process_type,
                suffix,
            } => store.store_jpeg(&image, process_type, suffix),
            SaveJob::Raw { image, suffix } => store.store_raw(&image, suffix),
            SaveJob::Batch(batch) => processor.submit_batch(batch),
        }
    }
}

struct QueuedJob {
    job: SaveJob,
    cost: CaptureCost,
}

/// State shared between the queue handle and its workers
struct QueueShared {
    load: AtomicU32,
    capacity: CaptureCost,
    completed: AtomicU64,
    failed: AtomicU64,
    /// Signalled whenever the load drops to zero
    idle: Notify,
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub load: CaptureCost,
    pub capacity: CaptureCost,
    pub completed: u64,
    pub failed: u64,
}

/// Background save queue
///
/// Must be started from within a tokio runtime. `enqueue` is synchronous
/// and may be called from any thread.
pub struct SaveQueue {
    shared: Arc<QueueShared>,
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SaveQueue {
    /// Start the queue and its workers on the current runtime
    pub fn start(
        settings: &QueueSettings,
        store: Arc<dyn ImageStore>,
        processor: Arc<dyn ImageProcessor>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shared = Arc::new(QueueShared {
            load: AtomicU32::new(0),
            capacity: settings.capacity,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            idle: Notify::new(),
        });

        let worker_count = settings.workers.max(1);
        let workers = (0..worker_count)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&receiver),
                    Arc::clone(&shared),
                    Arc::clone(&store),
                    Arc::clone(&processor),
                ))
            })
            .collect();

        info!(
            capacity = settings.capacity,
            workers = worker_count,
            "Save queue started"
        );

        Self {
            shared,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Hand a job to the background workers
    ///
    /// Never blocks. Admission is expected to have been checked already;
    /// exceeding capacity here is logged but accepted.
    pub fn enqueue(&self, job: SaveJob, cost: CaptureCost) -> Result<(), SaveQueueError> {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = sender.as_ref() else {
            warn!(kind = job.kind(), "Save queue closed, dropping job");
            return Err(SaveQueueError::Closed);
        };

        let kind = job.kind();
        let previous = self.shared.load.fetch_add(cost, Ordering::AcqRel);
        if previous.saturating_add(cost) > self.shared.capacity && previous > 0 {
            warn!(
                load = previous + cost,
                capacity = self.shared.capacity,
                "Save queue over capacity"
            );
        }

        if sender.send(QueuedJob { job, cost }).is_err() {
            self.release(cost);
            return Err(SaveQueueError::Closed);
        }

        debug!(kind, cost, load = previous + cost, "Job enqueued");
        Ok(())
    }

    /// Queue counters
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            load: self.shared.load.load(Ordering::Acquire),
            capacity: self.shared.capacity,
            completed: self.shared.completed.load(Ordering::Acquire),
            failed: self.shared.failed.load(Ordering::Acquire),
        }
    }

    /// Hard capacity in cost units
    pub fn capacity(&self) -> CaptureCost {
        self.shared.capacity
    }

    /// Wait until every enqueued job has been persisted
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.load.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting jobs, drain what is queued and join the workers
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(sender);

        let workers: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Save worker panicked");
            }
        }
        info!(stats = ?self.stats(), "Save queue shut down");
    }

    fn release(&self, cost: CaptureCost) {
        release(&self.shared, cost);
    }
}

impl QueueLoad for SaveQueue {
    fn current_load(&self) -> CaptureCost {
        self.shared.load.load(Ordering::Acquire)
    }

    fn would_block(&self, cost: CaptureCost) -> bool {
        let load = self.current_load();
        // An idle queue always takes at least one capture
        load > 0 && load.saturating_add(cost) > self.shared.capacity
    }
}

fn release(shared: &QueueShared, cost: CaptureCost) {
    let previous = shared.load.fetch_sub(cost, Ordering::AcqRel);
    if previous == cost {
        shared.idle.notify_waiters();
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    shared: Arc<QueueShared>,
    store: Arc<dyn ImageStore>,
    processor: Arc<dyn ImageProcessor>,
) {
    debug!(worker = id, "Save worker started");
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(QueuedJob { job, cost }) = next else {
            break;
        };

        let kind = job.kind();
        let store = Arc::clone(&store);
        let processor = Arc::clone(&processor);
        let result =
            tokio::task::spawn_blocking(move || job.run(store.as_ref(), processor.as_ref())).await;

        match result {
            Ok(Ok(())) => {
                shared.completed.fetch_add(1, Ordering::AcqRel);
                debug!(worker = id, kind, cost, "Job persisted");
            }
            Ok(Err(e)) => {
                shared.failed.fetch_add(1, Ordering::AcqRel);
                error!(worker = id, kind, error = %e, "Job failed");
            }
            Err(e) => {
                shared.failed.fetch_add(1, Ordering::AcqRel);
                error!(worker = id, kind, error = %e, "Job panicked");
            }
        }

        release(&shared, cost);
    }
    debug!(worker = id, "Save worker exiting");
}
