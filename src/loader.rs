//
// loader.rs
// MedView-rs
//
// Background volume loading: blocking loads run off the caller's task and report through a channel.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::volume::cache::DEFAULT_CACHE_CAPACITY;
use crate::volume::{DicomVolume, NiftiVolume, Volume};

/// What to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    DicomDirectory(PathBuf),
    NiftiFile(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Decoded-slice cache bound for DICOM series.
    pub cache_capacity: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl LoadRequest {
    pub fn path(&self) -> &Path {
        match self {
            LoadRequest::DicomDirectory(path) | LoadRequest::NiftiFile(path) => path,
        }
    }

    /// Open the volume on the current thread with default options.
    pub fn open_blocking(&self) -> Result<Box<dyn Volume>, LoadError> {
        self.open_blocking_with(LoadOptions::default())
    }

    pub fn open_blocking_with(&self, options: LoadOptions) -> Result<Box<dyn Volume>, LoadError> {
        let mut volume: Box<dyn Volume> = match self {
            LoadRequest::DicomDirectory(_) => {
                Box::new(DicomVolume::with_cache_capacity(options.cache_capacity))
            }
            LoadRequest::NiftiFile(_) => Box::new(NiftiVolume::new()),
        };
        volume.load(self.path())?;
        Ok(volume)
    }
}

/// Completion message: the request and its fully loaded volume (or the failure).
pub struct LoadEvent {
    pub request: LoadRequest,
    pub result: Result<Box<dyn Volume>, LoadError>,
}

pub fn channel() -> (UnboundedSender<LoadEvent>, UnboundedReceiver<LoadEvent>) {
    mpsc::unbounded_channel()
}

/// How a background load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Delivered,
    Cancelled,
    ReceiverDropped,
    Panicked,
}

pub struct LoadHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<LoadOutcome>,
}

impl LoadHandle {
    /// Abandon the job. A result produced after this point is dropped instead of sent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> LoadOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("Load task failed: {}", err);
                LoadOutcome::Panicked
            }
        }
    }
}

pub fn spawn_load(request: LoadRequest, sender: UnboundedSender<LoadEvent>) -> LoadHandle {
    spawn_load_with(request, LoadOptions::default(), sender)
}

/// Run the load on the blocking pool and send exactly one [`LoadEvent`] unless cancelled.
pub fn spawn_load_with(
    request: LoadRequest,
    options: LoadOptions,
    sender: UnboundedSender<LoadEvent>,
) -> LoadHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);

    let task = tokio::task::spawn_blocking(move || {
        if flag.load(Ordering::SeqCst) {
            debug!("Load of {:?} cancelled before start", request.path());
            return LoadOutcome::Cancelled;
        }

        let result = request.open_blocking_with(options);

        if flag.load(Ordering::SeqCst) {
            debug!("Discarding result of cancelled load {:?}", request.path());
            return LoadOutcome::Cancelled;
        }
        if let Err(err) = &result {
            info!("Load of {:?} failed: {}", request.path(), err);
        }

        match sender.send(LoadEvent { request, result }) {
            Ok(()) => LoadOutcome::Delivered,
            Err(mpsc::error::SendError(event)) => {
                debug!("No consumer for load of {:?}", event.request.path());
                LoadOutcome::ReceiverDropped
            }
        }
    });

    LoadHandle { cancelled, task }
}

/// Load through the background path and wait for the result.
pub async fn load(request: LoadRequest, options: LoadOptions) -> Result<Box<dyn Volume>, LoadError> {
    let path = request.path().to_path_buf();
    let (sender, mut receiver) = channel();
    let handle = spawn_load_with(request, options, sender);

    match receiver.recv().await {
        Some(event) => event.result,
        None => {
            let outcome = handle.join().await;
            debug!("Load of {:?} ended without a result: {:?}", path, outcome);
            Err(LoadError::Cancelled(path))
        }
    }
}
