//! Test doubles shared by the `core` unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::entities::{
    DecodeParams, Dimensions, FrameDecoder, FrameError, ImageHandle, Metadata, PixelBuffer,
    WorkerPool,
};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Decoder that never touches the disk.
///
/// Every path is 4x2; paths containing "broken" fail to decode, paths
/// containing "missing" fail header reads.
#[derive(Debug, Default)]
pub struct FakeDecoder {
    decodes: AtomicUsize,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl FrameDecoder for FakeDecoder {
    fn header(&self, path: &Path) -> Result<(Dimensions, Metadata), FrameError> {
        if path.to_string_lossy().contains("missing") {
            return Err(FrameError::NotFound(path.to_path_buf()));
        }
        let mut meta = Metadata::new();
        meta.set("file_name", path.file_name().unwrap().to_string_lossy());
        meta.set("channels", "4");
        Ok((Dimensions::new(4, 2), meta))
    }

    fn decode(&self, path: &Path, _params: DecodeParams) -> Result<ImageHandle, FrameError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        if path.to_string_lossy().contains("broken") {
            return Err(FrameError::Image(format!("{}: corrupt", path.display())));
        }
        Ok(ImageHandle::from_buffer(PixelBuffer::U8(vec![0; 4 * 2 * 4]), 4, 2))
    }
}

/// Pool that only queues jobs; tests decide when they run.
#[derive(Default)]
pub struct ManualPool {
    jobs: Mutex<Vec<Job>>,
}

impl ManualPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// Run every queued job on the current thread, returns how many ran
    pub fn run_all(&self) -> usize {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap());
        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }
}

impl WorkerPool for ManualPool {
    fn execute(&self, job: Job) {
        self.jobs.lock().unwrap().push(job);
    }
}

/// `/seq/shot.0000.exr` .. `/seq/shot.{n-1}.exr`
pub fn shot_paths(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("/seq/shot.{:04}.exr", i))).collect()
}
