//! Process-wide buffer cache
//!
//! Turns playable urls into decoded [`SampleBuffer`]s on a small pool of
//! loader threads:
//! - `load()` never blocks; it returns what is there and queues a fetch if
//!   nothing is
//! - at most one fetch per url is in flight, later callers just see `Loading`
//! - decoded buffers are kept for the life of the cache (no eviction)
//! - a failed load is remembered until someone asks for that url again,
//!   which retries it

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use super::sample_buffer::SampleBuffer;
use crate::loader::fetch::Fetch;

#[derive(Clone, Debug)]
pub enum LoadStatus {
    Ready(Arc<SampleBuffer>),
    Loading,
    Failed(String),
}

impl LoadStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadStatus::Ready(_))
    }
}

type Slots = Arc<Mutex<HashMap<String, LoadStatus>>>;

pub struct AudioCache {
    slots: Slots,
    job_tx: Option<Sender<String>>,
    workers: Vec<JoinHandle<()>>,
}

impl AudioCache {
    /// Spawn `threads` loader threads (at least one). Buffers are decoded at
    /// `sample_rate`, which should be the output device's rate.
    pub fn new(fetcher: Arc<dyn Fetch>, sample_rate: u32, threads: usize) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<String>();
        let slots: Slots = Arc::new(Mutex::new(HashMap::new()));

        let workers = (0..threads.max(1))
            .filter_map(|i| {
                let rx = job_rx.clone();
                let slots = slots.clone();
                let fetcher = fetcher.clone();
                thread::Builder::new()
                    .name(format!("padloop-loader-{i}"))
                    .spawn(move || loader_thread(rx, slots, fetcher, sample_rate))
                    .map_err(|e| log::error!("failed to spawn loader thread {i}: {e}"))
                    .ok()
            })
            .collect::<Vec<_>>();

        log::info!("AudioCache: {} loader threads at {} Hz", workers.len(), sample_rate);

        Self {
            slots,
            job_tx: Some(job_tx),
            workers,
        }
    }

    /// What we have for `url`, queueing a fetch when there's nothing usable.
    pub fn load(&self, url: &str) -> LoadStatus {
        let mut slots = lock(&self.slots);
        match slots.get(url) {
            Some(LoadStatus::Ready(buffer)) => return LoadStatus::Ready(buffer.clone()),
            Some(LoadStatus::Loading) => return LoadStatus::Loading,
            Some(LoadStatus::Failed(_)) | None => {}
        }

        let Some(tx) = &self.job_tx else {
            return LoadStatus::Failed("audio cache is shut down".to_string());
        };
        if tx.send(url.to_string()).is_err() {
            return LoadStatus::Failed("loader threads are gone".to_string());
        }
        slots.insert(url.to_string(), LoadStatus::Loading);
        LoadStatus::Loading
    }

    /// Look without touching anything.
    pub fn status(&self, url: &str) -> Option<LoadStatus> {
        lock(&self.slots).get(url).cloned()
    }

    /// Block until `url` is no longer loading, or the timeout runs out.
    /// Meant for warm-up and tests; never call it from the tick path.
    pub fn wait_for(&self, url: &str, timeout: Duration) -> Option<LoadStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.status(url) {
                Some(LoadStatus::Loading) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(1));
                }
                other => return other,
            }
        }
    }

    /// Number of decoded buffers held.
    pub fn ready_count(&self) -> usize {
        lock(&self.slots).values().filter(|s| s.is_ready()).count()
    }

    /// Stop the loader threads. Anything still queued is abandoned.
    pub fn shutdown(&mut self) {
        // dropping the sender ends each worker's recv loop
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("a loader thread panicked");
            }
        }
    }
}

impl Drop for AudioCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<String, LoadStatus>> {
    // a panicking loader can't leave the map half-written, so keep going
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn loader_thread(rx: Receiver<String>, slots: Slots, fetcher: Arc<dyn Fetch>, sample_rate: u32) {
    while let Ok(url) = rx.recv() {
        let started = Instant::now();
        let result = fetcher
            .fetch(&url)
            .and_then(|bytes| SampleBuffer::decode_wav(&bytes, sample_rate, &url));

        let status = match result {
            Ok(buffer) => {
                log::debug!(
                    "loaded {url}: {} frames in {:?}",
                    buffer.len(),
                    started.elapsed()
                );
                LoadStatus::Ready(Arc::new(buffer))
            }
            Err(e) => {
                log::warn!("failed to load {url}: {e}");
                LoadStatus::Failed(e.to_string())
            }
        };
        lock(&slots).insert(url, status);
    }
    log::info!("loader thread {:?} shutting down", thread::current().name());
}
