use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread::JoinHandle;

use crate::foundation::core::{CueIndex, TrackId};
use crate::foundation::error::{SubrastError, SubrastResult};
use crate::palette::cache::PaletteCache;
use crate::quantize::bitmap::Bitmap;
use crate::quantize::quantizer::quantize;
use crate::raster::backend::Rasterizer;
use crate::scene::cue::RenderRequest;

/// Name prefix of the pool's worker threads.
pub const WORKER_THREAD_PREFIX: &str = "subrast-render-";

/// Scheduler job key: one render job per `(track, cue)` pair.
pub type JobKey = (TrackId, CueIndex);

/// Non-blocking lookup result for a scheduled job.
#[derive(Debug)]
pub enum TryGet {
    /// The job finished; the bitmap is now owned by the caller and the job
    /// is marked consumed.
    Ready(Bitmap),
    /// Submitted but not finished yet.
    Pending,
    /// Never submitted, already consumed, or discarded during shutdown.
    Absent,
}

// Unsubmitted and discarded jobs have no table entry at all.
#[derive(Debug)]
enum JobState {
    Pending,
    Ready(Bitmap),
    Consumed,
}

/// Cross-thread render/quantize failure counters.
///
/// Failures downgrade a cue to empty content instead of aborting the run,
/// so they are only observable here and in the logs.
#[derive(Debug, Default)]
pub struct RenderCounters {
    render_failures: AtomicU64,
    quantize_failures: AtomicU64,
    tiles_skipped: AtomicU64,
}

/// Point-in-time copy of [`RenderCounters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderCounterSnapshot {
    /// Rasterizer errors downgraded to empty content.
    pub render_failures: u64,
    /// Quantizer overflow/allocation failures downgraded to empty content.
    pub quantize_failures: u64,
    /// Malformed tiles dropped whole.
    pub tiles_skipped: u64,
}

impl RenderCounters {
    fn record_render_failure(&self) {
        self.render_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_quantize_failure(&self) {
        self.quantize_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_tiles_skipped(&self, n: u32) {
        if n > 0 {
            self.tiles_skipped.fetch_add(u64::from(n), Ordering::Relaxed);
        }
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> RenderCounterSnapshot {
        RenderCounterSnapshot {
            render_failures: self.render_failures.load(Ordering::Relaxed),
            quantize_failures: self.quantize_failures.load(Ordering::Relaxed),
            tiles_skipped: self.tiles_skipped.load(Ordering::Relaxed),
        }
    }
}

struct QueuedJob {
    key: JobKey,
    request: RenderRequest,
}

struct PoolShared {
    jobs: Mutex<HashMap<JobKey, JobState>>,
    stop: AtomicBool,
    counters: RenderCounters,
    rasterizer: Arc<dyn Rasterizer>,
    palettes: Arc<PaletteCache>,
}

impl PoolShared {
    // A panicked worker must not poison the job table for the orchestrator.
    fn jobs(&self) -> MutexGuard<'_, HashMap<JobKey, JobState>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed pool of render workers with a per-key job cache.
///
/// Jobs move through `Pending -> Ready -> Consumed` exactly once. The
/// orchestrator polls with [`try_get`](Self::try_get) and falls back to
/// [`render_sync`](Self::render_sync) when it cannot wait, so worst-case
/// latency is bounded by a single synchronous render.
pub struct RenderWorkerPool {
    shared: Arc<PoolShared>,
    queue: Option<mpsc::Sender<QueuedJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl RenderWorkerPool {
    /// Start `worker_count` threads; `0` disables pooling entirely and the
    /// caller must render synchronously.
    ///
    /// Failing to spawn a requested worker is fatal: the configured
    /// concurrency level is unachievable.
    pub fn new(
        worker_count: usize,
        rasterizer: Arc<dyn Rasterizer>,
        palettes: Arc<PaletteCache>,
    ) -> SubrastResult<Self> {
        let shared = Arc::new(PoolShared {
            jobs: Mutex::new(HashMap::new()),
            stop: AtomicBool::new(false),
            counters: RenderCounters::default(),
            rasterizer,
            palettes,
        });

        if worker_count == 0 {
            return Ok(Self {
                shared,
                queue: None,
                workers: Vec::new(),
            });
        }

        let (tx, rx) = mpsc::channel::<QueuedJob>();
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let shared = Arc::clone(&shared);
            let rx = Arc::clone(&rx);
            let handle = std::thread::Builder::new()
                .name(format!("{WORKER_THREAD_PREFIX}{i}"))
                .spawn(move || worker_loop(&shared, &rx))
                .map_err(|e| {
                    SubrastError::scheduler(format!("failed to spawn render worker {i}: {e}"))
                })?;
            workers.push(handle);
        }

        Ok(Self {
            shared,
            queue: Some(tx),
            workers,
        })
    }

    /// Return `true` when worker threads are running.
    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Snapshot the shared failure counters.
    pub fn counters(&self) -> RenderCounterSnapshot {
        self.shared.counters.snapshot()
    }

    /// Enqueue a render job for `request`'s key, without blocking.
    ///
    /// A key that already exists in any state is left untouched; with the
    /// pool disabled this is a no-op and the caller's `try_get` will report
    /// `Absent`.
    pub fn submit_async(&self, request: RenderRequest) {
        let Some(queue) = &self.queue else { return };
        let key = (request.track, request.index);
        {
            let mut jobs = self.shared.jobs();
            match jobs.get(&key) {
                Some(JobState::Consumed) => {
                    debug_assert!(false, "render job resubmitted after consumption: {key:?}");
                    tracing::debug!(?key, "ignoring resubmission of a consumed render job");
                    return;
                }
                Some(_) => return,
                None => {
                    jobs.insert(key, JobState::Pending);
                }
            }
        }
        if queue.send(QueuedJob { key, request }).is_err() {
            // Workers already shut down; roll the entry back.
            self.shared.jobs().remove(&key);
        }
    }

    /// Non-blocking poll for a job's result.
    ///
    /// `Ready` also transitions the job to consumed: the same bitmap is
    /// never handed out twice.
    pub fn try_get(&self, key: JobKey) -> TryGet {
        let mut jobs = self.shared.jobs();
        match jobs.get(&key) {
            None => TryGet::Absent,
            Some(JobState::Pending) => TryGet::Pending,
            Some(JobState::Consumed) => TryGet::Absent,
            Some(JobState::Ready(_)) => match jobs.insert(key, JobState::Consumed) {
                Some(JobState::Ready(bitmap)) => TryGet::Ready(bitmap),
                // Unreachable: the state was checked under the same lock.
                _ => TryGet::Absent,
            },
        }
    }

    /// Render and quantize on the calling thread, bypassing the queue.
    ///
    /// The forward-progress escape hatch: used when a needed job is still
    /// pending and the caller cannot wait, and as the only path when the
    /// pool is disabled. Failures downgrade to an empty bitmap and are
    /// counted, never propagated.
    pub fn render_sync(&self, request: &RenderRequest) -> Bitmap {
        execute_request(
            self.shared.rasterizer.as_ref(),
            &self.shared.palettes,
            request,
            &self.shared.counters,
        )
    }

    /// Drain and join the workers.
    ///
    /// In-flight jobs finish; queued-but-not-started jobs are discarded.
    /// Idempotent, and also invoked on drop so the pool never outlives the
    /// resources the external rasterizer depends on.
    pub fn shutdown(&mut self) {
        if self.queue.is_none() && self.workers.is_empty() {
            return;
        }
        self.shared.stop.store(true, Ordering::SeqCst);
        // Dropping the sender disconnects the channel; workers drain and exit.
        self.queue = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("render worker panicked during shutdown");
            }
        }
    }
}

impl Drop for RenderWorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &PoolShared, rx: &Mutex<mpsc::Receiver<QueuedJob>>) {
    loop {
        let next = {
            let rx = rx.lock().unwrap_or_else(PoisonError::into_inner);
            rx.recv()
        };
        let Ok(job) = next else { break };

        if shared.stop.load(Ordering::SeqCst) {
            // Shutdown discards jobs that never started.
            shared.jobs().remove(&job.key);
            continue;
        }

        let bitmap = execute_request(
            shared.rasterizer.as_ref(),
            &shared.palettes,
            &job.request,
            &shared.counters,
        );

        let mut jobs = shared.jobs();
        if let Some(state) = jobs.get_mut(&job.key)
            && matches!(state, JobState::Pending)
        {
            *state = JobState::Ready(bitmap);
        }
    }
}

/// One render-and-quantize step, shared by workers and `render_sync`.
pub(crate) fn execute_request(
    rasterizer: &dyn Rasterizer,
    palettes: &PaletteCache,
    request: &RenderRequest,
    counters: &RenderCounters,
) -> Bitmap {
    let output = match rasterizer.render(request) {
        Ok(output) => output,
        Err(err) => {
            tracing::warn!(
                track = request.track.0,
                cue = request.index.0,
                %err,
                "rasterizer failed, cue degrades to empty content"
            );
            counters.record_render_failure();
            return Bitmap::empty();
        }
    };

    let palette = palettes.get_or_build(request.palette_mode);
    match quantize(&output, &palette) {
        Ok(q) => {
            counters.record_tiles_skipped(q.tiles_skipped);
            q.bitmap
        }
        Err(err) => {
            tracing::warn!(
                track = request.track.0,
                cue = request.index.0,
                %err,
                "quantization failed, cue degrades to empty content"
            );
            counters.record_quantize_failure();
            Bitmap::empty()
        }
    }
}
