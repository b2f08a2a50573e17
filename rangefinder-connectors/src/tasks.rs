//! One-in-flight subsystem workers
//!
//! Neural inference, object detection and terrain ray casting are too slow to
//! run on every frame. Each runs behind an [`InFlightWorker`] that accepts at
//! most one job at a time and publishes its latest result for the frame loop
//! to reuse:
//!
//! ```text
//!   submit ──▶ cancelled? ──yes──▶ Err(Cancelled)
//!                 │ no
//!                 ▼
//!              in flight? ──yes──▶ WouldBlock
//!                 │ no
//!                 ▼
//!              rate gate open? ──no──▶ WouldBlock
//!                 │ yes
//!                 ▼
//!              queue (capacity 1) ──▶ run ──▶ cancelled? ──no──▶ watch::send
//! ```
//!
//! `submit` never waits, so it can be called straight from the frame path.
//! Results carry the timestamp of the input they were computed from so the
//! caller can judge staleness.
//!
//! | worker  | default rate |
//! |---------|--------------|
//! | neural  | 15 Hz        |
//! | objects | 5 Hz         |
//! | terrain | 2 Hz         |

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use rangefinder_core::pipeline::CancellationToken;
use rangefinder_core::terrain::{ElevationSource, RayQuery, TerrainRayCaster};
use rangefinder_core::time::{RateGate, Timestamp};
use rangefinder_core::types::TerrainRayResult;

use crate::ConnectorError;

/// Neural inference cadence
pub const NEURAL_RATE_HZ: f64 = 15.0;

/// Object detection cadence
pub const OBJECT_RATE_HZ: f64 = 5.0;

/// Terrain ray casting cadence
pub const TERRAIN_RATE_HZ: f64 = 2.0;

/// Work executed by an [`InFlightWorker`]
///
/// Implementations check `cancel` between their own steps and return
/// [`ConnectorError::Cancelled`] when they stop early.
#[async_trait]
pub trait FrameTask: Send + Sync + 'static {
    /// Job payload
    type Input: Send + 'static;
    /// Published result
    type Output: Clone + Send + Sync + 'static;

    /// Run one job
    async fn run(&self, input: Self::Input, cancel: &CancellationToken) -> Result<Self::Output, ConnectorError>;
}

/// Wraps a blocking closure so it runs on tokio's blocking pool
pub struct BlockingTask<I, O> {
    f: Arc<dyn Fn(I) -> Result<O, ConnectorError> + Send + Sync>,
}

impl<I, O> BlockingTask<I, O> {
    /// Task from a blocking closure
    pub fn new(f: impl Fn(I) -> Result<O, ConnectorError> + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }
}

#[async_trait]
impl<I, O> FrameTask for BlockingTask<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    type Input = I;
    type Output = O;

    async fn run(&self, input: I, cancel: &CancellationToken) -> Result<O, ConnectorError> {
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        let f = Arc::clone(&self.f);
        let output = tokio::task::spawn_blocking(move || f(input))
            .await
            .map_err(|e| ConnectorError::Task(e.to_string()))??;
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        Ok(output)
    }
}

/// Terrain ray casting against a shared elevation source
///
/// This is where remote or disk-backed sources belong. The frame pipeline only
/// casts against resident tiles; hand the published result to the next frame
/// with `FrameInput::with_terrain`.
pub struct TerrainCastTask {
    caster: Arc<TerrainRayCaster>,
    source: Arc<dyn ElevationSource>,
}

impl TerrainCastTask {
    /// Cast with `caster` against `source`
    pub fn new(caster: TerrainRayCaster, source: Arc<dyn ElevationSource>) -> Self {
        Self {
            caster: Arc::new(caster),
            source,
        }
    }
}

#[async_trait]
impl FrameTask for TerrainCastTask {
    type Input = RayQuery;
    type Output = Option<TerrainRayResult>;

    async fn run(&self, query: RayQuery, cancel: &CancellationToken) -> Result<Self::Output, ConnectorError> {
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        let caster = Arc::clone(&self.caster);
        let source = Arc::clone(&self.source);
        let result = tokio::task::spawn_blocking(move || caster.cast(source.as_ref(), &query))
            .await
            .map_err(|e| ConnectorError::Task(e.to_string()))?;
        if cancel.is_cancelled() {
            return Err(ConnectorError::Cancelled);
        }
        Ok(result)
    }
}

/// Worker settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name used in log lines
    pub name: String,
    /// Minimum time between accepted submissions (ms)
    pub min_interval_ms: u64,
}

impl WorkerConfig {
    /// Worker admitting at most `hz` jobs per second
    pub fn new(name: impl Into<String>, hz: f64) -> Self {
        Self {
            name: name.into(),
            min_interval_ms: RateGate::from_hz(hz).interval_ms(),
        }
    }

    /// Neural depth inference
    pub fn neural() -> Self {
        Self::new("neural", NEURAL_RATE_HZ)
    }

    /// Object detection
    pub fn objects() -> Self {
        Self::new("objects", OBJECT_RATE_HZ)
    }

    /// Terrain ray casting
    pub fn terrain() -> Self {
        Self::new("terrain", TERRAIN_RATE_HZ)
    }

    /// Override the minimum interval
    pub fn min_interval_ms(mut self, ms: u64) -> Self {
        self.min_interval_ms = ms;
        self
    }
}

/// A published result and the input it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    /// Result value
    pub value: T,
    /// Timestamp of the submitted input
    pub timestamp: Timestamp,
    /// Submission sequence number, starting at 1
    pub sequence: u64,
}

/// Worker counters
#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    /// Jobs accepted by `submit`
    pub submitted: u64,
    /// Results published
    pub completed: u64,
    /// Jobs that ended in an error
    pub failed: u64,
    /// Jobs abandoned after cancellation
    pub cancelled: u64,
    /// Submissions refused because a job was in flight
    pub skipped_busy: u64,
    /// Submissions refused by the rate gate
    pub skipped_rate: u64,
    /// Last task error
    pub last_error: Option<String>,
}

struct Job<I> {
    input: I,
    timestamp: Timestamp,
    sequence: u64,
}

/// Bounded, rate-limited, one-job-at-a-time worker
pub struct InFlightWorker<T: FrameTask> {
    name: String,
    queue: mpsc::Sender<Job<T::Input>>,
    latest: watch::Receiver<Option<Stamped<T::Output>>>,
    gate: Mutex<RateGate>,
    in_flight: Arc<AtomicBool>,
    sequence: AtomicU64,
    cancel: CancellationToken,
    stats: Arc<Mutex<WorkerStats>>,
    handle: JoinHandle<()>,
}

impl<T: FrameTask> InFlightWorker<T> {
    /// Start a worker for `task` on `runtime`
    pub fn spawn(task: T, config: WorkerConfig, runtime: &Handle) -> Self {
        let (queue, jobs) = mpsc::channel(1);
        let (publish, latest) = watch::channel(None);
        let in_flight = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let stats = Arc::new(Mutex::new(WorkerStats::default()));

        let handle = runtime.spawn(run_loop(
            config.name.clone(),
            Arc::new(task),
            jobs,
            publish,
            Arc::clone(&in_flight),
            cancel.clone(),
            Arc::clone(&stats),
        ));

        Self {
            name: config.name,
            queue,
            latest,
            gate: Mutex::new(RateGate::new(config.min_interval_ms)),
            in_flight,
            sequence: AtomicU64::new(0),
            cancel,
            stats,
            handle,
        }
    }

    /// Worker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offer a job captured at `now`
    ///
    /// Returns the job's sequence number, `WouldBlock` when a job is already
    /// in flight or the rate gate is closed, and `Cancelled`/`Closed` once the
    /// worker has stopped.
    pub fn submit(&self, input: T::Input, now: Timestamp) -> nb::Result<u64, ConnectorError> {
        if self.cancel.is_cancelled() {
            return Err(nb::Error::Other(ConnectorError::Cancelled));
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.stats.lock().skipped_busy += 1;
            return Err(nb::Error::WouldBlock);
        }
        if self.gate.lock().try_acquire(now).is_err() {
            self.in_flight.store(false, Ordering::SeqCst);
            self.stats.lock().skipped_rate += 1;
            return Err(nb::Error::WouldBlock);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let job = Job {
            input,
            timestamp: now,
            sequence,
        };
        match self.queue.try_send(job) {
            Ok(()) => {
                self.stats.lock().submitted += 1;
                Ok(sequence)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.in_flight.store(false, Ordering::SeqCst);
                self.stats.lock().skipped_busy += 1;
                Err(nb::Error::WouldBlock)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.in_flight.store(false, Ordering::SeqCst);
                Err(nb::Error::Other(ConnectorError::Closed))
            }
        }
    }

    /// Most recent published result, reused until a fresh one lands
    pub fn latest(&self) -> Option<Stamped<T::Output>> {
        self.latest.borrow().clone()
    }

    /// Receiver notified on every publish
    pub fn subscribe(&self) -> watch::Receiver<Option<Stamped<T::Output>>> {
        self.latest.clone()
    }

    /// A job is queued or running
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().clone()
    }

    /// Token observed by the worker and its task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop accepting work; an in-flight job finishes without publishing
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the worker task to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let Self { queue, handle, name, .. } = self;
        drop(queue);
        if let Err(e) = handle.await {
            warn!("{} worker ended abnormally: {}", name, e);
        }
    }
}

async fn run_loop<T: FrameTask>(
    name: String,
    task: Arc<T>,
    mut jobs: mpsc::Receiver<Job<T::Input>>,
    publish: watch::Sender<Option<Stamped<T::Output>>>,
    in_flight: Arc<AtomicBool>,
    cancel: CancellationToken,
    stats: Arc<Mutex<WorkerStats>>,
) {
    while let Some(job) = jobs.recv().await {
        if cancel.is_cancelled() {
            stats.lock().cancelled += 1;
            in_flight.store(false, Ordering::SeqCst);
            break;
        }

        match task.run(job.input, &cancel).await {
            Ok(value) if !cancel.is_cancelled() => {
                publish.send_replace(Some(Stamped {
                    value,
                    timestamp: job.timestamp,
                    sequence: job.sequence,
                }));
                stats.lock().completed += 1;
                debug!("{} worker published #{}", name, job.sequence);
            }
            Ok(_) | Err(ConnectorError::Cancelled) => {
                stats.lock().cancelled += 1;
                debug!("{} worker dropped #{} after cancellation", name, job.sequence);
            }
            Err(e) => {
                warn!("{} worker job #{} failed: {}", name, job.sequence, e);
                let mut stats = stats.lock();
                stats.failed += 1;
                stats.last_error = Some(e.to_string());
            }
        }

        in_flight.store(false, Ordering::SeqCst);
        if cancel.is_cancelled() {
            break;
        }
    }
    debug!("{} worker stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rangefinder_core::config::TerrainConfig;
    use rangefinder_core::confidence::SourceConfidenceModel;
    use rangefinder_core::terrain::{ElevationTile, TileCache, TileKey};
    use rangefinder_core::types::GeoPoint;

    fn doubler(delay_ms: u64) -> BlockingTask<u32, u32> {
        BlockingTask::new(move |x: u32| {
            std::thread::sleep(Duration::from_millis(delay_ms));
            Ok(x * 2)
        })
    }

    async fn wait_idle<T: FrameTask>(worker: &InFlightWorker<T>) {
        for _ in 0..200 {
            if !worker.is_busy() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("worker never went idle");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn publishes_latest_result() {
        let worker = InFlightWorker::spawn(doubler(0), WorkerConfig::neural(), &Handle::current());
        assert!(worker.latest().is_none());

        let sequence = worker.submit(21, 1_000).unwrap();
        assert_eq!(sequence, 1);
        wait_idle(&worker).await;

        let latest = worker.latest().unwrap();
        assert_eq!(latest.value, 42);
        assert_eq!(latest.timestamp, 1_000);
        assert_eq!(latest.sequence, 1);

        // Reused until a fresh one lands
        assert_eq!(worker.latest(), Some(latest));
        assert_eq!(worker.stats().completed, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn busy_worker_refuses_without_waiting() {
        let config = WorkerConfig::new("slow", 1000.0).min_interval_ms(0);
        let worker = InFlightWorker::spawn(doubler(150), config, &Handle::current());

        assert!(worker.submit(1, 0).is_ok());
        assert!(matches!(worker.submit(2, 10), Err(nb::Error::WouldBlock)));
        assert!(worker.is_busy());

        wait_idle(&worker).await;
        assert_eq!(worker.latest().unwrap().value, 2);
        assert!(worker.submit(3, 20).is_ok());
        assert_eq!(worker.stats().skipped_busy, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rate_gate_spaces_submissions() {
        let worker = InFlightWorker::spawn(doubler(0), WorkerConfig::terrain(), &Handle::current());
        assert!(worker.submit(1, 0).is_ok());
        wait_idle(&worker).await;

        // 2 Hz: nothing before 500 ms
        assert!(matches!(worker.submit(2, 100), Err(nb::Error::WouldBlock)));
        assert!(!worker.is_busy());
        assert!(worker.submit(3, 500).is_ok());
        wait_idle(&worker).await;
        assert_eq!(worker.latest().unwrap().value, 6);
        assert_eq!(worker.stats().skipped_rate, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_job_publishes_nothing() {
        let config = WorkerConfig::new("slow", 1000.0).min_interval_ms(0);
        let worker = InFlightWorker::spawn(doubler(100), config, &Handle::current());

        assert!(worker.submit(5, 0).is_ok());
        worker.cancel();
        wait_idle(&worker).await;

        assert!(worker.latest().is_none());
        assert_eq!(worker.stats().cancelled, 1);
        assert!(matches!(
            worker.submit(6, 10),
            Err(nb::Error::Other(ConnectorError::Cancelled))
        ));
        worker.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failures_are_counted_not_published() {
        let task = BlockingTask::new(|_: ()| -> Result<u8, ConnectorError> {
            Err(ConnectorError::Task("model not loaded".into()))
        });
        let worker = InFlightWorker::spawn(task, WorkerConfig::objects(), &Handle::current());

        assert!(worker.submit((), 0).is_ok());
        wait_idle(&worker).await;

        let stats = worker.stats();
        assert_eq!(stats.failed, 1);
        assert!(stats.last_error.unwrap().contains("model not loaded"));
        assert!(worker.latest().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn terrain_worker_casts_off_the_frame_path() {
        let key = TileKey { lat: 37, lon: -122 };
        let cache = Arc::new(TileCache::default());
        cache.insert(ElevationTile::from_fn(key, 121, |_, _| 100.0).unwrap());

        let caster = TerrainRayCaster::new(TerrainConfig::default(), SourceConfidenceModel::default());
        let task = TerrainCastTask::new(caster, cache);
        let worker = InFlightWorker::spawn(task, WorkerConfig::terrain(), &Handle::current());

        let mut updates = worker.subscribe();
        let query = RayQuery::new(GeoPoint::new(37.5, -121.5, 140.0), 0.0, (-10f64).to_radians());
        assert!(worker.submit(query, 2_000).is_ok());

        tokio::time::timeout(Duration::from_secs(5), updates.changed())
            .await
            .unwrap()
            .unwrap();
        let hit = worker.latest().unwrap().value.unwrap();
        let expected = 40.0 / 10f64.to_radians().sin();
        assert!((hit.distance_m - expected).abs() < 3.0, "{}", hit.distance_m);
    }
}
