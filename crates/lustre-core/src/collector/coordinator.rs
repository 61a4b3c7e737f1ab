//! Scrape coordinator: bounds concurrent collection rounds and coalesces
//! requests that arrive close together.
//!
//! Every request ends up waiting on exactly one round:
//!
//! 1. the last completed round, if it finished within the freshness window;
//! 2. otherwise a new round, if fewer than `max_rounds` are running;
//! 3. otherwise the oldest running round.
//!
//! A round fans out one thread per source and completes when every source
//! has reported (or timed out). Sources fail independently.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::collector::error::CollectError;
use crate::collector::source::Source;
use crate::config::SchedulerConfig;
use crate::metric::MetricRecord;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of one source within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    /// Value of the `result` label.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

/// Per-source outcome of a round.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: String,
    pub outcome: Outcome,
    pub duration: Duration,
    pub error: Option<String>,
    pub records: usize,
}

/// Everything a completed round produced.
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcomes: Vec<SourceOutcome>,
    /// Records of all successful sources, in source order.
    pub records: Vec<MetricRecord>,
}

impl RoundReport {
    pub fn failed_sources(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == Outcome::Error)
            .count()
    }
}

#[derive(Debug)]
enum RoundState {
    Created,
    Running,
    Completed(Arc<RoundReport>),
}

struct Round {
    id: u64,
    created_at: DateTime<Utc>,
    state: Mutex<RoundState>,
    done: Condvar,
}

impl Round {
    fn new(id: u64) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            state: Mutex::new(RoundState::Created),
            done: Condvar::new(),
        }
    }

    fn set_running(&self) {
        *lock(&self.state) = RoundState::Running;
    }

    fn complete(&self, report: Arc<RoundReport>) {
        *lock(&self.state) = RoundState::Completed(report);
        self.done.notify_all();
    }

    /// Blocks until the round completes.
    fn wait(&self) -> Arc<RoundReport> {
        let mut state = lock(&self.state);
        loop {
            if let RoundState::Completed(report) = &*state {
                return Arc::clone(report);
            }
            state = self
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct Finished {
    at: Instant,
    report: Arc<RoundReport>,
}

#[derive(Default)]
struct CoordinatorState {
    /// Running rounds, oldest first.
    running: Vec<Arc<Round>>,
    last: Option<Finished>,
    next_id: u64,
    rounds_started: u64,
    peak_running: usize,
}

struct Inner {
    sources: Vec<Arc<dyn Source>>,
    config: SchedulerConfig,
    state: Mutex<CoordinatorState>,
}

/// Keeps a round in the running set while its round thread or any of its
/// source threads is alive. A timed-out source still reading the
/// filesystem therefore keeps occupying one of the `max_rounds` places.
struct RoundSlot {
    inner: Arc<Inner>,
    round: Arc<Round>,
}

impl Drop for RoundSlot {
    fn drop(&mut self) {
        let mut state = lock(&self.inner.state);
        state.running.retain(|r| !Arc::ptr_eq(r, &self.round));
    }
}

/// Message from a source thread: source index, result, elapsed time.
type SourceMessage = (usize, Result<Vec<MetricRecord>, String>, Duration);

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn run_round(slot: Arc<RoundSlot>) {
    let inner = Arc::clone(&slot.inner);
    let round = Arc::clone(&slot.round);
    round.set_running();
    let started = Instant::now();
    let started_at = Utc::now();
    debug!(round = round.id, sources = inner.sources.len(), "round started");

    let outcomes = inner.collect_sources(started, &slot);

    let mut records = Vec::new();
    let mut summaries = Vec::with_capacity(outcomes.len());
    for (outcome, found) in outcomes {
        records.extend(found);
        summaries.push(outcome);
    }

    let report = Arc::new(RoundReport {
        id: round.id,
        created_at: round.created_at,
        started_at,
        finished_at: Utc::now(),
        duration: started.elapsed(),
        outcomes: summaries,
        records,
    });
    debug!(
        round = report.id,
        records = report.records.len(),
        failed = report.failed_sources(),
        duration_ms = report.duration.as_millis() as u64,
        "round completed"
    );

    // Publish before waking the callers, so a caller that comes straight
    // back finds this round fresh.
    {
        let mut state = lock(&inner.state);
        let newer = state
            .last
            .as_ref()
            .is_none_or(|last| last.report.id < report.id);
        if newer {
            state.last = Some(Finished {
                at: Instant::now(),
                report: Arc::clone(&report),
            });
        } else {
            debug!(round = report.id, "newer round already published");
        }
    }
    drop(slot);

    round.complete(report);
}

impl Inner {
    /// Runs every source on its own thread and gathers the results in
    /// source order. Each source thread holds `slot` until its scan ends.
    fn collect_sources(
        &self,
        started: Instant,
        slot: &Arc<RoundSlot>,
    ) -> Vec<(SourceOutcome, Vec<MetricRecord>)> {
        let (tx, rx) = mpsc::channel::<SourceMessage>();
        let mut slots: Vec<Option<(SourceOutcome, Vec<MetricRecord>)>> =
            self.sources.iter().map(|_| None).collect();
        let mut expected = 0;

        for (index, source) in self.sources.iter().enumerate() {
            let tx = tx.clone();
            let thread_source = Arc::clone(source);
            let scan = Arc::clone(slot);
            let spawned = thread::Builder::new()
                .name(format!("lustre-{}", source.name()))
                .spawn(move || {
                    let begin = Instant::now();
                    let result = catch_unwind(AssertUnwindSafe(|| thread_source.collect()))
                        .unwrap_or_else(|payload| {
                            Err(CollectError::Panic(panic_message(&*payload)))
                        })
                        .map_err(|e| e.to_string());
                    let elapsed = begin.elapsed();
                    drop(scan);
                    // The round may have given up on us already.
                    let _ = tx.send((index, result, elapsed));
                });
            match spawned {
                Ok(_) => expected += 1,
                Err(e) => {
                    error!(source = source.name(), error = %e, "failed to spawn source thread");
                    slots[index] = Some(failure(source.name(), Duration::ZERO, e.to_string()));
                }
            }
        }
        drop(tx);

        let deadline = self.config.source_timeout.map(|t| started + t);
        let mut timed_out = false;
        while expected > 0 {
            let message = match deadline {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(wait) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) => {
                            timed_out = true;
                            break;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };
            expected -= 1;

            let (index, result, duration) = message;
            let name = self.sources[index].name();
            slots[index] = Some(match result {
                Ok(records) => {
                    debug!(source = name, records = records.len(), duration_ms = duration.as_millis() as u64, "source succeeded");
                    (
                        SourceOutcome {
                            source: name.to_string(),
                            outcome: Outcome::Success,
                            duration,
                            error: None,
                            records: records.len(),
                        },
                        records,
                    )
                }
                Err(message) => {
                    error!(source = name, duration_secs = duration.as_secs_f64(), error = %message, "source failed");
                    failure(name, duration, message)
                }
            });
        }

        let elapsed = started.elapsed();
        slots
            .into_iter()
            .zip(&self.sources)
            .map(|(slot, source)| {
                slot.unwrap_or_else(|| {
                    let message = if timed_out {
                        format!("timed out after {:.3}s", elapsed.as_secs_f64())
                    } else {
                        "source thread exited without a result".to_string()
                    };
                    warn!(source = source.name(), error = %message, "source failed");
                    failure(source.name(), elapsed, message)
                })
            })
            .collect()
    }
}

fn failure(
    source: &str,
    duration: Duration,
    message: String,
) -> (SourceOutcome, Vec<MetricRecord>) {
    (
        SourceOutcome {
            source: source.to_string(),
            outcome: Outcome::Error,
            duration,
            error: Some(message),
            records: 0,
        },
        Vec::new(),
    )
}

/// Coalescing scheduler in front of a fixed set of sources.
///
/// Cheap to clone; clones share rounds and state.
#[derive(Clone)]
pub struct ScrapeCoordinator {
    inner: Arc<Inner>,
}

impl ScrapeCoordinator {
    pub fn new(sources: Vec<Arc<dyn Source>>, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sources,
                config,
                state: Mutex::new(CoordinatorState::default()),
            }),
        }
    }

    /// Returns a report no older than the freshness window, collecting a new
    /// one or joining a running round as needed. Blocks until available.
    pub fn collect(&self) -> Arc<RoundReport> {
        let (round, start) = {
            let mut state = lock(&self.inner.state);

            if let Some(last) = &state.last {
                if last.at.elapsed() < self.inner.config.freshness {
                    debug!(round = last.report.id, "serving fresh round");
                    return Arc::clone(&last.report);
                }
            }

            if state.running.len() < self.inner.config.max_rounds.max(1) {
                state.next_id += 1;
                let round = Arc::new(Round::new(state.next_id));
                state.running.push(Arc::clone(&round));
                state.rounds_started += 1;
                state.peak_running = state.peak_running.max(state.running.len());
                (round, true)
            } else {
                let oldest = Arc::clone(&state.running[0]);
                debug!(round = oldest.id, "attaching to running round");
                (oldest, false)
            }
        };

        if start {
            self.start(&round);
        }
        round.wait()
    }

    fn start(&self, round: &Arc<Round>) {
        let slot = Arc::new(RoundSlot {
            inner: Arc::clone(&self.inner),
            round: Arc::clone(round),
        });
        let thread_slot = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name(format!("lustre-round-{}", round.id))
            .spawn(move || run_round(thread_slot));
        if let Err(e) = spawned {
            warn!(round = round.id, error = %e, "failed to spawn round thread, collecting inline");
            run_round(slot);
        }
    }

    /// Names of the configured sources.
    pub fn source_names(&self) -> Vec<String> {
        self.inner
            .sources
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Last completed round, if any.
    pub fn last_report(&self) -> Option<Arc<RoundReport>> {
        lock(&self.inner.state)
            .last
            .as_ref()
            .map(|f| Arc::clone(&f.report))
    }

    pub fn rounds_started(&self) -> u64 {
        lock(&self.inner.state).rounds_started
    }

    /// Most rounds ever running at the same time.
    pub fn peak_running(&self) -> usize {
        lock(&self.inner.state).peak_running
    }

    /// Rounds holding a running place. A completed round keeps its place
    /// until its timed-out sources stop reading.
    pub fn running(&self) -> usize {
        lock(&self.inner.state).running.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::source::build_sources;
    use crate::config::CollectorConfig;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behaviour {
        Ok,
        Fail,
        Panic,
    }

    struct FakeSource {
        name: &'static str,
        delay: Duration,
        /// Per-call delays overriding `delay` for the first calls.
        delays: Vec<Duration>,
        behaviour: Behaviour,
        calls: AtomicUsize,
        active: AtomicUsize,
        peak_active: AtomicUsize,
    }

    impl FakeSource {
        fn new(name: &'static str, delay: Duration, behaviour: Behaviour) -> Arc<Self> {
            Self::sequenced(name, delay, Vec::new(), behaviour)
        }

        fn sequenced(
            name: &'static str,
            delay: Duration,
            delays: Vec<Duration>,
            behaviour: Behaviour,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                delay,
                delays,
                behaviour,
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                peak_active: AtomicUsize::new(0),
            })
        }
    }

    impl Source for FakeSource {
        fn name(&self) -> &str {
            self.name
        }

        fn collect(&self) -> Result<Vec<MetricRecord>, CollectError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_active.fetch_max(active, Ordering::SeqCst);
            thread::sleep(self.delays.get(call).copied().unwrap_or(self.delay));
            self.active.fetch_sub(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Ok => Ok(vec![MetricRecord::new(self.name, "help", 1.0)]),
                Behaviour::Fail => Err(CollectError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "denied",
                ))),
                Behaviour::Panic => panic!("boom"),
            }
        }
    }

    fn config(max_rounds: usize, freshness: Duration) -> SchedulerConfig {
        SchedulerConfig {
            max_rounds,
            freshness,
            ..SchedulerConfig::default()
        }
    }

    #[test]
    fn test_fresh_round_is_reused() {
        let source = FakeSource::new("procfs", Duration::ZERO, Behaviour::Ok);
        let coordinator = ScrapeCoordinator::new(
            vec![source.clone()],
            config(4, Duration::from_secs(60)),
        );

        let first = coordinator.collect();
        let second = coordinator.collect();
        assert_eq!(first.id, second.id);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.rounds_started(), 1);
    }

    #[test]
    fn test_stale_round_is_recollected() {
        let source = FakeSource::new("procfs", Duration::ZERO, Behaviour::Ok);
        let coordinator = ScrapeCoordinator::new(vec![source.clone()], config(4, Duration::ZERO));

        let first = coordinator.collect();
        let second = coordinator.collect();
        assert_ne!(first.id, second.id);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_attaches_to_running_round() {
        let source = FakeSource::new("procfs", Duration::from_millis(300), Behaviour::Ok);
        let coordinator = ScrapeCoordinator::new(vec![source.clone()], config(1, Duration::ZERO));

        let background = coordinator.clone();
        let first = thread::spawn(move || background.collect());
        thread::sleep(Duration::from_millis(50));
        let second = coordinator.collect();

        assert_eq!(first.join().unwrap().id, second.id);
        assert_eq!(coordinator.rounds_started(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrency_ceiling() {
        let source = FakeSource::new("procfs", Duration::from_millis(100), Behaviour::Ok);
        let coordinator = ScrapeCoordinator::new(vec![source], config(2, Duration::ZERO));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    coordinator.collect()
                })
            })
            .collect();

        for handle in handles {
            let report = handle.join().unwrap();
            assert_eq!(report.records.len(), 1);
        }
        assert!(coordinator.peak_running() <= 2);
        assert!(coordinator.peak_running() >= 1);
        assert_eq!(coordinator.running(), 0);
    }

    #[test]
    fn test_failing_source_is_isolated() {
        let good = FakeSource::new("procfs", Duration::ZERO, Behaviour::Ok);
        let bad = FakeSource::new("sysfs", Duration::ZERO, Behaviour::Fail);
        let coordinator = ScrapeCoordinator::new(vec![good, bad], config(4, Duration::ZERO));

        let report = coordinator.collect();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].outcome, Outcome::Success);
        assert_eq!(report.outcomes[0].records, 1);
        assert_eq!(report.outcomes[1].outcome, Outcome::Error);
        assert!(report.outcomes[1].error.as_deref().unwrap().contains("denied"));
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].name, "procfs");
        assert_eq!(report.failed_sources(), 1);
    }

    #[test]
    fn test_panicking_source_is_isolated() {
        let good = FakeSource::new("procfs", Duration::ZERO, Behaviour::Ok);
        let bad = FakeSource::new("procsys", Duration::ZERO, Behaviour::Panic);
        let coordinator = ScrapeCoordinator::new(vec![good, bad], config(4, Duration::ZERO));

        let report = coordinator.collect();
        assert_eq!(report.outcomes[0].outcome, Outcome::Success);
        assert_eq!(report.outcomes[1].outcome, Outcome::Error);
        assert!(report.outcomes[1].error.as_deref().unwrap().contains("panicked: boom"));
    }

    #[test]
    fn test_source_timeout() {
        let fast = FakeSource::new("procfs", Duration::ZERO, Behaviour::Ok);
        let slow = FakeSource::new("sysfs", Duration::from_secs(2), Behaviour::Ok);
        let coordinator = ScrapeCoordinator::new(
            vec![fast, slow],
            SchedulerConfig {
                source_timeout: Some(Duration::from_millis(100)),
                ..config(4, Duration::ZERO)
            },
        );

        let begin = Instant::now();
        let report = coordinator.collect();
        assert!(begin.elapsed() < Duration::from_secs(2));
        assert_eq!(report.outcomes[0].outcome, Outcome::Success);
        assert_eq!(report.outcomes[1].outcome, Outcome::Error);
        assert!(report.outcomes[1].error.as_deref().unwrap().contains("timed out"));
        assert_eq!(report.records.len(), 1);
    }

    #[test]
    fn test_round_published_before_callers_return() {
        let source = FakeSource::new("procfs", Duration::ZERO, Behaviour::Ok);
        let coordinator = ScrapeCoordinator::new(vec![source], config(4, Duration::ZERO));

        for _ in 0..50 {
            let report = coordinator.collect();
            assert_eq!(coordinator.last_report().unwrap().id, report.id);
            assert_eq!(coordinator.running(), 0);
        }
    }

    #[test]
    fn test_returning_callers_reuse_fresh_round_under_contention() {
        let source = FakeSource::new("procfs", Duration::from_millis(20), Behaviour::Ok);
        let coordinator =
            ScrapeCoordinator::new(vec![source.clone()], config(4, Duration::from_secs(60)));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let first = coordinator.collect();
                    let last = coordinator.last_report().unwrap();
                    assert!(last.id >= first.id);
                    for _ in 0..5 {
                        assert!(coordinator.collect().id >= last.id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(coordinator.rounds_started() <= 4);
        assert_eq!(
            source.calls.load(Ordering::SeqCst) as u64,
            coordinator.rounds_started()
        );
        assert_eq!(coordinator.running(), 0);
    }

    #[test]
    fn test_timed_out_scan_keeps_its_place() {
        let source = FakeSource::new("procfs", Duration::from_millis(300), Behaviour::Ok);
        let coordinator = ScrapeCoordinator::new(
            vec![source.clone()],
            SchedulerConfig {
                source_timeout: Some(Duration::from_millis(30)),
                ..config(1, Duration::ZERO)
            },
        );

        for _ in 0..4 {
            let report = coordinator.collect();
            assert_eq!(report.id, 1);
            assert_eq!(report.outcomes[0].outcome, Outcome::Error);
        }
        assert_eq!(source.peak_active.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.rounds_started(), 1);
        assert_eq!(coordinator.running(), 1);

        thread::sleep(Duration::from_millis(600));
        assert_eq!(coordinator.running(), 0);
        assert_eq!(coordinator.collect().id, 2);
    }

    #[test]
    fn test_older_round_does_not_replace_newer() {
        let source = FakeSource::sequenced(
            "procfs",
            Duration::ZERO,
            vec![Duration::from_millis(300)],
            Behaviour::Ok,
        );
        let coordinator =
            ScrapeCoordinator::new(vec![source], config(2, Duration::from_secs(60)));

        let background = coordinator.clone();
        let slow = thread::spawn(move || background.collect());
        thread::sleep(Duration::from_millis(50));
        let fast = coordinator.collect();
        assert_eq!(fast.id, 2);

        assert_eq!(slow.join().unwrap().id, 1);
        assert_eq!(coordinator.last_report().unwrap().id, 2);
        assert_eq!(coordinator.collect().id, 2);
    }

    #[test]
    fn test_no_sources() {
        let coordinator = ScrapeCoordinator::new(Vec::new(), SchedulerConfig::default());
        let report = coordinator.collect();
        assert!(report.outcomes.is_empty());
        assert!(report.records.is_empty());
        assert_eq!(coordinator.last_report().unwrap().id, report.id);
    }

    #[test]
    fn test_fresh_round_causes_no_reads() {
        let fs = MockFs::lustre_server();
        let sources = build_sources(Arc::new(fs.clone()), &CollectorConfig::default(), 8);
        assert_eq!(sources.len(), 3);
        let coordinator = ScrapeCoordinator::new(sources, config(4, Duration::from_secs(60)));

        let first = coordinator.collect();
        assert_eq!(first.failed_sources(), 0);
        let reads = fs.read_count();
        assert!(reads > 0);

        for _ in 0..5 {
            let again = coordinator.collect();
            assert_eq!(again.id, first.id);
        }
        assert_eq!(fs.read_count(), reads);
    }

    #[test]
    fn test_unreadable_file_fails_only_its_source() {
        let mut fs = MockFs::lustre_server();
        fs.add_unreadable("/proc/fs/lustre/obdfilter/lustre-OST0000/kbytestotal");
        let sources = build_sources(Arc::new(fs), &CollectorConfig::default(), 8);
        let coordinator = ScrapeCoordinator::new(sources, config(4, Duration::ZERO));

        let report = coordinator.collect();
        for outcome in &report.outcomes {
            let expected = if outcome.source == "procfs" {
                Outcome::Error
            } else {
                Outcome::Success
            };
            assert_eq!(outcome.outcome, expected, "{}", outcome.source);
        }
        assert!(report.records.iter().any(|r| r.name == "send_count_total"));
        assert!(!report.records.iter().any(|r| r.name == "capacity_kilobytes"));
    }
}
