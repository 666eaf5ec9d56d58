//! Concurrent driver: one real worker per process.
//!
//! Workers run their policy's whole protocol against shared state (a
//! [`LockTable`] or a [`SharedBanker`]) and publish one [`WorkerMetrics`]
//! record through the telemetry channel when they stop.
//!
//! # Supervision
//!
//! - naive: a liveness monitor waits for every worker up to one shared
//!   deadline (`deadlock_timeout`); survivors are reported as deadlocked,
//!   aborted, and their holdings leak
//! - ordered, retry, banker: plain joins
//!
//! Time stamps on events are milliseconds since the driver started.

use crate::banker::{self, SharedBanker};
use crate::config::RunConfig;
use crate::error::ModelError;
use crate::events::{Event, EventKind, EventLog, EventSink};
use crate::locks::LockTable;
use crate::metrics::WorkerMetrics;
use crate::model::Resource;
use crate::policy::Policy;
use crate::report::{ConcurrentReport, LeakedResource};
use rand::Rng;
use serde_json::json;
use stalemate_env::{EnvError, ProcessId, ResourceId, RuntimeContext, TelemetryChannel, TelemetrySender, WorkerHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One worker of a concurrent scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub id: ProcessId,
    /// Resources in acquisition order (lock-based policies)
    pub plan: Vec<ResourceId>,
    /// Declared maximum claim per resource type (banker)
    pub claim: Vec<i64>,
}

impl WorkerSpec {
    pub fn with_plan(id: ProcessId, plan: Vec<ResourceId>) -> Self {
        Self {
            id,
            plan,
            claim: Vec::new(),
        }
    }

    pub fn with_claim(id: ProcessId, claim: Vec<i64>) -> Self {
        Self {
            id,
            plan: Vec::new(),
            claim,
        }
    }

    pub fn name(&self) -> String {
        self.id.to_string()
    }
}

/// Everything a concurrent run needs besides timing.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrentScenario {
    pub policy: Policy,
    pub resources: Vec<Resource>,
    pub workers: Vec<WorkerSpec>,
}

/// Shared state a worker contends on.
enum Arena {
    Locks(Arc<LockTable>),
    Banker(SharedBanker),
}

impl Arena {
    fn leaked(&self, resources: &[Resource]) -> Vec<LeakedResource> {
        match self {
            Arena::Locks(table) => table.leaked(),
            Arena::Banker(banker) => {
                let snapshot = banker.snapshot();
                let mut leaked = Vec::new();
                for (r, resource) in resources.iter().enumerate() {
                    for (p, row) in snapshot.allocation.iter().enumerate() {
                        if row.get(r).copied().unwrap_or(0) > 0 {
                            leaked.push(LeakedResource {
                                resource: resource.name.clone(),
                                holder: ProcessId::new(p).to_string(),
                            });
                        }
                    }
                }
                leaked
            }
        }
    }
}

/// Launches and supervises concurrent workers.
pub struct ConcurrentDriver<Ctx: RuntimeContext> {
    ctx: Arc<Ctx>,
    config: RunConfig,
    sink: EventLog,
}

impl<Ctx: RuntimeContext> ConcurrentDriver<Ctx> {
    pub fn new(ctx: Arc<Ctx>, config: RunConfig) -> Self {
        Self {
            ctx,
            config,
            sink: EventLog::new(),
        }
    }

    /// Uses an externally owned event log.
    pub fn with_sink(mut self, sink: EventLog) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs a scenario to completion (or to the liveness deadline).
    ///
    /// # Errors
    /// Only scenario construction fails; deadlocks, timeouts and lost
    /// telemetry are reported in the returned [`ConcurrentReport`].
    pub async fn run(&self, scenario: ConcurrentScenario) -> Result<ConcurrentReport, ModelError> {
        if scenario.workers.is_empty() {
            return Err(ModelError::NoProcesses);
        }
        if scenario.resources.is_empty() {
            return Err(ModelError::NoResources);
        }

        let mode = scenario.policy.name();
        let start = self.ctx.now();
        let names: Vec<String> = scenario.workers.iter().map(WorkerSpec::name).collect();

        let arena = match scenario.policy {
            Policy::Banker => {
                let claims: Vec<Vec<i64>> = scenario.workers.iter().map(|w| w.claim.clone()).collect();
                Arena::Banker(SharedBanker::with_claims(scenario.resources.clone(), &claims)?)
            }
            _ => {
                for worker in &scenario.workers {
                    if let Some(bad) = worker.plan.iter().find(|r| r.index() >= scenario.resources.len()) {
                        return Err(ModelError::UnknownResource(bad.to_string()));
                    }
                }
                Arena::Locks(Arc::new(LockTable::new(&scenario.resources)))
            }
        };

        let pool: Vec<String> = scenario
            .resources
            .iter()
            .map(|r| format!("{}={}", r.name, r.capacity))
            .collect();
        self.sink.emit(
            Event::new(
                0,
                EventKind::Start,
                format!("Running {} workers in mode '{}'; resources: {}", names.len(), mode, pool.join(", ")),
            )
            .with_data(json!({ "mode": mode, "workers": names.len() })),
        );

        // Telemetry provisioning failure is not fatal
        let mut channel = match TelemetryChannel::<WorkerMetrics>::open(self.telemetry_capacity(names.len())) {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!("Telemetry disabled: {}", e);
                self.sink.emit(Event::new(
                    stamp(self.ctx.as_ref(), start),
                    EventKind::Info,
                    format!("Telemetry disabled: {}", e),
                ));
                None
            }
        };
        let telemetry_lost = channel.is_none();

        let mut handles = Vec::with_capacity(scenario.workers.len());
        for spec in &scenario.workers {
            let worker = Worker {
                ctx: Arc::clone(&self.ctx),
                start,
                id: spec.id,
                name: spec.name(),
                config: self.config.clone(),
                sink: self.sink.clone(),
                telemetry: channel
                    .as_ref()
                    .map(TelemetryChannel::sender)
                    .unwrap_or_else(TelemetrySender::disabled),
            };
            let handle = match (&arena, scenario.policy) {
                (Arena::Banker(banker), _) => {
                    let banker = banker.clone();
                    let claim = spec.claim.clone();
                    self.ctx.spawn(&worker.name.clone(), async move { worker.run_banker(banker, claim).await })
                }
                (Arena::Locks(table), Policy::Retry(_)) => {
                    let table = Arc::clone(table);
                    let plan = spec.plan.clone();
                    self.ctx.spawn(&worker.name.clone(), async move { worker.run_retry(table, plan).await })
                }
                (Arena::Locks(table), policy) => {
                    let table = Arc::clone(table);
                    let mut plan = spec.plan.clone();
                    if policy.is_ordered() {
                        plan.sort();
                    }
                    self.ctx.spawn(&worker.name.clone(), async move { worker.run_locking(table, plan).await })
                }
            };
            handles.push(handle);
        }
        if self.config.progress {
            info!("[progress] {} workers started", handles.len());
        }

        let deadlocked = match scenario.policy {
            Policy::Naive => self.monitor_liveness(handles, start).await,
            _ => {
                self.join_all(handles).await;
                Vec::new()
            }
        };

        let reported = channel.as_mut().map(TelemetryChannel::drain).unwrap_or_default();
        let missing: Vec<String> = names
            .iter()
            .filter(|name| !reported.iter().any(|m| &m.name == *name))
            .cloned()
            .collect();
        let mut metrics = reported;
        for name in &deadlocked {
            if !metrics.iter().any(|m| &m.name == name) {
                metrics.push(WorkerMetrics::error(name.clone(), 0));
            }
        }
        if telemetry_lost {
            warn!("Telemetry was lost for this run; only supervisor-side results are reported");
        }

        let leaked = arena.leaked(&scenario.resources);
        let elapsed = self.ctx.now().saturating_sub(start);
        self.sink.emit(Event::new(
            stamp(self.ctx.as_ref(), start),
            EventKind::Finish,
            format!("Mode '{}' finished in {:.3}s", mode, elapsed.as_secs_f64()),
        ));

        Ok(ConcurrentReport {
            mode: mode.to_string(),
            duration: (elapsed.as_secs_f64() * 1000.0).round() / 1000.0,
            metrics,
            missing,
            deadlocked,
            leaked,
            telemetry_lost,
            events: self.sink.snapshot(),
        })
    }

    fn telemetry_capacity(&self, workers: usize) -> usize {
        match self.config.telemetry_capacity {
            0 => 0,
            capacity => capacity.max(workers),
        }
    }

    /// Waits for every worker up to one shared deadline and aborts the rest.
    ///
    /// Returns the names of the workers that had to be aborted.
    async fn monitor_liveness(&self, handles: Vec<WorkerHandle>, start: Duration) -> Vec<String> {
        let deadline = start + self.config.deadlock_timeout;
        let total = handles.len();
        let mut completed = 0;
        let mut survivors = Vec::new();

        for mut handle in handles {
            let remaining = deadline.saturating_sub(self.ctx.now());
            match handle.join_timeout(remaining).await {
                Ok(()) => {
                    completed += 1;
                    self.report_progress(completed, total);
                }
                Err(EnvError::Timeout(_)) => survivors.push(handle),
                Err(e) => {
                    error!("{}", e);
                    completed += 1;
                    self.report_progress(completed, total);
                }
            }
        }

        if survivors.is_empty() {
            info!("All workers finished before the {:?} deadline", self.config.deadlock_timeout);
            return Vec::new();
        }

        let names: Vec<String> = survivors.iter().map(|h| h.name().to_string()).collect();
        self.sink.emit(
            Event::new(
                stamp(self.ctx.as_ref(), start),
                EventKind::Deadlock,
                format!(
                    "Deadlock detected: workers {:?} still alive after {:.1}s",
                    names,
                    self.config.deadlock_timeout.as_secs_f64()
                ),
            )
            .with_data(json!({ "deadlocked": names })),
        );
        for handle in survivors {
            handle.abort_and_wait().await;
            completed += 1;
            self.report_progress(completed, total);
        }
        warn!("Terminated {} stuck workers; their resources stay held", names.len());
        names
    }

    async fn join_all(&self, handles: Vec<WorkerHandle>) {
        let total = handles.len();
        for (idx, mut handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.join().await {
                error!("{}", e);
            }
            self.report_progress(idx + 1, total);
        }
    }

    fn report_progress(&self, completed: usize, total: usize) {
        if self.config.progress {
            info!("[progress] {}/{} workers finished", completed, total);
        }
    }
}

/// Milliseconds since `start` on the context clock.
fn stamp<Ctx: RuntimeContext>(ctx: &Ctx, start: Duration) -> u64 {
    u64::try_from(ctx.now().saturating_sub(start).as_millis()).unwrap_or(u64::MAX)
}

/// Per-worker state moved into the spawned task.
struct Worker<Ctx: RuntimeContext> {
    ctx: Arc<Ctx>,
    start: Duration,
    id: ProcessId,
    name: String,
    config: RunConfig,
    sink: EventLog,
    telemetry: TelemetrySender<WorkerMetrics>,
}

impl<Ctx: RuntimeContext> Worker<Ctx> {
    fn emit(&self, kind: EventKind, message: String, data: serde_json::Value) {
        let t = stamp(self.ctx.as_ref(), self.start);
        self.sink
            .emit(Event::new(t, kind, format!("[{}] {}", self.name, message)).with_data(data));
    }

    async fn finish(&self, started: Duration, retries: u32, wait: Duration) {
        let duration = self.ctx.now().saturating_sub(started);
        let record = WorkerMetrics::ok(self.name.clone(), retries, duration.as_secs_f64(), wait.as_secs_f64());
        self.telemetry.publish(record).await;
    }

    async fn fail(&self, retries: u32) {
        self.telemetry
            .publish(WorkerMetrics::error(self.name.clone(), retries))
            .await;
    }

    /// Naive and ordered protocol: take each resource in plan order, holding
    /// each for `hold_time`, then release in reverse.
    async fn run_locking(self, table: Arc<LockTable>, plan: Vec<ResourceId>) {
        let started = self.ctx.now();
        let mut wait = Duration::ZERO;

        for &resource in &plan {
            let lock = match table.lock(resource) {
                Ok(lock) => lock,
                Err(e) => {
                    error!("[{}] {}", self.name, e);
                    return self.fail(0).await;
                }
            };
            debug!("[{}] needs {}", self.name, lock.name());
            let before = self.ctx.now();
            if let Err(e) = lock.acquire(self.id).await {
                error!("[{}] {}", self.name, e);
                return self.fail(0).await;
            }
            wait += self.ctx.now().saturating_sub(before);
            self.emit(
                EventKind::Acquire,
                format!("acquired {}, working", lock.name()),
                json!({ "pid": self.name, "resource": lock.name() }),
            );
            self.ctx.sleep(self.config.hold_time).await;
        }

        release_locks(&self, &table, &plan);
        self.emit(EventKind::Complete, "released everything and finished".to_string(), json!({ "pid": self.name }));
        self.finish(started, 0, wait).await;
    }

    /// Retry protocol: every acquisition is bounded by `retry_timeout`; on a
    /// timeout the attempt's holdings are released and the worker sleeps a
    /// uniform `[hold/2, hold]` before starting over.
    async fn run_retry(self, table: Arc<LockTable>, plan: Vec<ResourceId>) {
        let started = self.ctx.now();
        let mut rng = self.ctx.derive_rng(self.id.index() as u64);
        let mut wait = Duration::ZERO;
        let mut retries = 0u32;

        'attempt: loop {
            let mut held = Vec::with_capacity(plan.len());
            for &resource in &plan {
                let lock = match table.lock(resource) {
                    Ok(lock) => lock,
                    Err(e) => {
                        error!("[{}] {}", self.name, e);
                        release_locks(&self, &table, &held);
                        return self.fail(retries).await;
                    }
                };
                let before = self.ctx.now();
                let acquired = lock.acquire_timeout(self.id, self.config.retry_timeout).await;
                wait += self.ctx.now().saturating_sub(before);

                match acquired {
                    Ok(true) => {
                        held.push(resource);
                        self.emit(
                            EventKind::Acquire,
                            format!("acquired {}", lock.name()),
                            json!({ "pid": self.name, "resource": lock.name() }),
                        );
                        self.ctx.sleep(self.config.hold_time).await;
                    }
                    Ok(false) => {
                        retries += 1;
                        self.emit(
                            EventKind::Blocked,
                            format!(
                                "timed out after {:?} waiting for {}; backing off",
                                self.config.retry_timeout,
                                lock.name()
                            ),
                            json!({ "pid": self.name, "resource": lock.name(), "retries": retries }),
                        );
                        release_locks(&self, &table, &held);
                        if self.config.max_retries.is_some_and(|max| retries > max) {
                            warn!("[{}] gave up after {} retries", self.name, retries);
                            return self.fail(retries).await;
                        }
                        let backoff = draw_backoff(&mut rng, self.config.hold_time);
                        self.ctx.sleep(backoff).await;
                        continue 'attempt;
                    }
                    Err(e) => {
                        error!("[{}] {}", self.name, e);
                        release_locks(&self, &table, &held);
                        return self.fail(retries).await;
                    }
                }
            }

            release_locks(&self, &table, &held);
            self.emit(
                EventKind::Complete,
                format!("finished after {} retries", retries),
                json!({ "pid": self.name, "retries": retries }),
            );
            return self.finish(started, retries, wait).await;
        }
    }

    /// Banker protocol: negotiate random partial requests until the full
    /// claim is held, work, then release everything.
    async fn run_banker(self, banker: SharedBanker, claim: Vec<i64>) {
        let started = self.ctx.now();
        let mut rng = self.ctx.derive_rng(self.id.index() as u64);
        let hold = self.config.hold_time;
        let pause = (hold / 2).max(Duration::from_millis(200));
        let mut remaining = claim;
        let mut wait = Duration::ZERO;
        let mut retries = 0u32;

        loop {
            if remaining.iter().all(|&need| need <= 0) {
                self.ctx.sleep(hold).await;
                let released = banker.release_all(self.id);
                self.emit(
                    EventKind::Complete,
                    format!("reached its maximum claim; released {:?}", released),
                    json!({ "pid": self.name, "released": released }),
                );
                return self.finish(started, retries, wait).await;
            }

            let request = banker::partial_request(&mut rng, &remaining);
            match banker.request(self.id, &request) {
                Ok(()) => {
                    for (need, amount) in remaining.iter_mut().zip(&request) {
                        *need = (*need - amount).max(0);
                    }
                    let snapshot = banker.snapshot();
                    let held = snapshot.allocation.get(self.id.index()).cloned().unwrap_or_default();
                    debug!(
                        available = ?snapshot.available,
                        allocation = ?snapshot.allocation,
                        max_claim = ?snapshot.max_claim,
                        "[{}] banker state after grant",
                        self.name
                    );
                    self.emit(
                        EventKind::Acquire,
                        format!("request {:?} granted; allocation={:?} available={:?}", request, held, snapshot.available),
                        json!({ "pid": self.name, "request": request, "allocation": held, "available": snapshot.available }),
                    );
                    if remaining.iter().any(|&need| need > 0) {
                        self.ctx.sleep(hold / 3).await;
                    }
                }
                Err(reason) => {
                    retries += 1;
                    self.emit(
                        EventKind::Blocked,
                        format!("request {:?} denied ({}); waiting {:.2}s", request, reason, pause.as_secs_f64()),
                        json!({ "pid": self.name, "request": request, "reason": reason.to_string() }),
                    );
                    if self.config.max_retries.is_some_and(|max| retries > max) {
                        warn!("[{}] gave up after {} denials", self.name, retries);
                        banker.release_all(self.id);
                        return self.fail(retries).await;
                    }
                    let jitter = rng.gen_range(0..=millis(hold) / 2);
                    let before = self.ctx.now();
                    self.ctx.sleep(pause + Duration::from_millis(jitter)).await;
                    wait += self.ctx.now().saturating_sub(before);
                }
            }
        }
    }
}

/// Releases `held` in reverse acquisition order, emitting one event each.
fn release_locks<Ctx: RuntimeContext>(worker: &Worker<Ctx>, table: &LockTable, held: &[ResourceId]) {
    for &resource in held.iter().rev() {
        if let Some(lock) = table.get(resource) {
            if lock.release(worker.id) {
                worker.emit(
                    EventKind::Release,
                    format!("released {}", lock.name()),
                    json!({ "pid": worker.name, "resource": lock.name() }),
                );
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Uniform backoff in `[hold/2, hold]`.
fn draw_backoff<R: Rng>(rng: &mut R, hold: Duration) -> Duration {
    let high = millis(hold);
    Duration::from_millis(rng.gen_range(high / 2..=high))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RunStatus;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use stalemate_env::TokioContext;

    fn ab() -> Vec<Resource> {
        vec![
            Resource::unit(ResourceId::new(0), "A"),
            Resource::unit(ResourceId::new(1), "B"),
        ]
    }

    fn reversed_pair() -> Vec<WorkerSpec> {
        vec![
            WorkerSpec::with_plan(ProcessId::new(0), vec![ResourceId::new(0), ResourceId::new(1)]),
            WorkerSpec::with_plan(ProcessId::new(1), vec![ResourceId::new(1), ResourceId::new(0)]),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_naive_reversed_pair_deadlocks_and_leaks() {
        let driver = ConcurrentDriver::new(TokioContext::shared(42), RunConfig::default());
        let report = driver
            .run(ConcurrentScenario {
                policy: Policy::Naive,
                resources: ab(),
                workers: reversed_pair(),
            })
            .await
            .unwrap();

        assert_eq!(report.deadlocked, vec!["P1".to_string(), "P2".to_string()]);
        assert_eq!(report.missing, vec!["P1".to_string(), "P2".to_string()]);
        assert!(report.metrics.iter().all(|m| m.status == RunStatus::Error && m.duration.is_none()));
        assert_eq!(report.leaked.len(), 2);
        assert!(report.leaked.iter().any(|l| l.resource == "A" && l.holder == "P1"));
        assert!(report.leaked.iter().any(|l| l.resource == "B" && l.holder == "P2"));
        assert!(!report.all_ok());
        assert!(report.events.iter().any(|e| e.kind == EventKind::Deadlock));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordered_workers_finish() {
        let driver = ConcurrentDriver::new(TokioContext::shared(42), RunConfig::default());
        let report = driver
            .run(ConcurrentScenario {
                policy: Policy::Ordered,
                resources: ab(),
                workers: reversed_pair(),
            })
            .await
            .unwrap();

        assert!(report.all_ok());
        assert_eq!(report.metrics.len(), 2);
        assert!(report.missing.is_empty());
        assert!(report.leaked.is_empty());
        // The second worker waited for the first to release A
        let waits: Vec<f64> = report.metrics.iter().filter_map(|m| m.wait_time).collect();
        assert!(waits.iter().any(|&w| w > 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_workers_recover() {
        let config = RunConfig::default()
            .with_hold_time(Duration::from_millis(800))
            .with_retry_timeout(Duration::from_millis(300));
        let driver = ConcurrentDriver::new(TokioContext::shared(42), config.clone());
        let report = driver
            .run(ConcurrentScenario {
                policy: Policy::Retry(config.retry_policy()),
                resources: ab(),
                workers: reversed_pair(),
            })
            .await
            .unwrap();

        assert!(report.all_ok());
        assert_eq!(report.metrics.len(), 2);
        assert!(report.metrics.iter().map(|m| m.retries).sum::<u32>() >= 1);
        assert!(report.leaked.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling_reports_error() {
        let config = RunConfig::default()
            .with_retry_timeout(Duration::from_millis(100))
            .with_max_retries(Some(0));
        let driver = ConcurrentDriver::new(TokioContext::shared(42), config.clone());
        let report = driver
            .run(ConcurrentScenario {
                policy: Policy::Retry(config.retry_policy()),
                resources: ab(),
                workers: reversed_pair(),
            })
            .await
            .unwrap();

        assert!(report.metrics.iter().any(|m| m.status == RunStatus::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_banker_workers_complete() {
        let resources = vec![
            Resource::countable(ResourceId::new(0), "A", 2),
            Resource::countable(ResourceId::new(1), "B", 2),
        ];
        let workers = vec![
            WorkerSpec::with_claim(ProcessId::new(0), vec![2, 1]),
            WorkerSpec::with_claim(ProcessId::new(1), vec![1, 2]),
            WorkerSpec::with_claim(ProcessId::new(2), vec![2, 2]),
        ];
        let driver = ConcurrentDriver::new(TokioContext::shared(42), RunConfig::default());
        let report = driver
            .run(ConcurrentScenario {
                policy: Policy::Banker,
                resources,
                workers,
            })
            .await
            .unwrap();

        assert!(report.all_ok());
        assert_eq!(report.metrics.len(), 3);
        assert!(report.leaked.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_loss_is_not_fatal() {
        let config = RunConfig::default().with_telemetry_capacity(0);
        let driver = ConcurrentDriver::new(TokioContext::shared(42), config);
        let report = driver
            .run(ConcurrentScenario {
                policy: Policy::Ordered,
                resources: ab(),
                workers: reversed_pair(),
            })
            .await
            .unwrap();

        assert!(report.telemetry_lost);
        assert!(report.metrics.is_empty());
        assert_eq!(report.missing.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_scenario_rejected() {
        let driver = ConcurrentDriver::new(TokioContext::shared(42), RunConfig::default());
        let result = driver
            .run(ConcurrentScenario {
                policy: Policy::Naive,
                resources: ab(),
                workers: Vec::new(),
            })
            .await;
        assert_eq!(result.unwrap_err(), ModelError::NoProcesses);
    }

    #[test]
    fn test_backoff_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..32 {
            let b = draw_backoff(&mut rng, Duration::from_millis(800));
            assert!(b >= Duration::from_millis(400) && b <= Duration::from_millis(800));
        }
        assert_eq!(draw_backoff(&mut rng, Duration::ZERO), Duration::ZERO);
    }
}
