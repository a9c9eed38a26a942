// ABOUTME: Priority job scheduler with a bounded worker pool, retries, timeouts, and cancellation
mod distributed;
pub mod feedback;

pub use distributed::{DistributedQueueBackend, JobProgressUpdate, mapped_priority};
pub use feedback::{FeedbackEvent, FeedbackLoop, FeedbackLoopConfig, ReoptimizationTrigger, Trend};

use crate::pipeline::OptimizationPipeline;
use dashmap::DashMap;
use promptforge_types::{Job, JobStatus, Priority, QueueError, Template};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_concurrency: usize,
    pub job_timeout: Duration,
    pub retry_delay: Duration,
    pub max_job_history: usize,
    pub cleanup_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            job_timeout: Duration::from_secs(10 * 60),
            retry_delay: Duration::from_secs(5),
            max_job_history: 1000,
            cleanup_interval: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub enum QueueEvent {
    JobAdded { job_id: String },
    JobStarted { job_id: String },
    JobCompleted { job_id: String },
    JobFailed { job_id: String, error: String },
    JobRetrying { job_id: String, retry_count: u32 },
    JobCancelled { job_id: String },
}

#[derive(Debug, Clone, Default)]
pub struct AddJobOptions {
    pub priority: Priority,
    pub max_retries: Option<u32>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CancelOutcome {
    Cancelled,
    NoEffect,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub average_processing_time_ms: f64,
    pub success_rate: f64,
    pub active_workers: usize,
    pub queue_length: usize,
}

struct PendingEntry {
    priority: Priority,
    sequence: u64,
    job_id: String,
}

impl PartialEq for PendingEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for PendingEntry {}

impl PartialOrd for PendingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEntry {
    /// `BinaryHeap` is a max-heap: higher `Priority` must sort greater, and
    /// within a priority level the *earlier* sequence number (lower value)
    /// must sort greater so ties break FIFO.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct QueueInner {
    jobs: DashMap<String, Job>,
    pending: Mutex<BinaryHeap<PendingEntry>>,
    sequence: AtomicU64,
    notify: Notify,
    active_workers: AtomicUsize,
    processing_times_ms: Mutex<Vec<u64>>,
    config: QueueConfig,
    events: broadcast::Sender<QueueEvent>,
    pipeline: Arc<OptimizationPipeline>,
    distributed: Option<Arc<dyn DistributedQueueBackend>>,
}

/// Priority job scheduler. Owns a fixed-size worker pool that pulls from a
/// priority heap in strict `urgent < high < normal < low` order with FIFO
/// tie-breaking, and a background cleanup loop that trims terminal job
/// history. Cloning a `JobQueue` is cheap and shares the same workers.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    pub fn new(pipeline: Arc<OptimizationPipeline>, config: QueueConfig) -> Self {
        Self::with_distributed(pipeline, config, None)
    }

    pub fn with_distributed(
        pipeline: Arc<OptimizationPipeline>,
        config: QueueConfig,
        distributed: Option<Arc<dyn DistributedQueueBackend>>,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        let inner = Arc::new(QueueInner {
            jobs: DashMap::new(),
            pending: Mutex::new(BinaryHeap::new()),
            sequence: AtomicU64::new(0),
            notify: Notify::new(),
            active_workers: AtomicUsize::new(0),
            processing_times_ms: Mutex::new(Vec::new()),
            config: config.clone(),
            events,
            pipeline,
            distributed,
        });

        let queue = Self { inner: inner.clone() };
        for worker_id in 0..config.max_concurrency.max(1) {
            let inner = inner.clone();
            tokio::spawn(worker_loop(inner, worker_id));
        }
        let cleanup_inner = inner.clone();
        tokio::spawn(cleanup_loop(cleanup_inner));
        queue
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    /// Admit a job. Inserts into the pending heap in priority order unless
    /// a distributed backend is configured and reachable, in which case the
    /// job is mirrored there and local workers skip it; a remote enqueue
    /// failure falls back to the local queue transparently.
    #[instrument(skip(self, template, request), fields(template_id = %template_id))]
    pub async fn add_job(
        &self,
        template_id: impl Into<String>,
        template: Template,
        request: promptforge_types::OptimizationRequest,
        options: AddJobOptions,
    ) -> String {
        let max_retries = options.max_retries.unwrap_or(3);
        let job = Job::new(
            template_id,
            template,
            request,
            options.priority,
            max_retries,
            options.metadata,
        );
        let job_id = job.id.clone();

        if let Some(backend) = &self.inner.distributed {
            match backend.enqueue(&job).await {
                Ok(()) => {
                    self.inner.jobs.insert(job_id.clone(), job);
                    self.emit(QueueEvent::JobAdded { job_id: job_id.clone() });
                    self.spawn_remote_tracker(job_id.clone());
                    return job_id;
                }
                Err(err) => {
                    warn!(error = %err, "distributed queue backend unavailable, falling back to local queue");
                }
            }
        }

        self.inner.jobs.insert(job_id.clone(), job);
        self.push_pending(&job_id).await;
        self.emit(QueueEvent::JobAdded { job_id: job_id.clone() });
        job_id
    }

    async fn push_pending(&self, job_id: &str) {
        let priority = self
            .inner
            .jobs
            .get(job_id)
            .map(|j| j.priority)
            .unwrap_or(Priority::Normal);
        let sequence = self.inner.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        let mut pending = self.inner.pending.lock().await;
        pending.push(PendingEntry {
            priority,
            sequence,
            job_id: job_id.to_string(),
        });
        drop(pending);
        self.inner.notify.notify_one();
    }

    fn spawn_remote_tracker(&self, job_id: String) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let Some(backend) = inner.distributed.clone() else { return };
            loop {
                match backend.poll_progress(&job_id).await {
                    Ok(Some(update)) => {
                        if let Some(mut job) = inner.jobs.get_mut(&job_id) {
                            job.progress = update.progress;
                            job.status = update.status;
                            if update.status.is_terminal() {
                                job.completed_at = Some(chrono::Utc::now());
                                job.result = update.result;
                                job.error = update.error;
                                break;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(job_id = %job_id, error = %err, "remote job progress poll failed");
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        });
    }

    /// Cancellation of a pending job is immediate; of a processing job it is
    /// cooperative (the worker notices on its next check and discards its
    /// result instead of advancing the job). Idempotent on terminal jobs.
    pub fn cancel_job(&self, job_id: &str) -> CancelOutcome {
        let Some(mut job) = self.inner.jobs.get_mut(job_id) else {
            return CancelOutcome::NoEffect;
        };
        if job.status.is_terminal() {
            return CancelOutcome::NoEffect;
        }
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(chrono::Utc::now());
        drop(job);
        self.emit(QueueEvent::JobCancelled {
            job_id: job_id.to_string(),
        });
        CancelOutcome::Cancelled
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.inner.jobs.get(job_id).map(|j| j.clone())
    }

    pub async fn get_stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for entry in self.inner.jobs.iter() {
            match entry.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        let times = self.inner.processing_times_ms.lock().await;
        stats.average_processing_time_ms = if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<u64>() as f64 / times.len() as f64
        };
        let denom = stats.completed + stats.failed;
        stats.success_rate = if denom == 0 {
            0.0
        } else {
            stats.completed as f64 / denom as f64
        };
        stats.active_workers = self.inner.active_workers.load(AtomicOrdering::Relaxed);
        stats.queue_length = self.inner.pending.lock().await.len();
        stats
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.inner.events.send(event);
    }
}

async fn worker_loop(inner: Arc<QueueInner>, worker_id: usize) {
    loop {
        let job_id = match next_job(&inner).await {
            Some(id) => id,
            None => continue,
        };
        inner.active_workers.fetch_add(1, AtomicOrdering::Relaxed);
        process_job(&inner, &job_id, worker_id).await;
        inner.active_workers.fetch_sub(1, AtomicOrdering::Relaxed);
    }
}

async fn next_job(inner: &Arc<QueueInner>) -> Option<String> {
    loop {
        {
            let mut pending = inner.pending.lock().await;
            while let Some(entry) = pending.pop() {
                match inner.jobs.get(&entry.job_id).map(|j| j.status) {
                    Some(JobStatus::Pending) => return Some(entry.job_id),
                    // Cancelled (or otherwise no-longer-pending) entries are
                    // dropped here rather than scanned out of the heap eagerly.
                    _ => continue,
                }
            }
        }
        inner.notify.notified().await;
    }
}

#[instrument(skip(inner), fields(job_id = %job_id, worker = worker_id))]
async fn process_job(inner: &Arc<QueueInner>, job_id: &str, worker_id: usize) {
    let Some((template, request)) = inner.jobs.get_mut(job_id).map(|mut job| {
        job.status = JobStatus::Processing;
        job.started_at = Some(chrono::Utc::now());
        job.metadata.insert("worker".to_string(), worker_id.to_string());
        (job.template.clone(), job.request.clone())
    }) else {
        return;
    };
    let _ = inner.events.send(QueueEvent::JobStarted {
        job_id: job_id.to_string(),
    });

    let start = std::time::Instant::now();
    let context = Value::Object(Default::default());
    // `biased` with the timeout arm listed first: if both the pipeline and
    // the timer are ready in the same poll, the timeout wins.
    let outcome = tokio::select! {
        biased;
        _ = tokio::time::sleep(inner.config.job_timeout) => {
            // A timeout is a network-shaped failure (the optimizer call ran
            // out of time), so it is retry-eligible like other transient errors.
            Err((true, format!("Job timeout after {}ms", inner.config.job_timeout.as_millis())))
        }
        result = inner.pipeline.run(&template, &context, request) => {
            match result {
                Ok(output) => Ok(output),
                Err(err) => Err((err.is_transient(), err.to_string())),
            }
        }
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;

    // Cooperative cancellation: a worker that raced a cancellation discards
    // its result instead of advancing the job past the terminal state the
    // cancellation already recorded.
    if inner
        .jobs
        .get(job_id)
        .map(|j| j.status == JobStatus::Cancelled)
        .unwrap_or(true)
    {
        return;
    }

    match outcome {
        Ok(output) => {
            inner.processing_times_ms.lock().await.push(elapsed_ms);
            if let Some(mut job) = inner.jobs.get_mut(job_id) {
                job.status = JobStatus::Completed;
                job.progress = 100;
                job.completed_at = Some(chrono::Utc::now());
                job.result = Some(output.result);
                job.template = output.template;
            }
            info!(job_id, elapsed_ms, "job completed");
            let _ = inner.events.send(QueueEvent::JobCompleted {
                job_id: job_id.to_string(),
            });
        }
        Err((transient, error)) => {
            let (retry_count, max_retries) = inner
                .jobs
                .get(job_id)
                .map(|j| (j.retry_count + 1, j.max_retries))
                .unwrap_or((1, 0));

            // Permanent errors (validation, template, configuration) skip
            // the retry budget entirely; only transient (network, timeout)
            // failures are worth re-attempting.
            if transient && retry_count < max_retries {
                if let Some(mut job) = inner.jobs.get_mut(job_id) {
                    job.retry_count = retry_count;
                    job.status = JobStatus::Pending;
                    job.error = Some(error.clone());
                }
                let _ = inner.events.send(QueueEvent::JobRetrying {
                    job_id: job_id.to_string(),
                    retry_count,
                });
                debug!(job_id, retry_count, max_retries, "job failed, scheduling retry");
                let inner = inner.clone();
                let job_id = job_id.to_string();
                let delay = inner.config.retry_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let still_pending = inner
                        .jobs
                        .get(&job_id)
                        .map(|j| j.status == JobStatus::Pending)
                        .unwrap_or(false);
                    if still_pending {
                        let priority = inner.jobs.get(&job_id).map(|j| j.priority).unwrap_or(Priority::Normal);
                        let sequence = inner.sequence.fetch_add(1, AtomicOrdering::Relaxed);
                        inner.pending.lock().await.push(PendingEntry {
                            priority,
                            sequence,
                            job_id,
                        });
                        inner.notify.notify_one();
                    }
                });
            } else {
                if let Some(mut job) = inner.jobs.get_mut(job_id) {
                    // A permanent error never consumed a retry attempt, so the
                    // speculative `+ 1` above overcounts by one; a transient
                    // error that exhausted the retry budget genuinely made
                    // that many failed attempts, so it stands as computed.
                    job.retry_count = if transient { retry_count } else { retry_count.saturating_sub(1) };
                    job.status = JobStatus::Failed;
                    job.completed_at = Some(chrono::Utc::now());
                    job.error = Some(error.clone());
                }
                warn!(job_id, error, "job failed permanently");
                let _ = inner.events.send(QueueEvent::JobFailed {
                    job_id: job_id.to_string(),
                    error,
                });
            }
        }
    }
}

async fn cleanup_loop(inner: Arc<QueueInner>) {
    let mut ticker = tokio::time::interval(inner.config.cleanup_interval);
    ticker.tick().await; // first tick fires immediately; skip it
    loop {
        ticker.tick().await;
        cleanup_once(&inner);
    }
}

fn cleanup_once(inner: &Arc<QueueInner>) {
    let mut terminal: Vec<(String, chrono::DateTime<chrono::Utc>)> = inner
        .jobs
        .iter()
        .filter(|e| e.status.is_terminal())
        .map(|e| (e.id.clone(), e.completed_at.unwrap_or(e.created_at)))
        .collect();
    if terminal.len() <= inner.config.max_job_history {
        return;
    }
    terminal.sort_by(|a, b| b.1.cmp(&a.1));
    for (id, _) in terminal.into_iter().skip(inner.config.max_job_history) {
        inner.jobs.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TemplateEngine;
    use crate::optimizer::{MockOptimizerClient, OptimizerClient};
    use crate::pipeline::PipelineConfig;
    use promptforge_types::{NetworkError, OptimizationMetrics, OptimizationRequest, OptimizationStatus, Template};

    fn queue_with(
        responder: impl Fn(&OptimizationRequest) -> Result<promptforge_types::OptimizationResult, promptforge_types::ForgeError>
            + Send
            + Sync
            + 'static,
        config: QueueConfig,
    ) -> JobQueue {
        let engine = Arc::new(TemplateEngine::new());
        let optimizer: Arc<dyn OptimizerClient> = Arc::new(MockOptimizerClient {
            responder: Box::new(responder),
        });
        let pipeline = Arc::new(OptimizationPipeline::new(engine, optimizer, PipelineConfig::default()));
        JobQueue::new(pipeline, config)
    }

    fn ok_result(prompt: &str) -> promptforge_types::OptimizationResult {
        promptforge_types::OptimizationResult {
            optimized_prompt: prompt.to_string(),
            metrics: OptimizationMetrics {
                accuracy_improvement: 0.3,
                token_reduction: 0.2,
                cost_reduction: 1.0,
                processing_time_ms: 5,
                api_calls_used: 1,
                complexity_reduction: 0.0,
            },
            confidence: Some(0.9),
            status: OptimizationStatus::Completed,
            created_at: chrono::Utc::now(),
            completed_at: Some(chrono::Utc::now()),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn job_completes_and_is_reflected_in_stats() {
        let queue = queue_with(|_| Ok(ok_result("done")), QueueConfig::default());
        let template = Template::new("t", "1.0.0", "hi");
        let request = OptimizationRequest::new("task", "hi");
        let id = queue
            .add_job("t", template, request, AddJobOptions::default())
            .await;

        let mut job = queue.get_job(&id).unwrap();
        for _ in 0..50 {
            if job.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            job = queue.get_job(&id).unwrap();
        }
        assert_eq!(job.status, JobStatus::Completed);
        let stats = queue.get_stats().await;
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.success_rate, 1.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn permanent_failure_with_zero_retries_fails_on_first_attempt() {
        let queue = queue_with(
            |_| Err(NetworkError::Unreachable("down".into()).into()),
            QueueConfig {
                max_concurrency: 1,
                ..QueueConfig::default()
            },
        );
        let template = Template::new("t", "1.0.0", "hi");
        let request = OptimizationRequest::new("task", "hi");
        let id = queue
            .add_job(
                "t",
                template,
                request,
                AddJobOptions {
                    max_retries: Some(0),
                    ..Default::default()
                },
            )
            .await;

        let mut job = queue.get_job(&id).unwrap();
        for _ in 0..50 {
            if job.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            job = queue.get_job(&id).unwrap();
        }
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn template_stage_failure_skips_retries_even_with_budget_remaining() {
        // An unmatched `{{#if` fails metadata-extraction's variable-extraction
        // call with a template error, which is a permanent (non-network)
        // failure: it must not be retried even though max_retries allows it.
        let queue = queue_with(|_| Ok(ok_result("unused")), QueueConfig {
            max_concurrency: 1,
            ..QueueConfig::default()
        });
        let template = Template::new("t", "1.0.0", "{{#if cond}}no closing tag");
        let request = OptimizationRequest::new("task", "hi");
        let id = queue
            .add_job(
                "t",
                template,
                request,
                AddJobOptions {
                    max_retries: Some(5),
                    ..Default::default()
                },
            )
            .await;

        let mut job = queue.get_job(&id).unwrap();
        for _ in 0..50 {
            if job.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            job = queue.get_job(&id).unwrap();
        }
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retry_count, 0, "permanent errors must not consume the retry budget");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_job_is_idempotent_on_terminal_jobs() {
        let queue = queue_with(|_| Ok(ok_result("done")), QueueConfig::default());
        let template = Template::new("t", "1.0.0", "hi");
        let request = OptimizationRequest::new("task", "hi");
        let id = queue
            .add_job("t", template, request, AddJobOptions::default())
            .await;

        let mut job = queue.get_job(&id).unwrap();
        for _ in 0..50 {
            if job.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            job = queue.get_job(&id).unwrap();
        }
        assert_eq!(queue.cancel_job(&id), CancelOutcome::NoEffect);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelling_a_pending_job_moves_it_to_cancelled() {
        // A single-worker queue kept busy long enough that the second job
        // added is still pending when cancelled.
        let queue = queue_with(
            |_| {
                std::thread::sleep(Duration::from_millis(5));
                Ok(ok_result("done"))
            },
            QueueConfig {
                max_concurrency: 1,
                ..QueueConfig::default()
            },
        );
        let busy_template = Template::new("busy", "1.0.0", "hi");
        let busy_request = OptimizationRequest::new("task", "hi");
        queue
            .add_job("busy", busy_template, busy_request, AddJobOptions::default())
            .await;

        let template = Template::new("t", "1.0.0", "hi");
        let request = OptimizationRequest::new("task", "hi");
        let id = queue
            .add_job("t", template, request, AddJobOptions::default())
            .await;

        assert_eq!(queue.cancel_job(&id), CancelOutcome::Cancelled);
        assert_eq!(queue.get_job(&id).unwrap().status, JobStatus::Cancelled);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn higher_priority_pending_job_is_picked_first() {
        let started: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let started_clone = started.clone();
        let queue = queue_with(
            move |req| {
                started_clone.lock().unwrap().push(req.task.clone());
                std::thread::sleep(Duration::from_millis(10));
                Ok(ok_result("done"))
            },
            QueueConfig {
                max_concurrency: 1,
                ..QueueConfig::default()
            },
        );

        // Occupy the single worker first so both later jobs queue up.
        let occupying = Template::new("occupy", "1.0.0", "hi");
        let occupying_request = OptimizationRequest::new("occupy", "hi");
        queue
            .add_job("occupy", occupying, occupying_request, AddJobOptions::default())
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        let normal_template = Template::new("normal", "1.0.0", "hi");
        let normal_request = OptimizationRequest::new("normal-task", "hi");
        queue
            .add_job(
                "normal",
                normal_template,
                normal_request,
                AddJobOptions {
                    priority: Priority::Normal,
                    ..Default::default()
                },
            )
            .await;

        let urgent_template = Template::new("urgent", "1.0.0", "hi");
        let urgent_request = OptimizationRequest::new("urgent-task", "hi");
        queue
            .add_job(
                "urgent",
                urgent_template,
                urgent_request,
                AddJobOptions {
                    priority: Priority::Urgent,
                    ..Default::default()
                },
            )
            .await;

        tokio::time::sleep(Duration::from_millis(120)).await;
        let order = started.lock().unwrap().clone();
        let urgent_pos = order.iter().position(|t| t == "urgent-task");
        let normal_pos = order.iter().position(|t| t == "normal-task");
        if let (Some(u), Some(n)) = (urgent_pos, normal_pos) {
            assert!(u < n, "urgent job should start before normal job once queued");
        }
    }
}
