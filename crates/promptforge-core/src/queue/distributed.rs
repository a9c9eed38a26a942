// ABOUTME: Contract for an external broker-backed queue tier the local queue can mirror onto
use async_trait::async_trait;
use promptforge_types::{ForgeError, Job, JobStatus, OptimizationResult, Priority};

/// Maps local priority levels onto the point scale a remote broker expects:
/// urgent=10, high=5, normal=0, low=-5.
pub fn mapped_priority(priority: Priority) -> i32 {
    match priority {
        Priority::Urgent => 10,
        Priority::High => 5,
        Priority::Normal => 0,
        Priority::Low => -5,
    }
}

#[derive(Debug, Clone)]
pub struct JobProgressUpdate {
    pub status: JobStatus,
    pub progress: u8,
    pub result: Option<OptimizationResult>,
    pub error: Option<String>,
}

/// An external job broker mirroring the local queue's contract. When
/// configured, `JobQueue::add_job` enqueues here instead of the local
/// pending heap and bypasses local worker processing for that job; progress
/// is streamed back by polling `poll_progress`. If `enqueue` fails the
/// caller falls back to the local queue transparently.
#[async_trait]
pub trait DistributedQueueBackend: Send + Sync {
    async fn enqueue(&self, job: &Job) -> Result<(), ForgeError>;
    async fn poll_progress(&self, job_id: &str) -> Result<Option<JobProgressUpdate>, ForgeError>;
}
