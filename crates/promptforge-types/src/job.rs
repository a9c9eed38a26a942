// ABOUTME: Queue job identity, priority, and lifecycle state
use crate::optimization::{OptimizationRequest, OptimizationResult};
use crate::template::Template;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    // Declared low-to-high in source order but ranked urgent-first: derived
    // `Ord` sorts ascending, and the queue's binary heap wants the highest
    // priority on top, so `Urgent` must compare greatest.
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states are absorbing: no job ever leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub template_id: String,
    pub template: Template,
    pub request: OptimizationRequest,
    pub priority: Priority,
    pub status: JobStatus,
    /// 0-100.
    pub progress: u8,
    pub current_step: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<OptimizationResult>,
    pub metadata: HashMap<String, String>,
}

impl Job {
    pub fn new(
        template_id: impl Into<String>,
        template: Template,
        request: OptimizationRequest,
        priority: Priority,
        max_retries: u32,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.into(),
            template,
            request,
            priority,
            status: JobStatus::Pending,
            progress: 0,
            current_step: None,
            retry_count: 0,
            max_retries,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering_ranks_urgent_highest() {
        let mut priorities = vec![Priority::Normal, Priority::Urgent, Priority::Low, Priority::High];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Low, Priority::Normal, Priority::High, Priority::Urgent]
        );
    }

    #[test]
    fn terminal_states_are_absorbing() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
