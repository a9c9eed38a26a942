// ABOUTME: User feedback and performance metric records for the feedback loop
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Accuracy,
    Relevance,
    Clarity,
    Completeness,
    Efficiency,
}

/// Append-only per-template user rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub feedback_id: String,
    pub template_id: String,
    pub optimization_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// 1-5.
    pub rating: u8,
    pub category: FeedbackCategory,
    pub comment: Option<String>,
}

impl Feedback {
    pub fn new(
        template_id: impl Into<String>,
        rating: u8,
        category: FeedbackCategory,
        optimization_id: Option<String>,
        comment: Option<String>,
    ) -> Self {
        Self {
            feedback_id: Uuid::new_v4().to_string(),
            template_id: template_id.into(),
            optimization_id,
            timestamp: Utc::now(),
            rating: rating.clamp(1, 5),
            category,
            comment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    ResponseTime,
    TokenUsage,
    AccuracyScore,
    UserSatisfaction,
    ErrorRate,
}

/// Append-only performance sample for a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub template_id: String,
    pub timestamp: DateTime<Utc>,
    pub metric_type: MetricType,
    pub value: f64,
    pub context: Option<String>,
}
