// ABOUTME: Continuous-improvement observer converting ratings and performance drift into re-optimization triggers
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use promptforge_types::{Feedback, ForgeError, PerformanceMetric};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Clone)]
pub struct FeedbackLoopConfig {
    pub feedback_threshold: u32,
    pub rating_threshold: f64,
    pub performance_threshold: f64,
    pub cooldown: Duration,
    pub scheduled_review_interval: Duration,
    pub enable_auto_reoptimization: bool,
}

impl Default for FeedbackLoopConfig {
    fn default() -> Self {
        Self {
            feedback_threshold: 10,
            rating_threshold: 3.0,
            performance_threshold: 0.8,
            cooldown: Duration::from_secs(24 * 60 * 60),
            scheduled_review_interval: Duration::from_secs(7 * 24 * 60 * 60),
            enable_auto_reoptimization: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FeedbackEvent {
    ReoptimizationTriggered { template_id: String, reason: &'static str },
    ReoptimizationCompleted { template_id: String, job_id: String },
    ReoptimizationFailed { template_id: String, error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// Submits a new optimization job for a template; implemented by whatever
/// owns the queue, since the feedback loop only publishes events and never
/// calls the queue directly. Keeps the feedback/pipeline/queue cycle wired
/// through event subscription instead of a direct call cycle.
#[async_trait]
pub trait ReoptimizationTrigger: Send + Sync {
    async fn trigger(&self, template_id: &str) -> Result<String, ForgeError>;
}

/// Long-lived observer over user feedback and performance metrics for every
/// template, deciding when drift or poor ratings warrant re-optimization,
/// subject to a per-template cooldown.
pub struct FeedbackLoop {
    config: FeedbackLoopConfig,
    feedback: DashMap<String, Vec<Feedback>>,
    metrics: DashMap<String, Vec<PerformanceMetric>>,
    last_reoptimized: DashMap<String, DateTime<Utc>>,
    events: broadcast::Sender<FeedbackEvent>,
    trigger: Option<Arc<dyn ReoptimizationTrigger>>,
}

impl FeedbackLoop {
    pub fn new(config: FeedbackLoopConfig, trigger: Option<Arc<dyn ReoptimizationTrigger>>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            feedback: DashMap::new(),
            metrics: DashMap::new(),
            last_reoptimized: DashMap::new(),
            events,
            trigger,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedbackEvent> {
        self.events.subscribe()
    }

    pub fn feedback_for(&self, template_id: &str) -> Vec<Feedback> {
        self.feedback.get(template_id).map(|v| v.clone()).unwrap_or_default()
    }

    pub fn metrics_for(&self, template_id: &str) -> Vec<PerformanceMetric> {
        self.metrics.get(template_id).map(|v| v.clone()).unwrap_or_default()
    }

    /// Append feedback in arrival order and evaluate whether it, combined
    /// with the template's full history, now warrants re-optimization.
    pub async fn record_feedback(&self, feedback: Feedback) {
        let template_id = feedback.template_id.clone();
        self.feedback.entry(template_id.clone()).or_default().push(feedback);
        if self.feedback_condition(&template_id) {
            self.maybe_trigger(&template_id, "low-rating-volume").await;
        }
    }

    /// Append a performance sample; once at least 10 exist for the
    /// template, compare the mean of the 5 most recent against the mean of
    /// the prior ones and evaluate re-optimization if the ratio has dropped
    /// below `performance_threshold`.
    pub async fn record_metric(&self, metric: PerformanceMetric) {
        let template_id = metric.template_id.clone();
        self.metrics.entry(template_id.clone()).or_default().push(metric);
        let degraded = self
            .metrics
            .get(&template_id)
            .map(|samples| {
                samples.len() >= 10
                    && performance_ratio(&samples).map(|r| r < self.config.performance_threshold).unwrap_or(false)
            })
            .unwrap_or(false);
        if degraded {
            self.maybe_trigger(&template_id, "performance-drift").await;
        }
    }

    fn feedback_condition(&self, template_id: &str) -> bool {
        let Some(list) = self.feedback.get(template_id) else {
            return false;
        };
        if (list.len() as u32) < self.config.feedback_threshold {
            return false;
        }
        let average = list.iter().map(|f| f.rating as f64).sum::<f64>() / list.len() as f64;
        average < self.config.rating_threshold
    }

    /// Trend over a template's feedback ratings: the mean of the last 3
    /// against the mean of the 3 before that. Fewer than 6 samples is
    /// always stable — there isn't enough history to compare.
    pub fn trend(&self, template_id: &str) -> Trend {
        let Some(list) = self.feedback.get(template_id) else {
            return Trend::Stable;
        };
        if list.len() < 6 {
            return Trend::Stable;
        }
        let n = list.len();
        let recent: f64 = list[n - 3..].iter().map(|f| f.rating as f64).sum::<f64>() / 3.0;
        let prior: f64 = list[n - 6..n - 3].iter().map(|f| f.rating as f64).sum::<f64>() / 3.0;
        let delta = recent - prior;
        if delta > 0.5 {
            Trend::Improving
        } else if delta < -0.5 {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    /// Run the periodic "scheduled review" pass over every template with
    /// feedback history, triggering re-optimization for templates whose
    /// trend has concluded declining.
    pub async fn run_scheduled_review(&self) {
        let template_ids: Vec<String> = self.feedback.iter().map(|e| e.key().clone()).collect();
        for template_id in template_ids {
            if self.trend(&template_id) == Trend::Declining {
                self.maybe_trigger(&template_id, "scheduled-review-declining-trend").await;
            }
        }
    }

    /// Spawn a background task that calls `run_scheduled_review` on
    /// `scheduled_review_interval` (default weekly).
    pub fn spawn_scheduled_review(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        let interval = self.config.scheduled_review_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                this.run_scheduled_review().await;
            }
        })
    }

    fn cooldown_elapsed(&self, template_id: &str) -> bool {
        match self.last_reoptimized.get(template_id) {
            None => true,
            Some(last) => {
                Utc::now().signed_duration_since(*last).to_std().unwrap_or(Duration::ZERO) >= self.config.cooldown
            }
        }
    }

    async fn maybe_trigger(&self, template_id: &str, reason: &'static str) {
        if !self.cooldown_elapsed(template_id) {
            return;
        }
        self.last_reoptimized.insert(template_id.to_string(), Utc::now());
        let _ = self.events.send(FeedbackEvent::ReoptimizationTriggered {
            template_id: template_id.to_string(),
            reason,
        });

        if !self.config.enable_auto_reoptimization {
            info!(template_id, reason, "re-optimization recommended (auto-reoptimization disabled)");
            return;
        }
        let Some(trigger) = &self.trigger else {
            info!(template_id, reason, "re-optimization recommended (no trigger configured)");
            return;
        };
        match trigger.trigger(template_id).await {
            Ok(job_id) => {
                let _ = self.events.send(FeedbackEvent::ReoptimizationCompleted {
                    template_id: template_id.to_string(),
                    job_id,
                });
            }
            Err(err) => {
                let _ = self.events.send(FeedbackEvent::ReoptimizationFailed {
                    template_id: template_id.to_string(),
                    error: err.to_string(),
                });
            }
        }
    }
}

/// Ratio of the mean of the 5 most recent samples over the mean of every
/// sample before those 5. `None` when there are fewer than 10 samples.
fn performance_ratio(samples: &[PerformanceMetric]) -> Option<f64> {
    if samples.len() < 10 {
        return None;
    }
    let n = samples.len();
    let recent: f64 = samples[n - 5..].iter().map(|m| m.value).sum::<f64>() / 5.0;
    let prior_slice = &samples[..n - 5];
    let prior: f64 = prior_slice.iter().map(|m| m.value).sum::<f64>() / prior_slice.len() as f64;
    if prior == 0.0 {
        None
    } else {
        Some(recent / prior)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptforge_types::{FeedbackCategory, MetricType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn feedback(template_id: &str, rating: u8) -> Feedback {
        Feedback::new(template_id, rating, FeedbackCategory::Accuracy, None, None)
    }

    fn metric(template_id: &str, value: f64) -> PerformanceMetric {
        PerformanceMetric {
            template_id: template_id.to_string(),
            timestamp: Utc::now(),
            metric_type: MetricType::ResponseTime,
            value,
            context: None,
        }
    }

    #[tokio::test]
    async fn low_average_rating_over_threshold_count_triggers_recommendation() {
        let loop_ = FeedbackLoop::new(FeedbackLoopConfig::default(), None);
        let mut rx = loop_.subscribe();
        for _ in 0..10 {
            loop_.record_feedback(feedback("t1", 2)).await;
        }
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, FeedbackEvent::ReoptimizationTriggered { .. }));
    }

    #[tokio::test]
    async fn high_rating_does_not_trigger() {
        let loop_ = FeedbackLoop::new(FeedbackLoopConfig::default(), None);
        let mut rx = loop_.subscribe();
        for _ in 0..10 {
            loop_.record_feedback(feedback("t1", 5)).await;
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cooldown_suppresses_a_second_trigger() {
        let loop_ = FeedbackLoop::new(FeedbackLoopConfig::default(), None);
        let mut rx = loop_.subscribe();
        for _ in 0..10 {
            loop_.record_feedback(feedback("t1", 1)).await;
        }
        assert!(rx.try_recv().is_ok());
        loop_.record_feedback(feedback("t1", 1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn performance_drift_below_threshold_triggers() {
        let loop_ = FeedbackLoop::new(FeedbackLoopConfig::default(), None);
        let mut rx = loop_.subscribe();
        for _ in 0..5 {
            loop_.record_metric(metric("t1", 100.0)).await;
        }
        for _ in 0..5 {
            loop_.record_metric(metric("t1", 50.0)).await;
        }
        let event = rx.try_recv().unwrap();
        assert!(matches!(event, FeedbackEvent::ReoptimizationTriggered { reason: "performance-drift" }));
    }

    #[test]
    fn trend_detects_improving_and_declining() {
        let loop_ = FeedbackLoop::new(FeedbackLoopConfig::default(), None);
        assert_eq!(loop_.trend("missing"), Trend::Stable);
    }

    #[tokio::test]
    async fn declining_trend_is_detected_from_ratings_in_arrival_order() {
        let loop_ = FeedbackLoop::new(FeedbackLoopConfig::default(), None);
        for rating in [5, 5, 5, 1, 1, 1] {
            loop_
                .feedback
                .entry("t1".to_string())
                .or_default()
                .push(feedback("t1", rating));
        }
        assert_eq!(loop_.trend("t1"), Trend::Declining);
    }

    #[tokio::test]
    async fn enabled_auto_reoptimization_calls_the_trigger() {
        struct CountingTrigger(Arc<AtomicUsize>);
        #[async_trait]
        impl ReoptimizationTrigger for CountingTrigger {
            async fn trigger(&self, _template_id: &str) -> Result<String, ForgeError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok("job-1".to_string())
            }
        }
        let calls = Arc::new(AtomicUsize::new(0));
        let config = FeedbackLoopConfig {
            enable_auto_reoptimization: true,
            ..FeedbackLoopConfig::default()
        };
        let loop_ = FeedbackLoop::new(config, Some(Arc::new(CountingTrigger(calls.clone()))));
        let mut rx = loop_.subscribe();
        for _ in 0..10 {
            loop_.record_feedback(feedback("t1", 1)).await;
        }
        assert!(matches!(rx.try_recv().unwrap(), FeedbackEvent::ReoptimizationTriggered { .. }));
        assert!(matches!(rx.try_recv().unwrap(), FeedbackEvent::ReoptimizationCompleted { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
