// ABOUTME: Test fixtures for promptforge's template, job, and feedback types
use promptforge_types::*;
use std::collections::HashMap;

/// A small Mustache-style greeting template with one required variable.
pub fn sample_template() -> Template {
    let mut variables = HashMap::new();
    variables.insert("name".to_string(), VariableConfig::new(VariableType::String).required());
    Template {
        name: "greeting".to_string(),
        version: "1.0.0".to_string(),
        content: "Hello {{name}}!".to_string(),
        variables,
        files: Vec::new(),
        commands: Vec::new(),
        metadata: TemplateMetadata {
            author: Some("test-suite".to_string()),
            tags: vec!["sample".to_string()],
            category: Some("greeting".to_string()),
            ..TemplateMetadata::default()
        },
    }
}

/// Render context matching [`sample_template`]'s declared variables.
pub fn sample_context() -> serde_json::Value {
    serde_json::json!({ "name": "Ada" })
}

/// An optimization request for [`sample_template`].
pub fn sample_optimization_request() -> OptimizationRequest {
    OptimizationRequest::new("greet a user by name", "Hello {{name}}!")
}

/// A completed optimization result above the default confidence threshold.
pub fn sample_optimization_result() -> OptimizationResult {
    OptimizationResult {
        optimized_prompt: "Hello {{name}}, welcome!".to_string(),
        metrics: OptimizationMetrics {
            accuracy_improvement: 0.15,
            token_reduction: 0.05,
            cost_reduction: 1.1,
            processing_time_ms: 250,
            api_calls_used: 2,
            complexity_reduction: 0.1,
        },
        confidence: Some(0.9),
        status: OptimizationStatus::Completed,
        created_at: chrono::Utc::now(),
        completed_at: Some(chrono::Utc::now()),
    }
}

/// A pending job wrapping [`sample_template`] and [`sample_optimization_request`].
pub fn sample_job() -> Job {
    Job::new(
        "greeting@1.0.0",
        sample_template(),
        sample_optimization_request(),
        Priority::Normal,
        3,
        HashMap::new(),
    )
}

/// A 4-star feedback record for the sample template.
pub fn sample_feedback() -> Feedback {
    Feedback::new(
        "greeting@1.0.0",
        4,
        FeedbackCategory::Clarity,
        None,
        Some("reads naturally".to_string()),
    )
}

/// A single response-time performance sample for the sample template.
pub fn sample_performance_metric() -> PerformanceMetric {
    PerformanceMetric {
        template_id: "greeting@1.0.0".to_string(),
        timestamp: chrono::Utc::now(),
        metric_type: MetricType::ResponseTime,
        value: 120.0,
        context: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_template_declares_the_name_variable() {
        let template = sample_template();
        assert!(template.variables.contains_key("name"));
        assert_eq!(template.id(), "greeting@1.0.0");
    }

    #[test]
    fn sample_job_wraps_the_sample_template_and_request() {
        let job = sample_job();
        assert_eq!(job.template.id(), "greeting@1.0.0");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, Priority::Normal);
    }

    #[test]
    fn sample_feedback_rating_is_in_bounds() {
        let feedback = sample_feedback();
        assert!((1..=5).contains(&feedback.rating));
    }
}
