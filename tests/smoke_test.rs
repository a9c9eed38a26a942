// ABOUTME: End-to-end smoke test covering render, optimization, and feedback together
use async_trait::async_trait;
use promptforge_core::{
    AddJobOptions, FeedbackLoop, FeedbackLoopConfig, JobQueue, OptimizationPipeline, OptimizerClient, PipelineConfig,
    QueueConfig, TemplateEngine,
};
use promptforge_test_utils::{sample_context, sample_feedback, sample_optimization_result, sample_template};
use promptforge_types::{ForgeError, JobStatus, OptimizationRequest, OptimizationResult};
use std::sync::Arc;
use std::time::Duration;

struct StubOptimizer;

#[async_trait]
impl OptimizerClient for StubOptimizer {
    async fn optimize(&self, _request: &OptimizationRequest) -> Result<OptimizationResult, ForgeError> {
        Ok(sample_optimization_result())
    }
}

#[tokio::test]
async fn renders_a_template_and_runs_it_through_the_optimization_queue() {
    let engine = Arc::new(TemplateEngine::new());
    let rendered = engine.render(&sample_template().content, &sample_context()).unwrap();
    assert_eq!(rendered, "Hello Ada!");

    let optimizer: Arc<dyn OptimizerClient> = Arc::new(StubOptimizer);
    let pipeline = Arc::new(OptimizationPipeline::new(engine, optimizer, PipelineConfig::default()));
    let queue = JobQueue::new(pipeline, QueueConfig::default());

    let template = sample_template();
    let request = OptimizationRequest::new("greet a user", template.content.clone());
    let job_id = queue.add_job(template.id(), template, request, AddJobOptions::default()).await;

    let job = loop {
        let job = queue.get_job(&job_id).expect("job should still be tracked");
        if job.status.is_terminal() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    };

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result.unwrap().optimized_prompt, "Hello {{name}}, welcome!");
}

#[tokio::test]
async fn feedback_loop_tracks_ratings_independently_of_the_queue() {
    let feedback_loop = FeedbackLoop::new(FeedbackLoopConfig::default(), None);
    feedback_loop.record_feedback(sample_feedback()).await;
    assert_eq!(feedback_loop.feedback_for("greeting@1.0.0").len(), 1);
}
