// ABOUTME: Core business logic for the promptforge template optimization service
//! This crate implements the three core subsystems of the template
//! optimization service: the [`engine`] (parser/renderer for the
//! Mustache/Handlebars-style template language), the [`pipeline`] (the
//! nine-stage, event-emitting optimizer), and the [`queue`] (priority job
//! scheduler plus the continuous-improvement feedback loop). [`cache`],
//! [`optimizer`], [`storage`], and [`config`] are the supporting services
//! those three subsystems are built on.

pub mod cache;
pub mod config;
pub mod engine;
pub mod optimizer;
pub mod pipeline;
pub mod queue;
pub mod storage;

pub use cache::{Cache, CacheConfig, CacheStats, DistributedCacheTier};
pub use engine::TemplateEngine;
pub use optimizer::{HttpOptimizerClient, OptimizerClient, OptimizerConfig};
pub use pipeline::{OptimizationPipeline, PipelineConfig, PipelineEvent, PipelineOutput, Stage};
pub use queue::{
    AddJobOptions, CancelOutcome, DistributedQueueBackend, FeedbackEvent, FeedbackLoop, FeedbackLoopConfig, JobQueue,
    QueueConfig, QueueEvent, QueueStats, ReoptimizationTrigger, Trend,
};
pub use storage::{FileTemplateStore, OptimizedTemplateRecord, TemplateStore};
