// ABOUTME: Optimizer backend request/response contract
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Target model the optimizer backend should tune the prompt for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetModel {
    Gpt4,
    Gpt35Turbo,
    Claude3Opus,
    Claude3Sonnet,
    GeminiPro,
}

impl Default for TargetModel {
    fn default() -> Self {
        TargetModel::Claude3Sonnet
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub task: String,
    pub original_prompt: String,
    pub target_model: TargetModel,
    /// Refinement-iteration count, 1-10.
    pub refine_iterations: u8,
    /// Few-shot example count, 0-20.
    pub few_shot_count: u8,
    pub generate_reasoning: bool,
    pub examples: Option<Vec<String>>,
    pub metadata: HashMap<String, String>,
}

impl OptimizationRequest {
    pub fn new(task: impl Into<String>, original_prompt: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            original_prompt: original_prompt.into(),
            target_model: TargetModel::default(),
            refine_iterations: 3,
            few_shot_count: 5,
            generate_reasoning: true,
            examples: None,
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    /// In [0, 1].
    pub accuracy_improvement: f64,
    /// In [0, 1].
    pub token_reduction: f64,
    /// A factor >= 1.
    pub cost_reduction: f64,
    pub processing_time_ms: u64,
    pub api_calls_used: u32,
    /// Drop in the pipeline's structural complexity score from original to
    /// optimized content, as a fraction of the original score. 0 when the
    /// original score was 0.
    pub complexity_reduction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub optimized_prompt: String,
    pub metrics: OptimizationMetrics,
    /// In [0, 1]. `None` means "do not enforce the confidence threshold";
    /// `Some(0.0)` means the result fails it. See DESIGN.md.
    pub confidence: Option<f64>,
    pub status: OptimizationStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
