// ABOUTME: Nine-stage optimization pipeline with stage- and pipeline-level event emission
use crate::cache::Cache;
use crate::engine::TemplateEngine;
use crate::optimizer::OptimizerClient;
use crate::storage::TemplateStore;
use promptforge_types::{OptimizationMetrics, OptimizationRequest, OptimizationResult, PipelineError, Template};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    MetadataExtraction,
    ContextPreparation,
    Preprocessing,
    ExampleGeneration,
    RequestBuilding,
    Optimization,
    Postprocessing,
    Validation,
    TemplateUpdate,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::MetadataExtraction,
        Stage::ContextPreparation,
        Stage::Preprocessing,
        Stage::ExampleGeneration,
        Stage::RequestBuilding,
        Stage::Optimization,
        Stage::Postprocessing,
        Stage::Validation,
        Stage::TemplateUpdate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::MetadataExtraction => "metadata-extraction",
            Stage::ContextPreparation => "context-preparation",
            Stage::Preprocessing => "preprocessing",
            Stage::ExampleGeneration => "example-generation",
            Stage::RequestBuilding => "request-building",
            Stage::Optimization => "optimization",
            Stage::Postprocessing => "postprocessing",
            Stage::Validation => "validation",
            Stage::TemplateUpdate => "template-update",
        }
    }
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    PipelineStarted { job_id: String },
    StageStarted { job_id: String, stage: Stage },
    StageCompleted { job_id: String, stage: Stage, duration_ms: u64 },
    StageFailed { job_id: String, stage: Stage, error: String },
    PipelineCompleted { job_id: String, duration_ms: u64 },
    PipelineFailed { job_id: String, error: String },
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum `OptimizationResult::confidence` the validation stage
    /// accepts; `None` disables the check entirely (see the confidence
    /// open-question resolution on `OptimizationResult`).
    pub min_confidence: Option<f64>,
    pub event_buffer: usize,
    /// Whether the preprocessing/postprocessing placeholder tokenization
    /// round-trip runs at all.
    pub enable_preprocessing: bool,
    pub enable_postprocessing: bool,
    pub enable_validation: bool,
    /// Cap on few-shot examples chosen in the example-generation stage.
    pub max_examples: usize,
    /// Upper bound the context-preparation stage records as a constraint;
    /// purely advisory, nothing truncates to it.
    pub max_prompt_length: usize,
    /// Whether the optimizer backend is allowed to serve a cached result.
    /// Negated into the `skip_cache` request metadata flag.
    pub cache_optimizer_results: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: Some(0.5),
            event_buffer: 256,
            enable_preprocessing: true,
            enable_postprocessing: true,
            enable_validation: true,
            max_examples: 5,
            max_prompt_length: 10_000,
            cache_optimizer_results: true,
        }
    }
}

/// Output of a completed pipeline run: the updated template and the backend
/// result that produced it.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub template: Template,
    pub result: OptimizationResult,
}

/// Intermediate value threaded from context-preparation into request-building.
/// Not persisted; it exists only to keep per-run derived facts out of the
/// request until request-building decides what to do with them.
#[derive(Debug, Clone)]
struct OptimizationContext {
    task_description: String,
    max_length: usize,
}

struct MetadataExtraction {
    variables: Vec<String>,
    complexity: u32,
    token_estimate: u64,
    includes: Vec<String>,
}

/// A placeholder token substitution, produced by preprocessing and consumed
/// by postprocessing to restore the original `{{...}}` text.
struct PlaceholderMap(Vec<(String, String)>);

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{[^{}]*\}\}").expect("placeholder pattern is valid"))
}

fn include_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{>\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("include pattern is valid"))
}

/// Orchestrates the nine fixed stages that turn a `Template` plus a render
/// context into an optimized, re-rendered `Template`. Each stage is timed
/// and wrapped in `PipelineEvent::StageStarted`/`StageCompleted`/`StageFailed`;
/// subscribers (the queue, a UI) see progress without polling.
pub struct OptimizationPipeline {
    engine: Arc<TemplateEngine>,
    optimizer: Arc<dyn OptimizerClient>,
    config: PipelineConfig,
    events: broadcast::Sender<PipelineEvent>,
    store: Option<Arc<dyn TemplateStore>>,
    cache: Option<Arc<Cache<String>>>,
}

impl OptimizationPipeline {
    pub fn new(engine: Arc<TemplateEngine>, optimizer: Arc<dyn OptimizerClient>, config: PipelineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer);
        Self {
            engine,
            optimizer,
            config,
            events,
            store: None,
            cache: None,
        }
    }

    /// Target for the template-update stage's sibling-template persistence.
    /// Preferred over `with_cache` when both are configured.
    pub fn with_store(mut self, store: Arc<dyn TemplateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Fallback persistence for the template-update stage when no
    /// `TemplateStore` is configured.
    pub fn with_cache(mut self, cache: Arc<Cache<String>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    #[instrument(skip(self, template, context), fields(template_id = %template.id()))]
    pub async fn run(
        &self,
        template: &Template,
        context: &Value,
        mut request: OptimizationRequest,
    ) -> Result<PipelineOutput, PipelineError> {
        let job_id = template.id();
        let start = Instant::now();
        self.emit(PipelineEvent::PipelineStarted { job_id: job_id.clone() });

        let run_result = self.run_stages(template, context, &mut request, &job_id).await;

        match &run_result {
            Ok(_) => self.emit(PipelineEvent::PipelineCompleted {
                job_id: job_id.clone(),
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            Err(err) => self.emit(PipelineEvent::PipelineFailed {
                job_id: job_id.clone(),
                error: err.to_string(),
            }),
        }
        run_result
    }

    async fn run_stages(
        &self,
        template: &Template,
        _context: &Value,
        request: &mut OptimizationRequest,
        job_id: &str,
    ) -> Result<PipelineOutput, PipelineError> {
        let extraction = self
            .stage(job_id, Stage::MetadataExtraction, async {
                let variables =
                    self.engine
                        .extract_variables(&template.content)
                        .map_err(|e| PipelineError::StageFailed {
                            stage: Stage::MetadataExtraction.name().to_string(),
                            message: e.to_string(),
                        })?;
                let includes = include_pattern()
                    .captures_iter(&template.content)
                    .map(|c| c[1].to_string())
                    .collect::<Vec<_>>();
                let extraction = MetadataExtraction {
                    complexity: complexity_score(&template.content, variables.len()),
                    token_estimate: estimate_tokens(&template.content),
                    variables,
                    includes,
                };
                debug!(
                    complexity = extraction.complexity,
                    tokens = extraction.token_estimate,
                    includes = extraction.includes.len(),
                    "extracted template metadata"
                );
                Ok::<_, PipelineError>(extraction)
            })
            .await?;

        let opt_context = self
            .stage(job_id, Stage::ContextPreparation, async {
                let task_description = if !request.task.trim().is_empty() {
                    request.task.clone()
                } else if let Some(category) = &template.metadata.category {
                    format!("optimize this {category} prompt")
                } else {
                    "optimize this prompt for clarity and accuracy".to_string()
                };
                Ok::<_, PipelineError>(OptimizationContext {
                    task_description,
                    max_length: self.config.max_prompt_length,
                })
            })
            .await?;

        let placeholders = self
            .stage(job_id, Stage::Preprocessing, async {
                if !self.config.enable_preprocessing {
                    return Ok::<_, PipelineError>(PlaceholderMap(Vec::new()));
                }
                Ok(tokenize_placeholders(&template.content))
            })
            .await?;

        let examples = self
            .stage(job_id, Stage::ExampleGeneration, async {
                let mut examples = request.examples.clone().unwrap_or_default();
                examples.extend(example_bank(template.metadata.category.as_deref()));
                examples.truncate(self.config.max_examples);
                Ok::<_, PipelineError>(examples)
            })
            .await?;

        self.stage(job_id, Stage::RequestBuilding, async {
            request.task = truncate_whitespace(&opt_context.task_description);
            request.original_prompt = if self.config.enable_preprocessing {
                placeholders.0.iter().fold(template.content.clone(), |acc, (token, original)| {
                    acc.replacen(original.as_str(), token.as_str(), 1)
                })
            } else {
                template.content.clone()
            };
            request.few_shot_count = examples.len().min(u8::MAX as usize) as u8;
            request.examples = Some(examples.clone());
            request.metadata.insert("template_id".to_string(), template.name.clone());
            request.metadata.insert("template_version".to_string(), template.version.clone());
            if let Some(author) = &template.metadata.author {
                request.metadata.insert("template_author".to_string(), author.clone());
            }
            request.metadata.insert("max_prompt_length".to_string(), opt_context.max_length.to_string());
            request
                .metadata
                .insert("skip_cache".to_string(), (!self.config.cache_optimizer_results).to_string());
            Ok::<_, PipelineError>(())
        })
        .await?;

        let result = self
            .stage(job_id, Stage::Optimization, async {
                self.optimizer
                    .optimize(request)
                    .await
                    .map_err(|e| PipelineError::StageFailed {
                        stage: Stage::Optimization.name().to_string(),
                        message: e.to_string(),
                    })
            })
            .await?;

        let result = self
            .stage(job_id, Stage::Postprocessing, async {
                Ok::<_, PipelineError>(postprocess(result, &placeholders, &extraction, &template.content))
            })
            .await?;

        // Validation is in the *recover* set (spec §7): a failed check is
        // logged as a stage failure but never aborts the run — the last-good
        // `result` still flows into template-update.
        let _ = self
            .stage(job_id, Stage::Validation, async {
                if !self.config.enable_validation {
                    return Ok(());
                }
                if result.metrics.accuracy_improvement <= 0.0 && result.metrics.token_reduction <= 0.0 {
                    return Err(PipelineError::ValidationFailed(
                        "neither accuracy improvement nor token reduction was positive".to_string(),
                    ));
                }
                for (_, original) in &placeholders.0 {
                    if !result.optimized_prompt.contains(original.as_str()) {
                        warn!(placeholder = %original, "optimized content dropped a placeholder present in the original");
                    }
                }
                match (self.config.min_confidence, result.confidence) {
                    (Some(min), Some(actual)) if actual < min => Err(PipelineError::ValidationFailed(format!(
                        "confidence {actual:.2} below required {min:.2}"
                    ))),
                    _ => Ok(()),
                }
            })
            .await;

        let updated_template = self
            .stage(job_id, Stage::TemplateUpdate, async {
                let sibling = build_optimized_sibling(template, &result);
                self.persist_sibling(&sibling, &result).await;
                Ok::<_, PipelineError>(sibling)
            })
            .await?;

        Ok(PipelineOutput {
            template: updated_template,
            result,
        })
    }

    async fn persist_sibling(&self, sibling: &Template, result: &OptimizationResult) {
        use crate::storage::OptimizedTemplateRecord;
        let record = OptimizedTemplateRecord {
            template: sibling.clone(),
            result: result.clone(),
        };
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&record).await {
                error!(error = %e, "failed to persist optimized sibling template");
            }
            return;
        }
        if let Some(cache) = &self.cache {
            match serde_json::to_string(&record) {
                Ok(json) => cache.insert(&sibling.id(), json).await,
                Err(e) => error!(error = %e, "failed to serialize optimized sibling template for the cache"),
            }
        }
    }

    async fn stage<T>(
        &self,
        job_id: &str,
        stage: Stage,
        fut: impl std::future::Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        self.emit(PipelineEvent::StageStarted {
            job_id: job_id.to_string(),
            stage,
        });
        let start = Instant::now();
        match fut.await {
            Ok(value) => {
                self.emit(PipelineEvent::StageCompleted {
                    job_id: job_id.to_string(),
                    stage,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
                Ok(value)
            }
            Err(err) => {
                warn!(stage = stage.name(), error = %err, "pipeline stage failed");
                self.emit(PipelineEvent::StageFailed {
                    job_id: job_id.to_string(),
                    stage,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is the common case outside tests; a send error
        // there just means nobody's listening, not a pipeline failure.
        let _ = self.events.send(event);
    }
}

/// Structural complexity: one point per conditional/loop/partial-include
/// occurrence, one point per declared variable, one point per 500 characters
/// of content, capped at 10.
fn complexity_score(content: &str, variable_count: usize) -> u32 {
    let conditionals = content.matches("{{#if").count() + content.matches("{{#unless").count();
    let loops = content.matches("{{#each").count();
    let includes = content.matches("{{>").count();
    let length_score = content.len() / 500;
    ((conditionals + loops + includes + variable_count + length_score) as u32).min(10)
}

fn estimate_tokens(content: &str) -> u64 {
    (content.len() as u64).div_ceil(4)
}

fn truncate_whitespace(task: &str) -> String {
    task.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize_placeholders(content: &str) -> PlaceholderMap {
    let mut mapping = Vec::new();
    for (i, m) in placeholder_pattern().find_iter(content).enumerate() {
        mapping.push((format!("__VAR_{i}__"), m.as_str().to_string()));
    }
    PlaceholderMap(mapping)
}

fn example_bank(category: Option<&str>) -> Vec<String> {
    match category {
        Some("coding") => vec![
            "Input: a function with unclear naming -> Output: the same function with descriptive names".to_string(),
            "Input: a bug report -> Output: a minimal reproduction plus a root-cause hypothesis".to_string(),
        ],
        Some("analysis") => vec![
            "Input: a dataset summary -> Output: three ranked findings with supporting numbers".to_string(),
        ],
        _ => vec!["Input: a vague request -> Output: a clarified, actionable restatement".to_string()],
    }
}

fn postprocess(
    mut result: OptimizationResult,
    placeholders: &PlaceholderMap,
    extraction: &MetadataExtraction,
    original_content: &str,
) -> OptimizationResult {
    result.optimized_prompt = result.optimized_prompt.trim().to_string();
    for (token, original) in &placeholders.0 {
        result.optimized_prompt = result.optimized_prompt.replace(token.as_str(), original.as_str());
    }

    let original_tokens = estimate_tokens(original_content) as f64;
    let optimized_tokens = estimate_tokens(&result.optimized_prompt) as f64;
    if original_tokens > 0.0 {
        result.metrics.token_reduction = ((original_tokens - optimized_tokens) / original_tokens).max(0.0);
    }

    let optimized_variable_count = extraction.variables.len();
    let optimized_complexity = complexity_score(&result.optimized_prompt, optimized_variable_count);
    if extraction.complexity > 0 {
        result.metrics.complexity_reduction =
            ((extraction.complexity as f64 - optimized_complexity as f64) / extraction.complexity as f64).max(0.0);
    }
    result
}

fn build_optimized_sibling(template: &Template, result: &OptimizationResult) -> Template {
    let mut sibling = template.with_rendered_content(result.optimized_prompt.clone());
    // `id()` is `{name}@{version}`; suffixing the version yields the
    // spec-mandated sibling id `${original}_optimized`.
    sibling.version = format!("{}_optimized", template.version);
    sibling.name = format!("{} (Optimized)", template.name);
    sibling.metadata.extra.insert("original_id".to_string(), template.id());
    sibling.metadata.extra.insert("optimized_at".to_string(), chrono::Utc::now().to_rfc3339());
    sibling.metadata.extra.insert(
        "token_reduction".to_string(),
        format!("{:.4}", result.metrics.token_reduction),
    );
    sibling.metadata.extra.insert(
        "accuracy_improvement".to_string(),
        format!("{:.4}", result.metrics.accuracy_improvement),
    );
    sibling
}
