// Copyright 2025 CE-DPS Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// ABOUTME: CLI for rendering templates and driving the optimization queue
use clap::{Parser, Subcommand};
use promptforge_core::config::ConfigBuilder;
use promptforge_core::cache::fingerprint;
use promptforge_core::{
    AddJobOptions, Cache, CacheConfig, FeedbackLoop, FeedbackLoopConfig, FileTemplateStore, HttpOptimizerClient,
    JobQueue, OptimizationPipeline, OptimizerClient, OptimizerConfig, PipelineConfig, QueueConfig, TemplateEngine,
    TemplateStore,
};
use promptforge_types::{Feedback, FeedbackCategory, Job, JobStatus, OptimizationRequest, Priority, Template};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};

mod config;
use config::CliConfig;

#[derive(Parser)]
#[command(name = "promptforge")]
#[command(about = "Render templates, submit optimization jobs, and inspect the optimization queue")]
#[command(version = "0.1.0")]
#[command(author = "Concordia Team")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template against a JSON context
    Render {
        /// Path to a Mustache/Handlebars-style template file
        template_file: PathBuf,

        /// Path to a JSON context file; omit to render with an empty context
        #[arg(short, long)]
        context_file: Option<PathBuf>,
    },

    /// Validate a JSON context against a template's declared variable schema
    Validate {
        /// Path to a serialized `Template` (JSON)
        template_file: PathBuf,

        /// Path to a JSON context file
        #[arg(short, long)]
        context_file: Option<PathBuf>,
    },

    /// Submit an optimization job and, optionally, wait for it to finish
    Optimize {
        /// Path to a serialized `Template` (JSON)
        template_file: PathBuf,

        /// Natural-language description of what the prompt should accomplish
        #[arg(short, long)]
        task: String,

        /// Job priority: low, normal, high, urgent
        #[arg(short, long, default_value = "normal")]
        priority: String,

        /// Poll until the job reaches a terminal state and print the result
        #[arg(short, long)]
        wait: bool,
    },

    /// Print the job queue's current counters
    QueueStats,

    /// Print the render cache's current counters
    CacheStats,

    /// Submit a feedback rating for a template and print its rating trend
    Feedback {
        template_id: String,

        /// 1-5
        rating: u8,

        /// accuracy, relevance, clarity, completeness, efficiency
        #[arg(short, long, default_value = "clarity")]
        category: String,

        #[arg(short, long)]
        comment: Option<String>,
    },
}

/// Wires together the three core subsystems plus persistence for a single
/// CLI invocation. Every run starts from an empty queue and cache: the CLI
/// is a one-shot client over the library, not a long-lived server.
struct App {
    engine: Arc<TemplateEngine>,
    queue: JobQueue,
    render_cache: Arc<Cache<String>>,
    feedback: FeedbackLoop,
    store_dir: PathBuf,
}

impl App {
    async fn new(cli_config: &CliConfig) -> anyhow::Result<Self> {
        let settings = ConfigBuilder::new().with_env().build()?;
        let engine = Arc::new(TemplateEngine::new());

        let optimizer_config = OptimizerConfig {
            timeout: Duration::from_millis(settings.timeout_ms),
            max_retries: settings.retries,
            ..OptimizerConfig::new(settings.service_url.clone(), settings.api_key.clone().unwrap_or_default())
        };
        let optimizer: Arc<dyn OptimizerClient> = Arc::new(HttpOptimizerClient::new(optimizer_config)?);
        let render_cache = Arc::new(Cache::new(CacheConfig {
            max_entries: settings.cache.max_size,
            ttl: Duration::from_secs(settings.cache.ttl_secs),
        }));
        let pipeline = Arc::new(
            OptimizationPipeline::new(
                engine.clone(),
                optimizer,
                PipelineConfig {
                    min_confidence: Some(settings.min_confidence),
                    ..PipelineConfig::default()
                },
            )
            .with_cache(render_cache.clone()),
        );
        let queue = JobQueue::new(pipeline, QueueConfig::default());
        let feedback = FeedbackLoop::new(FeedbackLoopConfig::default(), None);

        Ok(Self {
            engine,
            queue,
            render_cache,
            feedback,
            store_dir: cli_config.store_dir.clone(),
        })
    }

    /// Opens (creating if needed) the optimized-template store. Lazy, so
    /// commands that never touch storage don't create the directory.
    async fn store(&self) -> anyhow::Result<FileTemplateStore> {
        Ok(FileTemplateStore::new(self.store_dir.clone()).await?)
    }

    async fn handle_render(&self, template_file: PathBuf, context_file: Option<PathBuf>) -> anyhow::Result<()> {
        let context = load_context(context_file)?;
        let cache_key = fingerprint(&[&template_file.display().to_string(), &context.to_string()]);
        if let Some(cached) = self.render_cache.get(&cache_key).await {
            println!("{cached}");
            return Ok(());
        }
        let rendered = self.engine.render_file(&template_file, &context)?;
        self.render_cache.insert(&cache_key, rendered.clone()).await;
        println!("{rendered}");
        Ok(())
    }

    fn handle_validate(&self, template_file: PathBuf, context_file: Option<PathBuf>) -> anyhow::Result<()> {
        let template = load_template(&template_file)?;
        let context = load_context(context_file)?;
        let result = self.engine.validate_context(&template.content, &context)?;
        if result.valid {
            println!("context is valid for {}", template.id());
            Ok(())
        } else {
            for path in &result.missing {
                println!("missing variable: {path}");
            }
            anyhow::bail!("{} validation error(s)", result.missing.len());
        }
    }

    async fn handle_optimize(
        &self,
        template_file: PathBuf,
        task: String,
        priority: String,
        wait: bool,
    ) -> anyhow::Result<()> {
        let template = load_template(&template_file)?;
        let priority = parse_priority(&priority)?;
        let request = OptimizationRequest::new(task, template.content.clone());
        let job_id = self
            .queue
            .add_job(
                template.id(),
                template,
                request,
                AddJobOptions {
                    priority,
                    ..AddJobOptions::default()
                },
            )
            .await;
        println!("submitted job {job_id}");

        if wait {
            let job = self.wait_for_completion(&job_id).await?;
            print_job_outcome(&job);
            if let Some(result) = &job.result {
                self.store()
                    .await?
                    .save(&promptforge_core::OptimizedTemplateRecord {
                        template: load_template(&template_file)?,
                        result: result.clone(),
                    })
                    .await?;
            }
        }
        Ok(())
    }

    async fn wait_for_completion(&self, job_id: &str) -> anyhow::Result<Job> {
        loop {
            let Some(job) = self.queue.get_job(job_id) else {
                anyhow::bail!("job {job_id} disappeared from the queue");
            };
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn handle_queue_stats(&self) {
        let stats = self.queue.get_stats().await;
        println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
    }

    fn handle_cache_stats(&self) {
        let stats = self.render_cache.stats();
        println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
    }

    async fn handle_feedback(
        &self,
        template_id: String,
        rating: u8,
        category: String,
        comment: Option<String>,
    ) -> anyhow::Result<()> {
        let category = parse_feedback_category(&category)?;
        let feedback = Feedback::new(template_id.clone(), rating, category, None, comment);
        self.feedback.record_feedback(feedback).await;
        println!("recorded feedback for {template_id}; rating trend: {:?}", self.feedback.trend(&template_id));
        Ok(())
    }
}

fn load_context(path: Option<PathBuf>) -> anyhow::Result<serde_json::Value> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(serde_json::Value::Object(Default::default())),
    }
}

fn load_template(path: &PathBuf) -> anyhow::Result<Template> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn parse_priority(raw: &str) -> anyhow::Result<Priority> {
    match raw.to_ascii_lowercase().as_str() {
        "low" => Ok(Priority::Low),
        "normal" => Ok(Priority::Normal),
        "high" => Ok(Priority::High),
        "urgent" => Ok(Priority::Urgent),
        other => anyhow::bail!("unknown priority '{other}' (expected low, normal, high, or urgent)"),
    }
}

fn parse_feedback_category(raw: &str) -> anyhow::Result<FeedbackCategory> {
    match raw.to_ascii_lowercase().as_str() {
        "accuracy" => Ok(FeedbackCategory::Accuracy),
        "relevance" => Ok(FeedbackCategory::Relevance),
        "clarity" => Ok(FeedbackCategory::Clarity),
        "completeness" => Ok(FeedbackCategory::Completeness),
        "efficiency" => Ok(FeedbackCategory::Efficiency),
        other => anyhow::bail!("unknown feedback category '{other}'"),
    }
}

fn print_job_outcome(job: &Job) {
    match job.status {
        JobStatus::Completed => {
            if let Some(result) = &job.result {
                println!("{}", result.optimized_prompt);
            }
        }
        JobStatus::Failed => {
            eprintln!("job failed: {}", job.error.as_deref().unwrap_or("unknown error"));
        }
        JobStatus::Cancelled => eprintln!("job was cancelled"),
        JobStatus::Pending | JobStatus::Processing => unreachable!("wait_for_completion only returns terminal jobs"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let cli_config = CliConfig::load();
    let app = App::new(&cli_config).await.unwrap_or_else(|e| {
        warn!("failed to initialize application: {e}");
        std::process::exit(1);
    });
    info!("promptforge CLI ready");

    let result = match cli.command {
        Commands::Render { template_file, context_file } => app.handle_render(template_file, context_file).await,
        Commands::Validate { template_file, context_file } => app.handle_validate(template_file, context_file),
        Commands::Optimize { template_file, task, priority, wait } => {
            app.handle_optimize(template_file, task, priority, wait).await
        }
        Commands::QueueStats => {
            app.handle_queue_stats().await;
            Ok(())
        }
        Commands::CacheStats => {
            app.handle_cache_stats();
            Ok(())
        }
        Commands::Feedback { template_id, rating, category, comment } => {
            app.handle_feedback(template_id, rating, category, comment).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
