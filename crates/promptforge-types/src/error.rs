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

// ABOUTME: Tagged error taxonomy for the promptforge optimization service
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Severity of an error, independent of its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Broad category an error belongs to, used for routing and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Validation,
    Network,
    Filesystem,
    Configuration,
    Template,
    Internal,
}

impl Category {
    /// Transient errors are eligible for queue retry; permanent ones are not.
    pub fn is_transient(self) -> bool {
        matches!(self, Category::Network)
    }
}

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ForgeError {
    pub fn category(&self) -> Category {
        match self {
            ForgeError::Template(_) => Category::Template,
            ForgeError::Pipeline(_) => Category::Internal,
            ForgeError::Queue(_) => Category::Internal,
            ForgeError::Cache(_) => Category::Internal,
            ForgeError::Network(_) => Category::Network,
            ForgeError::Validation(_) => Category::Validation,
            ForgeError::Configuration(_) => Category::Configuration,
            ForgeError::Io(_) => Category::Filesystem,
            ForgeError::Json(_) => Category::Internal,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ForgeError::Template(TemplateError::IncludeCycle(_)) => Severity::Medium,
            ForgeError::Template(_) => Severity::Medium,
            ForgeError::Validation(_) => Severity::Low,
            ForgeError::Configuration(_) => Severity::High,
            ForgeError::Network(_) => Severity::Medium,
            ForgeError::Io(_) => Severity::Medium,
            ForgeError::Pipeline(_) | ForgeError::Queue(_) => Severity::Medium,
            ForgeError::Cache(_) => Severity::Low,
            ForgeError::Json(_) => Severity::Critical,
        }
    }

    /// Transient errors (network, timeout) are eligible for queue retry;
    /// permanent errors (validation, template, configuration) are not.
    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }
}

/// Structured, user-visible error payload: stable code, message, severity,
/// and the affected entity id where applicable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub entity_id: Option<String>,
    pub context: HashMap<String, String>,
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("circular dependency detected: {0}")]
    IncludeCycle(String),

    #[error("include file not found: {0}")]
    IncludeNotFound(String),

    #[error("include depth exceeded (max {max}): {path}")]
    IncludeDepthExceeded { path: String, max: usize },

    #[error("malformed block: {0}")]
    MalformedBlock(String),

    #[error("partial not found: {0}")]
    PartialNotFound(String),

    #[error("io error reading template: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    #[error("type mismatch for '{name}': expected {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("value for '{name}' does not match pattern {pattern}")]
    PatternMismatch { name: String, pattern: String },

    #[error("value for '{name}' is outside allowed range")]
    OutOfRange { name: String },

    #[error("value for '{name}' is not one of the allowed choices")]
    EnumMiss { name: String },
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("optimizer backend unreachable: {0}")]
    Unreachable(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("optimizer backend returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("response shape mismatch: {0}")]
    ShapeMismatch(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("validation stage rejected result: {0}")]
    ValidationFailed(String),

    #[error("dependency for stage '{stage}' was not satisfied")]
    DependencyUnsatisfied { stage: String },
}

impl PipelineError {
    /// Only the optimization stage talks to the network; every other stage
    /// failure is an internal or template defect that a retry cannot fix.
    /// Mirrors `ForgeError::is_transient`'s network/permanent split at the
    /// stage-failure granularity the queue observes.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::StageFailed { stage, .. } if stage == "optimization")
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job timed out after {0}ms")]
    Timeout(u64),

    #[error("queue is shutting down")]
    ShuttingDown,

    #[error("distributed backend unavailable, falling back to local queue: {0}")]
    BackendUnavailable(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("producer for key '{0}' panicked or was cancelled")]
    ProducerFailed(String),

    #[error("distributed cache tier error: {0}")]
    RemoteTier(String),
}

pub type Result<T> = std::result::Result<T, ForgeError>;
