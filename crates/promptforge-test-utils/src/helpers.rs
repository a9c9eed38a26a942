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

// ABOUTME: Test helpers for promptforge's template, job, and feedback types
use promptforge_types::{Job, Template};
use tempfile::TempDir;

/// Create a temporary directory for testing.
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("failed to create temporary directory")
}

/// Assert that two templates are equivalent in everything but `metadata`
/// timestamps, which a round-trip through storage does not preserve bit
/// for bit.
pub fn assert_templates_equal(a: &Template, b: &Template) {
    assert_eq!(a.name, b.name);
    assert_eq!(a.version, b.version);
    assert_eq!(a.content, b.content);
    assert_eq!(a.variables, b.variables);
}

/// Assert that a job was constructed with a sane initial state.
pub fn assert_job_freshly_created(job: &Job) {
    assert_eq!(job.progress, 0);
    assert_eq!(job.retry_count, 0);
    assert!(job.started_at.is_none());
    assert!(job.completed_at.is_none());
    assert!(job.error.is_none());
    assert!(job.result.is_none());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_job;

    #[test]
    fn temp_dir_exists_while_held() {
        let dir = create_temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn sample_job_passes_the_freshness_assertion() {
        assert_job_freshly_created(&sample_job());
    }
}
