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

// ABOUTME: CLI-local configuration layered on top of promptforge-core's OptimizerSettings
use std::env;
use std::path::PathBuf;

/// Settings the CLI itself owns; everything about the optimizer backend,
/// cache, and rate limiting comes from `promptforge_core::config::ConfigBuilder`
/// instead of being re-declared here.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Directory `FileTemplateStore` persists optimized templates under.
    pub store_dir: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("./promptforge-store"),
        }
    }
}

impl CliConfig {
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = env::var("PROMPTFORGE_STORE_DIR") {
            config.store_dir = PathBuf::from(dir);
        }
        config
    }
}
