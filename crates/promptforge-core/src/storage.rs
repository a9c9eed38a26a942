// ABOUTME: Filesystem persistence for optimized template artifacts
use async_trait::async_trait;
use promptforge_types::{ForgeError, OptimizationResult, Template};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// An optimized template plus the result metadata that produced it,
/// persisted together as a single JSON document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OptimizedTemplateRecord {
    pub template: Template,
    pub result: OptimizationResult,
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn save(&self, record: &OptimizedTemplateRecord) -> Result<(), ForgeError>;
    async fn load(&self, template_id: &str) -> Result<Option<OptimizedTemplateRecord>, ForgeError>;
    async fn delete(&self, template_id: &str) -> Result<(), ForgeError>;
    async fn list(&self) -> Result<Vec<String>, ForgeError>;
}

/// Stores each optimized template as `<base_dir>/<id>.optimized.json`, with
/// `/` in an id's version component mapped to `_` so ids remain valid
/// single path segments.
pub struct FileTemplateStore {
    base_dir: PathBuf,
    index_lock: RwLock<()>,
}

impl FileTemplateStore {
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self, ForgeError> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            async_fs::create_dir_all(&base_dir).await?;
            info!(dir = %base_dir.display(), "created optimized template store directory");
        }
        Ok(Self {
            base_dir,
            index_lock: RwLock::new(()),
        })
    }

    fn path_for(&self, template_id: &str) -> PathBuf {
        let safe_name = template_id.replace('/', "_");
        self.base_dir.join(format!("{safe_name}.optimized.json"))
    }
}

#[async_trait]
impl TemplateStore for FileTemplateStore {
    async fn save(&self, record: &OptimizedTemplateRecord) -> Result<(), ForgeError> {
        let _guard = self.index_lock.write().await;
        let path = self.path_for(&record.template.id());
        let json = serde_json::to_vec_pretty(record)?;
        async_fs::write(&path, json).await?;
        debug!(path = %path.display(), "saved optimized template");
        Ok(())
    }

    async fn load(&self, template_id: &str) -> Result<Option<OptimizedTemplateRecord>, ForgeError> {
        let _guard = self.index_lock.read().await;
        let path = self.path_for(template_id);
        match async_fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, template_id: &str) -> Result<(), ForgeError> {
        let _guard = self.index_lock.write().await;
        let path = self.path_for(template_id);
        match async_fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, ForgeError> {
        let _guard = self.index_lock.read().await;
        let mut ids = Vec::new();
        let mut entries = match async_fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(name) = file_stem_without_optimized_suffix(&path) {
                ids.push(name);
            } else {
                warn!(path = %path.display(), "skipping unexpected file in optimized template store");
            }
        }
        Ok(ids)
    }
}

fn file_stem_without_optimized_suffix(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(".optimized.json").map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptforge_types::{OptimizationMetrics, OptimizationStatus};

    fn sample_record() -> OptimizedTemplateRecord {
        let template = Template::new("greeting", "1.0.0", "Hello {{name}}");
        let result = OptimizationResult {
            optimized_prompt: template.content.clone(),
            metrics: OptimizationMetrics {
                accuracy_improvement: 0.1,
                token_reduction: 0.2,
                cost_reduction: 1.1,
                processing_time_ms: 120,
                api_calls_used: 1,
                complexity_reduction: 0.0,
            },
            confidence: Some(0.9),
            status: OptimizationStatus::Completed,
            created_at: chrono::Utc::now(),
            completed_at: Some(chrono::Utc::now()),
        };
        OptimizedTemplateRecord { template, result }
    }

    #[tokio::test]
    async fn round_trips_a_saved_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTemplateStore::new(dir.path()).await.unwrap();
        let record = sample_record();

        store.save(&record).await.unwrap();
        let loaded = store.load(&record.template.id()).await.unwrap().unwrap();

        assert_eq!(loaded.template.id(), record.template.id());
        assert_eq!(loaded.result.optimized_prompt, record.result.optimized_prompt);
    }

    #[tokio::test]
    async fn missing_template_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTemplateStore::new(dir.path()).await.unwrap();
        assert!(store.load("nope@1.0.0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_then_list_reflects_removal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTemplateStore::new(dir.path()).await.unwrap();
        let record = sample_record();
        store.save(&record).await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec![record.template.id()]);
        store.delete(&record.template.id()).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_template_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTemplateStore::new(dir.path()).await.unwrap();
        store.delete("nope@1.0.0").await.unwrap();
    }
}
