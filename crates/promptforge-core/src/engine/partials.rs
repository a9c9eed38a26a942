// ABOUTME: Named and directory-loaded partial templates, kept as raw text until render time
use promptforge_types::TemplateError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Holds raw (unparsed) partial template bodies by name. Partials are
/// re-parsed on every render that reaches them, mirroring how the main
/// template is parsed fresh each call; this keeps a partial edited on disk
/// picking up live without a separate invalidation path.
#[derive(Debug, Clone, Default)]
pub struct PartialRegistry {
    partials: HashMap<String, String>,
    directory: Option<PathBuf>,
}

impl PartialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.partials.insert(name.into(), content.into());
    }

    pub fn register_from_file(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<(), TemplateError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        self.partials.insert(name.into(), content);
        Ok(())
    }

    pub fn set_directory(&mut self, dir: impl Into<PathBuf>) {
        self.directory = Some(dir.into());
    }

    /// Load every `*.hbs`/`*.mustache`/`*.tmpl` file in the configured
    /// directory, registering each under its file stem.
    pub fn load_directory(&mut self) -> Result<usize, TemplateError> {
        let dir = self
            .directory
            .clone()
            .ok_or_else(|| TemplateError::PartialNotFound("no partials directory configured".to_string()))?;
        let mut loaded = 0;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_template = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("hbs") | Some("mustache") | Some("tmpl")
            );
            if !is_template {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                let content = std::fs::read_to_string(&path)?;
                self.partials.insert(stem.to_string(), content);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.partials.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_retrieves_by_name() {
        let mut registry = PartialRegistry::new();
        registry.register("header", "Hi {{name}}");
        assert_eq!(registry.get("header"), Some("Hi {{name}}"));
        assert!(registry.contains("header"));
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn loads_template_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("footer.hbs"), "bye {{name}}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = PartialRegistry::new();
        registry.set_directory(dir.path());
        let loaded = registry.load_directory().unwrap();

        assert_eq!(loaded, 1);
        assert_eq!(registry.get("footer"), Some("bye {{name}}"));
        assert!(!registry.contains("notes"));
    }
}
