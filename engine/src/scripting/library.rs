//! In-memory script library backing the content repository

use crate::scripting::error::ScriptError;
use crate::scripting::resource::{ContentRepository, ScriptKind, ScriptResource};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Extension for imperative script files
pub const SCRIPT_EXTENSION: &str = "rhai";
/// Suffix (before the extension) marking a declarative script file
pub const DECLARATIVE_SUFFIX: &str = ".decl";

/// Map a script file path to its id and kind
///
/// `spin.rhai` is the imperative script `spin`; `hud.decl.rhai` is the
/// declarative script `hud`.
pub fn classify_script_file(path: &Path) -> Result<(String, ScriptKind), ScriptError> {
    let not_a_script = || ScriptError::NotAScript(path.to_path_buf());

    if path.extension().and_then(|ext| ext.to_str()) != Some(SCRIPT_EXTENSION) {
        return Err(not_a_script());
    }
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(not_a_script)?;

    match stem.strip_suffix(DECLARATIVE_SUFFIX) {
        Some("") => Err(not_a_script()),
        Some(id) => Ok((id.to_string(), ScriptKind::Declarative)),
        None if stem.is_empty() => Err(not_a_script()),
        None => Ok((stem.to_string(), ScriptKind::Imperative)),
    }
}

/// Script resources keyed by id, plus the queue of `Updated` signals
#[derive(Debug, Default)]
pub struct ScriptLibrary {
    resources: HashMap<String, Arc<ScriptResource>>,
    updates: Vec<String>,
}

impl ScriptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every script file in a directory
    ///
    /// Files that are not scripts are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, ScriptError> {
        let io_error = |source| ScriptError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut library = Self::new();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_error)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        for path in paths {
            match classify_script_file(&path) {
                Ok((id, kind)) => {
                    let source = read_source(&path)?;
                    debug!(script = %id, kind = ?kind, path = ?path, "Loaded script file");
                    library.insert(ScriptResource::new(id, kind, source));
                }
                Err(_) => debug!(path = ?path, "Skipping non-script file"),
            }
        }

        // Initial population is not an update
        library.updates.clear();
        info!(count = library.len(), dir = ?dir, "Script library loaded");
        Ok(library)
    }

    /// Add or replace a resource
    ///
    /// Replacing keeps the revision sequence monotonic. Both cases signal
    /// `Updated` so that entities waiting on the id get rebuilt.
    pub fn insert(&mut self, resource: ScriptResource) -> Arc<ScriptResource> {
        let id = resource.id().to_string();
        let resource = match self.resources.get(&id) {
            Some(existing) => resource.at_revision(existing.revision() + 1),
            None => resource,
        };

        let resource = Arc::new(resource);
        self.resources.insert(id.clone(), resource.clone());
        self.updates.push(id);
        resource
    }

    /// Bump a resource's revision without changing its content
    pub fn mark_updated(&mut self, id: &str) -> Result<u64, ScriptError> {
        let existing = self
            .resources
            .get(id)
            .ok_or_else(|| ScriptError::UnknownScript(id.to_string()))?;
        let next = Arc::new(existing.updated());
        let revision = next.revision();
        self.resources.insert(id.to_string(), next);
        self.updates.push(id.to_string());
        debug!(script = %id, revision, "Script marked updated");
        Ok(revision)
    }

    /// Swap in new source text for an existing resource
    pub fn replace_source(&mut self, id: &str, source: impl Into<String>) -> Result<u64, ScriptError> {
        let existing = self
            .resources
            .get(id)
            .ok_or_else(|| ScriptError::UnknownScript(id.to_string()))?;
        let next = Arc::new(existing.with_source(source));
        let revision = next.revision();
        self.resources.insert(id.to_string(), next);
        self.updates.push(id.to_string());
        debug!(script = %id, revision, "Script source replaced");
        Ok(revision)
    }

    /// Re-read a script file, adding it if it is new
    ///
    /// Returns the id of the affected script.
    pub fn reload_file(&mut self, path: &Path) -> Result<String, ScriptError> {
        let (id, kind) = classify_script_file(path)?;
        let source = read_source(path)?;
        if self.resources.contains_key(&id) {
            self.replace_source(&id, source)?;
        } else {
            self.insert(ScriptResource::new(id.clone(), kind, source));
        }
        Ok(id)
    }

    /// Remove a resource; entities referencing it drop it on their next rebuild
    pub fn remove(&mut self, id: &str) -> Option<Arc<ScriptResource>> {
        let removed = self.resources.remove(id);
        if removed.is_some() {
            self.updates.push(id.to_string());
        }
        removed
    }

    /// Take the ids of `Updated` signals raised since the last drain
    pub fn drain_updates(&mut self) -> Vec<String> {
        std::mem::take(&mut self.updates)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ContentRepository for ScriptLibrary {
    fn resolve(&self, id: &str) -> Option<Arc<ScriptResource>> {
        self.resources.get(id).cloned()
    }
}

fn read_source(path: &Path) -> Result<String, ScriptError> {
    std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })
}
