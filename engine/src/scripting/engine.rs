//! Rhai engine wrapper with compiled-script caching

use crate::scripting::error::ScriptError;
use crate::scripting::resource::ScriptResource;
use rhai::{Dynamic, Engine, Scope, AST};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, trace};

/// Messages scripts publish through `emit(...)`, in call order
pub type ScriptJournal = Arc<RwLock<Vec<String>>>;

/// Script engine with a compile cache keyed by `(id, revision)`
#[derive(Clone)]
pub struct ScriptEngine {
    /// The Rhai engine instance
    pub engine: Arc<Engine>,
    cache: Arc<RwLock<HashMap<(String, u64), Arc<AST>>>>,
    journal: ScriptJournal,
}

impl ScriptEngine {
    pub fn new() -> Self {
        let mut engine = Engine::new();

        // Configure engine for safety
        engine.set_max_expr_depths(100, 100);
        engine.set_max_call_levels(50);
        engine.set_max_operations(100_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(1_000);
        engine.disable_symbol("eval");

        engine.on_print(|text| info!(target: "script", "{text}"));
        engine.on_debug(|text, source, pos| {
            debug!(target: "script", source = source.unwrap_or("<script>"), position = %pos, "{text}");
        });

        let journal: ScriptJournal = Arc::new(RwLock::new(Vec::new()));
        let sink = journal.clone();
        engine.register_fn("emit", move |message: &str| {
            if let Ok(mut entries) = sink.write() {
                entries.push(message.to_string());
            }
        });

        Self {
            engine: Arc::new(engine),
            cache: Arc::new(RwLock::new(HashMap::new())),
            journal,
        }
    }

    /// Compile a resource's source, reusing the cached AST for its revision
    pub fn compile_resource(&self, resource: &ScriptResource) -> Result<Arc<AST>, ScriptError> {
        let key = (resource.id().to_string(), resource.revision());
        if let Some(ast) = self.cache.read().ok().and_then(|cache| cache.get(&key).cloned()) {
            trace!(script = %resource.id(), revision = resource.revision(), "Using cached script");
            return Ok(ast);
        }

        let ast = self.compile_source(resource.id(), resource.source())?;
        if let Ok(mut cache) = self.cache.write() {
            // Older revisions of the same script are never asked for again
            cache.retain(|(id, _), _| id != resource.id());
            cache.insert(key, ast.clone());
        }
        Ok(ast)
    }

    /// Compile source text without caching it
    pub fn compile_source(&self, id: &str, source: &str) -> Result<Arc<AST>, ScriptError> {
        debug!(script = %id, "Compiling script");
        self.engine
            .compile(source)
            .map(Arc::new)
            .map_err(|e| {
                let position = e.position();
                ScriptError::Compile {
                    id: id.to_string(),
                    message: format!(
                        "{}:{} - {}",
                        position.line().unwrap_or(0),
                        position.position().unwrap_or(0),
                        e
                    ),
                }
            })
    }

    /// Whether the script defines a function with this name
    pub fn has_function(ast: &AST, name: &str) -> bool {
        ast.iter_functions().any(|function| function.name == name)
    }

    /// Call a lifecycle hook with the entity id, if the script defines it
    pub fn call_hook(
        &self,
        id: &str,
        ast: &AST,
        scope: &mut Scope<'static>,
        hook: &'static str,
        entity_id: i64,
    ) -> Result<(), ScriptError> {
        if !Self::has_function(ast, hook) {
            trace!(script = %id, hook, "Hook not defined");
            return Ok(());
        }

        self.engine
            .call_fn::<Dynamic>(scope, ast, hook, (entity_id,))
            .map(|_| ())
            .map_err(|e| {
                let position = e.position();
                ScriptError::Hook {
                    id: id.to_string(),
                    hook,
                    message: format!(
                        "{}:{} - {}",
                        position.line().unwrap_or(0),
                        position.position().unwrap_or(0),
                        e
                    ),
                }
            })
    }

    /// Handle to the messages scripts have emitted
    pub fn journal(&self) -> ScriptJournal {
        self.journal.clone()
    }

    /// Copy of the emitted messages so far
    pub fn journal_entries(&self) -> Vec<String> {
        self.journal
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn is_cached(&self, id: &str, revision: u64) -> bool {
        self.cache
            .read()
            .map(|cache| cache.contains_key(&(id.to_string(), revision)))
            .unwrap_or(false)
    }

    /// Drop every cached revision of a script; returns how many were dropped
    pub fn evict(&self, id: &str) -> usize {
        self.cache
            .write()
            .map(|mut cache| {
                let before = cache.len();
                cache.retain(|(cached, _), _| cached != id);
                before - cache.len()
            })
            .unwrap_or(0)
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}
