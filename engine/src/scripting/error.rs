//! Error types for the scripting subsystem
//!
//! `ScriptError` is returned from fallible operations (loading, compiling,
//! running hooks). `ScriptSetIssue` is the absorbed taxonomy: those conditions
//! are logged and recorded as diagnostics, never surfaced as `Err`.

use hecs::Entity;
use std::path::PathBuf;

/// Errors produced while loading, compiling or running a script
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("script '{id}' failed to compile: {message}")]
    Compile { id: String, message: String },

    #[error("script '{id}' failed in {hook}: {message}")]
    Hook {
        id: String,
        hook: &'static str,
        message: String,
    },

    #[error("template for script '{id}' references unknown property '{key}'")]
    Template { id: String, key: String },

    #[error("not a script file: {0:?}")]
    NotAScript(PathBuf),

    #[error("script '{0}' is not in the library")]
    UnknownScript(String),
}

/// Conditions the resolver and coordinator absorb locally
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptSetIssue {
    #[error("entity {entity:?} references unknown script '{id}'")]
    UnresolvableReference { entity: Entity, id: String },

    #[error("entity {entity:?} has a malformed reference list: {message}")]
    MalformedReferenceList { entity: Entity, message: String },

    #[error("entity {entity:?} lists script '{id}' more than once")]
    DuplicateReference { entity: Entity, id: String },

    #[error("configuration completed for discarded instance {instance} of entity {entity:?}")]
    StaleCallback { entity: Entity, instance: u64 },

    #[error("rebuild already pending for entity {entity:?}; trigger coalesced")]
    ConcurrentRebuildRequested { entity: Entity },
}
