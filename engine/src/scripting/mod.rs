//! Script sets attached to scene entities
//!
//! Each host entity names its scripts in a reference-list property. The
//! [`ScriptSetResolver`] turns that list into a [`ResolvedSet`] of
//! [`ScriptResource`]s and reports every change; the [`ExecutionCoordinator`]
//! creates live instances for a set, configures them and enters them in a
//! fixed order; the [`MultiEntityRunner`] owns one such pair per entity.
//!
//! Everything runs on the host's thread. Triggers only schedule work, which
//! runs on the next [`MultiEntityRunner::update`].

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod factory;
pub mod instance;
pub mod library;
pub mod resolver;
pub mod resource;
pub mod runner;
pub mod scene_glue;

pub use coordinator::{CoordinatorState, ExecutionCoordinator};
pub use engine::{ScriptEngine, ScriptJournal};
pub use error::{ScriptError, ScriptSetIssue};
pub use factory::RhaiScriptFactory;
pub use instance::{
    ConfigureCompletion, ConfigureTicket, InstanceId, InstanceIdAllocator, LiveScript,
    ScriptInstanceFactory,
};
pub use library::ScriptLibrary;
pub use resolver::{PropertySource, Readiness, ResolvedSet, ScriptSetResolver, SetChanged};
pub use resource::{encode_reference_list, ContentRepository, ScriptKind, ScriptReference, ScriptResource};
pub use runner::{MultiEntityRunner, RunnerEvent, RunnerListener, ScriptContext};
pub use scene_glue::{SceneScriptBindings, SyncReport};

// Re-export commonly used types
pub use rhai::{Dynamic, EvalAltResult};

#[cfg(test)]
mod tests;
