//! Script sets for scene entities
//!
//! This crate resolves the scripts each scene entity references, builds live
//! Rhai instances for them and configures and enters those instances in a
//! deterministic order, rebuilding whenever the references or the scripts
//! themselves change.

pub mod app;
pub mod config;
pub mod core;
pub mod io;
pub mod scripting;

// Re-export commonly used types
pub mod prelude {
    // Entity system types
    pub use crate::core::entity::{Entity, EntityProperties, Name, PendingAssets, World};

    // IO types
    pub use crate::io::{Scene, SceneError, ScriptWatcher};

    // Config types
    pub use crate::config::{AppConfig, AssetConfig, RuntimeConfig};

    // App types
    pub use crate::app::{AppError, FrameReport, ScriptApp};

    // Scripting types
    pub use crate::scripting::{
        ContentRepository, CoordinatorState, LiveScript, MultiEntityRunner, PropertySource,
        Readiness, ResolvedSet, RhaiScriptFactory, RunnerEvent, ScriptContext, ScriptEngine,
        ScriptError, ScriptInstanceFactory, ScriptKind, ScriptLibrary, ScriptResource,
        ScriptSetIssue, SetChanged,
    };
}

/// Initialize logging with the default `info` filter
pub fn init_logging() {
    init_logging_with("info");
}

/// Initialize logging; `RUST_LOG` takes precedence over `default_filter`
pub fn init_logging_with(default_filter: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
