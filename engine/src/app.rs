//! Host application driving the script runtime one frame at a time

use crate::config::{AppConfig, ConfigError};
use crate::core::entity::World;
use crate::io::{SceneError, ScriptWatcher, WatchError, WatcherConfig};
use crate::scripting::library::classify_script_file;
use crate::scripting::{
    MultiEntityRunner, RhaiScriptFactory, RunnerEvent, SceneScriptBindings, ScriptEngine,
    ScriptError, ScriptLibrary, SyncReport,
};
use hecs::Entity;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Summary of one [`ScriptApp::tick`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame: u64,
    pub reloaded: usize,
    pub removed: usize,
    pub updated: usize,
    pub configured: usize,
    pub sync: SyncReport,
    pub issues: usize,
}

/// World, script library and runner wired together
pub struct ScriptApp {
    /// ECS world
    pub world: World,
    /// Loaded script resources
    pub library: ScriptLibrary,
    runner: MultiEntityRunner,
    factory: RhaiScriptFactory,
    bindings: SceneScriptBindings,
    watcher: Option<ScriptWatcher>,
    config: AppConfig,
    frame: u64,
}

impl ScriptApp {
    /// Create an app with default configuration and no scripts loaded
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        info!(?config, "Creating ScriptApp");
        Self {
            world: World::new(),
            library: ScriptLibrary::new(),
            runner: MultiEntityRunner::with_config(&config.runtime),
            factory: RhaiScriptFactory::new(ScriptEngine::new()),
            bindings: SceneScriptBindings::new(),
            watcher: None,
            config,
            frame: 0,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn runner(&self) -> &MultiEntityRunner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut MultiEntityRunner {
        &mut self.runner
    }

    pub fn engine(&self) -> &ScriptEngine {
        self.factory.engine()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Register a callback for runner notifications
    pub fn subscribe(&mut self, listener: impl FnMut(&RunnerEvent) + 'static) {
        self.runner.subscribe(listener);
    }

    /// Load the scripts directory and start watching it if hot reload is on
    ///
    /// Returns the number of scripts loaded.
    pub fn load_assets(&mut self) -> Result<usize, AppError> {
        self.config.assets.validate()?;
        let scripts = self.config.assets.scripts_path();
        self.library = ScriptLibrary::load_dir(&scripts)?;

        if self.config.runtime.hot_reload && self.watcher.is_none() {
            let watcher_config = WatcherConfig {
                debounce_duration: self.config.runtime.watch_debounce,
            };
            self.watcher = Some(ScriptWatcher::new(&scripts, watcher_config)?);
            info!(path = ?scripts, "Script hot reload enabled");
        }
        Ok(self.library.len())
    }

    /// Load a scene by name from the scenes directory, replacing the world
    pub fn load_scene(&mut self, name: &str) -> Result<Vec<Entity>, AppError> {
        let path = self.config.assets.scene_path(name)?;
        self.load_scene_file(path)
    }

    /// Load a scene file, replacing the world
    ///
    /// Every bound entity is unbound first, so scripts of the old scene exit.
    pub fn load_scene_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<Entity>, AppError> {
        self.bindings.clear(&mut self.runner);
        let spawned = self.world.load_scene(path.as_ref())?;
        info!(path = ?path.as_ref(), entities = spawned.len(), "Scene loaded");
        Ok(spawned)
    }

    /// Run one frame
    ///
    /// Order: hot-reload changes (deleted files leave the library),
    /// `Updated` forwarding, declarative
    /// configuration jobs, scene binding sync (which flushes rebuilds and
    /// delivers completions).
    pub fn tick(&mut self) -> FrameReport {
        self.frame += 1;
        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };

        if let Some(watcher) = &self.watcher {
            for path in watcher.poll_changes() {
                if !path.exists() {
                    match classify_script_file(&path) {
                        Ok((id, _)) => {
                            if self.library.remove(&id).is_some() {
                                self.factory.engine().evict(&id);
                                info!(script = %id, "Script removed");
                                report.removed += 1;
                            }
                        }
                        Err(e) => warn!(path = ?path, error = %e, "Ignoring removed file"),
                    }
                    continue;
                }
                match self.library.reload_file(&path) {
                    Ok(id) => {
                        info!(script = %id, "Script reloaded");
                        report.reloaded += 1;
                    }
                    Err(e) => warn!(path = ?path, error = %e, "Script reload failed"),
                }
            }
        }

        for id in self.library.drain_updates() {
            self.runner.notify_resource_updated(&id);
            report.updated += 1;
        }

        report.configured = self
            .factory
            .process_pending(self.config.runtime.declarative_budget_per_frame, &self.world);

        report.sync = self.bindings.sync(
            &self.world,
            &mut self.runner,
            &self.library,
            &mut self.factory,
        );

        // Issues were logged where they were absorbed
        report.issues = self.runner.take_diagnostics().len();
        debug!(?report, "Frame complete");
        report
    }

    /// Tick until every bound entity is settled and no work is queued
    ///
    /// Returns the number of frames run, or `None` if `max_frames` passed first.
    pub fn run_until_settled(&mut self, max_frames: u64) -> Option<u64> {
        for frame in 1..=max_frames {
            self.tick();
            if self.runner.all_settled() && self.factory.pending_jobs() == 0 {
                return Some(frame);
            }
        }
        None
    }

    /// Unbind every entity and stop the watcher
    pub fn shutdown(&mut self) -> Result<(), AppError> {
        self.bindings.clear(&mut self.runner);
        if let Some(watcher) = self.watcher.take() {
            watcher.stop()?;
        }
        info!(frames = self.frame, "ScriptApp shut down");
        Ok(())
    }
}

impl Default for ScriptApp {
    fn default() -> Self {
        Self::new()
    }
}
