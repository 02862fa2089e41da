//! Input/Output module for scene serialization and script hot reload

pub mod hot_reload;
mod scene;

pub use hot_reload::{ScriptWatcher, WatchError, WatcherConfig};
pub use scene::{Scene, SceneError, SerializedEntity};
