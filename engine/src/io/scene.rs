//! Scene serialization and loading

use crate::core::entity::{
    components::{EntityProperties, Name, PendingAssets},
    World,
};
use hecs::Entity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Scene data structure containing serialized entities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Entities in spawn order
    pub entities: Vec<SerializedEntity>,
}

/// A single serialized script host
///
/// Property values may be written as any JSON value; non-string values are
/// stored as their JSON text, so a reference list can be written inline as
/// `"scripts": [{"id": "spin"}]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending_assets: bool,
}

/// Errors that can occur during scene operations
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SerializedEntity {
    fn properties(&self) -> EntityProperties {
        self.properties
            .iter()
            .fold(EntityProperties::new(), |props, (key, value)| match value {
                serde_json::Value::String(text) => props.with(key, text),
                other => props.with(key, other.to_string()),
            })
    }
}

impl Scene {
    /// Create a new empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scene from a world, capturing every named or propertied entity
    pub fn from_world(world: &World) -> Self {
        let mut entities = Vec::new();

        for (entity, ()) in world.query::<()>().iter() {
            let name = world.get::<Name>(entity).ok().map(|name| name.0.clone());
            let properties: BTreeMap<String, serde_json::Value> = world
                .get::<EntityProperties>(entity)
                .map(|props| {
                    props
                        .iter()
                        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                        .collect()
                })
                .unwrap_or_default();
            let pending_assets = world.get::<PendingAssets>(entity).is_ok();

            if name.is_none() && !pending_assets && world.get::<EntityProperties>(entity).is_err() {
                debug!(entity = ?entity, "Skipping entity without scene data");
                continue;
            }
            entities.push(SerializedEntity {
                name,
                properties,
                pending_assets,
            });
        }

        info!(entity_count = entities.len(), "Created scene from world");
        Scene { entities }
    }

    /// Instantiate this scene into a world, returning the spawned entities in order
    pub fn instantiate(&self, world: &mut World) -> Vec<Entity> {
        info!(entity_count = self.entities.len(), "Instantiating scene");

        let spawned: Vec<Entity> = self
            .entities
            .iter()
            .enumerate()
            .map(|(index, serialized)| {
                let name = serialized
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("entity_{index}"));
                let entity = world.spawn((Name::new(name), serialized.properties()));
                if serialized.pending_assets {
                    // Freshly spawned, so the insert cannot miss
                    let _ = world.mark_pending_assets(entity);
                }
                debug!(index, entity = ?entity, "Spawned entity");
                entity
            })
            .collect();

        info!("Scene instantiation complete");
        spawned
    }

    /// Save this scene to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SceneError> {
        let path = path.as_ref();
        info!(path = ?path, "Saving scene to file");

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = ?path, "Scene saved successfully");
        Ok(())
    }

    /// Load a scene from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SceneError> {
        let path = path.as_ref();
        info!(path = ?path, "Loading scene from file");

        let json = fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let scene = serde_json::from_str(&json)?;

        info!(path = ?path, "Scene loaded successfully");
        Ok(scene)
    }
}
