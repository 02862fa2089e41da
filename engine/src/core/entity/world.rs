//! World wrapper providing helper methods for entity management

use super::components::{EntityProperties, Name, PendingAssets};
use crate::scripting::resolver::PropertySource;
use hecs::Entity;
use tracing::debug;

/// Wrapper around hecs::World providing additional helper methods
pub struct World {
    inner: hecs::World,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        Self {
            inner: hecs::World::new(),
        }
    }

    /// Spawn a new entity with the given components
    pub fn spawn(&mut self, components: impl hecs::DynamicBundle) -> Entity {
        self.inner.spawn(components)
    }

    /// Get a reference to a component on an entity
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<T>, hecs::ComponentError> {
        self.inner.get::<&T>(entity)
    }

    /// Query a single entity for a mutable component reference
    pub fn query_one_mut<Q: hecs::Query>(
        &mut self,
        entity: Entity,
    ) -> Result<Q::Item<'_>, hecs::QueryOneError> {
        self.inner.query_one_mut::<Q>(entity)
    }

    /// Insert a component into an entity
    pub fn insert_one(
        &mut self,
        entity: Entity,
        component: impl hecs::Component,
    ) -> Result<(), hecs::NoSuchEntity> {
        self.inner.insert_one(entity, component)
    }

    /// Remove a component from an entity
    pub fn remove_one<T: hecs::Component>(&mut self, entity: Entity) -> Result<T, hecs::ComponentError> {
        self.inner.remove_one::<T>(entity)
    }

    /// Query entities with specific components
    pub fn query<Q: hecs::Query>(&self) -> hecs::QueryBorrow<Q> {
        self.inner.query()
    }

    /// Despawn an entity and all its components
    pub fn despawn(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        self.inner.despawn(entity)
    }

    /// Check if an entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.inner.contains(entity)
    }

    /// Number of live entities
    pub fn len(&self) -> u32 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    /// Remove every entity
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Spawn a named entity carrying a property map
    pub fn spawn_host(&mut self, name: impl Into<String>, properties: EntityProperties) -> Entity {
        let name = Name::new(name);
        debug!(name = %name.0, properties = properties.len(), "Spawning script host");
        self.inner.spawn((name, properties))
    }

    /// Find the first entity with the given name
    pub fn find_by_name(&self, name: &str) -> Option<Entity> {
        self.inner
            .query::<&Name>()
            .iter()
            .find(|(_, n)| n.0 == name)
            .map(|(entity, _)| entity)
    }

    /// Set one property, adding the property map if the entity has none
    pub fn set_property(
        &mut self,
        entity: Entity,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), hecs::NoSuchEntity> {
        if let Ok(props) = self.inner.query_one_mut::<&mut EntityProperties>(entity) {
            props.set(key, value);
            return Ok(());
        }
        let mut props = EntityProperties::new();
        props.set(key, value);
        self.inner.insert_one(entity, props)
    }

    /// Remove one property; returns the old value
    pub fn remove_property(&mut self, entity: Entity, key: &str) -> Option<String> {
        self.inner
            .query_one_mut::<&mut EntityProperties>(entity)
            .ok()
            .and_then(|props| props.remove(key))
    }

    /// Mark the entity as still loading its assets
    pub fn mark_pending_assets(&mut self, entity: Entity) -> Result<(), hecs::NoSuchEntity> {
        self.inner.insert_one(entity, PendingAssets)
    }

    /// Clear the loading marker; returns whether it was present
    pub fn finish_assets(&mut self, entity: Entity) -> bool {
        self.inner.remove_one::<PendingAssets>(entity).is_ok()
    }

    /// Get access to the inner hecs::World for advanced operations
    pub fn inner(&self) -> &hecs::World {
        &self.inner
    }

    /// Get mutable access to the inner hecs::World for advanced operations
    pub fn inner_mut(&mut self) -> &mut hecs::World {
        &mut self.inner
    }

    /// Save the current world state to a scene file
    pub fn save_scene<P: AsRef<std::path::Path>>(
        &self,
        path: P,
    ) -> Result<(), crate::io::SceneError> {
        use crate::io::Scene;

        let scene = Scene::from_world(self);
        scene.save_to_file(path)
    }

    /// Load a scene from a file, replacing the current world content
    pub fn load_scene<P: AsRef<std::path::Path>>(
        &mut self,
        path: P,
    ) -> Result<Vec<Entity>, crate::io::SceneError> {
        use crate::io::Scene;

        let scene = Scene::load_from_file(path)?;
        self.inner.clear();
        Ok(scene.instantiate(self))
    }

    /// Load a scene from a file additively, keeping existing entities
    pub fn load_scene_additive<P: AsRef<std::path::Path>>(
        &mut self,
        path: P,
    ) -> Result<Vec<Entity>, crate::io::SceneError> {
        use crate::io::Scene;

        let scene = Scene::load_from_file(path)?;
        Ok(scene.instantiate(self))
    }
}

impl PropertySource for World {
    fn get_property(&self, entity: Entity, key: &str) -> Option<String> {
        self.inner
            .get::<&EntityProperties>(entity)
            .ok()
            .and_then(|props| props.get(key).map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_spawn() {
        let mut world = World::new();
        let entity = world.spawn((Name::new("a"),));
        assert!(world.contains(entity));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_property_source() {
        let mut world = World::new();
        let entity = world.spawn_host("door", EntityProperties::new().with("scripts", "[]"));

        assert_eq!(world.get_property(entity, "scripts").as_deref(), Some("[]"));
        assert_eq!(world.get_property(entity, "other"), None);
        assert_eq!(world.find_by_name("door"), Some(entity));
    }

    #[test]
    fn test_set_property_adds_map_when_missing() {
        let mut world = World::new();
        let entity = world.spawn((Name::new("bare"),));

        world.set_property(entity, "speed", "4").unwrap();
        assert_eq!(world.get_property(entity, "speed").as_deref(), Some("4"));

        world.set_property(entity, "speed", "5").unwrap();
        assert_eq!(world.get::<EntityProperties>(entity).unwrap().revision(), 2);

        assert_eq!(world.remove_property(entity, "speed").as_deref(), Some("5"));
        assert_eq!(world.get_property(entity, "speed"), None);
    }

    #[test]
    fn test_pending_assets_marker() {
        let mut world = World::new();
        let entity = world.spawn_host("loader", EntityProperties::new());

        world.mark_pending_assets(entity).unwrap();
        assert!(world.get::<PendingAssets>(entity).is_ok());
        assert!(world.finish_assets(entity));
        assert!(!world.finish_assets(entity));
    }

    #[test]
    fn test_despawned_entity_has_no_properties() {
        let mut world = World::new();
        let entity = world.spawn_host("gone", EntityProperties::new().with("k", "v"));
        world.despawn(entity).unwrap();
        assert_eq!(world.get_property(entity, "k"), None);
        assert!(world.set_property(entity, "k", "v").is_err());
    }
}
