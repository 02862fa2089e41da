//! Keeps the runner's bound entities in step with the world
//!
//! An entity is a script host while its [`EntityProperties`] carry the
//! runner's reference key. Property writes are detected through the map's
//! revision; readiness follows the [`PendingAssets`] marker.

use crate::core::entity::{EntityProperties, PendingAssets, World};
use crate::scripting::instance::ScriptInstanceFactory;
use crate::scripting::resolver::Readiness;
use crate::scripting::resource::ContentRepository;
use crate::scripting::runner::{MultiEntityRunner, ScriptContext};
use hecs::Entity;
use std::collections::HashMap;
use tracing::{debug, trace};

/// What one [`SceneScriptBindings::sync`] pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub bound: usize,
    pub unbound: usize,
    pub notified: usize,
    pub readied: usize,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
struct Observed {
    revision: u64,
    pending_assets: bool,
}

/// Last observed state of every bound entity
#[derive(Default)]
pub struct SceneScriptBindings {
    bound: HashMap<Entity, Observed>,
}

impl SceneScriptBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self, entity: Entity) -> bool {
        self.bound.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// Reconcile the runner with the world, then run one runner update
    pub fn sync(
        &mut self,
        world: &World,
        runner: &mut MultiEntityRunner,
        repository: &dyn ContentRepository,
        factory: &mut dyn ScriptInstanceFactory,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let key = runner.reference_key().to_string();

        let observed: HashMap<Entity, Observed> = world
            .query::<(&EntityProperties, Option<&PendingAssets>)>()
            .iter()
            .filter(|(_, (props, _))| props.contains(&key))
            .map(|(entity, (props, pending))| {
                (
                    entity,
                    Observed {
                        revision: props.revision(),
                        pending_assets: pending.is_some(),
                    },
                )
            })
            .collect();

        // Despawned entities and entities that lost the key
        let gone: Vec<Entity> = self
            .bound
            .keys()
            .filter(|entity| !observed.contains_key(entity))
            .copied()
            .collect();
        for entity in gone {
            self.bound.remove(&entity);
            if runner.remove_entity(entity) {
                debug!(entity = ?entity, alive = world.contains(entity), "Entity no longer hosts scripts");
                report.unbound += 1;
            }
        }

        let mut ctx = ScriptContext::new(world, repository, factory);
        for (entity, now) in observed {
            match self.bound.insert(entity, now) {
                None => {
                    let readiness = if now.pending_assets {
                        Readiness::Deferred
                    } else {
                        Readiness::Ready
                    };
                    if runner.add_entity(entity, readiness, &mut ctx) {
                        report.bound += 1;
                    }
                }
                Some(before) => {
                    if before.revision != now.revision && runner.notify_references_changed(entity) {
                        trace!(entity = ?entity, revision = now.revision, "Properties changed");
                        report.notified += 1;
                    }
                    if before.pending_assets && !now.pending_assets {
                        runner.signal_ready(entity, &mut ctx);
                        report.readied += 1;
                    }
                }
            }
        }

        runner.update(&mut ctx);
        if !report.is_empty() {
            debug!(?report, "Scene bindings synced");
        }
        report
    }

    /// Unbind every entity this glue bound
    pub fn clear(&mut self, runner: &mut MultiEntityRunner) {
        for (entity, _) in self.bound.drain() {
            runner.remove_entity(entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::coordinator::CoordinatorState;
    use crate::scripting::resource::encode_reference_list;
    use crate::scripting::tests::support::{enters, library, Call, RecordingFactory, KEY};

    fn host(world: &mut World, ids: &[&str]) -> Entity {
        world.spawn_host(
            "host",
            EntityProperties::new().with(KEY, encode_reference_list(ids.iter().copied())),
        )
    }

    #[test]
    fn test_binds_only_entities_with_key() {
        let mut world = World::new();
        let with_scripts = host(&mut world, &["B0"]);
        let without = world.spawn_host("plain", EntityProperties::new().with("other", "1"));
        let library = library(&["B0"]);
        let mut factory = RecordingFactory::new();
        let mut runner = MultiEntityRunner::new(KEY);
        let mut glue = SceneScriptBindings::new();

        let report = glue.sync(&world, &mut runner, &library, &mut factory);

        assert_eq!(report.bound, 1);
        assert!(runner.is_bound(with_scripts));
        assert!(!runner.is_bound(without));
        assert_eq!(runner.get_state(with_scripts), Some(CoordinatorState::Settled));

        // Nothing changed, nothing to do
        assert!(glue.sync(&world, &mut runner, &library, &mut factory).is_empty());
    }

    #[test]
    fn test_property_write_triggers_rebuild() {
        let mut world = World::new();
        let entity = host(&mut world, &["B0"]);
        let library = library(&["B0", "B1"]);
        let mut factory = RecordingFactory::new();
        let mut runner = MultiEntityRunner::new(KEY);
        let mut glue = SceneScriptBindings::new();

        glue.sync(&world, &mut runner, &library, &mut factory);
        factory.clear_calls();

        world
            .set_property(entity, KEY, encode_reference_list(["B0", "B1"]))
            .unwrap();
        let report = glue.sync(&world, &mut runner, &library, &mut factory);

        assert_eq!(report.notified, 1);
        assert_eq!(factory.entered(), enters(&["B0", "B1"]));
    }

    #[test]
    fn test_despawn_and_key_removal_unbind() {
        let mut world = World::new();
        let despawned = host(&mut world, &["B0"]);
        let stripped = host(&mut world, &["B1"]);
        let library = library(&["B0", "B1"]);
        let mut factory = RecordingFactory::new();
        let mut runner = MultiEntityRunner::new(KEY);
        let mut glue = SceneScriptBindings::new();

        glue.sync(&world, &mut runner, &library, &mut factory);
        factory.clear_calls();

        world.despawn(despawned).unwrap();
        world.remove_property(stripped, KEY);
        let report = glue.sync(&world, &mut runner, &library, &mut factory);

        assert_eq!(report.unbound, 2);
        assert_eq!(runner.entity_count(), 0);
        let mut calls = factory.calls();
        calls.sort_by_key(|call| format!("{call:?}"));
        assert_eq!(calls, vec![Call::Exit("B0".into()), Call::Exit("B1".into())]);
    }

    #[test]
    fn test_pending_assets_defer_resolution() {
        let mut world = World::new();
        let entity = host(&mut world, &["B0"]);
        world.mark_pending_assets(entity).unwrap();
        let library = library(&["B0"]);
        let mut factory = RecordingFactory::new();
        let mut runner = MultiEntityRunner::new(KEY);
        let mut glue = SceneScriptBindings::new();

        glue.sync(&world, &mut runner, &library, &mut factory);
        assert_eq!(runner.get_state(entity), Some(CoordinatorState::Pending));
        assert!(factory.calls().is_empty());

        world.finish_assets(entity);
        let report = glue.sync(&world, &mut runner, &library, &mut factory);

        assert_eq!(report.readied, 1);
        assert_eq!(factory.entered(), enters(&["B0"]));
        assert_eq!(runner.get_state(entity), Some(CoordinatorState::Settled));
    }

    #[test]
    fn test_clear_unbinds_everything() {
        let mut world = World::new();
        host(&mut world, &["B0"]);
        host(&mut world, &["B0"]);
        let library = library(&["B0"]);
        let mut factory = RecordingFactory::new();
        let mut runner = MultiEntityRunner::new(KEY);
        let mut glue = SceneScriptBindings::new();

        glue.sync(&world, &mut runner, &library, &mut factory);
        glue.clear(&mut runner);

        assert!(glue.is_empty());
        assert_eq!(runner.entity_count(), 0);
    }
}
