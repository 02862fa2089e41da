//! Owns one resolver/coordinator pair per bound host entity

use crate::config::RuntimeConfig;
use crate::scripting::coordinator::{CoordinatorState, ExecutionCoordinator};
use crate::scripting::error::ScriptSetIssue;
use crate::scripting::instance::{ConfigureTicket, InstanceIdAllocator, ScriptInstanceFactory};
use crate::scripting::resolver::{
    PropertySource, Readiness, ResolvedSet, ScriptSetResolver, SetChanged,
};
use crate::scripting::resource::ContentRepository;
use hecs::Entity;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info};

/// The external collaborators a runner call may need
pub struct ScriptContext<'a> {
    pub properties: &'a dyn PropertySource,
    pub repository: &'a dyn ContentRepository,
    pub factory: &'a mut dyn ScriptInstanceFactory,
}

impl<'a> ScriptContext<'a> {
    pub fn new(
        properties: &'a dyn PropertySource,
        repository: &'a dyn ContentRepository,
        factory: &'a mut dyn ScriptInstanceFactory,
    ) -> Self {
        Self {
            properties,
            repository,
            factory,
        }
    }
}

/// Notifications delivered to runner subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    Changed(SetChanged),
    Settled { entity: Entity },
}

/// Subscriber callback
pub type RunnerListener = Box<dyn FnMut(&RunnerEvent)>;

struct EntityBinding {
    resolver: ScriptSetResolver,
    coordinator: ExecutionCoordinator,
}

/// Script state for every bound entity
///
/// Entities are independent; nothing is ordered across them.
pub struct MultiEntityRunner {
    reference_key: String,
    bindings: HashMap<Entity, EntityBinding>,
    completion_tx: Sender<ConfigureTicket>,
    completion_rx: Receiver<ConfigureTicket>,
    instance_ids: InstanceIdAllocator,
    listeners: Vec<RunnerListener>,
    diagnostics: Vec<ScriptSetIssue>,
}

impl MultiEntityRunner {
    pub fn new(reference_key: impl Into<String>) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel();
        Self {
            reference_key: reference_key.into(),
            bindings: HashMap::new(),
            completion_tx,
            completion_rx,
            instance_ids: InstanceIdAllocator::new(),
            listeners: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self::new(config.reference_key.clone())
    }

    pub fn reference_key(&self) -> &str {
        &self.reference_key
    }

    /// Register a callback for `Changed` and `Settled` notifications
    pub fn subscribe(&mut self, listener: impl FnMut(&RunnerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Bind an entity
    ///
    /// A ready entity resolves and starts configuring within this call.
    /// Returns false when the entity was already bound.
    pub fn add_entity(
        &mut self,
        entity: Entity,
        readiness: Readiness,
        ctx: &mut ScriptContext<'_>,
    ) -> bool {
        if self.bindings.contains_key(&entity) {
            debug!(entity = ?entity, "Entity already bound");
            return false;
        }

        let mut binding = EntityBinding {
            resolver: ScriptSetResolver::new(entity, self.reference_key.clone(), readiness),
            coordinator: ExecutionCoordinator::with_ids(
                entity,
                self.completion_tx.clone(),
                self.instance_ids.clone(),
            ),
        };
        debug!(entity = ?entity, readiness = ?readiness, "Binding entity scripts");

        if let Some(changed) = binding.resolver.bind(ctx.properties, ctx.repository) {
            apply_change(&mut binding, changed, ctx.factory, &mut self.listeners);
        }
        self.diagnostics.extend(binding.resolver.take_diagnostics());
        self.bindings.insert(entity, binding);
        true
    }

    /// Unbind an entity, exiting all of its live instances
    ///
    /// Configuration completions that arrive later for this entity are ignored.
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        let Some(mut binding) = self.bindings.remove(&entity) else {
            return false;
        };

        if let Some(changed) = binding.resolver.unbind() {
            emit(&mut self.listeners, &RunnerEvent::Changed(changed));
        }
        binding.coordinator.release();
        self.diagnostics.extend(binding.resolver.take_diagnostics());
        self.diagnostics.extend(binding.coordinator.take_diagnostics());
        debug!(entity = ?entity, "Unbound entity scripts");
        true
    }

    /// Open the readiness gate of a deferred entity
    pub fn signal_ready(&mut self, entity: Entity, ctx: &mut ScriptContext<'_>) {
        let Some(binding) = self.bindings.get_mut(&entity) else {
            return;
        };
        if let Some(changed) = binding.resolver.signal_ready(ctx.properties, ctx.repository) {
            apply_change(binding, changed, ctx.factory, &mut self.listeners);
        }
        self.diagnostics.extend(binding.resolver.take_diagnostics());
    }

    /// The entity's reference list was rewritten
    pub fn notify_references_changed(&mut self, entity: Entity) -> bool {
        let Some(binding) = self.bindings.get_mut(&entity) else {
            return false;
        };
        let scheduled = binding.resolver.notify_references_changed();
        self.diagnostics.extend(binding.resolver.take_diagnostics());
        scheduled
    }

    /// A script resource was updated; returns how many entities were scheduled
    pub fn notify_resource_updated(&mut self, id: &str) -> usize {
        let mut scheduled = 0;
        for binding in self.bindings.values_mut() {
            if binding.resolver.notify_resource_updated(id) {
                scheduled += 1;
            }
            self.diagnostics.extend(binding.resolver.take_diagnostics());
        }
        if scheduled > 0 {
            debug!(script = %id, entities = scheduled, "Script update scheduled rebuilds");
        }
        scheduled
    }

    /// Run every pending rebuild
    pub fn flush(&mut self, ctx: &mut ScriptContext<'_>) -> usize {
        let mut rebuilt = 0;
        for binding in self.bindings.values_mut() {
            if let Some(changed) = binding.resolver.flush(ctx.properties, ctx.repository) {
                apply_change(binding, changed, ctx.factory, &mut self.listeners);
                rebuilt += 1;
            }
            self.diagnostics.extend(binding.resolver.take_diagnostics());
        }
        rebuilt
    }

    /// Deliver queued configuration completions
    pub fn pump_completions(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(ticket) = self.completion_rx.try_recv() {
            self.complete_configuration(ticket);
            delivered += 1;
        }
        delivered
    }

    /// Deliver one configuration completion directly
    ///
    /// Returns true when it settled the entity's set.
    pub fn complete_configuration(&mut self, ticket: ConfigureTicket) -> bool {
        let Some(binding) = self.bindings.get_mut(&ticket.entity) else {
            let issue = ScriptSetIssue::StaleCallback {
                entity: ticket.entity,
                instance: ticket.instance,
            };
            debug!(%issue, "Completion for unbound entity");
            self.diagnostics.push(issue);
            return false;
        };

        let settled = binding.coordinator.on_instance_configured(ticket);
        self.diagnostics.extend(binding.coordinator.take_diagnostics());
        if settled {
            emit(
                &mut self.listeners,
                &RunnerEvent::Settled {
                    entity: ticket.entity,
                },
            );
        }
        settled
    }

    /// One frame of runner work: pending rebuilds, then queued completions
    pub fn update(&mut self, ctx: &mut ScriptContext<'_>) {
        self.flush(ctx);
        self.pump_completions();
    }

    pub fn get_state(&self, entity: Entity) -> Option<CoordinatorState> {
        self.bindings
            .get(&entity)
            .map(|binding| binding.coordinator.state())
    }

    /// The last set the entity's resolver emitted
    pub fn resolved_set(&self, entity: Entity) -> Option<&ResolvedSet> {
        self.bindings
            .get(&entity)
            .map(|binding| binding.resolver.current())
    }

    /// Ids of the entity's entered instances, in declared order
    pub fn entered_scripts(&self, entity: Entity) -> Option<Vec<&str>> {
        self.bindings
            .get(&entity)
            .map(|binding| binding.coordinator.entered_scripts())
    }

    pub fn is_bound(&self, entity: Entity) -> bool {
        self.bindings.contains_key(&entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.bindings.keys().copied()
    }

    pub fn entity_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn all_settled(&self) -> bool {
        self.bindings
            .values()
            .all(|binding| binding.coordinator.state() == CoordinatorState::Settled)
    }

    /// Take the issues absorbed since the last call
    pub fn take_diagnostics(&mut self) -> Vec<ScriptSetIssue> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Unbind every entity
    pub fn clear(&mut self) {
        let entities: Vec<Entity> = self.entities().collect();
        let count = entities.len();
        for entity in entities {
            self.remove_entity(entity);
        }
        info!(count, "Cleared script runner");
    }
}

fn apply_change(
    binding: &mut EntityBinding,
    changed: SetChanged,
    factory: &mut dyn ScriptInstanceFactory,
    listeners: &mut [RunnerListener],
) {
    let entity = changed.entity;
    let state = binding.coordinator.apply(&changed, factory);
    emit(listeners, &RunnerEvent::Changed(changed));
    if state == CoordinatorState::Settled {
        emit(listeners, &RunnerEvent::Settled { entity });
    }
}

fn emit(listeners: &mut [RunnerListener], event: &RunnerEvent) {
    for listener in listeners.iter_mut() {
        listener(event);
    }
}
