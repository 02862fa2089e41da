//! Configures and enters one entity's live script instances
//!
//! Ordering rules:
//! - declarative instances are entered as soon as their own configuration
//!   completes, in completion order;
//! - imperative instances are entered, in declared relative order, only once
//!   every declarative instance in the set has completed configuration;
//! - the coordinator is `Settled` once every instance has been entered.
//!
//! Every applied change tears the previous instances down and starts over from
//! the complete new set; unchanged scripts are not reused.

use crate::scripting::error::ScriptSetIssue;
use crate::scripting::instance::{
    ConfigureCompletion, ConfigureTicket, InstanceId, InstanceIdAllocator, LiveScript,
    ScriptInstanceFactory,
};
use crate::scripting::resolver::SetChanged;
use crate::scripting::resource::{ScriptKind, ScriptResource};
use hecs::Entity;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Lifecycle state of one entity's script set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorState {
    /// Some instance in the current set has not been entered yet
    Pending,
    /// Every instance in the current set has been entered
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstancePhase {
    Configuring,
    Configured,
    Entered,
}

struct TrackedInstance {
    id: InstanceId,
    resource: Arc<ScriptResource>,
    phase: InstancePhase,
    script: Box<dyn LiveScript>,
}

impl TrackedInstance {
    fn enter(&mut self, entity: Entity) {
        if self.phase == InstancePhase::Entered {
            return;
        }
        self.phase = InstancePhase::Entered;
        trace!(entity = ?entity, script = %self.resource.id(), instance = self.id, "Entering script");
        if let Err(e) = self.script.enter() {
            warn!(entity = ?entity, script = %self.resource.id(), error = %e, "Script enter failed");
        }
    }
}

/// Per-entity execution state machine
pub struct ExecutionCoordinator {
    entity: Entity,
    state: CoordinatorState,
    /// Live instances in declared order
    instances: Vec<TrackedInstance>,
    declarative_total: usize,
    declarative_configured: usize,
    instance_ids: InstanceIdAllocator,
    completions: Sender<ConfigureTicket>,
    diagnostics: Vec<ScriptSetIssue>,
}

impl ExecutionCoordinator {
    /// Create a coordinator; it stays `Pending` until the first change arrives
    pub fn new(entity: Entity, completions: Sender<ConfigureTicket>) -> Self {
        Self::with_ids(entity, completions, InstanceIdAllocator::new())
    }

    /// Create a coordinator drawing instance ids from a shared allocator
    pub fn with_ids(
        entity: Entity,
        completions: Sender<ConfigureTicket>,
        instance_ids: InstanceIdAllocator,
    ) -> Self {
        Self {
            entity,
            state: CoordinatorState::Pending,
            instances: Vec::new(),
            declarative_total: 0,
            declarative_configured: 0,
            instance_ids,
            completions,
            diagnostics: Vec::new(),
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Declarative instances still waiting for their configuration callback
    pub fn awaiting_configuration(&self) -> usize {
        self.declarative_total - self.declarative_configured
    }

    /// Ids of live instances that have been entered, in declared order
    pub fn entered_scripts(&self) -> Vec<&str> {
        self.instances
            .iter()
            .filter(|instance| instance.phase == InstancePhase::Entered)
            .map(|instance| instance.resource.id())
            .collect()
    }

    /// Rebuild from a resolver change
    ///
    /// Returns the state after the synchronous part of the rebuild; a set
    /// without declarative scripts is already `Settled` here.
    pub fn apply(
        &mut self,
        changed: &SetChanged,
        factory: &mut dyn ScriptInstanceFactory,
    ) -> CoordinatorState {
        self.teardown();
        self.state = CoordinatorState::Pending;

        for resource in changed.new.iter() {
            let script = match factory.create_instance(self.entity, resource) {
                Ok(script) => script,
                Err(e) => {
                    warn!(entity = ?self.entity, script = %resource.id(), error = %e, "Failed to create script instance");
                    continue;
                }
            };
            let phase = match resource.kind() {
                ScriptKind::Declarative => InstancePhase::Configuring,
                ScriptKind::Imperative => InstancePhase::Configured,
            };
            self.instances.push(TrackedInstance {
                id: self.instance_ids.next_id(),
                resource: resource.clone(),
                phase,
                script,
            });
        }

        self.declarative_total = self
            .instances
            .iter()
            .filter(|instance| instance.phase == InstancePhase::Configuring)
            .count();
        self.declarative_configured = 0;

        debug!(
            entity = ?self.entity,
            instances = self.instances.len(),
            declarative = self.declarative_total,
            "Script set rebuilt"
        );

        for instance in &mut self.instances {
            if instance.phase != InstancePhase::Configuring {
                continue;
            }
            let ticket = ConfigureTicket {
                entity: self.entity,
                instance: instance.id,
            };
            trace!(entity = ?self.entity, script = %instance.resource.id(), instance = instance.id, "Configuring script");
            instance
                .script
                .configure(ConfigureCompletion::new(ticket, self.completions.clone()));
        }

        self.release_imperatives();
        self.state
    }

    /// A declarative instance finished configuring
    ///
    /// Returns true when this completion settled the set. Completions for
    /// discarded or already-configured instances are ignored.
    pub fn on_instance_configured(&mut self, ticket: ConfigureTicket) -> bool {
        let entity = self.entity;
        let instance = self
            .instances
            .iter_mut()
            .filter(|_| ticket.entity == entity)
            .find(|instance| instance.id == ticket.instance);

        let Some(instance) = instance.filter(|i| i.phase == InstancePhase::Configuring) else {
            let issue = ScriptSetIssue::StaleCallback {
                entity: ticket.entity,
                instance: ticket.instance,
            };
            debug!(%issue, "Ignoring configuration completion");
            self.diagnostics.push(issue);
            return false;
        };

        instance.phase = InstancePhase::Configured;
        instance.enter(entity);
        self.declarative_configured += 1;

        self.release_imperatives()
    }

    /// Tear down everything after the resolver's final empty change
    pub fn release(&mut self) {
        self.teardown();
        self.state = CoordinatorState::Settled;
    }

    pub fn take_diagnostics(&mut self) -> Vec<ScriptSetIssue> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Enter imperative instances once no declarative one is outstanding
    fn release_imperatives(&mut self) -> bool {
        if self.state == CoordinatorState::Settled
            || self.declarative_configured < self.declarative_total
        {
            return false;
        }

        let entity = self.entity;
        for instance in &mut self.instances {
            if instance.resource.kind() == ScriptKind::Imperative {
                instance.enter(entity);
            }
        }

        self.state = CoordinatorState::Settled;
        debug!(entity = ?self.entity, instances = self.instances.len(), "Script set settled");
        true
    }

    fn teardown(&mut self) {
        for mut instance in self.instances.drain(..) {
            trace!(entity = ?self.entity, script = %instance.resource.id(), instance = instance.id, "Exiting script");
            instance.script.exit();
        }
        self.declarative_total = 0;
        self.declarative_configured = 0;
    }
}

impl Drop for ExecutionCoordinator {
    fn drop(&mut self) {
        if !self.instances.is_empty() {
            debug!(entity = ?self.entity, "Coordinator dropped with live instances; exiting them");
            self.teardown();
        }
    }
}
