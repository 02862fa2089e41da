//! Live script instances and the factory seam that builds them

use crate::scripting::error::ScriptError;
use crate::scripting::resource::ScriptResource;
use hecs::Entity;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use tracing::{trace, warn};

/// Identifies one live instance; never reused by coordinators sharing an allocator
pub type InstanceId = u64;

/// Shared instance id counter
///
/// A runner hands one clone to every coordinator it creates, so a completion
/// left over from an unbound entity can never match an instance of a later
/// binding of the same entity.
#[derive(Debug, Clone, Default)]
pub struct InstanceIdAllocator {
    last: Rc<Cell<InstanceId>>,
}

impl InstanceIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> InstanceId {
        let id = self.last.get() + 1;
        self.last.set(id);
        id
    }
}

/// Addresses the coordinator slot a configuration completion belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfigureTicket {
    pub entity: Entity,
    pub instance: InstanceId,
}

/// One-shot completion handle handed to a declarative instance
///
/// Consuming `complete` is the only way to signal, so an instance completes at
/// most once. Completions are queued and delivered by the runner on its next
/// pump, never re-entrantly from inside `configure`.
#[derive(Debug)]
pub struct ConfigureCompletion {
    ticket: ConfigureTicket,
    sender: Sender<ConfigureTicket>,
}

impl ConfigureCompletion {
    pub(crate) fn new(ticket: ConfigureTicket, sender: Sender<ConfigureTicket>) -> Self {
        Self { ticket, sender }
    }

    pub fn ticket(&self) -> ConfigureTicket {
        self.ticket
    }

    /// Signal that configuration finished
    pub fn complete(self) {
        trace!(entity = ?self.ticket.entity, instance = self.ticket.instance, "Configuration complete");
        if self.sender.send(self.ticket).is_err() {
            // Runner is gone; nothing left to enter
            warn!(entity = ?self.ticket.entity, "Configuration completed after runner shutdown");
        }
    }
}

/// Behaviour shared by both instance variants
///
/// The coordinator is the only caller. `configure` is only invoked for
/// declarative instances; imperative ones are configured on construction.
pub trait LiveScript {
    /// Start asynchronous configuration; call `completion.complete()` when done
    fn configure(&mut self, completion: ConfigureCompletion) {
        completion.complete();
    }

    /// Lifecycle start
    fn enter(&mut self) -> Result<(), ScriptError>;

    /// Teardown
    fn exit(&mut self);
}

/// Builds live instances for `(host entity, resource)` pairs
///
/// The variant is decided by `resource.kind()`.
pub trait ScriptInstanceFactory {
    fn create_instance(
        &mut self,
        entity: Entity,
        resource: &ScriptResource,
    ) -> Result<Box<dyn LiveScript>, ScriptError>;
}
