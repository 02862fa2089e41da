//! Recording collaborators shared by the scenario tests

use crate::scripting::error::ScriptError;
use crate::scripting::instance::{ConfigureCompletion, LiveScript, ScriptInstanceFactory};
use crate::scripting::library::ScriptLibrary;
use crate::scripting::resolver::PropertySource;
use crate::scripting::resource::{encode_reference_list, ScriptKind, ScriptResource};
use hecs::Entity;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const KEY: &str = "scripts";

/// One observable call made on a live instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Configure(String),
    Enter(String),
    Exit(String),
}

#[derive(Default)]
struct Shared {
    calls: Vec<Call>,
    completions: HashMap<(Entity, String), ConfigureCompletion>,
}

/// Factory whose instances record their calls and park their completions
#[derive(Clone, Default)]
pub struct RecordingFactory {
    shared: Rc<RefCell<Shared>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.borrow().calls.clone()
    }

    pub fn entered(&self) -> Vec<String> {
        self.shared
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Enter(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.shared.borrow_mut().calls.clear();
    }

    /// Finish configuring the parked declarative instance `id` of `entity`
    pub fn complete(&self, entity: Entity, id: &str) {
        let completion = self
            .shared
            .borrow_mut()
            .completions
            .remove(&(entity, id.to_string()))
            .unwrap_or_else(|| panic!("no pending configuration for {id}"));
        completion.complete();
    }

    /// Take a parked completion without firing it
    pub fn take_completion(&self, entity: Entity, id: &str) -> Option<ConfigureCompletion> {
        self.shared
            .borrow_mut()
            .completions
            .remove(&(entity, id.to_string()))
    }

    pub fn has_pending(&self, entity: Entity, id: &str) -> bool {
        self.shared
            .borrow()
            .completions
            .contains_key(&(entity, id.to_string()))
    }
}

impl ScriptInstanceFactory for RecordingFactory {
    fn create_instance(
        &mut self,
        entity: Entity,
        resource: &ScriptResource,
    ) -> Result<Box<dyn LiveScript>, ScriptError> {
        self.shared
            .borrow_mut()
            .calls
            .push(Call::Create(resource.id().to_string()));
        Ok(Box::new(RecordingScript {
            entity,
            id: resource.id().to_string(),
            shared: self.shared.clone(),
        }))
    }
}

struct RecordingScript {
    entity: Entity,
    id: String,
    shared: Rc<RefCell<Shared>>,
}

impl LiveScript for RecordingScript {
    fn configure(&mut self, completion: ConfigureCompletion) {
        let mut shared = self.shared.borrow_mut();
        shared.calls.push(Call::Configure(self.id.clone()));
        shared
            .completions
            .insert((self.entity, self.id.clone()), completion);
    }

    fn enter(&mut self) -> Result<(), ScriptError> {
        self.shared
            .borrow_mut()
            .calls
            .push(Call::Enter(self.id.clone()));
        Ok(())
    }

    fn exit(&mut self) {
        self.shared
            .borrow_mut()
            .calls
            .push(Call::Exit(self.id.clone()));
    }
}

/// Property store keyed by entity, holding only reference lists
#[derive(Default)]
pub struct ListProps {
    lists: HashMap<Entity, String>,
}

impl ListProps {
    pub fn set(&mut self, entity: Entity, ids: &[&str]) {
        self.lists
            .insert(entity, encode_reference_list(ids.iter().copied()));
    }
}

impl PropertySource for ListProps {
    fn get_property(&self, entity: Entity, key: &str) -> Option<String> {
        if key != KEY {
            return None;
        }
        self.lists.get(&entity).cloned()
    }
}

/// Library where ids starting with `V` are declarative and the rest imperative
pub fn library(ids: &[&str]) -> ScriptLibrary {
    let mut library = ScriptLibrary::new();
    for id in ids {
        let kind = if id.starts_with('V') {
            ScriptKind::Declarative
        } else {
            ScriptKind::Imperative
        };
        library.insert(ScriptResource::new(*id, kind, ""));
    }
    library.drain_updates();
    library
}

pub fn enters(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}
