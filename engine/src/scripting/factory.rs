//! Rhai-backed script instances
//!
//! Imperative scripts compile inside `create_instance`. Declarative scripts are
//! templates: their `${key}` placeholders are filled from the host entity's
//! properties by a configuration job that runs later, during
//! [`RhaiScriptFactory::process_pending`].

use crate::scripting::engine::ScriptEngine;
use crate::scripting::error::ScriptError;
use crate::scripting::instance::{ConfigureCompletion, LiveScript, ScriptInstanceFactory};
use crate::scripting::resolver::PropertySource;
use crate::scripting::resource::{ScriptKind, ScriptResource};
use hecs::Entity;
use rhai::{Scope, AST};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub const ENTER_HOOK: &str = "on_enter";
pub const EXIT_HOOK: &str = "on_exit";

type ProgramSlot = Rc<RefCell<Option<Arc<AST>>>>;
type JobQueue = Rc<RefCell<VecDeque<ConfigurationJob>>>;

struct ConfigurationJob {
    entity: Entity,
    resource: Arc<ScriptResource>,
    slot: ProgramSlot,
    completion: ConfigureCompletion,
}

/// Fill `${key}` placeholders from the entity's properties
///
/// `$$` escapes a literal `$`.
pub fn render_template(
    id: &str,
    template: &str,
    entity: Entity,
    properties: &dyn PropertySource,
) -> Result<String, ScriptError> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('$') {
        output.push_str(&rest[..start]);
        let tail = &rest[start + 1..];

        if let Some(after) = tail.strip_prefix('$') {
            output.push('$');
            rest = after;
        } else if let Some(body) = tail.strip_prefix('{') {
            let end = body.find('}').ok_or_else(|| ScriptError::Template {
                id: id.to_string(),
                key: body.to_string(),
            })?;
            let key = body[..end].trim();
            let value = properties
                .get_property(entity, key)
                .ok_or_else(|| ScriptError::Template {
                    id: id.to_string(),
                    key: key.to_string(),
                })?;
            output.push_str(&value);
            rest = &body[end + 1..];
        } else {
            output.push('$');
            rest = tail;
        }
    }
    output.push_str(rest);
    Ok(output)
}

/// Factory building Rhai script instances
pub struct RhaiScriptFactory {
    engine: ScriptEngine,
    jobs: JobQueue,
}

impl RhaiScriptFactory {
    pub fn new(engine: ScriptEngine) -> Self {
        Self {
            engine,
            jobs: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    /// Declarative configurations waiting to run
    pub fn pending_jobs(&self) -> usize {
        self.jobs.borrow().len()
    }

    /// Run up to `budget` queued declarative configurations
    ///
    /// Each job resolves its template, compiles and then completes its
    /// instance's configuration. A job that fails still completes so the
    /// entity can settle; that instance's entry becomes a logged no-op.
    /// Returns the number of jobs run.
    pub fn process_pending(&mut self, budget: usize, properties: &dyn PropertySource) -> usize {
        let mut processed = 0;
        while processed < budget {
            let Some(job) = self.jobs.borrow_mut().pop_front() else {
                break;
            };
            processed += 1;

            if Rc::strong_count(&job.slot) == 1 {
                // The instance was torn down before its configuration ran
                debug!(entity = ?job.entity, script = %job.resource.id(), "Dropping configuration for discarded instance");
                continue;
            }

            let compiled = render_template(job.resource.id(), job.resource.source(), job.entity, properties)
                .and_then(|source| self.engine.compile_source(job.resource.id(), &source));
            match compiled {
                Ok(ast) => {
                    *job.slot.borrow_mut() = Some(ast);
                    trace!(entity = ?job.entity, script = %job.resource.id(), "Declarative script configured");
                }
                Err(e) => {
                    warn!(entity = ?job.entity, script = %job.resource.id(), error = %e, "Declarative configuration failed");
                }
            }
            job.completion.complete();
        }
        processed
    }
}

impl ScriptInstanceFactory for RhaiScriptFactory {
    fn create_instance(
        &mut self,
        entity: Entity,
        resource: &ScriptResource,
    ) -> Result<Box<dyn LiveScript>, ScriptError> {
        let program = match resource.kind() {
            ScriptKind::Imperative => Program::Ready(self.engine.compile_resource(resource)?),
            ScriptKind::Declarative => Program::Deferred {
                resource: Arc::new(resource.clone()),
                slot: Rc::new(RefCell::new(None)),
                jobs: self.jobs.clone(),
            },
        };

        Ok(Box::new(RhaiScript {
            engine: self.engine.clone(),
            id: resource.id().to_string(),
            entity,
            program,
            scope: Scope::new(),
            entered: false,
        }))
    }
}

enum Program {
    Ready(Arc<AST>),
    Deferred {
        resource: Arc<ScriptResource>,
        slot: ProgramSlot,
        jobs: JobQueue,
    },
}

struct RhaiScript {
    engine: ScriptEngine,
    id: String,
    entity: Entity,
    program: Program,
    scope: Scope<'static>,
    entered: bool,
}

impl RhaiScript {
    fn ast(&self) -> Option<Arc<AST>> {
        match &self.program {
            Program::Ready(ast) => Some(ast.clone()),
            Program::Deferred { slot, .. } => slot.borrow().clone(),
        }
    }

    fn entity_id(&self) -> i64 {
        self.entity.to_bits().get() as i64
    }
}

impl LiveScript for RhaiScript {
    fn configure(&mut self, completion: ConfigureCompletion) {
        match &self.program {
            Program::Ready(_) => completion.complete(),
            Program::Deferred {
                resource,
                slot,
                jobs,
            } => jobs.borrow_mut().push_back(ConfigurationJob {
                entity: self.entity,
                resource: resource.clone(),
                slot: slot.clone(),
                completion,
            }),
        }
    }

    fn enter(&mut self) -> Result<(), ScriptError> {
        let Some(ast) = self.ast() else {
            return Err(ScriptError::Hook {
                id: self.id.clone(),
                hook: ENTER_HOOK,
                message: "script was never configured".to_string(),
            });
        };
        self.entered = true;
        let entity_id = self.entity_id();
        self.engine
            .call_hook(&self.id, &ast, &mut self.scope, ENTER_HOOK, entity_id)
    }

    fn exit(&mut self) {
        if !self.entered {
            return;
        }
        self.entered = false;
        let Some(ast) = self.ast() else {
            return;
        };
        let entity_id = self.entity_id();
        if let Err(e) = self
            .engine
            .call_hook(&self.id, &ast, &mut self.scope, EXIT_HOOK, entity_id)
        {
            warn!(entity = ?self.entity, error = %e, "Script exit failed");
        }
    }
}
