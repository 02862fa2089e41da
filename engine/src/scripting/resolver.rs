//! Resolves a host entity's declared reference list into a script set
//!
//! The resolver reads the reserved reference-list property, looks every id up
//! in the content repository and reports the outcome as a [`SetChanged`]
//! carrying the complete previous and next sets. Consumers treat `new` as the
//! only source of truth.
//!
//! Triggers (list rewritten, referenced resource updated) only schedule a
//! rebuild. At most one rebuild is pending per entity; further triggers fold
//! into it. Rebuilds run on [`ScriptSetResolver::flush`], so callers never
//! observe a half-applied set.

use crate::scripting::error::ScriptSetIssue;
use crate::scripting::resource::{ContentRepository, ScriptReference, ScriptResource};
use hecs::Entity;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Read access to the host entity property store
pub trait PropertySource {
    fn get_property(&self, entity: Entity, key: &str) -> Option<String>;
}

/// Immutable, ordered snapshot of resolved scripts
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSet {
    scripts: Arc<[Arc<ScriptResource>]>,
}

impl ResolvedSet {
    pub fn new(scripts: Vec<Arc<ScriptResource>>) -> Self {
        Self {
            scripts: scripts.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<ScriptResource>> {
        self.scripts.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ScriptResource>> {
        self.scripts.iter()
    }

    /// Script ids in declared order
    pub fn ids(&self) -> Vec<&str> {
        self.scripts.iter().map(|script| script.id()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.scripts.iter().any(|script| script.id() == id)
    }
}

impl Default for ResolvedSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// A settled change of one entity's script set
#[derive(Debug, Clone, PartialEq)]
pub struct SetChanged {
    pub entity: Entity,
    pub old: ResolvedSet,
    pub new: ResolvedSet,
}

/// Whether a host entity can resolve its scripts yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Resolution waits for [`ScriptSetResolver::signal_ready`]
    Deferred,
}

/// Per-entity resolver state
#[derive(Debug)]
pub struct ScriptSetResolver {
    entity: Entity,
    reference_key: String,
    bound: bool,
    ready: bool,
    rebuild_pending: bool,
    emitted: bool,
    current: ResolvedSet,
    /// Every id in the last read list, resolvable or not
    watched: HashSet<String>,
    diagnostics: Vec<ScriptSetIssue>,
}

impl ScriptSetResolver {
    pub fn new(entity: Entity, reference_key: impl Into<String>, readiness: Readiness) -> Self {
        Self {
            entity,
            reference_key: reference_key.into(),
            bound: false,
            ready: readiness == Readiness::Ready,
            rebuild_pending: false,
            emitted: false,
            current: ResolvedSet::empty(),
            watched: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// The last emitted set
    pub fn current(&self) -> &ResolvedSet {
        &self.current
    }

    /// Whether an `Updated` signal for `id` concerns this entity
    pub fn watches(&self, id: &str) -> bool {
        self.watched.contains(id)
    }

    /// Start watching the entity
    ///
    /// Resolves immediately when the entity is ready; otherwise resolution
    /// waits for `signal_ready`. The first resolution always emits, even for
    /// an empty set.
    pub fn bind(
        &mut self,
        properties: &dyn PropertySource,
        repository: &dyn ContentRepository,
    ) -> Option<SetChanged> {
        if self.bound {
            debug!(entity = ?self.entity, "Resolver already bound");
            return None;
        }
        self.bound = true;
        self.rebuild_pending = true;

        if !self.ready {
            debug!(entity = ?self.entity, "Entity not ready; deferring script resolution");
            return None;
        }
        self.rebuild(properties, repository)
    }

    /// The external readiness gate opened
    pub fn signal_ready(
        &mut self,
        properties: &dyn PropertySource,
        repository: &dyn ContentRepository,
    ) -> Option<SetChanged> {
        if self.ready {
            return None;
        }
        self.ready = true;
        debug!(entity = ?self.entity, "Entity ready for script resolution");
        self.flush(properties, repository)
    }

    /// The reference-list property was rewritten
    ///
    /// Returns true when this scheduled a new rebuild.
    pub fn notify_references_changed(&mut self) -> bool {
        self.schedule_rebuild()
    }

    /// A resource was updated; only ids in the current list matter
    pub fn notify_resource_updated(&mut self, id: &str) -> bool {
        if !self.watched.contains(id) {
            return false;
        }
        self.schedule_rebuild()
    }

    /// Run the pending rebuild, if any and if the entity is ready
    pub fn flush(
        &mut self,
        properties: &dyn PropertySource,
        repository: &dyn ContentRepository,
    ) -> Option<SetChanged> {
        if !self.bound || !self.ready || !self.rebuild_pending {
            return None;
        }
        self.rebuild(properties, repository)
    }

    /// Stop watching and emit the final empty change
    pub fn unbind(&mut self) -> Option<SetChanged> {
        if !self.bound {
            return None;
        }
        self.bound = false;
        self.rebuild_pending = false;
        self.watched.clear();

        let old = std::mem::take(&mut self.current);
        debug!(entity = ?self.entity, released = old.len(), "Resolver unbound");
        Some(SetChanged {
            entity: self.entity,
            old,
            new: ResolvedSet::empty(),
        })
    }

    /// Take the issues absorbed since the last call
    pub fn take_diagnostics(&mut self) -> Vec<ScriptSetIssue> {
        std::mem::take(&mut self.diagnostics)
    }

    fn schedule_rebuild(&mut self) -> bool {
        if !self.bound {
            return false;
        }
        if self.rebuild_pending {
            let issue = ScriptSetIssue::ConcurrentRebuildRequested {
                entity: self.entity,
            };
            trace!(%issue, "Rebuild trigger coalesced");
            self.diagnostics.push(issue);
            return false;
        }
        self.rebuild_pending = true;
        trace!(entity = ?self.entity, "Rebuild scheduled");
        true
    }

    fn rebuild(
        &mut self,
        properties: &dyn PropertySource,
        repository: &dyn ContentRepository,
    ) -> Option<SetChanged> {
        self.rebuild_pending = false;

        let references = self.read_references(properties);
        let mut watched = HashSet::with_capacity(references.len());
        let mut scripts = Vec::with_capacity(references.len());

        for reference in references {
            if !watched.insert(reference.id.clone()) {
                self.absorb(ScriptSetIssue::DuplicateReference {
                    entity: self.entity,
                    id: reference.id,
                });
                continue;
            }
            match repository.resolve(&reference.id) {
                Some(resource) => scripts.push(resource),
                None => self.absorb(ScriptSetIssue::UnresolvableReference {
                    entity: self.entity,
                    id: reference.id,
                }),
            }
        }
        self.watched = watched;

        let new = ResolvedSet::new(scripts);
        if self.emitted && new == self.current {
            debug!(entity = ?self.entity, "Rebuild produced an identical set");
            return None;
        }
        self.emitted = true;

        let old = std::mem::replace(&mut self.current, new.clone());
        debug!(
            entity = ?self.entity,
            old = ?old.ids(),
            new = ?new.ids(),
            "Script set changed"
        );
        Some(SetChanged {
            entity: self.entity,
            old,
            new,
        })
    }

    fn read_references(&mut self, properties: &dyn PropertySource) -> Vec<ScriptReference> {
        let Some(raw) = properties.get_property(self.entity, &self.reference_key) else {
            return Vec::new();
        };
        if raw.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<Vec<ScriptReference>>(&raw) {
            Ok(references) => references,
            Err(e) => {
                self.absorb(ScriptSetIssue::MalformedReferenceList {
                    entity: self.entity,
                    message: e.to_string(),
                });
                Vec::new()
            }
        }
    }

    fn absorb(&mut self, issue: ScriptSetIssue) {
        warn!(%issue, "Script reference skipped");
        self.diagnostics.push(issue);
    }
}
