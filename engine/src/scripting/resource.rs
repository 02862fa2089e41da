//! Script resources and the content repository seam

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a script gets configured before it can be entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptKind {
    /// Configuration completes later through a callback
    Declarative,
    /// Configured by the time the factory returns the instance
    Imperative,
}

/// One script's identity, source and revision
///
/// Resources are immutable snapshots. A content update produces a new snapshot
/// with a higher revision; holders of the old `Arc` keep seeing the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptResource {
    id: String,
    kind: ScriptKind,
    source: String,
    revision: u64,
}

impl ScriptResource {
    /// Create a resource at revision 0
    pub fn new(id: impl Into<String>, kind: ScriptKind, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            revision: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Snapshot of this resource with the revision bumped by one
    pub fn updated(&self) -> Self {
        Self {
            revision: self.revision + 1,
            ..self.clone()
        }
    }

    pub(crate) fn at_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Snapshot with new source text and the revision bumped by one
    pub fn with_source(&self, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            revision: self.revision + 1,
            ..self.clone()
        }
    }
}

/// One entry of a host entity's reference list, as stored in its properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptReference {
    pub id: String,
}

impl ScriptReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Serialize an ordered reference list into the property string format
pub fn encode_reference_list<I, S>(ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let refs: Vec<ScriptReference> = ids.into_iter().map(ScriptReference::new).collect();
    // A Vec of plain string structs always serializes
    serde_json::to_string(&refs).unwrap_or_else(|_| "[]".to_string())
}

/// Read-only lookup of script resources by id
///
/// `Updated` signals are not carried here; the host forwards them to the
/// runner, and resolvers re-read through `resolve`.
pub trait ContentRepository {
    fn resolve(&self, id: &str) -> Option<Arc<ScriptResource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updated_bumps_revision_only() {
        let resource = ScriptResource::new("spin", ScriptKind::Imperative, "fn on_enter(e) {}");
        let next = resource.updated();
        assert_eq!(next.revision(), 1);
        assert_eq!(next.source(), resource.source());
        assert_eq!(resource.revision(), 0);
    }

    #[test]
    fn test_with_source_replaces_text() {
        let resource = ScriptResource::new("spin", ScriptKind::Declarative, "a");
        let next = resource.with_source("b").with_source("c");
        assert_eq!(next.source(), "c");
        assert_eq!(next.revision(), 2);
        assert_eq!(next.kind(), ScriptKind::Declarative);
    }

    #[test]
    fn test_reference_list_format() {
        let encoded = encode_reference_list(["a", "b"]);
        assert_eq!(encoded, r#"[{"id":"a"},{"id":"b"}]"#);

        let decoded: Vec<ScriptReference> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, vec![ScriptReference::new("a"), ScriptReference::new("b")]);
    }
}
