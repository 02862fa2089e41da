//! Core components for script host entities

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name component for user-friendly entity identification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name(pub String);

impl Name {
    /// Create a new name component
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// String properties attached to an entity
///
/// Every write bumps `revision` so observers can detect changes without
/// diffing the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityProperties {
    values: BTreeMap<String, String>,
    #[serde(skip)]
    revision: u64,
}

impl EntityProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert that does not count as a change
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Set a property, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.revision += 1;
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Marker for an entity whose assets are still streaming in
///
/// Script sets of such entities are not resolved until the marker is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAssets;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_component() {
        let name = Name::new("Test Entity");
        assert_eq!(name.0, "Test Entity");

        // Test default
        let default_name = Name::default();
        assert_eq!(default_name.0, "");

        // Test serialization
        let json = serde_json::to_string(&name).unwrap();
        let deserialized: Name = serde_json::from_str(&json).unwrap();
        assert_eq!(name, deserialized);
    }

    #[test]
    fn test_property_revision_tracks_writes() {
        let mut props = EntityProperties::new().with("speed", "2");
        assert_eq!(props.revision(), 0);

        assert_eq!(props.set("speed", "3"), Some("2".to_string()));
        assert_eq!(props.revision(), 1);
        assert_eq!(props.get("speed"), Some("3"));

        assert!(props.remove("missing").is_none());
        assert_eq!(props.revision(), 1);
        assert!(props.remove("speed").is_some());
        assert_eq!(props.revision(), 2);
        assert!(props.is_empty());
    }

    #[test]
    fn test_properties_serialize_as_plain_map() {
        let props = EntityProperties::new().with("a", "1").with("b", "2");
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(json, serde_json::json!({"a": "1", "b": "2"}));
    }
}
