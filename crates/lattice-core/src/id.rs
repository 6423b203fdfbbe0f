//! Business identity for entities in a network graph.
//!
//! An entity is addressed by its `(type, key)` pair, unique within one
//! network. The pair is the only lookup handle exposed to callers; the
//! storage layer's internal primary keys never leave the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The `(type, key)` identity of an entity within a network.
///
/// Ordering is lexicographic on `(ty, key)`, which is the canonical sort
/// order for every entity and edge list returned by the storage engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    /// Entity type classifier, e.g. `"gateway"` or `"policy_rule"`.
    pub ty: String,
    /// Caller-chosen key, unique per type within a network.
    pub key: String,
}

impl EntityId {
    pub fn new(ty: impl Into<String>, key: impl Into<String>) -> Self {
        EntityId {
            ty: ty.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ty, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_display() {
        assert_eq!(format!("{}", EntityId::new("foo", "bar")), "foo-bar");
    }

    #[test]
    fn entity_id_ordering_is_type_then_key() {
        let mut ids = vec![
            EntityId::new("foo", "bar"),
            EntityId::new("bar", "baz"),
            EntityId::new("bar", "abc"),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                EntityId::new("bar", "abc"),
                EntityId::new("bar", "baz"),
                EntityId::new("foo", "bar"),
            ]
        );
    }

    #[test]
    fn serde_roundtrip() {
        let id = EntityId::new("gateway", "gw1");
        let json = serde_json::to_string(&id).unwrap();
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
