//! Data model for the entity-graph storage layer.
//!
//! Networks are the tenant-scoping unit; entities are graph nodes owned by
//! a network; associations are directed edges between entities. Optional
//! fields use explicit `Option` wrappers throughout -- a `None` update
//! field means "leave unchanged", and an empty string supplied where an
//! `Option<String>` is stored is normalized to absent.

use std::collections::BTreeMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use lattice_core::EntityId;

use crate::error::StorageError;

/// Default number of entities per page when the caller asks for
/// pagination without a page size.
pub const DEFAULT_ENTITY_LOAD_PAGE_SIZE: u32 = 100;

/// Upper bound on the effective page size for a single load.
pub const MAX_ENTITY_LOAD_PAGE_SIZE: u32 = 1000;

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// A tenant network. Owns entities and a set of typed opaque configs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Globally unique network ID.
    pub id: String,
    /// Optional classifier, e.g. the network technology.
    pub ty: Option<String>,
    pub name: String,
    pub description: String,
    /// Opaque configs keyed by config type. One row per type; the map is
    /// ordered so bulk writes are deterministic.
    pub configs: BTreeMap<String, Vec<u8>>,
    /// Monotonically increasing, bumped on every update.
    pub version: u64,
}

/// Selects which networks to load.
#[derive(Debug, Clone, Default)]
pub struct NetworkLoadFilter {
    /// Explicit network IDs to load.
    pub ids: Vec<String>,
}

/// Selects which optional network fields to populate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkLoadCriteria {
    pub load_metadata: bool,
    pub load_configs: bool,
}

/// Result of a network load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkLoadResult {
    pub networks: Vec<Network>,
    /// Requested IDs that do not exist. Not an error.
    pub network_ids_not_found: Vec<String>,
}

/// Sparse update (or deletion) of one network.
#[derive(Debug, Clone, Default)]
pub struct NetworkUpdateCriteria {
    pub id: String,
    /// Deletes the network and its configs. All other fields are ignored.
    pub delete_network: bool,
    pub new_name: Option<String>,
    pub new_description: Option<String>,
    pub configs_to_add_or_update: BTreeMap<String, Vec<u8>>,
    pub configs_to_delete: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A node of the per-network entity graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntity {
    /// Owning network.
    pub network_id: String,
    /// Business identity, unique per network.
    pub id: EntityId,
    /// System-assigned internal primary key. Used only for joins inside
    /// the engine; never accepted as a lookup handle.
    pub pk: String,
    /// Optional physical device ID, unique across all networks.
    pub physical_id: Option<String>,
    pub name: String,
    pub description: String,
    /// Opaque application-defined config. `None` when not loaded or unset.
    pub config: Option<Vec<u8>>,
    /// Label shared by every entity in this entity's connected component.
    pub graph_id: String,
    /// Bumped by exactly one on every successful mutation.
    pub version: u64,
    /// Outgoing edges, deduplicated and sorted.
    pub associations: Vec<EntityId>,
    /// Incoming edges, deduplicated and sorted.
    pub parent_associations: Vec<EntityId>,
}

/// Selects which entities to load. At most one filter mode applies:
/// explicit IDs, a physical-ID lookup (network-agnostic), a graph-ID
/// lookup, or type/key predicates. An empty filter loads the whole
/// network.
#[derive(Debug, Clone, Default)]
pub struct EntityLoadFilter {
    pub ids: Vec<EntityId>,
    pub type_filter: Option<String>,
    pub key_filter: Option<String>,
    pub physical_id: Option<String>,
    pub graph_id: Option<String>,
}

impl EntityLoadFilter {
    /// True when no filter mode is set, i.e. the load spans every entity
    /// of the network.
    pub fn is_load_all(&self) -> bool {
        self.ids.is_empty()
            && self.type_filter.is_none()
            && self.key_filter.is_none()
            && self.physical_id.is_none()
            && self.graph_id.is_none()
    }
}

/// Selects which optional entity fields to populate, plus pagination.
#[derive(Debug, Clone, Default)]
pub struct EntityLoadCriteria {
    /// Load name and description.
    pub load_metadata: bool,
    pub load_config: bool,
    /// Load outgoing associations.
    pub load_assocs_from: bool,
    /// Load incoming associations.
    pub load_assocs_to: bool,
    /// Page size; 0 means [`DEFAULT_ENTITY_LOAD_PAGE_SIZE`]. Only honored
    /// for type-filtered loads.
    pub page_size: u32,
    /// Opaque cursor from a previous page; empty for the first page.
    pub page_token: String,
}

impl EntityLoadCriteria {
    /// Loads every optional field.
    pub fn full() -> Self {
        EntityLoadCriteria {
            load_metadata: true,
            load_config: true,
            load_assocs_from: true,
            load_assocs_to: true,
            ..Default::default()
        }
    }
}

/// Result of an entity load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityLoadResult {
    pub entities: Vec<NetworkEntity>,
    /// Explicitly requested IDs that do not exist. Not an error.
    pub entities_not_found: Vec<EntityId>,
    /// Cursor for the next page; empty when this page is the last.
    pub next_page_token: String,
}

/// Sparse update (or deletion) of one entity.
///
/// At most one association mode may be used per update: `add`/`delete`,
/// or `set` (which replaces every outgoing edge).
#[derive(Debug, Clone, Default)]
pub struct EntityUpdateCriteria {
    pub id: EntityId,
    /// Deletes the entity and its edges. Deleting an absent entity is a
    /// no-op, not an error. All other fields are ignored.
    pub delete_entity: bool,
    pub new_name: Option<String>,
    pub new_description: Option<String>,
    pub new_physical_id: Option<String>,
    pub new_config: Option<Vec<u8>>,
    pub associations_to_add: Vec<EntityId>,
    pub associations_to_delete: Vec<EntityId>,
    /// Replaces all outgoing edges with this set. `Some(vec![])` clears
    /// every outgoing edge.
    pub associations_to_set: Option<Vec<EntityId>>,
}

// ---------------------------------------------------------------------------
// Graphs
// ---------------------------------------------------------------------------

/// A directed edge between two entities in the same network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: EntityId,
    pub to: EntityId,
}

/// The full connected component containing a requested entity. Derived
/// per query, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityGraph {
    /// Member entities, sorted by `(type, key)`, with both association
    /// directions resolved.
    pub entities: Vec<NetworkEntity>,
    /// Members with no incoming edge within the component.
    pub root_entities: Vec<EntityId>,
    /// Every edge among the members, sorted by `(from, to)`.
    pub edges: Vec<GraphEdge>,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Requested isolation for a storage transaction.
///
/// SQLite transactions are always serializable; the levels map onto
/// transaction begin behaviors: `Serializable` begins exclusively,
/// `RepeatableRead` begins immediately (taking the write lock up front),
/// and the weaker levels begin deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Options for [`crate::store::SqlStoreFactory::start_transaction`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    /// Advisory: the transaction will only read. Read-only transactions
    /// begin deferred so no write lock is taken.
    pub read_only: bool,
}

// ---------------------------------------------------------------------------
// Page tokens
// ---------------------------------------------------------------------------

/// Wire form of the pagination cursor. Callers treat the encoded string
/// as an opaque blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EntityPageToken {
    pub last_included_entity: String,
}

pub(crate) fn encode_page_token(last_included_entity: &str) -> Result<String, StorageError> {
    let token = EntityPageToken {
        last_included_entity: last_included_entity.to_owned(),
    };
    let payload = serde_json::to_vec(&token)?;
    Ok(URL_SAFE_NO_PAD.encode(payload))
}

pub(crate) fn decode_page_token(token: &str) -> Result<EntityPageToken, StorageError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|_| StorageError::InvalidPageToken)?;
    serde_json::from_slice(&decoded).map_err(|_| StorageError::InvalidPageToken)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sorts and deduplicates an association list in place.
pub(crate) fn normalize_assocs(assocs: &mut Vec<EntityId>) {
    assocs.sort();
    assocs.dedup();
}

/// Normalizes "empty string means absent" for optional stored fields.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_token_roundtrip() {
        let encoded = encode_page_token("gw42").unwrap();
        let decoded = decode_page_token(&encoded).unwrap();
        assert_eq!(decoded.last_included_entity, "gw42");
    }

    #[test]
    fn page_token_is_opaque_base64() {
        let encoded = encode_page_token("k").unwrap();
        assert!(!encoded.contains('{'));
        assert!(decode_page_token("not a token!").is_err());
    }

    #[test]
    fn normalize_assocs_sorts_and_dedups() {
        let mut assocs = vec![
            EntityId::new("b", "2"),
            EntityId::new("a", "1"),
            EntityId::new("b", "2"),
        ];
        normalize_assocs(&mut assocs);
        assert_eq!(assocs, vec![EntityId::new("a", "1"), EntityId::new("b", "2")]);
    }

    #[test]
    fn empty_filter_is_load_all() {
        assert!(EntityLoadFilter::default().is_load_all());
        let by_type = EntityLoadFilter {
            type_filter: Some("gateway".to_owned()),
            ..Default::default()
        };
        assert!(!by_type.is_load_all());
    }
}
