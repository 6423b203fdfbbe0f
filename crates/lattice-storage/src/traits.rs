//! The [`GraphStore`] trait defining the storage contract.
//!
//! Every operation on networks, entities, and entity graphs runs through
//! a transaction-scoped handle implementing this trait. Higher-level
//! services integrate against the trait only; none of them touch the SQL
//! tables directly.

use lattice_core::EntityId;

use crate::error::StorageError;
use crate::types::{
    EntityGraph, EntityLoadCriteria, EntityLoadFilter, EntityLoadResult, EntityUpdateCriteria,
    Network, NetworkEntity, NetworkLoadCriteria, NetworkLoadFilter, NetworkLoadResult,
    NetworkUpdateCriteria,
};

/// The storage contract for tenant networks and their entity graphs.
///
/// A handle is bound to exactly one transaction: every call executes
/// inside it, and the caller resolves the transaction exactly once with
/// `commit` or `rollback` on the concrete handle.
pub trait GraphStore {
    // -------------------------------------------------------------------
    // Network operations
    // -------------------------------------------------------------------

    /// Loads the networks named by `filter`. Absent IDs are reported in
    /// the result, not treated as errors.
    fn load_networks(
        &self,
        filter: NetworkLoadFilter,
        criteria: NetworkLoadCriteria,
    ) -> Result<NetworkLoadResult, StorageError>;

    /// Creates a network and its configs. Fails with `AlreadyExists` if
    /// the ID is taken.
    fn create_network(&mut self, network: Network) -> Result<Network, StorageError>;

    /// Applies a batch of sparse network updates and deletions. At most
    /// one criteria entry per network ID is allowed.
    fn update_networks(&mut self, updates: Vec<NetworkUpdateCriteria>)
        -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Entity operations
    // -------------------------------------------------------------------

    /// Loads entities matching `filter`, populating the fields selected
    /// by `criteria`. Pagination is only available for type-filtered
    /// loads.
    fn load_entities(
        &self,
        network_id: &str,
        filter: EntityLoadFilter,
        criteria: EntityLoadCriteria,
    ) -> Result<EntityLoadResult, StorageError>;

    /// Counts entities matching `filter` without loading them.
    fn count_entities(
        &self,
        network_id: &str,
        filter: EntityLoadFilter,
    ) -> Result<u64, StorageError>;

    /// Creates an entity, its requested edges, and merges the connected
    /// graphs. Returns the entity with all system-assigned fields set.
    fn create_entity(
        &mut self,
        network_id: &str,
        entity: NetworkEntity,
    ) -> Result<NetworkEntity, StorageError>;

    /// Applies a sparse update or deletion to one entity, maintaining the
    /// graph-ID invariant across any edge changes.
    fn update_entity(
        &mut self,
        network_id: &str,
        update: EntityUpdateCriteria,
    ) -> Result<NetworkEntity, StorageError>;

    /// Loads the full connected component containing `id`, with resolved
    /// edges and root entities.
    fn load_graph_for_entity(
        &self,
        network_id: &str,
        id: &EntityId,
        criteria: EntityLoadCriteria,
    ) -> Result<EntityGraph, StorageError>;
}
