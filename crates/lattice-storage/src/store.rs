//! Storage factory and transaction-scoped handle.
//!
//! [`SqlStoreFactory`] owns the database connection, the configured SQL
//! dialect, and the ID generator. [`SqlStoreFactory::start_transaction`]
//! begins one transaction and returns a [`SqlGraphStore`] bound to it; the
//! caller resolves the handle exactly once with [`SqlGraphStore::commit`]
//! or [`SqlGraphStore::rollback`]. A dropped handle rolls back.
//!
//! The engine does no in-process locking: isolation comes entirely from
//! the transaction behavior mapped from [`TxOptions`].

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::info;

use lattice_core::EntityId;

use crate::dialect::Dialect;
use crate::error::{db_err, StorageError};
use crate::idgen::{IdGenerator, UuidIdGenerator};
use crate::schema::{ddl_statements, INTERNAL_NETWORK_ID, NETWORKS_TABLE};
use crate::traits::GraphStore;
use crate::types::{
    EntityGraph, EntityLoadCriteria, EntityLoadFilter, EntityLoadResult, EntityUpdateCriteria,
    IsolationLevel, Network, NetworkEntity, NetworkLoadCriteria, NetworkLoadFilter,
    NetworkLoadResult, NetworkUpdateCriteria, TxOptions,
};

/// Entry point to the storage engine.
pub struct SqlStoreFactory {
    conn: Connection,
    dialect: Dialect,
    id_gen: Box<dyn IdGenerator>,
}

impl SqlStoreFactory {
    /// Wraps an existing connection with an explicit dialect and ID
    /// generator.
    pub fn new(
        conn: Connection,
        dialect: Dialect,
        id_gen: Box<dyn IdGenerator>,
    ) -> Result<Self, StorageError> {
        configure(&conn)?;
        Ok(SqlStoreFactory {
            conn,
            dialect,
            id_gen,
        })
    }

    /// Opens (or creates) a SQLite database at `path`.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(db_err("error opening database"))?;
        Self::new(conn, Dialect::Sqlite, Box::new(UuidIdGenerator))
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(db_err("error opening database"))?;
        Self::new(conn, Dialect::Sqlite, Box::new(UuidIdGenerator))
    }

    /// Idempotently creates the networks, network-configs, entities, and
    /// associations tables plus the reserved internal network row. Safe
    /// to call on every service start.
    pub fn initialize_storage(&mut self) -> Result<(), StorageError> {
        for stmt in ddl_statements(self.dialect) {
            self.conn
                .execute(&stmt, [])
                .map_err(db_err("error initializing storage schema"))?;
        }

        let seed = self.dialect.insert_or_ignore(
            NETWORKS_TABLE,
            &["id", "name", "description"],
            &["id"],
        );
        self.conn
            .execute(
                &seed,
                params![
                    INTERNAL_NETWORK_ID,
                    "Internal",
                    "Reserved network for non-tenant entities",
                ],
            )
            .map_err(db_err("error seeding internal network"))?;

        info!(dialect = ?self.dialect, "storage schema initialized");
        Ok(())
    }

    /// Begins one transaction and returns the storage handle bound to it.
    pub fn start_transaction(
        &mut self,
        options: TxOptions,
    ) -> Result<SqlGraphStore<'_>, StorageError> {
        let behavior = tx_behavior(&options);
        let tx = self
            .conn
            .transaction_with_behavior(behavior)
            .map_err(db_err("error opening transaction"))?;
        Ok(SqlGraphStore {
            tx,
            dialect: self.dialect,
            id_gen: self.id_gen.as_ref(),
        })
    }
}

/// Configures connection pragmas: WAL journaling (a no-op for in-memory
/// databases) and foreign-key enforcement, which SQLite leaves off by
/// default and the associations cascade relies on.
fn configure(conn: &Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(db_err("error configuring journal mode"))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(db_err("error enabling foreign keys"))?;
    Ok(())
}

/// SQLite transactions are always serializable once they take the write
/// lock; the requested isolation picks how eagerly that lock is taken.
fn tx_behavior(options: &TxOptions) -> TransactionBehavior {
    if options.read_only {
        return TransactionBehavior::Deferred;
    }
    match options.isolation {
        Some(IsolationLevel::Serializable) => TransactionBehavior::Exclusive,
        Some(IsolationLevel::RepeatableRead) => TransactionBehavior::Immediate,
        _ => TransactionBehavior::Deferred,
    }
}

/// Transaction-scoped storage handle. All operations execute inside the
/// one wrapped transaction; nothing is visible to other transactions
/// until [`SqlGraphStore::commit`].
pub struct SqlGraphStore<'conn> {
    pub(crate) tx: Transaction<'conn>,
    pub(crate) dialect: Dialect,
    pub(crate) id_gen: &'conn dyn IdGenerator,
}

impl SqlGraphStore<'_> {
    /// Commits every mutation made through this handle.
    pub fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().map_err(db_err("error committing transaction"))
    }

    /// Discards every mutation made through this handle.
    pub fn rollback(self) -> Result<(), StorageError> {
        self.tx
            .rollback()
            .map_err(db_err("error rolling back transaction"))
    }
}

impl GraphStore for SqlGraphStore<'_> {
    fn load_networks(
        &self,
        filter: NetworkLoadFilter,
        criteria: NetworkLoadCriteria,
    ) -> Result<NetworkLoadResult, StorageError> {
        self.do_load_networks(filter, criteria)
    }

    fn create_network(&mut self, network: Network) -> Result<Network, StorageError> {
        self.do_create_network(network)
    }

    fn update_networks(
        &mut self,
        updates: Vec<NetworkUpdateCriteria>,
    ) -> Result<(), StorageError> {
        self.do_update_networks(updates)
    }

    fn load_entities(
        &self,
        network_id: &str,
        filter: EntityLoadFilter,
        criteria: EntityLoadCriteria,
    ) -> Result<EntityLoadResult, StorageError> {
        self.do_load_entities(network_id, filter, criteria)
    }

    fn count_entities(
        &self,
        network_id: &str,
        filter: EntityLoadFilter,
    ) -> Result<u64, StorageError> {
        self.do_count_entities(network_id, filter)
    }

    fn create_entity(
        &mut self,
        network_id: &str,
        entity: NetworkEntity,
    ) -> Result<NetworkEntity, StorageError> {
        self.do_create_entity(network_id, entity)
    }

    fn update_entity(
        &mut self,
        network_id: &str,
        update: EntityUpdateCriteria,
    ) -> Result<NetworkEntity, StorageError> {
        self.do_update_entity(network_id, update)
    }

    fn load_graph_for_entity(
        &self,
        network_id: &str,
        id: &EntityId,
        criteria: EntityLoadCriteria,
    ) -> Result<EntityGraph, StorageError> {
        self.do_load_graph_for_entity(network_id, id, criteria)
    }
}
