//! Persisted schema for the entity-graph storage engine.
//!
//! Four tables: networks, their typed configs, entities, and the
//! association edges between entities. All DDL is generated through the
//! [`Dialect`] builder and guarded with `IF NOT EXISTS` so initialization
//! is safe to run repeatedly.

use crate::dialect::Dialect;

pub const NETWORKS_TABLE: &str = "networks";
pub const NETWORK_CONFIGS_TABLE: &str = "network_configs";
pub const ENTITIES_TABLE: &str = "entities";
pub const ASSOCIATIONS_TABLE: &str = "associations";

/// Reserved network holding entities that are not scoped to any tenant.
pub const INTERNAL_NETWORK_ID: &str = "network_lattice_internal";

/// `key` collides with a keyword in some dialects, so it is always quoted.
pub const KEY_COL: &str = "\"key\"";

/// All DDL statements required by the engine, in execution order.
///
/// Entities reference their network without `ON DELETE CASCADE`: deleting
/// a network with live entities is a foreign-key error, and cleanup is the
/// caller's responsibility. Associations do cascade with their endpoints.
pub fn ddl_statements(dialect: Dialect) -> Vec<String> {
    let bytes = dialect.bytes_type();
    vec![
        dialect.create_table_if_not_exists(
            NETWORKS_TABLE,
            &[
                "id TEXT PRIMARY KEY".to_owned(),
                "type TEXT".to_owned(),
                "name TEXT".to_owned(),
                "description TEXT".to_owned(),
                "version BIGINT NOT NULL DEFAULT 0".to_owned(),
            ],
            &[],
        ),
        dialect.create_table_if_not_exists(
            NETWORK_CONFIGS_TABLE,
            &[
                format!("network_id TEXT NOT NULL REFERENCES {NETWORKS_TABLE} (id) ON DELETE CASCADE"),
                "type TEXT NOT NULL".to_owned(),
                format!("value {bytes}"),
            ],
            &["PRIMARY KEY (network_id, type)".to_owned()],
        ),
        dialect.create_table_if_not_exists(
            ENTITIES_TABLE,
            &[
                "pk TEXT PRIMARY KEY".to_owned(),
                format!("network_id TEXT REFERENCES {NETWORKS_TABLE} (id)"),
                "type TEXT NOT NULL".to_owned(),
                format!("{KEY_COL} TEXT NOT NULL"),
                "graph_id TEXT NOT NULL".to_owned(),
                "name TEXT".to_owned(),
                "description TEXT".to_owned(),
                "physical_id TEXT UNIQUE".to_owned(),
                format!("config {bytes}"),
                "version BIGINT NOT NULL DEFAULT 0".to_owned(),
            ],
            &[format!("UNIQUE (network_id, {KEY_COL}, type)")],
        ),
        // graph_id is the access path for whole-component loads.
        dialect.create_index_if_not_exists("entities_graph_id_idx", ENTITIES_TABLE, "graph_id"),
        dialect.create_table_if_not_exists(
            ASSOCIATIONS_TABLE,
            &[
                format!("from_pk TEXT NOT NULL REFERENCES {ENTITIES_TABLE} (pk) ON DELETE CASCADE"),
                format!("to_pk TEXT NOT NULL REFERENCES {ENTITIES_TABLE} (pk) ON DELETE CASCADE"),
            ],
            &["PRIMARY KEY (from_pk, to_pk)".to_owned()],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_is_guarded_for_idempotence() {
        for stmt in ddl_statements(Dialect::Sqlite) {
            assert!(stmt.contains("IF NOT EXISTS"), "not idempotent: {stmt}");
        }
    }

    #[test]
    fn postgres_ddl_uses_bytea() {
        let ddl = ddl_statements(Dialect::Postgres).join("\n");
        assert!(ddl.contains("config BYTEA"));
        assert!(!ddl.contains("BLOB"));
    }

    #[test]
    fn entities_do_not_cascade_with_their_network() {
        let ddl = ddl_statements(Dialect::Sqlite)
            .into_iter()
            .find(|s| s.contains("CREATE TABLE IF NOT EXISTS entities"))
            .unwrap();
        assert!(!ddl.contains("network_id TEXT REFERENCES networks (id) ON DELETE CASCADE"));
    }
}
