//! Network CRUD operations.
//!
//! Networks are the tenant-scoping unit: creation, sparse update with
//! config add/delete criteria, and deletion (which removes the network's
//! configs but, deliberately, not its entities).

use std::collections::{BTreeMap, HashSet};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use crate::error::{db_err, StorageError};
use crate::schema::{NETWORKS_TABLE, NETWORK_CONFIGS_TABLE};
use crate::store::SqlGraphStore;
use crate::types::{
    Network, NetworkLoadCriteria, NetworkLoadFilter, NetworkLoadResult, NetworkUpdateCriteria,
};

impl SqlGraphStore<'_> {
    pub(crate) fn do_load_networks(
        &self,
        filter: NetworkLoadFilter,
        criteria: NetworkLoadCriteria,
    ) -> Result<NetworkLoadResult, StorageError> {
        if filter.ids.is_empty() {
            return Ok(NetworkLoadResult::default());
        }

        let mut columns = vec![
            format!("{NETWORKS_TABLE}.id"),
            format!("{NETWORKS_TABLE}.type"),
        ];
        if criteria.load_metadata {
            columns.push(format!("{NETWORKS_TABLE}.name"));
            columns.push(format!("{NETWORKS_TABLE}.description"));
        }
        if criteria.load_configs {
            columns.push(format!("{NETWORK_CONFIGS_TABLE}.type"));
            columns.push(format!("{NETWORK_CONFIGS_TABLE}.value"));
        }
        columns.push(format!("{NETWORKS_TABLE}.version"));

        let join = if criteria.load_configs {
            format!(
                " LEFT JOIN {NETWORK_CONFIGS_TABLE} \
                 ON {NETWORK_CONFIGS_TABLE}.network_id = {NETWORKS_TABLE}.id"
            )
        } else {
            String::new()
        };
        let sql = format!(
            "SELECT {} FROM {NETWORKS_TABLE}{join} WHERE {NETWORKS_TABLE}.id IN ({})",
            columns.join(", "),
            self.dialect.placeholders(1, filter.ids.len()),
        );

        let mut stmt = self
            .tx
            .prepare_cached(&sql)
            .map_err(db_err("error querying for networks"))?;
        let values: Vec<Value> = filter.ids.iter().cloned().map(Value::Text).collect();
        let mut rows = stmt
            .query(params_from_iter(values.iter()))
            .map_err(db_err("error querying for networks"))?;

        let mut networks: BTreeMap<String, Network> = BTreeMap::new();
        while let Some(row) = rows.next().map_err(db_err("error querying for networks"))? {
            let mut idx = 0;
            let mut next = || {
                let i = idx;
                idx += 1;
                i
            };
            let id: String = row.get(next()).map_err(db_err("error scanning network row"))?;
            let ty: Option<String> =
                row.get(next()).map_err(db_err("error scanning network row"))?;
            let (name, description) = if criteria.load_metadata {
                let name: Option<String> =
                    row.get(next()).map_err(db_err("error scanning network row"))?;
                let description: Option<String> =
                    row.get(next()).map_err(db_err("error scanning network row"))?;
                (name.unwrap_or_default(), description.unwrap_or_default())
            } else {
                (String::new(), String::new())
            };
            let config = if criteria.load_configs {
                let cfg_type: Option<String> =
                    row.get(next()).map_err(db_err("error scanning network row"))?;
                let cfg_value: Option<Vec<u8>> =
                    row.get(next()).map_err(db_err("error scanning network row"))?;
                cfg_type.map(|t| (t, cfg_value.unwrap_or_default()))
            } else {
                None
            };
            let version: i64 = row.get(next()).map_err(db_err("error scanning network row"))?;

            let network = networks.entry(id.clone()).or_insert_with(|| Network {
                id,
                ty,
                name,
                description,
                configs: BTreeMap::new(),
                version: version as u64,
            });
            if let Some((cfg_type, cfg_value)) = config {
                network.configs.insert(cfg_type, cfg_value);
            }
        }

        let mut not_found = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for id in &filter.ids {
            if !networks.contains_key(id) && seen.insert(id) {
                not_found.push(id.clone());
            }
        }

        Ok(NetworkLoadResult {
            networks: networks.into_values().collect(),
            network_ids_not_found: not_found,
        })
    }

    pub(crate) fn do_create_network(&mut self, network: Network) -> Result<Network, StorageError> {
        if network.id.is_empty() {
            return Err(StorageError::InvalidArgument(
                "network ID must be specified".to_owned(),
            ));
        }

        let count_sql = format!(
            "SELECT COUNT(1) FROM {NETWORKS_TABLE} WHERE id = {}",
            self.dialect.placeholder(1),
        );
        let count: i64 = self
            .tx
            .query_row(&count_sql, params![network.id], |row| row.get(0))
            .map_err(db_err("error checking for existing network"))?;
        if count > 0 {
            return Err(StorageError::AlreadyExists(format!(
                "network {}",
                network.id
            )));
        }

        let insert_sql = format!(
            "INSERT INTO {NETWORKS_TABLE} (id, type, name, description) VALUES ({})",
            self.dialect.placeholders(1, 4),
        );
        self.tx
            .execute(
                &insert_sql,
                params![network.id, network.ty, network.name, network.description],
            )
            .map_err(db_err("error inserting network"))?;

        if !network.configs.is_empty() {
            let config_sql = format!(
                "INSERT INTO {NETWORK_CONFIGS_TABLE} (network_id, type, value) VALUES ({})",
                self.dialect.placeholders(1, 3),
            );
            let mut stmt = self
                .tx
                .prepare_cached(&config_sql)
                .map_err(db_err("error inserting network configs"))?;
            for (cfg_type, cfg_value) in &network.configs {
                stmt.execute(params![network.id, cfg_type, cfg_value])
                    .map_err(db_err("error inserting network configs"))?;
            }
        }

        Ok(network)
    }

    pub(crate) fn do_update_networks(
        &mut self,
        updates: Vec<NetworkUpdateCriteria>,
    ) -> Result<(), StorageError> {
        let mut ids: HashSet<&str> = HashSet::new();
        for update in &updates {
            if !ids.insert(&update.id) {
                return Err(StorageError::InvalidArgument(
                    "multiple updates for a single network are not allowed".to_owned(),
                ));
            }
        }

        for update in &updates {
            if update.delete_network {
                self.delete_network(&update.id)?;
            } else {
                self.update_network(update)?;
            }
        }
        Ok(())
    }

    fn delete_network(&mut self, id: &str) -> Result<(), StorageError> {
        // The configs cascade with the network row, but explicit deletes
        // are clearer.
        let delete_configs = format!(
            "DELETE FROM {NETWORK_CONFIGS_TABLE} WHERE network_id = {}",
            self.dialect.placeholder(1),
        );
        self.tx
            .execute(&delete_configs, params![id])
            .map_err(db_err("error deleting network configs"))?;

        let delete_network = format!(
            "DELETE FROM {NETWORKS_TABLE} WHERE id = {}",
            self.dialect.placeholder(1),
        );
        self.tx
            .execute(&delete_network, params![id])
            .map_err(db_err("error deleting network"))?;
        Ok(())
    }

    fn update_network(&mut self, update: &NetworkUpdateCriteria) -> Result<(), StorageError> {
        let mut sets = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(name) = &update.new_name {
            values.push(Value::Text(name.clone()));
            sets.push(format!("name = {}", self.dialect.placeholder(values.len())));
        }
        if let Some(description) = &update.new_description {
            values.push(Value::Text(description.clone()));
            sets.push(format!(
                "description = {}",
                self.dialect.placeholder(values.len())
            ));
        }
        sets.push("version = version + 1".to_owned());
        values.push(Value::Text(update.id.clone()));
        let update_sql = format!(
            "UPDATE {NETWORKS_TABLE} SET {} WHERE id = {}",
            sets.join(", "),
            self.dialect.placeholder(values.len()),
        );
        self.tx
            .execute(&update_sql, params_from_iter(values.iter()))
            .map_err(db_err("error updating network"))?;

        if !update.configs_to_add_or_update.is_empty() {
            let upsert_sql = self.dialect.insert_or_update(
                NETWORK_CONFIGS_TABLE,
                &["network_id", "type", "value"],
                &["network_id", "type"],
                &["value"],
            );
            let mut stmt = self
                .tx
                .prepare_cached(&upsert_sql)
                .map_err(db_err("error updating network configs"))?;
            for (cfg_type, cfg_value) in &update.configs_to_add_or_update {
                stmt.execute(params![update.id, cfg_type, cfg_value])
                    .map_err(db_err("error updating network configs"))?;
            }
        }

        if !update.configs_to_delete.is_empty() {
            let delete_sql = format!(
                "DELETE FROM {NETWORK_CONFIGS_TABLE} WHERE network_id = {} AND type IN ({})",
                self.dialect.placeholder(1),
                self.dialect.placeholders(2, update.configs_to_delete.len()),
            );
            let mut values: Vec<Value> = vec![Value::Text(update.id.clone())];
            values.extend(update.configs_to_delete.iter().cloned().map(Value::Text));
            self.tx
                .execute(&delete_sql, params_from_iter(values.iter()))
                .map_err(db_err("error deleting network configs"))?;
        }
        Ok(())
    }
}
