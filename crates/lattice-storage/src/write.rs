//! Entity write engine.
//!
//! Creates, updates, and deletes entities and their edges. Every edge
//! mutation hands off to the graph-consistency engine in the same
//! transaction, so committed state never violates the graph-ID invariant.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use lattice_core::EntityId;

use crate::error::{db_err, StorageError};
use crate::schema::{ASSOCIATIONS_TABLE, ENTITIES_TABLE, KEY_COL};
use crate::store::SqlGraphStore;
use crate::types::{
    non_empty, normalize_assocs, EntityLoadCriteria, EntityLoadFilter, EntityUpdateCriteria,
    NetworkEntity,
};

impl SqlGraphStore<'_> {
    pub(crate) fn do_create_entity(
        &mut self,
        network_id: &str,
        mut entity: NetworkEntity,
    ) -> Result<NetworkEntity, StorageError> {
        if entity.id.ty.is_empty() || entity.id.key.is_empty() {
            return Err(StorageError::InvalidArgument(
                "entity type and key must be specified".to_owned(),
            ));
        }

        let count_sql = format!(
            "SELECT COUNT(1) FROM {ENTITIES_TABLE} \
             WHERE network_id = {} AND {KEY_COL} = {} AND type = {}",
            self.dialect.placeholder(1),
            self.dialect.placeholder(2),
            self.dialect.placeholder(3),
        );
        let count: i64 = self
            .tx
            .query_row(
                &count_sql,
                params![network_id, entity.id.key, entity.id.ty],
                |row| row.get(0),
            )
            .map_err(db_err("error checking for existing entity"))?;
        if count > 0 {
            return Err(StorageError::AlreadyExists(format!(
                "an entity ({})",
                entity.id
            )));
        }

        entity.physical_id = non_empty(entity.physical_id);
        if let Some(physical_id) = &entity.physical_id {
            let physical_sql = format!(
                "SELECT COUNT(1) FROM {ENTITIES_TABLE} WHERE physical_id = {}",
                self.dialect.placeholder(1),
            );
            let count: i64 = self
                .tx
                .query_row(&physical_sql, params![physical_id], |row| row.get(0))
                .map_err(db_err("error checking for existing physical ID"))?;
            if count > 0 {
                return Err(StorageError::AlreadyExists(format!(
                    "an entity with physical ID {physical_id}"
                )));
            }
        }

        entity.network_id = network_id.to_owned();
        entity.pk = self.id_gen.generate();
        entity.graph_id = self.id_gen.generate();
        entity.version = 0;
        entity.parent_associations.clear();

        let insert_sql = format!(
            "INSERT INTO {ENTITIES_TABLE} \
             (pk, network_id, type, {KEY_COL}, graph_id, name, description, physical_id, config) \
             VALUES ({})",
            self.dialect.placeholders(1, 9),
        );
        self.tx
            .execute(
                &insert_sql,
                params![
                    entity.pk,
                    entity.network_id,
                    entity.id.ty,
                    entity.id.key,
                    entity.graph_id,
                    entity.name,
                    entity.description,
                    entity.physical_id,
                    entity.config,
                ],
            )
            .map_err(db_err("error inserting entity"))?;

        normalize_assocs(&mut entity.associations);
        if !entity.associations.is_empty() {
            let pk = entity.pk.clone();
            let graph_id = entity.graph_id.clone();
            entity.graph_id =
                self.write_edges(network_id, &pk, &graph_id, &entity.associations)?;
        }
        Ok(entity)
    }

    pub(crate) fn do_update_entity(
        &mut self,
        network_id: &str,
        update: EntityUpdateCriteria,
    ) -> Result<NetworkEntity, StorageError> {
        if update.id.ty.is_empty() || update.id.key.is_empty() {
            return Err(StorageError::InvalidArgument(
                "entity type and key must be specified".to_owned(),
            ));
        }
        if update.associations_to_set.is_some()
            && (!update.associations_to_add.is_empty() || !update.associations_to_delete.is_empty())
        {
            return Err(StorageError::InvalidArgument(
                "cannot combine setting associations with adding or deleting them".to_owned(),
            ));
        }

        if update.delete_entity {
            return self.delete_entity(network_id, &update.id);
        }

        let existing = self
            .load_basic_entity(network_id, &update.id)?
            .ok_or_else(|| StorageError::NotFound(format!("entity ({})", update.id)))?;

        let new_physical_id = update.new_physical_id.clone().map(|p| non_empty(Some(p)));
        if let Some(Some(physical_id)) = &new_physical_id {
            if existing.physical_id.as_deref() != Some(physical_id) {
                let physical_sql = format!(
                    "SELECT COUNT(1) FROM {ENTITIES_TABLE} WHERE physical_id = {} AND pk != {}",
                    self.dialect.placeholder(1),
                    self.dialect.placeholder(2),
                );
                let count: i64 = self
                    .tx
                    .query_row(&physical_sql, params![physical_id, existing.pk], |row| {
                        row.get(0)
                    })
                    .map_err(db_err("error checking for existing physical ID"))?;
                if count > 0 {
                    return Err(StorageError::AlreadyExists(format!(
                        "an entity with physical ID {physical_id}"
                    )));
                }
            }
        }

        self.update_entity_fields(&existing.pk, &update, &new_physical_id)?;

        let mut entity = NetworkEntity {
            network_id: network_id.to_owned(),
            id: update.id.clone(),
            pk: existing.pk.clone(),
            physical_id: match &new_physical_id {
                Some(new) => new.clone(),
                None => existing.physical_id.clone(),
            },
            name: update.new_name.clone().unwrap_or_default(),
            description: update.new_description.clone().unwrap_or_default(),
            config: update.new_config.clone(),
            graph_id: existing.graph_id.clone(),
            version: existing.version + 1,
            associations: Vec::new(),
            parent_associations: Vec::new(),
        };

        if let Some(set) = &update.associations_to_set {
            let delete_sql = format!(
                "DELETE FROM {ASSOCIATIONS_TABLE} WHERE from_pk = {}",
                self.dialect.placeholder(1),
            );
            self.tx
                .execute(&delete_sql, params![existing.pk])
                .map_err(db_err("error deleting associations"))?;

            let mut targets = set.clone();
            normalize_assocs(&mut targets);
            if !targets.is_empty() {
                entity.graph_id =
                    self.write_edges(network_id, &existing.pk, &existing.graph_id, &targets)?;
            }
            entity.associations = targets;
            // A replace may have orphaned part of the old component.
            let graph_id = entity.graph_id.clone();
            self.fix_graph(network_id, &graph_id)?;
        }

        if !update.associations_to_add.is_empty() {
            let mut targets = update.associations_to_add.clone();
            normalize_assocs(&mut targets);
            entity.graph_id =
                self.write_edges(network_id, &existing.pk, &existing.graph_id, &targets)?;
            entity.associations = targets;
        }

        if !update.associations_to_delete.is_empty() {
            let mut targets = update.associations_to_delete.clone();
            normalize_assocs(&mut targets);
            let removed = self.delete_edges(network_id, &existing.pk, &targets)?;
            if removed > 0 {
                self.fix_graph(network_id, &existing.graph_id)?;
            }
        }

        Ok(entity)
    }

    /// Deleting an absent entity is a no-op, not an error.
    fn delete_entity(
        &mut self,
        network_id: &str,
        id: &EntityId,
    ) -> Result<NetworkEntity, StorageError> {
        let deleted = NetworkEntity {
            network_id: network_id.to_owned(),
            id: id.clone(),
            ..Default::default()
        };
        let Some(existing) = self.load_basic_entity(network_id, id)? else {
            return Ok(deleted);
        };

        let delete_sql = format!(
            "DELETE FROM {ENTITIES_TABLE} WHERE pk = {}",
            self.dialect.placeholder(1),
        );
        self.tx
            .execute(&delete_sql, params![existing.pk])
            .map_err(db_err("error deleting entity"))?;

        // The edge rows cascade with the entity; the remainder of its
        // former component may now be partitioned.
        self.fix_graph(network_id, &existing.graph_id)?;
        Ok(deleted)
    }

    /// Loads the basic columns of one entity by business identity.
    pub(crate) fn load_basic_entity(
        &self,
        network_id: &str,
        id: &EntityId,
    ) -> Result<Option<NetworkEntity>, StorageError> {
        let filter = EntityLoadFilter {
            ids: vec![id.clone()],
            ..Default::default()
        };
        let mut entities =
            self.load_entity_rows(network_id, &filter, &EntityLoadCriteria::default())?;
        Ok(entities.pop())
    }

    /// Single `UPDATE` applying the changed fields. The version is bumped
    /// by exactly one regardless of how many fields changed, including
    /// pure edge mutations.
    fn update_entity_fields(
        &mut self,
        pk: &str,
        update: &EntityUpdateCriteria,
        new_physical_id: &Option<Option<String>>,
    ) -> Result<(), StorageError> {
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
        if let Some(physical_id) = new_physical_id {
            values.push(match physical_id {
                Some(p) => Value::Text(p.clone()),
                None => Value::Null,
            });
            sets.push(format!(
                "physical_id = {}",
                self.dialect.placeholder(values.len())
            ));
        }
        if let Some(config) = &update.new_config {
            values.push(Value::Blob(config.clone()));
            sets.push(format!(
                "config = {}",
                self.dialect.placeholder(values.len())
            ));
        }
        sets.push("version = version + 1".to_owned());
        values.push(Value::Text(pk.to_owned()));

        let update_sql = format!(
            "UPDATE {ENTITIES_TABLE} SET {} WHERE pk = {}",
            sets.join(", "),
            self.dialect.placeholder(values.len()),
        );
        self.tx
            .execute(&update_sql, params_from_iter(values.iter()))
            .map_err(db_err("error updating entity"))?;
        Ok(())
    }

    /// Inserts edges from `from_pk` to each target (skipping duplicates)
    /// and merges the connected graphs. Returns the surviving graph ID.
    fn write_edges(
        &mut self,
        network_id: &str,
        from_pk: &str,
        from_graph_id: &str,
        targets: &[EntityId],
    ) -> Result<String, StorageError> {
        let loaded = self.load_edge_targets(network_id, targets)?;

        let insert_sql = self.dialect.insert_or_ignore(
            ASSOCIATIONS_TABLE,
            &["from_pk", "to_pk"],
            &["from_pk", "to_pk"],
        );
        {
            let mut stmt = self
                .tx
                .prepare_cached(&insert_sql)
                .map_err(db_err("error inserting associations"))?;
            for (to_pk, _) in &loaded {
                stmt.execute(params![from_pk, to_pk])
                    .map_err(db_err("error inserting associations"))?;
            }
        }

        let mut graph_ids: Vec<String> = loaded.into_iter().map(|(_, gid)| gid).collect();
        graph_ids.push(from_graph_id.to_owned());
        self.merge_graphs(graph_ids)
    }

    /// Deletes the named outgoing edges, returning how many rows actually
    /// existed.
    fn delete_edges(
        &mut self,
        network_id: &str,
        from_pk: &str,
        targets: &[EntityId],
    ) -> Result<usize, StorageError> {
        let loaded = self.load_edge_targets(network_id, targets)?;

        let delete_sql = format!(
            "DELETE FROM {ASSOCIATIONS_TABLE} WHERE from_pk = {} AND to_pk = {}",
            self.dialect.placeholder(1),
            self.dialect.placeholder(2),
        );
        let mut stmt = self
            .tx
            .prepare_cached(&delete_sql)
            .map_err(db_err("error deleting associations"))?;
        let mut removed = 0;
        for (to_pk, _) in &loaded {
            removed += stmt
                .execute(params![from_pk, to_pk])
                .map_err(db_err("error deleting associations"))?;
        }
        Ok(removed)
    }

    /// Resolves edge targets to `(pk, graph_id)`, failing if any target
    /// does not exist.
    fn load_edge_targets(
        &self,
        network_id: &str,
        targets: &[EntityId],
    ) -> Result<Vec<(String, String)>, StorageError> {
        let mut loaded = Vec::with_capacity(targets.len());
        for target in targets {
            let entity = self
                .load_basic_entity(network_id, target)?
                .ok_or_else(|| StorageError::NotFound(format!("entity ({target})")))?;
            loaded.push((entity.pk, entity.graph_id));
        }
        Ok(loaded)
    }
}
