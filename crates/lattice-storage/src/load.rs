//! Entity load engine.
//!
//! Builds filtered, optionally paginated queries over the entities table
//! and reassembles rows into [`NetworkEntity`] values. Associations are
//! loaded with one query per requested direction, scoped to the primary
//! keys of the already-loaded entities so no per-entity queries are
//! issued.

use std::collections::{HashMap, HashSet};

use rusqlite::types::Value;
use rusqlite::params_from_iter;

use lattice_core::EntityId;

use crate::error::{db_err, StorageError};
use crate::schema::{ASSOCIATIONS_TABLE, ENTITIES_TABLE, KEY_COL};
use crate::store::SqlGraphStore;
use crate::types::{
    decode_page_token, encode_page_token, normalize_assocs, EntityLoadCriteria, EntityLoadFilter,
    EntityLoadResult, NetworkEntity, DEFAULT_ENTITY_LOAD_PAGE_SIZE, MAX_ENTITY_LOAD_PAGE_SIZE,
};

/// Which side of the associations table a load is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssocSide {
    From,
    To,
    Either,
}

impl SqlGraphStore<'_> {
    pub(crate) fn do_load_entities(
        &self,
        network_id: &str,
        filter: EntityLoadFilter,
        criteria: EntityLoadCriteria,
    ) -> Result<EntityLoadResult, StorageError> {
        let paginated = is_pageable(&filter);
        if !criteria.page_token.is_empty() && !paginated {
            return Err(StorageError::InvalidArgument(
                "pagination requires a type filter".to_owned(),
            ));
        }
        let page_size = effective_page_size(criteria.page_size);
        let mut entities = self.load_entity_rows(network_id, &filter, &criteria)?;

        if !paginated {
            entities.sort_by(|a, b| a.id.cmp(&b.id));
        }

        let next_page_token = if paginated && entities.len() == page_size as usize {
            let last = entities.last().expect("page is non-empty");
            encode_page_token(&last.id.key)?
        } else {
            String::new()
        };

        self.fill_associations(&mut entities, &filter, &criteria)?;

        let entities_not_found = missing_requested_ids(&filter, &entities);
        Ok(EntityLoadResult {
            entities,
            entities_not_found,
            next_page_token,
        })
    }

    pub(crate) fn do_count_entities(
        &self,
        network_id: &str,
        filter: EntityLoadFilter,
    ) -> Result<u64, StorageError> {
        let mut values: Vec<Value> = Vec::new();
        let clause = self.entity_filter_clause(network_id, &filter, &mut values);
        let sql = format!("SELECT COUNT(1) FROM {ENTITIES_TABLE} AS ent{clause}");
        let count: i64 = self
            .tx
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))
            .map_err(db_err("error counting entities"))?;
        Ok(count as u64)
    }

    /// Runs the entity query for `filter` and assembles the rows, without
    /// association loading or explicit-ID bookkeeping.
    pub(crate) fn load_entity_rows(
        &self,
        network_id: &str,
        filter: &EntityLoadFilter,
        criteria: &EntityLoadCriteria,
    ) -> Result<Vec<NetworkEntity>, StorageError> {
        let mut columns = vec![
            "ent.network_id".to_owned(),
            "ent.pk".to_owned(),
            format!("ent.{KEY_COL}"),
            "ent.type".to_owned(),
            "ent.physical_id".to_owned(),
            "ent.version".to_owned(),
            "ent.graph_id".to_owned(),
        ];
        if criteria.load_metadata {
            columns.push("ent.name".to_owned());
            columns.push("ent.description".to_owned());
        }
        if criteria.load_config {
            columns.push("ent.config".to_owned());
        }

        let mut values: Vec<Value> = Vec::new();
        let mut clause = self.entity_filter_clause(network_id, filter, &mut values);
        if is_pageable(filter) {
            // Type-scoped loads are pageable: key-ascending order with an
            // exclusive lower bound from the previous page's token.
            if !criteria.page_token.is_empty() {
                let token = decode_page_token(&criteria.page_token)?;
                values.push(Value::Text(token.last_included_entity));
                clause.push_str(&format!(
                    " AND ent.{KEY_COL} > {}",
                    self.dialect.placeholder(values.len())
                ));
            }
            clause.push_str(&format!(
                " ORDER BY ent.{KEY_COL} LIMIT {}",
                effective_page_size(criteria.page_size)
            ));
        }

        let sql = format!(
            "SELECT {} FROM {ENTITIES_TABLE} AS ent{clause}",
            columns.join(", "),
        );
        let mut stmt = self
            .tx
            .prepare_cached(&sql)
            .map_err(db_err("error querying for entities"))?;
        let mut rows = stmt
            .query(params_from_iter(values.iter()))
            .map_err(db_err("error querying for entities"))?;

        let mut entities = Vec::new();
        while let Some(row) = rows.next().map_err(db_err("error querying for entities"))? {
            let network_id: String = row.get(0).map_err(db_err("error scanning entity row"))?;
            let pk: String = row.get(1).map_err(db_err("error scanning entity row"))?;
            let key: String = row.get(2).map_err(db_err("error scanning entity row"))?;
            let ty: String = row.get(3).map_err(db_err("error scanning entity row"))?;
            let physical_id: Option<String> =
                row.get(4).map_err(db_err("error scanning entity row"))?;
            let version: i64 = row.get(5).map_err(db_err("error scanning entity row"))?;
            let graph_id: String = row.get(6).map_err(db_err("error scanning entity row"))?;

            let mut idx = 7;
            let (name, description) = if criteria.load_metadata {
                let name: Option<String> =
                    row.get(idx).map_err(db_err("error scanning entity row"))?;
                let description: Option<String> =
                    row.get(idx + 1).map_err(db_err("error scanning entity row"))?;
                idx += 2;
                (name.unwrap_or_default(), description.unwrap_or_default())
            } else {
                (String::new(), String::new())
            };
            let config: Option<Vec<u8>> = if criteria.load_config {
                row.get(idx).map_err(db_err("error scanning entity row"))?
            } else {
                None
            };

            entities.push(NetworkEntity {
                network_id,
                id: EntityId::new(ty, key),
                pk,
                physical_id,
                name,
                description,
                config,
                graph_id,
                version: version as u64,
                associations: Vec::new(),
                parent_associations: Vec::new(),
            });
        }
        Ok(entities)
    }

    /// Builds the WHERE clause for an entity filter, appending bind values
    /// to `values`. Physical-ID lookups are network-agnostic; every other
    /// mode is scoped to `network_id`.
    fn entity_filter_clause(
        &self,
        network_id: &str,
        filter: &EntityLoadFilter,
        values: &mut Vec<Value>,
    ) -> String {
        let mut push = |values: &mut Vec<Value>, v: Value| {
            values.push(v);
            self.dialect.placeholder(values.len())
        };

        if let Some(physical_id) = &filter.physical_id {
            let ph = push(values, Value::Text(physical_id.clone()));
            return format!(" WHERE ent.physical_id = {ph}");
        }

        let network_ph = push(values, Value::Text(network_id.to_owned()));
        let mut clause = format!(" WHERE ent.network_id = {network_ph}");

        if !filter.ids.is_empty() {
            let groups: Vec<String> = filter
                .ids
                .iter()
                .map(|id| {
                    let key_ph = push(values, Value::Text(id.key.clone()));
                    let ty_ph = push(values, Value::Text(id.ty.clone()));
                    format!("(ent.{KEY_COL} = {key_ph} AND ent.type = {ty_ph})")
                })
                .collect();
            clause.push_str(&format!(" AND ({})", groups.join(" OR ")));
        } else if let Some(graph_id) = &filter.graph_id {
            let ph = push(values, Value::Text(graph_id.clone()));
            clause.push_str(&format!(" AND ent.graph_id = {ph}"));
        } else {
            if let Some(ty) = &filter.type_filter {
                let ph = push(values, Value::Text(ty.clone()));
                clause.push_str(&format!(" AND ent.type = {ph}"));
            }
            if let Some(key) = &filter.key_filter {
                let ph = push(values, Value::Text(key.clone()));
                clause.push_str(&format!(" AND ent.{KEY_COL} = {ph}"));
            }
        }
        clause
    }

    /// Loads association rows touching `pks` on the given side. An empty
    /// `pks` slice loads the entire associations table (whole-network
    /// loads).
    pub(crate) fn load_assoc_rows(
        &self,
        pks: &[String],
        side: AssocSide,
    ) -> Result<Vec<(String, String)>, StorageError> {
        let mut sql = format!(
            "SELECT assoc.from_pk, assoc.to_pk FROM {ASSOCIATIONS_TABLE} AS assoc"
        );
        let mut values: Vec<Value> = Vec::new();
        if !pks.is_empty() {
            let placeholders = self.dialect.placeholders(1, pks.len());
            let clause = match side {
                AssocSide::From => format!(" WHERE assoc.from_pk IN ({placeholders})"),
                AssocSide::To => format!(" WHERE assoc.to_pk IN ({placeholders})"),
                AssocSide::Either => {
                    // The pk list binds twice, once per side.
                    let second = self.dialect.placeholders(pks.len() + 1, pks.len());
                    values.extend(pks.iter().cloned().map(Value::Text));
                    format!(
                        " WHERE assoc.from_pk IN ({placeholders}) OR assoc.to_pk IN ({second})"
                    )
                }
            };
            values.extend(pks.iter().cloned().map(Value::Text));
            sql.push_str(&clause);
        }

        let mut stmt = self
            .tx
            .prepare_cached(&sql)
            .map_err(db_err("error querying for associations"))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(db_err("error querying for associations"))?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row.map_err(db_err("error scanning association row"))?);
        }
        Ok(edges)
    }

    /// Resolves primary keys to entity IDs with a single lookup query.
    pub(crate) fn resolve_entity_ids(
        &self,
        pks: &[String],
    ) -> Result<HashMap<String, EntityId>, StorageError> {
        if pks.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT pk, type, {KEY_COL} FROM {ENTITIES_TABLE} WHERE pk IN ({})",
            self.dialect.placeholders(1, pks.len()),
        );
        let values: Vec<Value> = pks.iter().cloned().map(Value::Text).collect();
        let mut stmt = self
            .tx
            .prepare_cached(&sql)
            .map_err(db_err("error resolving entity IDs"))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let pk: String = row.get(0)?;
                let ty: String = row.get(1)?;
                let key: String = row.get(2)?;
                Ok((pk, EntityId::new(ty, key)))
            })
            .map_err(db_err("error resolving entity IDs"))?;

        let mut map = HashMap::new();
        for row in rows {
            let (pk, id) = row.map_err(db_err("error resolving entity IDs"))?;
            map.insert(pk, id);
        }
        Ok(map)
    }

    /// Populates the requested association direction(s) on the loaded
    /// entities, one query per direction.
    fn fill_associations(
        &self,
        entities: &mut [NetworkEntity],
        filter: &EntityLoadFilter,
        criteria: &EntityLoadCriteria,
    ) -> Result<(), StorageError> {
        if entities.is_empty() || (!criteria.load_assocs_from && !criteria.load_assocs_to) {
            return Ok(());
        }

        // Whole-network loads scope the association query to the entire
        // table rather than a pk list.
        let scope: Vec<String> = if filter.is_load_all() {
            Vec::new()
        } else {
            entities.iter().map(|e| e.pk.clone()).collect()
        };

        let mut outgoing = Vec::new();
        let mut incoming = Vec::new();
        if criteria.load_assocs_from {
            outgoing = self.load_assoc_rows(&scope, AssocSide::From)?;
        }
        if criteria.load_assocs_to {
            incoming = self.load_assoc_rows(&scope, AssocSide::To)?;
        }

        // Resolve pks referenced by edges but absent from this load.
        let mut id_by_pk: HashMap<String, EntityId> = entities
            .iter()
            .map(|e| (e.pk.clone(), e.id.clone()))
            .collect();
        let unresolved: Vec<String> = outgoing
            .iter()
            .chain(incoming.iter())
            .flat_map(|(from, to)| [from, to])
            .filter(|pk| !id_by_pk.contains_key(*pk))
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        id_by_pk.extend(self.resolve_entity_ids(&unresolved)?);

        for entity in entities.iter_mut() {
            for (from, to) in &outgoing {
                if *from == entity.pk {
                    if let Some(id) = id_by_pk.get(to) {
                        entity.associations.push(id.clone());
                    }
                }
            }
            for (from, to) in &incoming {
                if *to == entity.pk {
                    if let Some(id) = id_by_pk.get(from) {
                        entity.parent_associations.push(id.clone());
                    }
                }
            }
            normalize_assocs(&mut entity.associations);
            normalize_assocs(&mut entity.parent_associations);
        }
        Ok(())
    }
}

/// Pagination is type-scoped only: it applies exactly when the filter is
/// a pure type (or type + key) predicate.
fn is_pageable(filter: &EntityLoadFilter) -> bool {
    filter.type_filter.is_some()
        && filter.ids.is_empty()
        && filter.graph_id.is_none()
        && filter.physical_id.is_none()
}

fn effective_page_size(requested: u32) -> u32 {
    if requested == 0 {
        DEFAULT_ENTITY_LOAD_PAGE_SIZE
    } else {
        requested.min(MAX_ENTITY_LOAD_PAGE_SIZE)
    }
}

/// Requested IDs that the query did not return, in request order.
fn missing_requested_ids(
    filter: &EntityLoadFilter,
    entities: &[NetworkEntity],
) -> Vec<EntityId> {
    if filter.ids.is_empty() {
        return Vec::new();
    }
    let loaded: HashSet<&EntityId> = entities.iter().map(|e| &e.id).collect();
    let mut seen: HashSet<&EntityId> = HashSet::new();
    filter
        .ids
        .iter()
        .filter(|id| !loaded.contains(*id) && seen.insert(*id))
        .cloned()
        .collect()
}
