//! Graph consistency engine and whole-graph loads.
//!
//! Owns the invariant that all entities connected by any path share one
//! graph ID. Edge creation merges the touched components with a pure
//! label rewrite; edge removal re-derives connectivity with a union-find
//! pass and relabels any split-off components.

use std::collections::{BTreeSet, HashMap};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use tracing::debug;

use lattice_core::{connected_components, EntityId};

use crate::error::{db_err, StorageError};
use crate::load::AssocSide;
use crate::schema::ENTITIES_TABLE;
use crate::store::SqlGraphStore;
use crate::types::{
    normalize_assocs, EntityGraph, EntityLoadCriteria, EntityLoadFilter, GraphEdge, NetworkEntity,
};

impl SqlGraphStore<'_> {
    /// Collapses the given graph IDs into one. Every prior ID already
    /// denotes a full connected component, so this is a bulk label
    /// rewrite with no traversal: the lexicographically smallest ID
    /// survives and is returned.
    pub(crate) fn merge_graphs(&mut self, graph_ids: Vec<String>) -> Result<String, StorageError> {
        let distinct: BTreeSet<String> = graph_ids.into_iter().collect();
        let mut iter = distinct.into_iter();
        let survivor = iter
            .next()
            .ok_or_else(|| StorageError::InvalidArgument("no graph IDs to merge".to_owned()))?;

        let merge_sql = format!(
            "UPDATE {ENTITIES_TABLE} SET graph_id = {} WHERE graph_id = {}",
            self.dialect.placeholder(1),
            self.dialect.placeholder(2),
        );
        let mut stmt = self
            .tx
            .prepare_cached(&merge_sql)
            .map_err(db_err("error merging entity graphs"))?;
        let mut merged = 0;
        for old in iter {
            stmt.execute(params![survivor, old])
                .map_err(db_err("error merging entity graphs"))?;
            merged += 1;
        }
        if merged > 0 {
            debug!(%survivor, merged, "merged entity graphs");
        }
        Ok(survivor)
    }

    /// Re-derives the connectivity of the component labeled `graph_id`
    /// after edges were removed. If it fractured, the largest fragment
    /// (lexicographically first on a size tie) keeps the label and every
    /// other fragment is relabeled with a freshly generated ID.
    pub(crate) fn fix_graph(
        &mut self,
        network_id: &str,
        graph_id: &str,
    ) -> Result<(), StorageError> {
        let (members, edges) = self.load_graph_rows(network_id, graph_id, &Default::default())?;
        if members.len() <= 1 {
            return Ok(());
        }

        let pks: Vec<String> = members.iter().map(|e| e.pk.clone()).collect();
        let components = connected_components(&pks, &edges);
        if components.len() <= 1 {
            return Ok(());
        }

        let max_len = components.last().map(Vec::len).unwrap_or(0);
        let keep = components
            .iter()
            .position(|c| c.len() == max_len)
            .expect("components is non-empty");

        for (i, component) in components.iter().enumerate() {
            if i == keep {
                continue;
            }
            let new_id = self.id_gen.generate();
            let relabel_sql = format!(
                "UPDATE {ENTITIES_TABLE} SET graph_id = {} WHERE pk IN ({})",
                self.dialect.placeholder(1),
                self.dialect.placeholders(2, component.len()),
            );
            let mut values: Vec<Value> = vec![Value::Text(new_id.clone())];
            values.extend(component.iter().cloned().map(Value::Text));
            self.tx
                .execute(&relabel_sql, params_from_iter(values.iter()))
                .map_err(db_err("error relabeling split graph"))?;
            debug!(
                old = graph_id,
                new = %new_id,
                size = component.len(),
                "relabeled split-off graph component"
            );
        }
        Ok(())
    }

    pub(crate) fn do_load_graph_for_entity(
        &self,
        network_id: &str,
        id: &EntityId,
        criteria: EntityLoadCriteria,
    ) -> Result<EntityGraph, StorageError> {
        let entity = self
            .load_basic_entity(network_id, id)?
            .ok_or_else(|| StorageError::NotFound(format!("entity ({id})")))?;

        // Member fields honor the caller's criteria; associations and
        // roots are derived from the full edge list below.
        let member_criteria = EntityLoadCriteria {
            load_metadata: criteria.load_metadata,
            load_config: criteria.load_config,
            ..Default::default()
        };
        let (mut members, edge_rows) =
            self.load_graph_rows(network_id, &entity.graph_id, &member_criteria)?;

        let id_by_pk: HashMap<String, EntityId> = members
            .iter()
            .map(|e| (e.pk.clone(), e.id.clone()))
            .collect();

        for member in members.iter_mut() {
            for (from, to) in &edge_rows {
                if *from == member.pk {
                    if let Some(to_id) = id_by_pk.get(to) {
                        member.associations.push(to_id.clone());
                    }
                }
                if *to == member.pk {
                    if let Some(from_id) = id_by_pk.get(from) {
                        member.parent_associations.push(from_id.clone());
                    }
                }
            }
            normalize_assocs(&mut member.associations);
            normalize_assocs(&mut member.parent_associations);
        }
        members.sort_by(|a, b| a.id.cmp(&b.id));

        let root_entities: Vec<EntityId> = members
            .iter()
            .filter(|e| e.parent_associations.is_empty())
            .map(|e| e.id.clone())
            .collect();
        if root_entities.is_empty() {
            // A closed cycle has no entry point.
            return Err(StorageError::NoRootEntities {
                graph_id: entity.graph_id,
            });
        }

        let mut edges: Vec<GraphEdge> = edge_rows
            .iter()
            .filter_map(|(from, to)| {
                Some(GraphEdge {
                    from: id_by_pk.get(from)?.clone(),
                    to: id_by_pk.get(to)?.clone(),
                })
            })
            .collect();
        edges.sort();
        edges.dedup();

        Ok(EntityGraph {
            entities: members,
            root_entities,
            edges,
        })
    }

    /// Loads every entity carrying `graph_id` and every association row
    /// touching those entities.
    fn load_graph_rows(
        &self,
        network_id: &str,
        graph_id: &str,
        criteria: &EntityLoadCriteria,
    ) -> Result<(Vec<NetworkEntity>, Vec<(String, String)>), StorageError> {
        let filter = EntityLoadFilter {
            graph_id: Some(graph_id.to_owned()),
            ..Default::default()
        };
        let members = self.load_entity_rows(network_id, &filter, criteria)?;
        if members.is_empty() {
            return Ok((members, Vec::new()));
        }
        let pks: Vec<String> = members.iter().map(|e| e.pk.clone()).collect();
        let edges = self.load_assoc_rows(&pks, AssocSide::Either)?;
        Ok((members, edges))
    }
}
