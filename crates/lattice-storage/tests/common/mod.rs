//! Shared fixtures for the storage integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::Connection;

use lattice_core::{connected_components, EntityId};
use lattice_storage::idgen::IdGenerator;
use lattice_storage::{
    Dialect, EntityLoadCriteria, EntityLoadFilter, GraphStore, Network, NetworkEntity,
    SqlGraphStore, SqlStoreFactory,
};

/// Deterministic generator: "1", "2", "3", ...
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        SequentialIdGenerator {
            counter: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        self.counter.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

/// In-memory factory with sequential IDs and an initialized schema.
pub fn new_factory() -> SqlStoreFactory {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    let mut factory = SqlStoreFactory::new(
        conn,
        Dialect::Sqlite,
        Box::new(SequentialIdGenerator::new()),
    )
    .expect("create factory");
    factory.initialize_storage().expect("initialize storage");
    factory
}

pub fn create_network(store: &mut SqlGraphStore<'_>, id: &str) {
    store
        .create_network(Network {
            id: id.to_owned(),
            ..Default::default()
        })
        .expect("create network");
}

pub fn entity(ty: &str, key: &str) -> NetworkEntity {
    NetworkEntity {
        id: EntityId::new(ty, key),
        ..Default::default()
    }
}

pub fn load_all(store: &SqlGraphStore<'_>, network_id: &str) -> Vec<NetworkEntity> {
    store
        .load_entities(
            network_id,
            EntityLoadFilter::default(),
            EntityLoadCriteria {
                load_assocs_from: true,
                ..Default::default()
            },
        )
        .expect("load all entities")
        .entities
}

pub fn graph_id_of(store: &SqlGraphStore<'_>, network_id: &str, ty: &str, key: &str) -> String {
    let result = store
        .load_entities(
            network_id,
            EntityLoadFilter {
                ids: vec![EntityId::new(ty, key)],
                ..Default::default()
            },
            EntityLoadCriteria::default(),
        )
        .expect("load entity");
    result
        .entities
        .first()
        .unwrap_or_else(|| panic!("entity {ty}-{key} not found"))
        .graph_id
        .clone()
}

/// Asserts invariants 3 and 4: graph-ID equality exactly partitions the
/// network's entities into edge-connected components.
pub fn assert_graph_consistent(store: &SqlGraphStore<'_>, network_id: &str) {
    let entities = load_all(store, network_id);
    let pks: Vec<String> = entities.iter().map(|e| e.pk.clone()).collect();
    let pk_by_id: HashMap<&EntityId, &str> =
        entities.iter().map(|e| (&e.id, e.pk.as_str())).collect();
    let gid_by_pk: HashMap<&str, &str> = entities
        .iter()
        .map(|e| (e.pk.as_str(), e.graph_id.as_str()))
        .collect();

    let mut edges = Vec::new();
    for e in &entities {
        for assoc in &e.associations {
            edges.push((e.pk.clone(), pk_by_id[assoc].to_owned()));
        }
    }

    let mut seen_gids: HashSet<&str> = HashSet::new();
    for component in connected_components(&pks, &edges) {
        let gids: HashSet<&str> = component.iter().map(|pk| gid_by_pk[pk.as_str()]).collect();
        assert_eq!(
            gids.len(),
            1,
            "component {component:?} carries mixed graph ids {gids:?}"
        );
        let gid = gids.into_iter().next().unwrap();
        assert!(
            seen_gids.insert(gid),
            "graph id {gid} is shared across disconnected components"
        );
    }
}
