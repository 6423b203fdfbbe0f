//! Network CRUD and schema initialization.

mod common;

use std::collections::BTreeMap;

use common::{create_network, entity, new_factory};
use lattice_storage::{
    GraphStore, Network, NetworkLoadCriteria, NetworkLoadFilter, NetworkUpdateCriteria,
    StorageError, TxOptions, INTERNAL_NETWORK_ID,
};

fn configs(pairs: &[(&str, &[u8])]) -> BTreeMap<String, Vec<u8>> {
    pairs
        .iter()
        .map(|(t, v)| (t.to_string(), v.to_vec()))
        .collect()
}

#[test]
fn initialize_is_idempotent_and_seeds_internal_network() {
    let mut factory = new_factory();
    // A second initialization must not fail or duplicate anything.
    factory.initialize_storage().unwrap();

    let store = factory.start_transaction(TxOptions::default()).unwrap();
    let result = store
        .load_networks(
            NetworkLoadFilter {
                ids: vec![INTERNAL_NETWORK_ID.to_owned()],
            },
            NetworkLoadCriteria::default(),
        )
        .unwrap();
    assert_eq!(result.networks.len(), 1);
    assert!(result.network_ids_not_found.is_empty());
}

#[test]
fn create_and_load_networks() {
    let mut factory = new_factory();
    let mut store = factory.start_transaction(TxOptions::default()).unwrap();

    store
        .create_network(Network {
            id: "n1".to_owned(),
            ty: Some("lte".to_owned()),
            name: "Hello".to_owned(),
            description: "Hello network".to_owned(),
            configs: configs(&[("foo", b"foo"), ("baz", b"quz")]),
            ..Default::default()
        })
        .unwrap();
    store
        .create_network(Network {
            id: "n2".to_owned(),
            ..Default::default()
        })
        .unwrap();

    let result = store
        .load_networks(
            NetworkLoadFilter {
                ids: vec!["n1".to_owned(), "n2".to_owned(), "missing".to_owned()],
            },
            NetworkLoadCriteria {
                load_metadata: true,
                load_configs: true,
            },
        )
        .unwrap();

    assert_eq!(result.network_ids_not_found, vec!["missing".to_owned()]);
    assert_eq!(result.networks.len(), 2);
    let n1 = &result.networks[0];
    assert_eq!(n1.id, "n1");
    assert_eq!(n1.ty.as_deref(), Some("lte"));
    assert_eq!(n1.name, "Hello");
    assert_eq!(n1.description, "Hello network");
    assert_eq!(n1.configs, configs(&[("foo", b"foo"), ("baz", b"quz")]));
    assert_eq!(n1.version, 0);
    assert!(result.networks[1].configs.is_empty());
}

#[test]
fn creating_a_duplicate_network_is_a_conflict() {
    let mut factory = new_factory();
    let mut store = factory.start_transaction(TxOptions::default()).unwrap();
    create_network(&mut store, "n1");

    let result = store.create_network(Network {
        id: "n1".to_owned(),
        ..Default::default()
    });
    assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
}

#[test]
fn update_networks_applies_fields_and_configs() {
    let mut factory = new_factory();
    let mut store = factory.start_transaction(TxOptions::default()).unwrap();
    store
        .create_network(Network {
            id: "n1".to_owned(),
            name: "old".to_owned(),
            configs: configs(&[("hello", b"x"), ("keep", b"y")]),
            ..Default::default()
        })
        .unwrap();

    store
        .update_networks(vec![NetworkUpdateCriteria {
            id: "n1".to_owned(),
            new_name: Some("renamed".to_owned()),
            configs_to_add_or_update: configs(&[("hello", b"updated"), ("added", b"z")]),
            configs_to_delete: vec!["keep".to_owned()],
            ..Default::default()
        }])
        .unwrap();

    let result = store
        .load_networks(
            NetworkLoadFilter {
                ids: vec!["n1".to_owned()],
            },
            NetworkLoadCriteria {
                load_metadata: true,
                load_configs: true,
            },
        )
        .unwrap();
    let n1 = &result.networks[0];
    assert_eq!(n1.name, "renamed");
    assert_eq!(n1.version, 1);
    assert_eq!(
        n1.configs,
        configs(&[("hello", b"updated"), ("added", b"z")])
    );
}

#[test]
fn multiple_updates_for_one_network_are_rejected() {
    let mut factory = new_factory();
    let mut store = factory.start_transaction(TxOptions::default()).unwrap();
    create_network(&mut store, "n1");

    let result = store.update_networks(vec![
        NetworkUpdateCriteria {
            id: "n1".to_owned(),
            delete_network: true,
            ..Default::default()
        },
        NetworkUpdateCriteria {
            id: "n1".to_owned(),
            new_name: Some("renamed".to_owned()),
            ..Default::default()
        },
    ]);
    assert!(matches!(result, Err(StorageError::InvalidArgument(_))));
}

#[test]
fn deleting_a_network_removes_it_and_its_configs() {
    let mut factory = new_factory();
    let mut store = factory.start_transaction(TxOptions::default()).unwrap();
    store
        .create_network(Network {
            id: "n1".to_owned(),
            configs: configs(&[("foo", b"bar")]),
            ..Default::default()
        })
        .unwrap();

    store
        .update_networks(vec![NetworkUpdateCriteria {
            id: "n1".to_owned(),
            delete_network: true,
            ..Default::default()
        }])
        .unwrap();

    let result = store
        .load_networks(
            NetworkLoadFilter {
                ids: vec!["n1".to_owned()],
            },
            NetworkLoadCriteria::default(),
        )
        .unwrap();
    assert!(result.networks.is_empty());
    assert_eq!(result.network_ids_not_found, vec!["n1".to_owned()]);
}

#[test]
fn deleting_a_network_with_live_entities_fails() {
    let mut factory = new_factory();
    let mut store = factory.start_transaction(TxOptions::default()).unwrap();
    create_network(&mut store, "n1");
    store.create_entity("n1", entity("foo", "bar")).unwrap();

    // Entities do not cascade with their network; the foreign key holds
    // the delete back until the caller cleans them up.
    let result = store.update_networks(vec![NetworkUpdateCriteria {
        id: "n1".to_owned(),
        delete_network: true,
        ..Default::default()
    }]);
    assert!(matches!(result, Err(StorageError::Database { .. })));
}
