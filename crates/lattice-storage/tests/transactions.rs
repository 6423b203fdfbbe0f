//! Transaction-scoped handle semantics: commit, rollback, and options.

mod common;

use common::{create_network, entity, new_factory};
use lattice_storage::{
    EntityLoadCriteria, EntityLoadFilter, GraphStore, IsolationLevel, SqlStoreFactory, TxOptions,
};

fn entity_count(factory: &mut SqlStoreFactory, network: &str) -> usize {
    let store = factory.start_transaction(TxOptions::default()).unwrap();
    let result = store
        .load_entities(
            network,
            EntityLoadFilter::default(),
            EntityLoadCriteria::default(),
        )
        .unwrap();
    result.entities.len()
}

#[test]
fn committed_writes_are_visible_to_later_transactions() {
    let mut factory = new_factory();
    let mut store = factory.start_transaction(TxOptions::default()).unwrap();
    create_network(&mut store, "n1");
    store.create_entity("n1", entity("foo", "bar")).unwrap();
    store.commit().unwrap();

    assert_eq!(entity_count(&mut factory, "n1"), 1);
}

#[test]
fn rollback_discards_every_write_in_the_transaction() {
    let mut factory = new_factory();
    let mut store = factory.start_transaction(TxOptions::default()).unwrap();
    create_network(&mut store, "n1");
    store.commit().unwrap();

    let mut store = factory.start_transaction(TxOptions::default()).unwrap();
    store.create_entity("n1", entity("foo", "bar")).unwrap();
    store.rollback().unwrap();

    assert_eq!(entity_count(&mut factory, "n1"), 0);
}

#[test]
fn dropping_a_handle_rolls_back() {
    let mut factory = new_factory();
    let mut store = factory.start_transaction(TxOptions::default()).unwrap();
    create_network(&mut store, "n1");
    store.commit().unwrap();

    {
        let mut store = factory.start_transaction(TxOptions::default()).unwrap();
        store.create_entity("n1", entity("foo", "bar")).unwrap();
        // Dropped without commit.
    }

    assert_eq!(entity_count(&mut factory, "n1"), 0);
}

#[test]
fn file_backed_database_persists_across_factories() {
    let path = std::env::temp_dir().join(format!("lattice_test_{}.db", uuid::Uuid::new_v4()));
    let path_str = path.to_str().unwrap().to_owned();

    {
        let mut factory = SqlStoreFactory::open(&path_str).unwrap();
        factory.initialize_storage().unwrap();
        let mut store = factory.start_transaction(TxOptions::default()).unwrap();
        create_network(&mut store, "n1");
        store.create_entity("n1", entity("foo", "bar")).unwrap();
        store.commit().unwrap();
    }

    let mut factory = SqlStoreFactory::open(&path_str).unwrap();
    assert_eq!(entity_count(&mut factory, "n1"), 1);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn transaction_options_are_accepted() {
    let mut factory = new_factory();
    for options in [
        TxOptions::default(),
        TxOptions {
            isolation: Some(IsolationLevel::Serializable),
            read_only: false,
        },
        TxOptions {
            isolation: Some(IsolationLevel::ReadCommitted),
            read_only: true,
        },
    ] {
        let store = factory.start_transaction(options).unwrap();
        store.commit().unwrap();
    }
}
