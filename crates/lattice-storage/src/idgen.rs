//! Generation of opaque unique identifiers.
//!
//! The engine needs globally unique strings for entity primary keys and
//! graph IDs. The generator is injected into the storage factory so tests
//! can substitute a deterministic sequence.

use uuid::Uuid;

/// Produces globally unique opaque string identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Production generator backed by random v4 UUIDs.
#[derive(Debug, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
