mod repository;

pub use repository::*;

/// SQL migration for the initial schema
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for refuel-path indexes and the idempotency constraint
pub const MIGRATION_002_REFUEL_INDEXES: &str = include_str!("migrations/002_refuel_indexes.sql");
