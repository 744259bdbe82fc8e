//! Target store abstraction.
//!
//! The orchestrator never talks to a concrete database; it goes through
//! [`TargetConnection`], resolved per `(organization, vault)` by an injected
//! [`ConnectionResolver`]. The shipped implementations live in tests and the
//! CLI; production callers plug in their own driver.

use std::sync::Arc;

use serde_json::{Map, Value};

use docload_model::Result;

/// Result of one unordered bulk insert.
#[derive(Debug, Default)]
pub struct BulkInsertOutcome {
    pub inserted: usize,
    /// `(index into the submitted batch, store message)` per rejected
    /// document.
    pub failures: Vec<(usize, String)>,
}

/// A live connection to one target vault.
pub trait TargetConnection: Send + Sync {
    /// Cheap liveness probe; used before reusing a cached connection.
    fn ping(&self) -> Result<()>;

    fn collection_exists(&self, database: &str, collection: &str) -> Result<bool>;

    /// Create the collection if missing; a no-op when it already exists.
    fn ensure_collection(&self, database: &str, collection: &str) -> Result<()>;

    /// Unordered insert: documents after a failed one are still attempted.
    fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: &[Map<String, Value>],
    ) -> Result<BulkInsertOutcome>;

    /// Remove every document stamped with the given import id. Returns the
    /// deleted count.
    fn delete_by_import_id(
        &self,
        database: &str,
        collection: &str,
        import_id: &str,
    ) -> Result<u64>;
}

/// Resolves a vault reference to a live connection.
///
/// Implementations return [`docload_model::ImportError::ConnectionNotFound`]
/// when the vault does not exist or the organization may not use it, and
/// [`docload_model::ImportError::Connection`] for reachability failures.
pub trait ConnectionResolver: Send + Sync {
    fn resolve(&self, organization_id: &str, vault_id: &str) -> Result<Arc<dyn TargetConnection>>;
}
