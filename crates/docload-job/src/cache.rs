//! Shared connection cache.
//!
//! Connections are created lazily per `(organization, vault)` key, pinged
//! before reuse and rebuilt through the resolver when the ping fails. The
//! cache is the only state executing jobs share.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use docload_model::Result;

use crate::target::{ConnectionResolver, TargetConnection};

pub struct ConnectionCache {
    resolver: Arc<dyn ConnectionResolver>,
    connections: Mutex<HashMap<(String, String), Arc<dyn TargetConnection>>>,
}

impl ConnectionCache {
    pub fn new(resolver: Arc<dyn ConnectionResolver>) -> Self {
        Self {
            resolver,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a live connection, reusing a cached one when it still answers.
    pub fn get(&self, organization_id: &str, vault_id: &str) -> Result<Arc<dyn TargetConnection>> {
        let key = (organization_id.to_string(), vault_id.to_string());
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = connections.get(&key) {
            match existing.ping() {
                Ok(()) => return Ok(Arc::clone(existing)),
                Err(error) => {
                    warn!(vault = vault_id, %error, "cached connection dead, rebuilding");
                    connections.remove(&key);
                }
            }
        }

        let fresh = self.resolver.resolve(organization_id, vault_id)?;
        debug!(vault = vault_id, "target connection established");
        connections.insert(key, Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Drop a cached connection, forcing the next `get` to resolve anew.
    pub fn evict(&self, organization_id: &str, vault_id: &str) {
        let key = (organization_id.to_string(), vault_id.to_string());
        self.connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
    }
}
