//! Filesystem-backed target store.
//!
//! Collections are JSON-lines files laid out as
//! `<root>/<vault>/<database>/<collection>.jsonl`. Good enough for local dry
//! runs and integration tests; real deployments plug a database driver into
//! the same traits.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use docload_job::{BulkInsertOutcome, ConnectionResolver, IMPORT_ID_FIELD, TargetConnection};
use docload_model::{ImportError, Result};

pub struct FsTarget {
    vault_dir: PathBuf,
}

impl FsTarget {
    pub fn new(vault_dir: impl Into<PathBuf>) -> Self {
        Self {
            vault_dir: vault_dir.into(),
        }
    }

    fn collection_path(&self, database: &str, collection: &str) -> PathBuf {
        self.vault_dir.join(database).join(format!("{collection}.jsonl"))
    }

    fn read_documents(path: &Path) -> Result<Vec<Map<String, Value>>> {
        let contents = fs::read_to_string(path)?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    ImportError::Connection(format!("corrupt document in {}: {e}", path.display()))
                })
            })
            .collect()
    }
}

impl TargetConnection for FsTarget {
    fn ping(&self) -> Result<()> {
        if self.vault_dir.is_dir() {
            Ok(())
        } else {
            Err(ImportError::Connection(format!(
                "vault directory missing: {}",
                self.vault_dir.display()
            )))
        }
    }

    fn collection_exists(&self, database: &str, collection: &str) -> Result<bool> {
        Ok(self.collection_path(database, collection).is_file())
    }

    fn ensure_collection(&self, database: &str, collection: &str) -> Result<()> {
        let path = self.collection_path(database, collection);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            fs::File::create(&path)?;
        }
        Ok(())
    }

    fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: &[Map<String, Value>],
    ) -> Result<BulkInsertOutcome> {
        let path = self.collection_path(database, collection);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut outcome = BulkInsertOutcome::default();
        for (index, document) in documents.iter().enumerate() {
            match serde_json::to_string(document) {
                Ok(line) => {
                    writeln!(file, "{line}")?;
                    outcome.inserted += 1;
                }
                Err(error) => outcome.failures.push((index, error.to_string())),
            }
        }
        Ok(outcome)
    }

    fn delete_by_import_id(
        &self,
        database: &str,
        collection: &str,
        import_id: &str,
    ) -> Result<u64> {
        let path = self.collection_path(database, collection);
        if !path.is_file() {
            return Ok(0);
        }
        let documents = Self::read_documents(&path)?;
        let kept: Vec<&Map<String, Value>> = documents
            .iter()
            .filter(|doc| doc.get(IMPORT_ID_FIELD).and_then(Value::as_str) != Some(import_id))
            .collect();
        let deleted = (documents.len() - kept.len()) as u64;
        if deleted > 0 {
            let mut contents = String::new();
            for doc in &kept {
                contents.push_str(&serde_json::to_string(doc).map_err(|e| {
                    ImportError::Connection(format!("reserialize {}: {e}", path.display()))
                })?);
                contents.push('\n');
            }
            fs::write(&path, contents)?;
        }
        Ok(deleted)
    }
}

/// Resolves vault ids to subdirectories of one local root.
pub struct FsResolver {
    root: PathBuf,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ConnectionResolver for FsResolver {
    fn resolve(&self, _organization_id: &str, vault_id: &str) -> Result<Arc<dyn TargetConnection>> {
        if !self.root.is_dir() {
            return Err(ImportError::ConnectionNotFound(format!(
                "target root does not exist: {}",
                self.root.display()
            )));
        }
        let vault_dir = self.root.join(vault_id);
        fs::create_dir_all(&vault_dir)?;
        Ok(Arc::new(FsTarget::new(vault_dir)))
    }
}
