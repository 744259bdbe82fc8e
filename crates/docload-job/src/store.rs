//! Job persistence.
//!
//! Two implementations ship: an in-memory map for tests and embedding, and a
//! directory of pretty-printed JSON files, one per job id. Both are safe to
//! share across threads; neither coordinates concurrent writers for the same
//! job.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use docload_model::{ImportError, ImportJob, Result};

pub trait JobStore: Send + Sync {
    fn insert(&self, job: &ImportJob) -> Result<()>;
    fn update(&self, job: &ImportJob) -> Result<()>;
    fn get(&self, import_id: &str) -> Result<ImportJob>;
    fn list(&self, organization_id: &str) -> Result<Vec<ImportJob>>;
    /// Returns whether a record existed.
    fn remove(&self, import_id: &str) -> Result<bool>;
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, ImportJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ImportJob>> {
        // A poisoned lock means a writer panicked mid-update; the map itself
        // is still whole jobs.
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: &ImportJob) -> Result<()> {
        self.lock().insert(job.import_id.clone(), job.clone());
        Ok(())
    }

    fn update(&self, job: &ImportJob) -> Result<()> {
        let mut jobs = self.lock();
        if !jobs.contains_key(&job.import_id) {
            return Err(ImportError::JobNotFound(job.import_id.clone()));
        }
        jobs.insert(job.import_id.clone(), job.clone());
        Ok(())
    }

    fn get(&self, import_id: &str) -> Result<ImportJob> {
        self.lock()
            .get(import_id)
            .cloned()
            .ok_or_else(|| ImportError::JobNotFound(import_id.to_string()))
    }

    fn list(&self, organization_id: &str) -> Result<Vec<ImportJob>> {
        let mut jobs: Vec<ImportJob> = self
            .lock()
            .values()
            .filter(|j| j.organization_id == organization_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    fn remove(&self, import_id: &str) -> Result<bool> {
        Ok(self.lock().remove(import_id).is_some())
    }
}

/// One pretty-printed JSON file per job id under a base directory.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    base_dir: PathBuf,
}

impl FileJobStore {
    /// The directory is created if it does not exist.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn job_path(&self, import_id: &str) -> PathBuf {
        let safe: String = import_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }

    fn write_job(&self, job: &ImportJob) -> Result<()> {
        let json = serde_json::to_string_pretty(job)
            .map_err(|e| ImportError::Store(format!("serialize job {}: {e}", job.import_id)))?;
        fs::write(self.job_path(&job.import_id), json)?;
        Ok(())
    }

    fn read_job(&self, path: &Path) -> Result<ImportJob> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| ImportError::Store(format!("parse job file {}: {e}", path.display())))
    }
}

impl JobStore for FileJobStore {
    fn insert(&self, job: &ImportJob) -> Result<()> {
        self.write_job(job)
    }

    fn update(&self, job: &ImportJob) -> Result<()> {
        if !self.job_path(&job.import_id).exists() {
            return Err(ImportError::JobNotFound(job.import_id.clone()));
        }
        self.write_job(job)
    }

    fn get(&self, import_id: &str) -> Result<ImportJob> {
        let path = self.job_path(import_id);
        if !path.exists() {
            return Err(ImportError::JobNotFound(import_id.to_string()));
        }
        self.read_job(&path)
    }

    fn list(&self, organization_id: &str) -> Result<Vec<ImportJob>> {
        let mut jobs = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            // Unreadable files are somebody else's data, not a listing error.
            if let Ok(job) = self.read_job(&path)
                && job.organization_id == organization_id
            {
                jobs.push(job);
            }
        }
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    fn remove(&self, import_id: &str) -> Result<bool> {
        let path = self.job_path(import_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }
}
