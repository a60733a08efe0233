//! Persistent job storage using redb.
//!
//! # Table design
//!
//! ```text
//! JOBS  u64 id      → JSON-encoded Job
//! META  "next_id"   → u64
//! ```
//!
//! Ids are big-endian `u64` keys, so a table scan returns jobs in id order
//! and "lowest-id ToDo" is the first match of a forward scan. The id
//! counter lives in `META` and only ever grows, so a deleted id is never
//! handed out again. Every mutation is its own write transaction.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use serde::Serialize;

use crate::error::{PnaError, Result};
use crate::recorder::InvocationRecord;
use crate::types::{JobStatus, Progress};

use super::job::Job;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const JOBS: TableDefinition<u64, &[u8]> = TableDefinition::new("jobs");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ID: &str = "next_id";

fn encode(job: &Job) -> Result<Vec<u8>> {
    serde_json::to_vec(job).map_err(PnaError::storage)
}

fn decode(bytes: &[u8]) -> Result<Job> {
    serde_json::from_slice(bytes).map_err(PnaError::storage)
}

/// One page of a filtered listing.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    /// Matches before `offset`/`limit` were applied.
    pub total: usize,
}

// ---------------------------------------------------------------------------
// JobDb
// ---------------------------------------------------------------------------

pub struct JobDb {
    db: Database,
}

impl JobDb {
    /// Open or create the database at `path`, creating both tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(PnaError::storage)?;
        }
        let db = Database::create(path)
            .map_err(|e| PnaError::StorageUnavailable(format!("{}: {e}", path.display())))?;
        let wt = db.begin_write().map_err(PnaError::storage)?;
        wt.open_table(JOBS).map_err(PnaError::storage)?;
        wt.open_table(META).map_err(PnaError::storage)?;
        wt.commit().map_err(PnaError::storage)?;
        Ok(Self { db })
    }

    /// Append a blank `ToDo` job with the next id.
    pub fn create(&self) -> Result<Job> {
        let mut created = self.append(Job::placeholder, 1)?;
        created.pop().ok_or_else(|| PnaError::storage("job was not created"))
    }

    /// Append one job per record, in record order.
    pub fn import(&self, records: &[InvocationRecord]) -> Result<Vec<Job>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let mut it = records.iter();
        self.append(
            |id| match it.next() {
                Some(rec) => Job::from_record(id, rec),
                None => Job::placeholder(id),
            },
            records.len(),
        )
    }

    // Allocates `count` consecutive ids and inserts `make(id)` for each, all
    // in one transaction so a partial import is never visible.
    fn append(&self, mut make: impl FnMut(u64) -> Job, count: usize) -> Result<Vec<Job>> {
        let wt = self.db.begin_write().map_err(PnaError::storage)?;
        let mut out = Vec::with_capacity(count);
        {
            let mut meta = wt.open_table(META).map_err(PnaError::storage)?;
            let mut jobs = wt.open_table(JOBS).map_err(PnaError::storage)?;
            let mut next = meta
                .get(NEXT_ID)
                .map_err(PnaError::storage)?
                .map(|g| g.value())
                .unwrap_or(1);
            for _ in 0..count {
                let job = make(next);
                jobs.insert(next, encode(&job)?.as_slice())
                    .map_err(PnaError::storage)?;
                out.push(job);
                next += 1;
            }
            meta.insert(NEXT_ID, next).map_err(PnaError::storage)?;
        }
        wt.commit().map_err(PnaError::storage)?;
        Ok(out)
    }

    pub fn get(&self, id: u64) -> Result<Job> {
        let rt = self.db.begin_read().map_err(PnaError::storage)?;
        let table = rt.open_table(JOBS).map_err(PnaError::storage)?;
        let guard = table
            .get(id)
            .map_err(PnaError::storage)?
            .ok_or(PnaError::NotFound(id))?;
        decode(guard.value())
    }

    /// Replace a stored job. `NotFound` if its id is not in the table.
    pub fn update(&self, job: &Job) -> Result<Job> {
        let mut job = job.clone();
        job.updated_at = Utc::now();
        let bytes = encode(&job)?;

        let wt = self.db.begin_write().map_err(PnaError::storage)?;
        {
            let mut table = wt.open_table(JOBS).map_err(PnaError::storage)?;
            let exists = table.get(job.id).map_err(PnaError::storage)?.is_some();
            if !exists {
                return Err(PnaError::NotFound(job.id));
            }
            table
                .insert(job.id, bytes.as_slice())
                .map_err(PnaError::storage)?;
        }
        wt.commit().map_err(PnaError::storage)?;
        Ok(job)
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        let wt = self.db.begin_write().map_err(PnaError::storage)?;
        {
            let mut table = wt.open_table(JOBS).map_err(PnaError::storage)?;
            let removed = table.remove(id).map_err(PnaError::storage)?.is_some();
            if !removed {
                return Err(PnaError::NotFound(id));
            }
        }
        wt.commit().map_err(PnaError::storage)?;
        Ok(())
    }

    /// Every job in id order.
    pub fn all(&self) -> Result<Vec<Job>> {
        let rt = self.db.begin_read().map_err(PnaError::storage)?;
        let table = rt.open_table(JOBS).map_err(PnaError::storage)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(PnaError::storage)? {
            let (_, v) = entry.map_err(PnaError::storage)?;
            result.push(decode(v.value())?);
        }
        Ok(result)
    }

    /// Filtered, paged listing in id order.
    pub fn list(&self, filter: Option<&str>, offset: usize, limit: Option<usize>) -> Result<JobPage> {
        let needle = filter.map(|f| f.trim().to_lowercase()).unwrap_or_default();
        let matching: Vec<Job> = self
            .all()?
            .into_iter()
            .filter(|j| j.matches(&needle))
            .collect();
        let total = matching.len();
        let jobs = matching
            .into_iter()
            .skip(offset)
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(JobPage { jobs, total })
    }

    pub fn set_status(&self, id: u64, status: JobStatus, error: Option<String>) -> Result<Job> {
        let mut job = self.get(id)?;
        job.status = status;
        job.error = error;
        self.update(&job)
    }

    /// The lowest-id job still waiting to run.
    pub fn next_todo(&self) -> Result<Option<Job>> {
        let rt = self.db.begin_read().map_err(PnaError::storage)?;
        let table = rt.open_table(JOBS).map_err(PnaError::storage)?;
        for entry in table.iter().map_err(PnaError::storage)? {
            let (_, v) = entry.map_err(PnaError::storage)?;
            let job = decode(v.value())?;
            if job.status == JobStatus::ToDo {
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    /// Put every job back to `ToDo` with its error cleared. Returns how many
    /// jobs changed.
    pub fn reset_all(&self) -> Result<usize> {
        let now = Utc::now();
        let wt = self.db.begin_write().map_err(PnaError::storage)?;
        let mut changed = 0;
        {
            let mut table = wt.open_table(JOBS).map_err(PnaError::storage)?;
            let mut pending = Vec::new();
            for entry in table.iter().map_err(PnaError::storage)? {
                let (k, v) = entry.map_err(PnaError::storage)?;
                let job = decode(v.value())?;
                if job.status != JobStatus::ToDo || job.error.is_some() {
                    pending.push((k.value(), job));
                }
            }
            for (id, mut job) in pending {
                job.status = JobStatus::ToDo;
                job.error = None;
                job.updated_at = now;
                table
                    .insert(id, encode(&job)?.as_slice())
                    .map_err(PnaError::storage)?;
                changed += 1;
            }
        }
        wt.commit().map_err(PnaError::storage)?;
        Ok(changed)
    }

    /// `Done` jobs over all jobs.
    pub fn progress(&self) -> Result<Progress> {
        let jobs = self.all()?;
        let completed = jobs.iter().filter(|j| j.status == JobStatus::Done).count();
        Ok(Progress::new(completed, jobs.len()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
