use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::pool::CredentialId;
use crate::queue::job::{JobRecord, JobStatus};

const DEFAULT_CAPACITY: usize = 1_000;

/// Recent job records, for operators. Holding a record here never affects
/// whether a job runs.
#[derive(Debug)]
pub struct JobHistory {
    jobs: HashMap<Uuid, JobRecord>,
    capacity: usize,
}

impl Default for JobHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl JobHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            capacity,
        }
    }

    /// Record a new job. When full, the oldest finished record is evicted
    /// first; unfinished records are never evicted.
    pub fn add_job(&mut self, job: JobRecord) {
        if self.jobs.len() >= self.capacity {
            self.evict_oldest_finished();
        }
        self.jobs.insert(job.id, job);
    }

    fn evict_oldest_finished(&mut self) {
        let oldest = self
            .jobs
            .values()
            .filter(|j| j.status.is_finished())
            .min_by_key(|j| j.completed_at.unwrap_or(j.created_at))
            .map(|j| j.id);
        if let Some(id) = oldest {
            self.jobs.remove(&id);
        }
    }

    pub fn get_job(&self, id: &Uuid) -> Option<&JobRecord> {
        self.jobs.get(id)
    }

    /// Mark a job as running on `credential`.
    pub fn mark_running(&mut self, id: &Uuid, credential: CredentialId) -> bool {
        if let Some(job) = self.jobs.get_mut(id) {
            job.status = JobStatus::Running;
            job.credential = Some(credential);
            job.started_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    pub fn mark_completed(&mut self, id: &Uuid) -> bool {
        self.finish(id, JobStatus::Completed, None)
    }

    pub fn mark_failed(&mut self, id: &Uuid, error: String) -> bool {
        self.finish(id, JobStatus::Failed, Some(error))
    }

    fn finish(&mut self, id: &Uuid, status: JobStatus, error: Option<String>) -> bool {
        if let Some(job) = self.jobs.get_mut(id) {
            job.status = status;
            job.error = error;
            job.completed_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    /// Get all records sorted chronologically by creation time
    pub fn all_jobs(&self) -> Vec<&JobRecord> {
        let mut jobs: Vec<&JobRecord> = self.jobs.values().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
