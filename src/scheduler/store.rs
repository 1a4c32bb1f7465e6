use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{EternityError, Result};
use crate::scheduler::job::{Job, JobId, JobStatus, NewJob, Solution, SolutionId};

/// Precondition checked atomically with a conditional write.
#[derive(Debug, Clone, Copy)]
pub enum Condition<'a> {
    Always,
    /// `Assigned` and leased to this worker.
    AssignedTo(&'a str),
    /// `Assigned` with no heartbeat, or a heartbeat older than the cutoff.
    LeaseExpired(DateTime<Utc>),
}

impl Condition<'_> {
    pub fn holds(&self, job: &Job) -> bool {
        match self {
            Condition::Always => true,
            Condition::AssignedTo(worker_id) => job.is_assigned_to(worker_id),
            Condition::LeaseExpired(cutoff) => {
                job.status == JobStatus::Assigned
                    && job.last_heartbeat.map_or(true, |hb| hb < *cutoff)
            }
        }
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update<T> {
    Applied(T),
    /// The precondition failed; carries the unchanged record.
    Rejected(Job),
}

/// Durable job and solution records.
///
/// The coordination protocol relies on two guarantees only: single-record
/// conditional writes are atomic, and [`JobStore::split`] applies the parent
/// change and every child insert together or not at all.
pub trait JobStore: Send + Sync {
    fn insert(&self, job: NewJob) -> Result<JobId>;

    fn get(&self, id: JobId) -> Result<Option<Job>>;

    /// Claim the lowest-id `Pending`, unverified job for `worker_id`.
    fn claim_next_pending(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<Job>>;

    fn update_if(
        &self,
        id: JobId,
        condition: Condition<'_>,
        apply: &mut dyn FnMut(&mut Job),
    ) -> Result<Update<Job>>;

    /// Conditionally update the parent and insert its children atomically.
    fn split(
        &self,
        id: JobId,
        condition: Condition<'_>,
        apply: &mut dyn FnMut(&mut Job),
        children: Vec<NewJob>,
    ) -> Result<Update<(Job, Vec<JobId>)>>;

    /// Jobs matching `filter`, ordered by id.
    fn scan(&self, filter: &dyn Fn(&Job) -> bool) -> Result<Vec<Job>>;

    fn count_by_status(&self, status: JobStatus) -> Result<usize>;

    fn is_empty(&self) -> Result<bool>;

    /// Conditionally update the job and append a [`Solution`] for it, both
    /// or neither.
    fn record_solution(
        &self,
        id: JobId,
        condition: Condition<'_>,
        apply: &mut dyn FnMut(&mut Job),
        solution: NewSolution,
    ) -> Result<Update<(Job, SolutionId)>>;

    fn get_solution(&self, id: SolutionId) -> Result<Option<Solution>>;

    fn solutions(&self) -> Result<Vec<Solution>>;

    fn set_solution_verified(&self, id: SolutionId) -> Result<Solution>;
}

/// A solution about to be recorded.
#[derive(Debug, Clone)]
pub struct NewSolution {
    pub board: Vec<u8>,
    pub found_by: String,
    pub verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Inner {
    jobs: BTreeMap<JobId, Job>,
    next_job_id: JobId,
    solutions: BTreeMap<SolutionId, Solution>,
    next_solution_id: SolutionId,
}

impl Inner {
    fn allocate_job(&mut self) -> JobId {
        self.next_job_id += 1;
        self.next_job_id
    }
}

/// In-process [`JobStore`]. Every operation holds the write lock for its
/// whole duration, which makes each one atomic.
///
/// A store opened with [`MemoryJobStore::open`] also keeps a JSON snapshot
/// on disk. Each write is applied to a copy, the copy is written to a
/// temporary file and renamed over the snapshot, and only then swapped in,
/// so a failed write changes neither memory nor disk.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: RwLock<Inner>,
    max_jobs: Option<usize>,
    snapshot: Option<PathBuf>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse inserts beyond `max_jobs` records.
    pub fn with_capacity(max_jobs: usize) -> Self {
        Self {
            max_jobs: Some(max_jobs),
            ..Self::default()
        }
    }

    /// Load the snapshot at `path`, or start empty if there is none, and
    /// persist every later write there.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let bytes = fs::read(&path)?;
            let inner: Inner = serde_json::from_slice(&bytes).map_err(|e| {
                EternityError::Storage(format!("corrupt snapshot {}: {}", path.display(), e))
            })?;
            tracing::info!(
                path = %path.display(),
                jobs = inner.jobs.len(),
                solutions = inner.solutions.len(),
                "Loaded job store snapshot"
            );
            inner
        } else {
            tracing::info!(path = %path.display(), "No snapshot found, starting empty");
            Inner::default()
        };
        Ok(Self {
            inner: RwLock::new(inner),
            max_jobs: None,
            snapshot: Some(path),
        })
    }

    fn check_capacity(&self, inner: &Inner, additional: usize) -> Result<()> {
        match self.max_jobs {
            Some(max) if inner.jobs.len() + additional > max => Err(EternityError::Storage(
                format!("job store at capacity ({} jobs)", max),
            )),
            _ => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().jobs.len()
    }

    pub fn is_persistent(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Run `write` under the write lock. With a snapshot path the change is
    /// made on a copy and committed to disk before it becomes visible.
    fn write<T>(&self, op: impl FnOnce(&mut Inner) -> Result<T>) -> Result<T> {
        let mut inner = self.inner.write();
        let Some(path) = &self.snapshot else {
            return op(&mut *inner);
        };
        let mut next = (*inner).clone();
        let out = op(&mut next)?;
        save_snapshot(path, &next)?;
        *inner = next;
        Ok(out)
    }
}

fn save_snapshot(path: &Path, inner: &Inner) -> Result<()> {
    let bytes = serde_json::to_vec(inner)
        .map_err(|e| EternityError::Storage(format!("snapshot encode failed: {}", e)))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: NewJob) -> Result<JobId> {
        self.write(|inner| {
            self.check_capacity(inner, 1)?;
            let id = inner.allocate_job();
            inner.jobs.insert(id, Job::from_new(id, job, Utc::now()));
            Ok(id)
        })
    }

    fn get(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.inner.read().jobs.get(&id).cloned())
    }

    fn claim_next_pending(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<Job>> {
        self.write(|inner| {
            let next = inner
                .jobs
                .values_mut()
                .find(|j| j.status == JobStatus::Pending && !j.is_verified);
            Ok(next.map(|job| {
                job.assign(worker_id, now);
                job.clone()
            }))
        })
    }

    fn update_if(
        &self,
        id: JobId,
        condition: Condition<'_>,
        apply: &mut dyn FnMut(&mut Job),
    ) -> Result<Update<Job>> {
        self.write(|inner| {
            let job = inner
                .jobs
                .get_mut(&id)
                .ok_or(EternityError::JobNotFound(id))?;
            if !condition.holds(job) {
                return Ok(Update::Rejected(job.clone()));
            }
            apply(job);
            Ok(Update::Applied(job.clone()))
        })
    }

    fn split(
        &self,
        id: JobId,
        condition: Condition<'_>,
        apply: &mut dyn FnMut(&mut Job),
        children: Vec<NewJob>,
    ) -> Result<Update<(Job, Vec<JobId>)>> {
        self.write(|inner| {
            let parent = inner.jobs.get(&id).ok_or(EternityError::JobNotFound(id))?;
            if !condition.holds(parent) {
                return Ok(Update::Rejected(parent.clone()));
            }
            // Fail before touching anything so a refused split leaves no trace.
            self.check_capacity(inner, children.len())?;

            let now = Utc::now();
            let mut child_ids = Vec::with_capacity(children.len());
            for child in children {
                let child_id = inner.allocate_job();
                inner.jobs.insert(child_id, Job::from_new(child_id, child, now));
                child_ids.push(child_id);
            }

            let parent = inner
                .jobs
                .get_mut(&id)
                .ok_or(EternityError::JobNotFound(id))?;
            apply(parent);
            Ok(Update::Applied((parent.clone(), child_ids)))
        })
    }

    fn scan(&self, filter: &dyn Fn(&Job) -> bool) -> Result<Vec<Job>> {
        Ok(self
            .inner
            .read()
            .jobs
            .values()
            .filter(|j| filter(j))
            .cloned()
            .collect())
    }

    fn count_by_status(&self, status: JobStatus) -> Result<usize> {
        Ok(self
            .inner
            .read()
            .jobs
            .values()
            .filter(|j| j.status == status)
            .count())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.inner.read().jobs.is_empty())
    }

    fn record_solution(
        &self,
        id: JobId,
        condition: Condition<'_>,
        apply: &mut dyn FnMut(&mut Job),
        solution: NewSolution,
    ) -> Result<Update<(Job, SolutionId)>> {
        self.write(|inner| {
            let job = inner
                .jobs
                .get_mut(&id)
                .ok_or(EternityError::JobNotFound(id))?;
            if !condition.holds(job) {
                return Ok(Update::Rejected(job.clone()));
            }
            apply(job);
            let job = job.clone();

            inner.next_solution_id += 1;
            let solution_id = inner.next_solution_id;
            inner.solutions.insert(
                solution_id,
                Solution {
                    id: solution_id,
                    job_id: id,
                    board: solution.board,
                    found_by: solution.found_by,
                    verified: solution.verified,
                    found_at: Utc::now(),
                },
            );
            Ok(Update::Applied((job, solution_id)))
        })
    }

    fn get_solution(&self, id: SolutionId) -> Result<Option<Solution>> {
        Ok(self.inner.read().solutions.get(&id).cloned())
    }

    fn solutions(&self) -> Result<Vec<Solution>> {
        Ok(self.inner.read().solutions.values().cloned().collect())
    }

    fn set_solution_verified(&self, id: SolutionId) -> Result<Solution> {
        self.write(|inner| {
            let solution = inner
                .solutions
                .get_mut(&id)
                .ok_or(EternityError::SolutionNotFound(id))?;
            solution.verified = true;
            Ok(solution.clone())
        })
    }
}
