//! Job coordination: the store, the assignment/report protocol and lease
//! reclamation.
//!
//! # Job lifecycle
//!
//! ```text
//! Pending -> Assigned -> SplitParent | Solved | Completed | Pending
//!               ^  |
//!               |  +-- zombie reaper (lease expired) --> Pending
//! ```
//!
//! An exhausted job needs two agreeing attempts before it is `Completed`;
//! the first attempt sends it back to `Pending` for a second worker.

pub mod coordinator;
pub mod job;
pub mod reaper;
pub mod report;
pub mod store;

pub use coordinator::{Coordinator, Stats};
pub use job::{Job, JobId, JobStatus, NewJob, Solution, SolutionId};
pub use reaper::ZombieReaper;
pub use report::{Assignment, OutcomeReport, Progress, ReportAck, SearchResult, SplitReport};
pub use store::{Condition, JobStore, MemoryJobStore, NewSolution, Update};
