//! Core pod recycling functionality
//!
//! This library provides:
//! - Pod targets and per-target validation
//! - Namespace allow-list gate (fail closed)
//! - Batch recycler with per-target error isolation
//! - Outcome aggregation into a batch result

pub mod allowlist;
pub mod error;
pub mod outcome;
pub mod recycler;
pub mod target;

pub use allowlist::NamespaceAllowList;
pub use error::{CoreError, PodApiError, Result};
pub use outcome::{AggregateStatus, BatchResult, RecycleOutcome, RecycleStatus};
pub use recycler::{
    ensure_targets, screen_namespace, screen_target, BatchRecycler, PodClient, DEADLINE_EXCEEDED,
    DEFAULT_CONCURRENCY,
};
pub use target::PodTarget;
