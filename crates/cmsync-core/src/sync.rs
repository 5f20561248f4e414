//! Push and pull engine
//!
//! One [`ReconciliationEngine`] handles one artifact type: it computes the
//! working set once, then runs every item through a [`ConcurrencyThrottle`]
//! with the operation's [`RetryPolicy`]. Per-item results become
//! [`SyncEvent`]s and counters; only working-set failures (and fail-fast
//! aborts) fail the operation itself.

mod actions;
mod context;
mod events;
mod executor;
mod orchestrator;
mod reporting;
mod retry;
mod throttle;


pub use actions::{PullOutcome, PushAction, PushActionResolver, PushOutcome};
pub use context::{SelectionMode, StatusFilter, SyncContext, SyncOptions};
pub use events::{EventEmitter, SyncEvent};
pub use executor::{ItemExecutor, WorkingEntry};
pub use orchestrator::{PullResult, PushResult, ReconciliationEngine, WorkingSet};
pub use reporting::{ReportContext, SyncReporter};
pub use retry::RetryPolicy;
pub use throttle::{ConcurrencyThrottle, DEFAULT_CONCURRENCY, ItemOutcome};

use crate::artifact::ArtifactRef;
use crate::error::SyncError;

/// Synchronization result with statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Items that succeeded
    pub count: usize,
    /// Items that failed
    pub error_count: usize,
    /// Items that succeeded with a warning
    pub warning_count: usize,
    /// Pushes that created a remote item
    pub created: usize,
    /// Pushes that updated a remote item
    pub updated: usize,
    /// Updates that fell back to a create
    pub recreated: usize,
    /// Create-only pushes of items that already existed
    pub conflicts_ignored: usize,
    /// One message per failed item
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Items processed, successfully or not
    #[must_use]
    pub const fn total(&self) -> usize {
        self.count + self.error_count
    }

    /// Whether no item failed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error_count == 0
    }

    /// Count a successful push
    pub fn record_push(&mut self, outcome: PushOutcome) {
        self.count += 1;
        match outcome {
            PushOutcome::Created => self.created += 1,
            PushOutcome::Updated => self.updated += 1,
            PushOutcome::RecreatedViaFallback => self.recreated += 1,
            PushOutcome::ConflictIgnored => self.conflicts_ignored += 1,
            PushOutcome::WouldPush(_) => {}
        }
    }

    /// Count a successful pull
    pub fn record_pull(&mut self, outcome: &PullOutcome) {
        self.count += 1;
        if matches!(outcome, PullOutcome::PulledWithWarning { .. }) {
            self.warning_count += 1;
        }
    }

    /// Count a failed item
    pub fn record_error(&mut self, item: &ArtifactRef, error: &SyncError) {
        self.error_count += 1;
        self.errors.push(format!("{item}: {error}"));
    }

    /// Add the counts of another result
    pub fn merge(&mut self, other: Self) {
        self.count += other.count;
        self.error_count += other.error_count;
        self.warning_count += other.warning_count;
        self.created += other.created;
        self.updated += other.updated;
        self.recreated += other.recreated;
        self.conflicts_ignored += other.conflicts_ignored;
        self.errors.extend(other.errors);
    }
}
