//! Draft reconciliation engine: debounced autosave, offline fallback, and
//! explicit save and publish flows.

mod connectivity;
mod scheduler;
mod service;
mod types;

pub use connectivity::ConnectivityMonitor;
pub use scheduler::{CommitDue, CommitScheduler};
pub use service::EditorService;
pub use types::{
    CommitOutcome, CommitState, EditorError, FallbackReason, OFFLINE_NOTICE, ReconcileOutcome,
    SubmitOutcome, SyncStatus,
};
