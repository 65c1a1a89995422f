//! State machine vocabulary for the editor service.

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::adapters::RemoteError,
    domain::drafts::{DraftRecord, PostRecord},
    domain::error::DomainError,
};

/// Where the session sits in its commit lifecycle.
///
/// `PendingCommit` means edits exist and the quiet-period timer is armed;
/// `Committing` covers the span of one in-flight commit attempt. Both commit
/// results fold back to `Idle`, so a failure never wedges the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Idle,
    PendingCommit,
    Committing,
}

/// Why a commit stopped at the local snapshot instead of reaching the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Offline,
    Anonymous,
    RemoteFailed,
}

/// Result of one background commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing to do: the draft is blank or unchanged since the last commit.
    Skipped,
    /// The draft reached the server under the given identity.
    Committed { draft_id: Uuid },
    /// Only the local snapshot was written; the reason says whether the
    /// values now count as committed (offline does, a remote failure does
    /// not, so the next tick retries).
    SavedLocally { reason: FallbackReason },
}

/// Result of reconciling a leftover local snapshot with the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    NoSnapshot,
    /// The slot held a blank draft and was discarded without a server write.
    ClearedBlank,
    Synced { draft_id: Uuid },
    /// Still offline; the snapshot stays put for a later attempt.
    Offline,
    /// The snapshot could not be pushed this time and was kept locally.
    Deferred,
}

/// Result of an explicit save or publish action.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Published {
        post: PostRecord,
        notice: &'static str,
    },
    DraftSaved {
        draft: DraftRecord,
        notice: &'static str,
    },
    /// Offline: the draft went to the local slot and the session stays open.
    SavedLocally { notice: &'static str },
}

impl SubmitOutcome {
    pub fn notice(&self) -> &'static str {
        match self {
            Self::Published { notice, .. }
            | Self::DraftSaved { notice, .. }
            | Self::SavedLocally { notice } => notice,
        }
    }
}

/// Errors surfaced by explicit editor actions. Background autosave never
/// returns these; its failures degrade to [`CommitOutcome::SavedLocally`].
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Point-in-time view of the engine for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub state: CommitState,
    pub online: bool,
    pub dirty: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_saved: Option<OffsetDateTime>,
}

/// Banner shown when an explicit action lands in the local slot instead of
/// the server.
pub const OFFLINE_NOTICE: &str =
    "当前处于离线状态，内容已保存到本地。网络恢复后将自动同步到草稿箱。";

/// Confirmation text for a successful submit, phrased by whether the session
/// was editing an existing post and whether it published or saved a draft.
pub(crate) fn success_notice(was_editing: bool, published: bool) -> &'static str {
    match (was_editing, published) {
        (true, true) => "博客更新成功！",
        (true, false) => "草稿更新成功！",
        (false, true) => "博客发布成功！",
        (false, false) => "草稿保存成功！",
    }
}
