//! Orchestrates one editing session against the local slot and the server.
//!
//! The service is single-owner and runs on one task; every await point
//! belongs to at most one in-flight remote call, so commit ordering never
//! needs a lock. Writes are local-first: the slot is updated before any
//! network attempt, which is what makes sudden offline transitions lossless.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use metrics::{counter, histogram};
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    application::adapters::{
        PublishPostParams, RemoteDraftClient, RemoteError, SessionProvider, SnapshotStore,
        UpsertDraftParams,
    },
    domain::drafts::{self, DraftFields, DraftRecord, DraftSnapshot, EditSession, PostRecord},
    domain::error::DomainError,
};

use super::{
    scheduler::{CommitDue, CommitScheduler},
    types::{
        CommitOutcome, CommitState, EditorError, FallbackReason, OFFLINE_NOTICE, ReconcileOutcome,
        SubmitOutcome, SyncStatus, success_notice,
    },
};

const METRIC_COMMIT_TOTAL: &str = "bozza_commit_total";
const METRIC_COMMIT_FAILURE_TOTAL: &str = "bozza_commit_failure_total";
const METRIC_SNAPSHOT_WRITE_TOTAL: &str = "bozza_snapshot_write_total";
const METRIC_RECONCILE_TOTAL: &str = "bozza_reconcile_total";
const METRIC_REMOTE_UPSERT_MS: &str = "bozza_remote_upsert_ms";

enum Submitted {
    Draft(DraftRecord),
    Post(PostRecord),
}

pub struct EditorService {
    remote: Arc<dyn RemoteDraftClient>,
    sessions: Arc<dyn SessionProvider>,
    snapshots: Arc<dyn SnapshotStore>,
    scheduler: CommitScheduler,
    session: EditSession,
    state: CommitState,
    online: bool,
    last_saved: Option<OffsetDateTime>,
}

impl EditorService {
    /// Build the service plus the receiver its autosave expiries arrive on.
    ///
    /// Connectivity starts pessimistic; the first successful probe flips it
    /// and triggers the startup reconciliation of any leftover snapshot.
    pub fn new(
        remote: Arc<dyn RemoteDraftClient>,
        sessions: Arc<dyn SessionProvider>,
        snapshots: Arc<dyn SnapshotStore>,
        quiet_period: Duration,
    ) -> (Self, UnboundedReceiver<CommitDue>) {
        let (scheduler, fires) = CommitScheduler::new(quiet_period);
        let service = Self {
            remote,
            sessions,
            snapshots,
            scheduler,
            session: EditSession::new(),
            state: CommitState::Idle,
            online: false,
            last_saved: None,
        };
        (service, fires)
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: self.state,
            online: self.online,
            dirty: self.session.is_dirty(),
            last_saved: self.last_saved,
        }
    }

    /// Current contents of the local slot, if any. Read errors count as an
    /// empty slot here; status displays should never fail on a bad file.
    pub fn peek_snapshot(&self) -> Option<DraftSnapshot> {
        self.snapshots.load().ok().flatten()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.session.fields.title = title.into();
        self.note_mutation();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.session.fields.content = content.into();
        self.note_mutation();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.session.fields.category = category.into();
        self.note_mutation();
    }

    /// Visibility applies at publish time only, so it does not arm autosave.
    pub fn set_private(&mut self, private: bool) {
        self.session.private = private;
    }

    /// Arm or disarm the autosave timer after a field mutation. Returning to
    /// the exact committed values withdraws the pending commit entirely.
    fn note_mutation(&mut self) {
        if self.session.is_dirty() {
            self.state = CommitState::PendingCommit;
            self.scheduler.schedule();
        } else if self.state == CommitState::PendingCommit {
            self.scheduler.cancel();
            self.state = CommitState::Idle;
            debug!("edits returned to committed values, autosave withdrawn");
        }
    }

    /// Handle one expiry from the scheduler's receiver. Stale expiries from
    /// superseded timers are dropped without touching the session.
    pub async fn scheduler_fired(&mut self, due: CommitDue) -> Option<CommitOutcome> {
        if !self.scheduler.accepts(due) {
            return None;
        }
        Some(self.autosave_tick().await)
    }

    /// Commit pending edits now instead of waiting out the quiet period.
    pub async fn flush(&mut self) -> CommitOutcome {
        let due = self.scheduler.fire_now();
        self.scheduler_fired(due).await.unwrap_or(CommitOutcome::Skipped)
    }

    /// Withdraw any scheduled autosave, also invalidating expiries that
    /// already left the timer but have not been handled yet.
    pub fn cancel_pending(&mut self) {
        self.scheduler.cancel();
        if self.state == CommitState::PendingCommit {
            self.state = CommitState::Idle;
        }
    }

    async fn autosave_tick(&mut self) -> CommitOutcome {
        if self.session.fields.is_blank() || !self.session.is_dirty() {
            self.state = CommitState::Idle;
            return CommitOutcome::Skipped;
        }

        self.state = CommitState::Committing;
        self.persist_snapshot();

        if !self.online {
            // Offline, so the slot write is the commit of record.
            self.session.mark_committed();
            self.last_saved = Some(OffsetDateTime::now_utc());
            self.state = CommitState::Idle;
            counter!(METRIC_COMMIT_TOTAL, "kind" => "local").increment(1);
            info!("offline, draft committed to local slot");
            return CommitOutcome::SavedLocally {
                reason: FallbackReason::Offline,
            };
        }

        if self.sessions.current_account().is_none() {
            self.state = CommitState::Idle;
            debug!("not signed in, draft kept local only");
            return CommitOutcome::SavedLocally {
                reason: FallbackReason::Anonymous,
            };
        }

        let identity_before = self.session.commit_identity();
        let record = match self.upsert_remote_draft(self.draft_params()).await {
            Ok(record) => record,
            Err(err) => {
                self.state = CommitState::Idle;
                counter!(METRIC_COMMIT_FAILURE_TOTAL, "kind" => "autosave").increment(1);
                warn!(error = %err, "autosave failed, draft stays in local slot");
                return CommitOutcome::SavedLocally {
                    reason: FallbackReason::RemoteFailed,
                };
            }
        };

        if identity_before.is_none() {
            self.session.adopt_server_id(record.id);
        }
        self.session.mark_committed();
        self.last_saved = Some(OffsetDateTime::now_utc());
        self.clear_snapshot_best_effort();
        self.state = CommitState::Idle;
        counter!(METRIC_COMMIT_TOTAL, "kind" => "autosave").increment(1);
        info!(draft_id = %record.id, "autosave committed");
        CommitOutcome::Committed {
            draft_id: record.id,
        }
    }

    /// Record a probe result. On the offline-to-online edge the leftover
    /// snapshot is reconciled exactly once; every other report is a no-op.
    pub async fn set_connectivity(&mut self, online: bool) -> Option<ReconcileOutcome> {
        if self.online == online {
            return None;
        }
        self.online = online;
        if online {
            info!(target = "bozza::editor", "connectivity restored, reconciling local slot");
            Some(self.reconcile_snapshot().await)
        } else {
            info!(target = "bozza::editor", "connectivity lost, commits fall back to local slot");
            None
        }
    }

    /// Push the local slot's contents to the server as a draft.
    ///
    /// The snapshot's stored identity addresses the upsert, so re-syncing an
    /// already-created draft can never duplicate it. When the slot holds
    /// exactly what this session last committed, a freshly created draft id
    /// is adopted by the session for the same reason.
    #[instrument(skip(self))]
    pub async fn reconcile_snapshot(&mut self) -> ReconcileOutcome {
        if !self.online {
            return ReconcileOutcome::Offline;
        }

        let snapshot = match self.snapshots.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return ReconcileOutcome::NoSnapshot,
            Err(err) => {
                warn!(error = %err, "could not read local slot");
                return ReconcileOutcome::NoSnapshot;
            }
        };

        if snapshot.is_blank() {
            self.clear_snapshot_best_effort();
            counter!(METRIC_RECONCILE_TOTAL, "outcome" => "cleared_blank").increment(1);
            return ReconcileOutcome::ClearedBlank;
        }

        if self.sessions.current_account().is_none() {
            debug!("not signed in, snapshot kept for a later sync");
            counter!(METRIC_RECONCILE_TOTAL, "outcome" => "deferred").increment(1);
            return ReconcileOutcome::Deferred;
        }

        let owns_snapshot = snapshot.editing_id == self.session.editing_existing_id
            && snapshot.draft_id == self.session.server_draft_id
            && snapshot.fields() == self.session.last_committed;

        let fields = snapshot.fields();
        let category = fields.category_or_default().to_string();
        let params = UpsertDraftParams {
            id: snapshot.stored_identity(),
            title: fields.title,
            content: fields.content,
            category,
        };

        match self.upsert_remote_draft(params).await {
            Ok(record) => {
                if owns_snapshot && self.session.commit_identity().is_none() {
                    self.session.adopt_server_id(record.id);
                }
                self.clear_snapshot_best_effort();
                counter!(METRIC_RECONCILE_TOTAL, "outcome" => "synced").increment(1);
                info!(target = "bozza::editor", draft_id = %record.id, "local slot synced to server");
                ReconcileOutcome::Synced {
                    draft_id: record.id,
                }
            }
            Err(err) => {
                counter!(METRIC_RECONCILE_TOTAL, "outcome" => "deferred").increment(1);
                warn!(error = %err, "sync of local slot failed, snapshot kept");
                ReconcileOutcome::Deferred
            }
        }
    }

    /// Publish the session as a public or private post. Validation runs
    /// before anything leaves the process.
    pub async fn publish(&mut self) -> Result<SubmitOutcome, EditorError> {
        self.cancel_pending();
        drafts::validate_publish(&self.session.fields)?;
        self.submit(true).await
    }

    /// Save the session as a server-side draft. Drafts accept partial work,
    /// so no validation applies.
    pub async fn save_draft(&mut self) -> Result<SubmitOutcome, EditorError> {
        self.cancel_pending();
        self.submit(false).await
    }

    async fn submit(&mut self, publish: bool) -> Result<SubmitOutcome, EditorError> {
        if !self.online {
            // The slot write is the commit of record here too; the reconnect
            // sync then adopts whatever identity it creates for the slot.
            self.persist_snapshot();
            self.session.mark_committed();
            self.last_saved = Some(OffsetDateTime::now_utc());
            counter!(METRIC_COMMIT_TOTAL, "kind" => "local").increment(1);
            info!(publish, "offline, explicit save parked in local slot");
            return Ok(SubmitOutcome::SavedLocally {
                notice: OFFLINE_NOTICE,
            });
        }

        if self.sessions.current_account().is_none() {
            return Err(RemoteError::Unauthorized.into());
        }

        let was_editing = self.session.editing_existing_id.is_some();
        let kind = if publish { "publish" } else { "draft" };
        self.state = CommitState::Committing;

        let result = if publish {
            let params = PublishPostParams {
                id: self.session.commit_identity(),
                title: self.session.fields.title.clone(),
                content: self.session.fields.content.clone(),
                category: self.session.fields.category_or_default().to_string(),
                private: self.session.private,
            };
            self.remote.publish(params).await.map(Submitted::Post)
        } else {
            self.upsert_remote_draft(self.draft_params())
                .await
                .map(Submitted::Draft)
        };

        let submitted = match result {
            Ok(submitted) => submitted,
            Err(err) => {
                self.state = CommitState::Idle;
                counter!(METRIC_COMMIT_FAILURE_TOTAL, "kind" => kind).increment(1);
                warn!(error = %err, kind, "explicit save failed");
                return Err(err.into());
            }
        };

        self.clear_snapshot_best_effort();
        self.session.reset();
        self.state = CommitState::Idle;
        self.last_saved = Some(OffsetDateTime::now_utc());
        counter!(METRIC_COMMIT_TOTAL, "kind" => kind).increment(1);

        let notice = success_notice(was_editing, publish);
        Ok(match submitted {
            Submitted::Post(post) => {
                info!(post_id = %post.id, "post published");
                SubmitOutcome::Published { post, notice }
            }
            Submitted::Draft(draft) => {
                info!(draft_id = %draft.id, "draft saved");
                SubmitOutcome::DraftSaved { draft, notice }
            }
        })
    }

    /// Load an existing post into the session for editing. Only the post's
    /// author may edit it; anyone else sees the post as missing.
    #[instrument(skip(self))]
    pub async fn load_for_editing(&mut self, id: Uuid) -> Result<(), EditorError> {
        let Some(account) = self.sessions.current_account() else {
            return Err(RemoteError::Unauthorized.into());
        };

        let post = self.remote.fetch_post(id).await?;
        if post.author_id != account {
            return Err(DomainError::not_found("post").into());
        }

        self.cancel_pending();
        self.session.seed_existing(
            post.id,
            DraftFields {
                title: post.title,
                content: post.content,
                category: post.category,
            },
            post.is_private,
        );
        self.state = CommitState::Idle;
        info!(post_id = %id, "editing existing post");
        Ok(())
    }

    /// Throw away the local slot and reset the session. With `delete_remote`
    /// the draft the slot points at is removed from the server as well; a
    /// draft that is already gone counts as removed.
    pub async fn discard_snapshot(&mut self, delete_remote: bool) -> Result<(), EditorError> {
        self.cancel_pending();

        let snapshot = match self.snapshots.load() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "could not read local slot");
                None
            }
        };
        self.clear_snapshot_best_effort();

        if delete_remote {
            let draft_id = snapshot
                .as_ref()
                .and_then(|snapshot| snapshot.draft_id)
                .or(self.session.server_draft_id);
            if let Some(draft_id) = draft_id {
                if self.sessions.current_account().is_none() {
                    return Err(RemoteError::Unauthorized.into());
                }
                match self.remote.delete_draft(draft_id).await {
                    Ok(()) | Err(RemoteError::NotFound) => {
                        info!(draft_id = %draft_id, "server draft removed");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        self.session.reset();
        self.state = CommitState::Idle;
        Ok(())
    }

    fn draft_params(&self) -> UpsertDraftParams {
        UpsertDraftParams {
            id: self.session.commit_identity(),
            title: self.session.fields.title.clone(),
            content: self.session.fields.content.clone(),
            category: self.session.fields.category_or_default().to_string(),
        }
    }

    async fn upsert_remote_draft(
        &self,
        params: UpsertDraftParams,
    ) -> Result<DraftRecord, RemoteError> {
        let started_at = Instant::now();
        let result = self.remote.upsert_draft(params).await;
        histogram!(METRIC_REMOTE_UPSERT_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        result
    }

    /// Local-first write. Slot failures are logged and swallowed; losing the
    /// fallback copy must never interrupt editing.
    fn persist_snapshot(&self) {
        let snapshot = DraftSnapshot::capture(&self.session);
        match self.snapshots.save(&snapshot) {
            Ok(()) => {
                counter!(METRIC_SNAPSHOT_WRITE_TOTAL).increment(1);
            }
            Err(err) => {
                warn!(error = %err, "local snapshot write failed");
            }
        }
    }

    fn clear_snapshot_best_effort(&self) {
        if let Err(err) = self.snapshots.clear() {
            warn!(error = %err, "failed to clear local snapshot");
        }
    }
}
