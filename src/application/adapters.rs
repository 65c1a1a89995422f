//! Adapter traits describing the engine's collaborators.
//!
//! The editor core talks to the outside world exclusively through these
//! seams so tests can substitute in-memory fakes for the HTTP client and the
//! on-disk snapshot store.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::drafts::{DraftRecord, DraftSnapshot, PostRecord};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("resource not found")]
    NotFound,
    #[error("request rejected: {message}")]
    Rejected { message: String },
    #[error("network failure: {0}")]
    Network(String),
}

impl RemoteError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::Network(err.to_string())
    }

    /// Failures that say nothing about the draft itself, only about the
    /// ability to reach the server right now.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertDraftParams {
    /// Existing record to overwrite; `None` asks the server to create one.
    pub id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPostParams {
    /// Existing draft or post to publish in place of creating a new record.
    pub id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub category: String,
    pub private: bool,
}

/// Remote side of the reconciliation engine.
///
/// `upsert_draft` must be idempotent with respect to `id`: the same id may be
/// written any number of times without creating duplicates.
#[async_trait]
pub trait RemoteDraftClient: Send + Sync {
    async fn upsert_draft(&self, params: UpsertDraftParams) -> Result<DraftRecord, RemoteError>;

    async fn delete_draft(&self, id: Uuid) -> Result<(), RemoteError>;

    async fn publish(&self, params: PublishPostParams) -> Result<PostRecord, RemoteError>;

    async fn fetch_post(&self, id: Uuid) -> Result<PostRecord, RemoteError>;
}

/// Who is signed in, if anyone. Commits to the server require an account.
pub trait SessionProvider: Send + Sync {
    fn current_account(&self) -> Option<Uuid>;
}

/// Single-slot local persistence for the working draft.
///
/// `load` reports corrupt contents as absent rather than failing; `clear` on
/// an empty slot is a no-op.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &DraftSnapshot) -> Result<(), StorageError>;

    fn load(&self) -> Result<Option<DraftSnapshot>, StorageError>;

    fn clear(&self) -> Result<(), StorageError>;
}
