//! Draft editing sessions and their persisted local snapshots.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{error::DomainError, types::PostStatus};

/// Categories offered by the editor frontend. The engine itself only requires
/// that a category is selected before publishing.
pub const CATEGORIES: [&str; 8] = [
    "HTML",
    "CSS",
    "JavaScript",
    "React",
    "Vue",
    "Python",
    "Java",
    "其他",
];

/// Category substituted for draft writes when none has been selected.
pub const DEFAULT_CATEGORY: &str = "其他";

/// The user-edited field values of one draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DraftFields {
    pub title: String,
    pub content: String,
    pub category: String,
}

impl DraftFields {
    /// A draft with neither title nor content is not worth committing anywhere.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }

    /// Category to send on draft writes, falling back to the default.
    pub fn category_or_default(&self) -> &str {
        if self.category.is_empty() {
            DEFAULT_CATEGORY
        } else {
            &self.category
        }
    }
}

/// In-memory state of one open editor instance.
///
/// At most one of `server_draft_id` / `editing_existing_id` drives the
/// identity used for commits; once a commit succeeds and returns an id, all
/// later commits in the session address that same id.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    pub fields: DraftFields,
    pub private: bool,
    /// Identity of the server-side draft once an autosave has created one.
    pub server_draft_id: Option<Uuid>,
    /// Set when the session was opened to edit an already-stored post.
    pub editing_existing_id: Option<Uuid>,
    /// Field values as of the last successful commit, local or remote.
    pub last_committed: DraftFields,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the session for editing an existing post. The loaded values
    /// count as committed so that loading never triggers an autosave.
    pub fn seed_existing(&mut self, id: Uuid, fields: DraftFields, private: bool) {
        self.fields = fields.clone();
        self.private = private;
        self.server_draft_id = None;
        self.editing_existing_id = Some(id);
        self.last_committed = fields;
    }

    /// Identity for the next commit: the autosave-created draft wins over the
    /// explicit edit target, which wins over creating a new record.
    pub fn commit_identity(&self) -> Option<Uuid> {
        self.server_draft_id.or(self.editing_existing_id)
    }

    /// Whether the current field values differ from the last committed ones.
    pub fn is_dirty(&self) -> bool {
        self.fields != self.last_committed
    }

    /// Record that the current field values have been durably committed.
    pub fn mark_committed(&mut self) {
        self.last_committed = self.fields.clone();
    }

    /// Adopt a server-assigned draft id, keeping the first one for the whole
    /// session so repeat commits upsert instead of inserting again.
    pub fn adopt_server_id(&mut self, id: Uuid) {
        if self.server_draft_id.is_none() {
            self.server_draft_id = Some(id);
        }
    }

    /// Discard all session state after a successful explicit submit.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// The locally persisted draft, stored under a single well-known slot.
///
/// Field names are part of the stored format and must stay stable across
/// versions; `last_modified` is serialized as an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editing_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    pub is_draft: bool,
}

impl DraftSnapshot {
    /// Capture the session's current values, stamped with the current time.
    pub fn capture(session: &EditSession) -> Self {
        Self {
            title: session.fields.title.clone(),
            content: session.fields.content.clone(),
            category: session.fields.category.clone(),
            editing_id: session.editing_existing_id,
            draft_id: session.server_draft_id,
            last_modified: OffsetDateTime::now_utc(),
            is_draft: true,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }

    /// Identity to address when reconciling this snapshot with the server,
    /// with the same precedence as a live session.
    pub fn stored_identity(&self) -> Option<Uuid> {
        self.draft_id.or(self.editing_id)
    }

    pub fn fields(&self) -> DraftFields {
        DraftFields {
            title: self.title.clone(),
            content: self.content.clone(),
            category: self.category.clone(),
        }
    }
}

/// Rules a draft must satisfy before it may be published. Drafts themselves
/// are exempt; partial work is always allowed to be saved.
///
/// Lengths are counted in characters rather than bytes, so CJK titles are
/// measured the way an editor displays them.
pub fn validate_publish(fields: &DraftFields) -> Result<(), DomainError> {
    let title = fields.title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("请输入博客标题"));
    }
    let title_chars = title.chars().count();
    if title_chars < 3 {
        return Err(DomainError::validation("标题长度至少为3个字符"));
    }
    if title_chars > 100 {
        return Err(DomainError::validation("标题长度不能超过100个字符"));
    }

    let content = fields.content.trim();
    if content.is_empty() {
        return Err(DomainError::validation("请输入博客内容"));
    }
    if content.chars().count() < 10 {
        return Err(DomainError::validation("内容长度至少为10个字符"));
    }

    if fields.category.is_empty() {
        return Err(DomainError::validation("请选择博客分类"));
    }

    Ok(())
}

/// Server-side draft record as returned by the remote client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftRecord {
    pub id: Uuid,
    pub updated_at: OffsetDateTime,
}

/// Server-side post record, returned by publish and fetch operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: String,
    pub status: PostStatus,
    pub is_private: bool,
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str, content: &str, category: &str) -> DraftFields {
        DraftFields {
            title: title.to_string(),
            content: content.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn blank_detection_ignores_whitespace_and_category() {
        assert!(fields("", "  \n", "Vue").is_blank());
        assert!(!fields("t", "", "").is_blank());
        assert!(!fields("", "body", "").is_blank());
    }

    #[test]
    fn commit_identity_prefers_autosave_draft() {
        let mut session = EditSession::new();
        assert_eq!(session.commit_identity(), None);

        let existing = Uuid::new_v4();
        session.editing_existing_id = Some(existing);
        assert_eq!(session.commit_identity(), Some(existing));

        let draft = Uuid::new_v4();
        session.server_draft_id = Some(draft);
        assert_eq!(session.commit_identity(), Some(draft));
    }

    #[test]
    fn adopt_keeps_the_first_server_id() {
        let mut session = EditSession::new();
        let first = Uuid::new_v4();
        session.adopt_server_id(first);
        session.adopt_server_id(Uuid::new_v4());
        assert_eq!(session.server_draft_id, Some(first));
    }

    #[test]
    fn seeding_an_existing_post_counts_as_committed() {
        let mut session = EditSession::new();
        session.seed_existing(Uuid::new_v4(), fields("t", "c", "Java"), true);
        assert!(!session.is_dirty());
        assert!(session.private);

        session.fields.content.push('!');
        assert!(session.is_dirty());
    }

    #[test]
    fn default_category_substitution() {
        assert_eq!(fields("t", "c", "").category_or_default(), DEFAULT_CATEGORY);
        assert_eq!(fields("t", "c", "CSS").category_or_default(), "CSS");
    }

    fn validation_message(fields: &DraftFields) -> String {
        match validate_publish(fields) {
            Err(DomainError::Validation { message }) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn publish_validation_checks_each_rule() {
        let ok = fields("标题三字", "内容长度正好足够十个字", "React");
        assert!(validate_publish(&ok).is_ok());

        assert_eq!(
            validation_message(&fields("  ", "long enough body", "React")),
            "请输入博客标题"
        );
        assert_eq!(
            validation_message(&fields("ab", "long enough body", "React")),
            "标题长度至少为3个字符"
        );
        assert_eq!(
            validation_message(&fields(&"长".repeat(101), "long enough body", "React")),
            "标题长度不能超过100个字符"
        );
        assert_eq!(
            validation_message(&fields("title", "", "React")),
            "请输入博客内容"
        );
        assert_eq!(
            validation_message(&fields("title", "短内容", "React")),
            "内容长度至少为10个字符"
        );
        assert_eq!(
            validation_message(&fields("title", "long enough body", "")),
            "请选择博客分类"
        );
    }

    #[test]
    fn publish_validation_measures_characters_not_bytes() {
        // Three CJK characters are nine bytes but still a valid title.
        let cjk = fields("标题字", "内容内容内容内容内容", "Vue");
        assert!(validate_publish(&cjk).is_ok());
    }
}
