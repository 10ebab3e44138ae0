use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use super::model::{
    Category, EditedFeedback, FeedbackId, FeedbackRecord, LocatedFeedback, Status, UpvotedIds,
};

/// Receives the intents an edit session produces. Implementations own
/// persistence and any failure reporting; the session never observes a result.
pub trait FeedbackSink {
    fn save_changes(&mut self, edited: EditedFeedback);
    fn delete(&mut self, id: FeedbackId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub title: String,
    pub category: Category,
    pub status: Status,
    pub description: String,
}

impl Default for EditDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            category: Category::Ui,
            status: Status::Suggestion,
            description: String::new(),
        }
    }
}

impl EditDraft {
    pub fn seeded(located: &LocatedFeedback) -> Self {
        let record = &located.record;
        Self {
            title: record.title.clone(),
            category: record.category,
            status: located.status,
            description: record.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Editing,
    ConfirmingDelete,
    Saved,
    Deleted,
    Cancelled,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionPhase::Saved | SessionPhase::Deleted | SessionPhase::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("edit session already ended ({0:?})")]
    Ended(SessionPhase),
    #[error("no feedback record is loaded")]
    NoRecord,
    #[error("delete was not requested")]
    DeleteNotRequested,
    #[error("title is {length} characters, the limit is {limit}")]
    TitleTooLong { length: usize, limit: usize },
}

/// What the delete confirmation shows: the record as it was located, not the
/// draft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeletePreview<'a> {
    pub record: &'a FeedbackRecord,
    pub status: Status,
    pub upvoted: bool,
}

/// One edit interaction, from seeding to save, delete or cancel.
#[derive(Debug, Clone)]
pub struct EditSession {
    original: Option<LocatedFeedback>,
    seeded: EditDraft,
    draft: EditDraft,
    phase: SessionPhase,
}

impl EditSession {
    pub fn seed(located: Option<LocatedFeedback>) -> Self {
        let draft = located
            .as_ref()
            .map(EditDraft::seeded)
            .unwrap_or_default();
        tracing::debug!(
            id = ?located.as_ref().map(|found| found.record.id),
            "seeded edit session"
        );
        Self {
            original: located,
            seeded: draft.clone(),
            draft,
            phase: SessionPhase::Editing,
        }
    }

    pub fn original(&self) -> Option<&LocatedFeedback> {
        self.original.as_ref()
    }

    pub fn record_id(&self) -> Option<FeedbackId> {
        self.original.as_ref().map(|located| located.record.id)
    }

    pub fn is_found(&self) -> bool {
        self.original.is_some()
    }

    pub fn draft(&self) -> &EditDraft {
        &self.draft
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        !self.phase.is_terminal()
    }

    pub fn is_confirming_delete(&self) -> bool {
        self.phase == SessionPhase::ConfirmingDelete
    }

    /// Whether the draft differs from what it was seeded with.
    pub fn is_dirty(&self) -> bool {
        self.draft != self.seeded
    }

    pub fn edit_title(&mut self, title: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.draft.title = title.into();
        Ok(())
    }

    pub fn edit_category(&mut self, category: Category) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.draft.category = category;
        Ok(())
    }

    pub fn edit_status(&mut self, status: Status) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.draft.status = status;
        Ok(())
    }

    pub fn edit_description(&mut self, description: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.draft.description = description.into();
        Ok(())
    }

    /// Trims the draft title and checks it against `limit` graphemes.
    pub fn normalize_title(&mut self, limit: usize) -> Result<(), SessionError> {
        self.ensure_active()?;
        let title = self.draft.title.trim();
        let length = title.graphemes(true).count();
        if length > limit {
            return Err(SessionError::TitleTooLong { length, limit });
        }
        if title.len() != self.draft.title.len() {
            self.draft.title = title.to_string();
        }
        Ok(())
    }

    pub fn request_delete(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        if self.original.is_none() {
            return Err(SessionError::NoRecord);
        }
        self.phase = SessionPhase::ConfirmingDelete;
        Ok(())
    }

    pub fn cancel_delete(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.phase = SessionPhase::Editing;
        Ok(())
    }

    pub fn delete_preview<'a>(&'a self, upvoted: &UpvotedIds) -> Option<DeletePreview<'a>> {
        if !self.is_confirming_delete() {
            return None;
        }
        self.original.as_ref().map(|located| DeletePreview {
            record: &located.record,
            status: located.status,
            upvoted: upvoted.contains(&located.record.id),
        })
    }

    /// Hands the located identifier to `sink` and ends the session.
    pub fn confirm_delete<S>(&mut self, sink: &mut S) -> Result<FeedbackId, SessionError>
    where
        S: FeedbackSink + ?Sized,
    {
        self.ensure_active()?;
        if !self.is_confirming_delete() {
            return Err(SessionError::DeleteNotRequested);
        }
        let id = self.record_id().ok_or(SessionError::NoRecord)?;
        self.phase = SessionPhase::Deleted;
        tracing::debug!(id, "edit session confirmed delete");
        sink.delete(id);
        Ok(id)
    }

    /// Hands the full draft to `sink` and ends the session.
    pub fn save<S>(&mut self, sink: &mut S) -> Result<(), SessionError>
    where
        S: FeedbackSink + ?Sized,
    {
        self.ensure_active()?;
        let edited = self.edited_record().ok_or(SessionError::NoRecord)?;
        self.phase = SessionPhase::Saved;
        tracing::debug!(id = edited.id(), status = %edited.status, "edit session saved");
        sink.save_changes(edited);
        Ok(())
    }

    /// Discards the draft without notifying anyone.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.phase = SessionPhase::Cancelled;
        self.draft = self.seeded.clone();
        Ok(())
    }

    /// The record as it would be saved right now.
    pub fn edited_record(&self) -> Option<EditedFeedback> {
        let located = self.original.as_ref()?;
        let record = FeedbackRecord {
            id: located.record.id,
            title: self.draft.title.clone(),
            category: self.draft.category,
            upvotes: located.record.upvotes,
            description: self.draft.description.clone(),
            comments: located.record.comments.clone(),
        };
        Some(EditedFeedback {
            record,
            status: self.draft.status,
        })
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.phase.is_terminal() {
            return Err(SessionError::Ended(self.phase));
        }
        Ok(())
    }
}
