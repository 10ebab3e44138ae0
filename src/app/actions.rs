use anyhow::Result;

use crate::feedback::{EditedFeedback, FeedbackId, FeedbackSink};
use crate::storage::StorageHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Saved(FeedbackId),
    Deleted(FeedbackId),
}

pub struct ActionDispatcher<'a> {
    storage: &'a StorageHandle,
    outcome: Option<Result<Dispatched>>,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(storage: &'a StorageHandle) -> Self {
        Self {
            storage,
            outcome: None,
        }
    }

    pub fn finish(self) -> Result<Option<Dispatched>> {
        self.outcome.transpose()
    }
}

impl FeedbackSink for ActionDispatcher<'_> {
    fn save_changes(&mut self, edited: EditedFeedback) {
        let id = edited.id();
        let result = self.storage.save_changes(&edited);
        if let Err(err) = &result {
            tracing::error!(?err, id, "failed to save feedback");
        }
        self.outcome = Some(result.map(|()| Dispatched::Saved(id)));
    }

    fn delete(&mut self, id: FeedbackId) {
        let result = self.storage.delete_feedback(id);
        if let Err(err) = &result {
            tracing::error!(?err, id, "failed to delete feedback");
        }
        self.outcome = Some(result.map(|()| Dispatched::Deleted(id)));
    }
}
