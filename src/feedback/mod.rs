//! Feedback records, the status-partitioned board they live in, and the edit
//! session that drives the edit screen.

pub mod locator;
pub mod model;
pub mod session;

pub use locator::{locate, locate_param, parse_identifier, Locator};
pub use model::{
    cycle_in, Category, EditedFeedback, FeedbackCollection, FeedbackId, FeedbackRecord,
    LocatedFeedback, Status, UpvotedIds,
};
pub use session::{
    DeletePreview, EditDraft, EditSession, FeedbackSink, SessionError, SessionPhase,
};
