use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

pub type FeedbackId = i64;

/// Set of feedback identifiers the current user has upvoted.
pub type UpvotedIds = HashSet<FeedbackId>;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    #[default]
    #[serde(rename = "UI")]
    #[strum(serialize = "UI")]
    Ui,
    #[serde(rename = "UX")]
    #[strum(serialize = "UX")]
    Ux,
    Enhancement,
    Bug,
    Feature,
}

impl Category {
    pub fn cycle(self, delta: isize) -> Self {
        cycle_in(&Self::iter().collect::<Vec<_>>(), self, delta)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Status {
    #[default]
    Suggestion,
    Planned,
    #[serde(rename = "In-Progress")]
    #[strum(serialize = "In-Progress")]
    InProgress,
    Live,
}

/// Steps `delta` places through `items` starting at `current`, wrapping at
/// both ends. A value missing from `items` snaps to the first entry.
pub fn cycle_in<T: Copy + PartialEq>(items: &[T], current: T, delta: isize) -> T {
    if items.is_empty() {
        return current;
    }
    let Some(index) = items.iter().position(|item| *item == current) else {
        return items[0];
    };
    let len = items.len() as isize;
    let next = (index as isize + delta).rem_euclid(len);
    items[next as usize]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: FeedbackId,
    pub title: String,
    pub category: Category,
    #[serde(default)]
    pub upvotes: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub comments: Vec<serde_json::Value>,
}

impl FeedbackRecord {
    pub fn new(id: FeedbackId, title: impl Into<String>, category: Category) -> Self {
        Self {
            id,
            title: title.into(),
            category,
            upvotes: 0,
            description: String::new(),
            comments: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_upvotes(mut self, upvotes: u32) -> Self {
        self.upvotes = upvotes;
        self
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

/// Feedback grouped by status, in insertion order.
///
/// Identifiers are expected to be unique across every partition. The
/// collection itself does not enforce that; the store rejects duplicates when
/// records are admitted, and [`FeedbackCollection::duplicate_ids`] lets
/// importers check a collection before handing it over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackCollection {
    partitions: IndexMap<Status, Vec<FeedbackRecord>>,
}

impl FeedbackCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty collection with one partition per status, in canonical order.
    pub fn with_all_statuses() -> Self {
        let partitions = Status::iter().map(|status| (status, Vec::new())).collect();
        Self { partitions }
    }

    pub fn push(&mut self, status: Status, record: FeedbackRecord) {
        self.partitions.entry(status).or_default().push(record);
    }

    pub fn statuses(&self) -> impl Iterator<Item = Status> + '_ {
        self.partitions.keys().copied()
    }

    pub fn partitions(&self) -> impl Iterator<Item = (Status, &[FeedbackRecord])> + '_ {
        self.partitions
            .iter()
            .map(|(status, records)| (*status, records.as_slice()))
    }

    pub fn partition(&self, status: Status) -> &[FeedbackRecord] {
        self.partitions
            .get(&status)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_id(&self, id: FeedbackId) -> bool {
        self.partitions
            .values()
            .flatten()
            .any(|record| record.id == id)
    }

    /// Identifiers that appear more than once, in first-seen order.
    pub fn duplicate_ids(&self) -> Vec<FeedbackId> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for record in self.partitions.values().flatten() {
            if !seen.insert(record.id) && !duplicates.contains(&record.id) {
                duplicates.push(record.id);
            }
        }
        duplicates
    }
}

/// A record together with the status partition it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedFeedback {
    pub record: FeedbackRecord,
    pub status: Status,
}

/// Payload handed to the save callback: the full edited record and the
/// status it should end up in.
#[derive(Debug, Clone, PartialEq)]
pub struct EditedFeedback {
    pub record: FeedbackRecord,
    pub status: Status,
}

impl EditedFeedback {
    pub fn id(&self) -> FeedbackId {
        self.record.id
    }
}
