use std::sync::Arc;

use super::model::{FeedbackCollection, FeedbackId, LocatedFeedback};

/// Parses a routing parameter into an identifier. Missing, blank or
/// non-numeric input has no identifier.
pub fn parse_identifier(raw: &str) -> Option<FeedbackId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

/// Finds the record with `id` and the status partition holding it.
///
/// Partitions are scanned in collection order and records in sequence order;
/// the first match wins.
pub fn locate(collection: &FeedbackCollection, id: FeedbackId) -> Option<LocatedFeedback> {
    collection.partitions().find_map(|(status, records)| {
        records
            .iter()
            .find(|record| record.id == id)
            .map(|record| LocatedFeedback {
                record: record.clone(),
                status,
            })
    })
}

/// [`locate`] for a raw routing parameter.
pub fn locate_param(collection: &FeedbackCollection, raw: &str) -> Option<LocatedFeedback> {
    parse_identifier(raw).and_then(|id| locate(collection, id))
}

/// Memoizes the last lookup, keyed on the collection's identity and the id.
///
/// Handing in a different `Arc` (even with equal contents) or a different id
/// recomputes; nothing else is cached.
#[derive(Debug, Default)]
pub struct Locator {
    cached: Option<CachedLookup>,
}

#[derive(Debug)]
struct CachedLookup {
    collection: Arc<FeedbackCollection>,
    id: Option<FeedbackId>,
    result: Option<LocatedFeedback>,
}

impl Locator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locate(
        &mut self,
        collection: &Arc<FeedbackCollection>,
        id: Option<FeedbackId>,
    ) -> Option<&LocatedFeedback> {
        let hit = matches!(
            &self.cached,
            Some(cached) if Arc::ptr_eq(&cached.collection, collection) && cached.id == id
        );
        if !hit {
            let result = id.and_then(|id| locate(collection, id));
            tracing::trace!(?id, found = result.is_some(), "recomputed feedback lookup");
            self.cached = Some(CachedLookup {
                collection: Arc::clone(collection),
                id,
                result,
            });
        }
        self.cached.as_ref().and_then(|cached| cached.result.as_ref())
    }

    pub fn locate_param(
        &mut self,
        collection: &Arc<FeedbackCollection>,
        raw: &str,
    ) -> Option<&LocatedFeedback> {
        self.locate(collection, parse_identifier(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::model::{Category, FeedbackRecord, Status};

    fn board() -> FeedbackCollection {
        let mut collection = FeedbackCollection::with_all_statuses();
        collection.push(Status::Suggestion, FeedbackRecord::new(1, "A", Category::Ui));
        collection.push(Status::Planned, FeedbackRecord::new(2, "B", Category::Feature));
        collection.push(Status::Planned, FeedbackRecord::new(3, "C", Category::Bug));
        collection.push(Status::Live, FeedbackRecord::new(7, "D", Category::Ux));
        collection
    }

    #[test]
    fn locate_reports_record_and_partition() {
        let collection = board();
        let found = locate_param(&collection, "2").expect("record 2");
        assert_eq!(found.record.title, "B");
        assert_eq!(found.status, Status::Planned);

        let live = locate(&collection, 7).expect("record 7");
        assert_eq!(live.status, Status::Live);
    }

    #[test]
    fn locate_misses_unknown_and_malformed_ids() {
        let collection = board();
        assert!(locate_param(&collection, "99").is_none());
        assert!(locate_param(&collection, "abc").is_none());
        assert!(locate_param(&collection, "").is_none());
        assert!(locate_param(&collection, "2.5").is_none());
    }

    #[test]
    fn parse_identifier_trims_whitespace() {
        assert_eq!(parse_identifier(" 12 "), Some(12));
        assert_eq!(parse_identifier("-3"), Some(-3));
        assert_eq!(parse_identifier("   "), None);
    }

    #[test]
    fn locate_is_idempotent() {
        let collection = board();
        assert_eq!(locate(&collection, 3), locate(&collection, 3));
        assert_eq!(locate(&collection, 42), locate(&collection, 42));
    }

    #[test]
    fn first_match_wins_when_ids_collide() {
        let mut collection = board();
        collection.push(Status::Live, FeedbackRecord::new(2, "shadow", Category::Ui));
        let found = locate(&collection, 2).expect("record 2");
        assert_eq!(found.status, Status::Planned);
        assert_eq!(found.record.title, "B");
    }

    #[test]
    fn locator_recomputes_when_collection_identity_changes() {
        let first = Arc::new(board());
        let mut locator = Locator::new();
        assert_eq!(
            locator.locate(&first, Some(1)).map(|found| found.status),
            Some(Status::Suggestion)
        );

        let mut moved = board();
        moved.push(Status::Live, FeedbackRecord::new(9, "E", Category::Ui));
        let second = Arc::new(moved);
        assert!(locator.locate(&first, Some(9)).is_none());
        assert_eq!(
            locator.locate(&second, Some(9)).map(|found| found.status),
            Some(Status::Live)
        );
        assert!(locator.locate_param(&second, "nope").is_none());
    }
}
