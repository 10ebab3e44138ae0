use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::config::DbConfig;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};
use crate::feedback::{
    EditedFeedback, FeedbackCollection, FeedbackId, FeedbackRecord, Status, UpvotedIds,
};

mod schema;

const FEEDBACK_COLUMNS: &str = "id, status, title, category, description, upvotes, comments";

const SAMPLE_BOARD: &str = r#"{
    "Suggestion": [
        {
            "id": 1,
            "title": "Add tags for solutions",
            "category": "Enhancement",
            "upvotes": 112,
            "description": "Easier to search for solutions based on a specific stack.",
            "comments": [
                {"id": 1, "content": "Tagging by stack would help a lot when browsing.", "user": {"name": "Suzanne Chang", "username": "upbeat1811"}}
            ]
        },
        {
            "id": 2,
            "title": "Add a dark theme option",
            "category": "Feature",
            "upvotes": 99,
            "description": "It would help people with light sensitivities and who prefer dark mode.",
            "comments": []
        }
    ],
    "Planned": [
        {
            "id": 3,
            "title": "More comprehensive reports",
            "category": "Feature",
            "upvotes": 123,
            "description": "It would be great to see a more detailed breakdown of solutions.",
            "comments": []
        }
    ],
    "In-Progress": [
        {
            "id": 4,
            "title": "One-click portfolio generation",
            "category": "Feature",
            "upvotes": 62,
            "description": "Add ability to create professional looking portfolio from profile.",
            "comments": []
        }
    ],
    "Live": [
        {
            "id": 5,
            "title": "Animated solution screenshots",
            "category": "Bug",
            "upvotes": 9,
            "description": "Screenshots of solutions with animations don't display correctly.",
            "comments": []
        }
    ]
}"#;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("feedback #{0} already exists")]
    DuplicateId(FeedbackId),
    #[error("feedback #{0} not found")]
    NotFound(FeedbackId),
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn fetch_collection(&self) -> Result<FeedbackCollection> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {FEEDBACK_COLUMNS}
                 FROM feedback
                 ORDER BY position ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], read_feedback_row)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("reading feedback rows")?;
            let mut collection = FeedbackCollection::with_all_statuses();
            for (status, record) in rows {
                collection.push(status, record);
            }
            Ok(collection)
        })
    }

    pub fn fetch_upvoted_ids(&self) -> Result<UpvotedIds> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT feedback_id FROM upvotes")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, FeedbackId>(0))?
                .collect::<rusqlite::Result<UpvotedIds>>()
                .context("reading upvotes")?;
            Ok(ids)
        })
    }

    pub fn insert_feedback(&self, status: Status, record: &FeedbackRecord) -> Result<()> {
        self.with_connection(|conn| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            insert_record(conn, status, record, now)
        })
    }

    pub fn import_collection(&self, collection: &FeedbackCollection) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().context("starting import transaction")?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let mut imported = 0;
        for (status, records) in collection.partitions() {
            for record in records {
                insert_record(&tx, status, record, now)?;
                imported += 1;
            }
        }
        tx.commit().context("committing import")?;
        tracing::info!(imported, "imported feedback collection");
        Ok(imported)
    }

    pub fn save_changes(&self, edited: &EditedFeedback) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().context("starting save transaction")?;
        let id = edited.id();
        let current: Option<String> = tx
            .query_row("SELECT status FROM feedback WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()
            .context("looking up feedback status")?;
        let Some(current) = current else {
            return Err(StoreError::NotFound(id).into());
        };

        let record = &edited.record;
        if current == edited.status.as_ref() {
            tx.execute(
                "UPDATE feedback
                 SET title = ?2, category = ?3, description = ?4
                 WHERE id = ?1",
                params![
                    id,
                    record.title,
                    record.category.as_ref(),
                    record.description
                ],
            )
            .with_context(|| format!("updating feedback #{id}"))?;
        } else {
            // moved records go to the end of their new partition
            let position = next_position(&tx, edited.status)?;
            tx.execute(
                "UPDATE feedback
                 SET title = ?2, category = ?3, description = ?4, status = ?5, position = ?6
                 WHERE id = ?1",
                params![
                    id,
                    record.title,
                    record.category.as_ref(),
                    record.description,
                    edited.status.as_ref(),
                    position
                ],
            )
            .with_context(|| format!("moving feedback #{id} to {}", edited.status))?;
            tracing::info!(id, from = %current, to = %edited.status, "feedback changed status");
        }
        tx.commit().context("committing save")?;
        Ok(())
    }

    pub fn delete_feedback(&self, id: FeedbackId) -> Result<()> {
        self.with_connection(|conn| {
            let removed = conn
                .execute("DELETE FROM feedback WHERE id = ?1", [id])
                .with_context(|| format!("deleting feedback #{id}"))?;
            if removed == 0 {
                return Err(StoreError::NotFound(id).into());
            }
            tracing::info!(id, "deleted feedback");
            Ok(())
        })
    }

    pub fn toggle_upvote(&self, id: FeedbackId) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().context("starting upvote transaction")?;
        ensure_feedback_exists(&tx, id)?;
        let upvoted = tx
            .query_row(
                "SELECT 1 FROM upvotes WHERE feedback_id = ?1",
                [id],
                |_| Ok(()),
            )
            .optional()
            .context("checking upvote")?
            .is_some();
        if upvoted {
            tx.execute("DELETE FROM upvotes WHERE feedback_id = ?1", [id])?;
            tx.execute(
                "UPDATE feedback SET upvotes = MAX(upvotes - 1, 0) WHERE id = ?1",
                [id],
            )?;
        } else {
            tx.execute("INSERT INTO upvotes (feedback_id) VALUES (?1)", [id])?;
            tx.execute("UPDATE feedback SET upvotes = upvotes + 1 WHERE id = ?1", [id])?;
        }
        tx.commit().context("committing upvote")?;
        Ok(!upvoted)
    }

    pub fn export_collection(&self) -> Result<String> {
        let collection = self.fetch_collection()?;
        serde_json::to_string_pretty(&collection).context("serializing feedback collection")
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &paths.database_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    if !existed && storage.seed_sample_data {
        seed_sample_feedback(&conn)?;
    }
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)
        .context("enabling foreign keys")?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

fn seed_sample_feedback(conn: &Connection) -> Result<()> {
    let existing: Option<i64> = conn
        .query_row("SELECT id FROM feedback LIMIT 1", [], |row| row.get(0))
        .optional()
        .context("checking for existing feedback")?;
    if existing.is_some() {
        return Ok(());
    }

    tracing::info!("seeding first-run feedback");
    let board: FeedbackCollection =
        serde_json::from_str(SAMPLE_BOARD).context("parsing sample feedback")?;
    let now = OffsetDateTime::now_utc().unix_timestamp();
    for (status, records) in board.partitions() {
        for record in records {
            insert_record(conn, status, record, now)?;
        }
    }
    Ok(())
}

fn insert_record(
    conn: &Connection,
    status: Status,
    record: &FeedbackRecord,
    now: i64,
) -> Result<()> {
    let exists = conn
        .query_row("SELECT 1 FROM feedback WHERE id = ?1", [record.id], |_| Ok(()))
        .optional()
        .context("checking feedback id")?
        .is_some();
    if exists {
        return Err(StoreError::DuplicateId(record.id).into());
    }
    let position = next_position(conn, status)?;
    let comments = serde_json::to_string(&record.comments).context("encoding comments")?;
    conn.execute(
        "INSERT INTO feedback
            (id, status, position, title, category, description, upvotes, comments, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            record.id,
            status.as_ref(),
            position,
            record.title,
            record.category.as_ref(),
            record.description,
            record.upvotes,
            comments,
            now
        ],
    )
    .with_context(|| format!("inserting feedback #{}", record.id))?;
    Ok(())
}

fn ensure_feedback_exists(conn: &Connection, id: FeedbackId) -> Result<()> {
    let exists = conn
        .query_row("SELECT 1 FROM feedback WHERE id = ?1", [id], |_| Ok(()))
        .optional()
        .context("checking feedback id")?
        .is_some();
    if !exists {
        return Err(StoreError::NotFound(id).into());
    }
    Ok(())
}

fn next_position(conn: &Connection, status: Status) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM feedback WHERE status = ?1",
        [status.as_ref()],
        |row| row.get(0),
    )
    .context("computing partition position")
}

fn read_feedback_row(row: &Row<'_>) -> rusqlite::Result<(Status, FeedbackRecord)> {
    let status: String = row.get(1)?;
    let category: String = row.get(3)?;
    let comments: String = row.get(6)?;
    let record = FeedbackRecord {
        id: row.get(0)?,
        title: row.get(2)?,
        category: parse_column(3, &category)?,
        description: row.get(4)?,
        upvotes: row.get(5)?,
        comments: serde_json::from_str(&comments).map_err(|err| conversion_error(6, err))?,
    };
    Ok((parse_column(1, &status)?, record))
}

fn parse_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    raw.parse().map_err(|err| conversion_error(idx, err))
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: StdError + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, StorageOptions};
    use crate::feedback::{locate, Category};
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn init_storage(seed: bool) -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted(temp.path());
        paths.ensure_directories()?;
        let mut opts = StorageOptions::default();
        opts.database_path = paths.database_path.clone();
        opts.seed_sample_data = seed;
        let storage = init(&paths, &opts)?;
        Ok((temp, storage))
    }

    fn store_error(err: &anyhow::Error) -> Option<&StoreError> {
        err.downcast_ref::<StoreError>()
    }

    #[test]
    fn first_run_seeds_every_partition() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage(true)?;
        let collection = storage.fetch_collection()?;
        let statuses = collection.statuses().collect::<Vec<_>>();
        assert_eq!(
            statuses,
            vec![
                Status::Suggestion,
                Status::Planned,
                Status::InProgress,
                Status::Live
            ]
        );
        assert_eq!(collection.partition(Status::Suggestion).len(), 2);
        let found = locate(&collection, 1).expect("seeded record");
        assert_eq!(found.record.category, Category::Enhancement);
        assert_eq!(found.record.comment_count(), 1);
        assert!(storage.fetch_upvoted_ids()?.is_empty());
        Ok(())
    }

    #[test]
    fn empty_store_still_lists_all_statuses() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage(false)?;
        let collection = storage.fetch_collection()?;
        assert!(collection.is_empty());
        assert_eq!(collection.statuses().count(), 4);
        Ok(())
    }

    #[test]
    fn insert_rejects_ids_used_in_other_partitions() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage(false)?;
        storage.insert_feedback(Status::Planned, &FeedbackRecord::new(7, "A", Category::Ui))?;
        let err = storage
            .insert_feedback(Status::Live, &FeedbackRecord::new(7, "B", Category::Bug))
            .unwrap_err();
        assert_matches!(store_error(&err), Some(StoreError::DuplicateId(7)));
        assert_eq!(storage.fetch_collection()?.len(), 1);
        Ok(())
    }

    #[test]
    fn import_is_all_or_nothing() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage(false)?;
        storage.insert_feedback(Status::Live, &FeedbackRecord::new(3, "taken", Category::Ui))?;

        let mut incoming = FeedbackCollection::new();
        incoming.push(Status::Suggestion, FeedbackRecord::new(1, "one", Category::Ui));
        incoming.push(Status::Planned, FeedbackRecord::new(3, "clash", Category::Ux));
        let err = storage.import_collection(&incoming).unwrap_err();
        assert_matches!(store_error(&err), Some(StoreError::DuplicateId(3)));

        let collection = storage.fetch_collection()?;
        assert_eq!(collection.len(), 1);
        assert!(!collection.contains_id(1));
        Ok(())
    }

    #[test]
    fn save_updates_fields_in_place() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage(true)?;
        let collection = storage.fetch_collection()?;
        let mut located = locate(&collection, 2).expect("record 2");
        located.record.title = "Dark mode".into();
        located.record.category = Category::Ux;
        located.record.description = "Please".into();
        storage.save_changes(&EditedFeedback {
            record: located.record,
            status: Status::Suggestion,
        })?;

        let after = storage.fetch_collection()?;
        let suggestions = after.partition(Status::Suggestion);
        assert_eq!(suggestions[1].id, 2);
        assert_eq!(suggestions[1].title, "Dark mode");
        assert_eq!(suggestions[1].category, Category::Ux);
        assert_eq!(suggestions[1].description, "Please");
        assert_eq!(suggestions[1].upvotes, 99);
        Ok(())
    }

    #[test]
    fn status_change_appends_to_new_partition() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage(true)?;
        let collection = storage.fetch_collection()?;
        let located = locate(&collection, 1).expect("record 1");
        storage.save_changes(&EditedFeedback {
            record: located.record,
            status: Status::Planned,
        })?;

        let after = storage.fetch_collection()?;
        let planned = after
            .partition(Status::Planned)
            .iter()
            .map(|record| record.id)
            .collect::<Vec<_>>();
        assert_eq!(planned, vec![3, 1]);
        assert_eq!(locate(&after, 1).map(|found| found.status), Some(Status::Planned));
        Ok(())
    }

    #[test]
    fn save_and_delete_report_missing_records() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage(false)?;
        let err = storage
            .save_changes(&EditedFeedback {
                record: FeedbackRecord::new(40, "ghost", Category::Ui),
                status: Status::Live,
            })
            .unwrap_err();
        assert_matches!(store_error(&err), Some(StoreError::NotFound(40)));

        let err = storage.delete_feedback(40).unwrap_err();
        assert_matches!(store_error(&err), Some(StoreError::NotFound(40)));
        Ok(())
    }

    #[test]
    fn delete_cascades_upvotes() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage(true)?;
        assert!(storage.toggle_upvote(4)?);
        assert!(storage.fetch_upvoted_ids()?.contains(&4));

        storage.delete_feedback(4)?;
        let collection = storage.fetch_collection()?;
        assert!(locate(&collection, 4).is_none());
        assert!(collection.partition(Status::InProgress).is_empty());
        assert!(storage.fetch_upvoted_ids()?.is_empty());
        Ok(())
    }

    #[test]
    fn toggle_upvote_adjusts_count() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage(true)?;
        assert!(storage.toggle_upvote(5)?);
        let upvotes = |storage: &StorageHandle| -> anyhow::Result<u32> {
            let collection = storage.fetch_collection()?;
            Ok(locate(&collection, 5).expect("record 5").record.upvotes)
        };
        assert_eq!(upvotes(&storage)?, 10);
        assert!(!storage.toggle_upvote(5)?);
        assert_eq!(upvotes(&storage)?, 9);

        let err = storage.toggle_upvote(77).unwrap_err();
        assert_matches!(store_error(&err), Some(StoreError::NotFound(77)));
        Ok(())
    }

    #[test]
    fn export_feeds_back_into_import() -> anyhow::Result<()> {
        let (_temp, source) = init_storage(true)?;
        let exported = source.export_collection()?;
        assert!(exported.contains("\"In-Progress\""));

        let parsed: FeedbackCollection = serde_json::from_str(&exported)?;
        let (_other, target) = init_storage(false)?;
        assert_eq!(target.import_collection(&parsed)?, 5);
        assert_eq!(target.fetch_collection()?, source.fetch_collection()?);
        Ok(())
    }
}
