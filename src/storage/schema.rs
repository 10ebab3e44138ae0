use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS feedback (
            id INTEGER PRIMARY KEY,
            status TEXT NOT NULL,
            position INTEGER NOT NULL,
            title TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            upvotes INTEGER NOT NULL DEFAULT 0,
            comments TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS feedback_status_position
            ON feedback(status, position);

        CREATE TABLE IF NOT EXISTS upvotes (
            feedback_id INTEGER PRIMARY KEY,
            FOREIGN KEY (feedback_id) REFERENCES feedback(id) ON DELETE CASCADE
        );

        CREATE TRIGGER IF NOT EXISTS feedback_touch_updated
        AFTER UPDATE OF title, category, description, status ON feedback
        BEGIN
            UPDATE feedback SET updated_at = strftime('%s', 'now') WHERE id = new.id;
        END;
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
