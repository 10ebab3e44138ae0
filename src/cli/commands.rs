use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use crate::app::{ActionDispatcher, App, ScreenOutcome};
use crate::config::AppConfig;
use crate::feedback::{
    locate, Category, EditSession, FeedbackCollection, FeedbackId, FeedbackRecord,
    LocatedFeedback, Status,
};
use crate::storage::{StorageHandle, StoreError};

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Feedback id as shown on the board
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct IdArgs {
    /// Feedback identifier
    pub id: FeedbackId,
}

#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Feedback identifier
    pub id: FeedbackId,
    /// New title
    #[arg(long)]
    pub title: Option<String>,
    /// New category (UI, UX, Enhancement, Bug, Feature)
    #[arg(long)]
    pub category: Option<Category>,
    /// New status (Suggestion, Planned, In-Progress, Live)
    #[arg(long)]
    pub status: Option<Status>,
    /// New description
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Feedback identifier
    pub id: FeedbackId,
    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// JSON board file. If omitted, reads from stdin.
    #[arg()]
    pub path: Option<PathBuf>,
}

pub fn run_edit(config: Arc<AppConfig>, storage: StorageHandle, args: EditArgs) -> Result<()> {
    let mut app = App::new(config, storage, args.id)?;
    match app.run()? {
        ScreenOutcome::Saved(id) => println!("Saved feedback #{id}"),
        ScreenOutcome::Deleted(id) => println!("Deleted feedback #{id}"),
        ScreenOutcome::Cancelled => println!("Edit canceled"),
        ScreenOutcome::Left => {}
    }
    Ok(())
}

pub fn run_show(storage: &StorageHandle, args: &IdArgs) -> Result<String> {
    let collection = storage.fetch_collection().context("loading feedback board")?;
    let upvoted = storage.fetch_upvoted_ids()?;
    let located = find(&collection, args.id)?;
    let record = &located.record;

    let mut out = String::new();
    let _ = writeln!(&mut out, "#{}  {}", record.id, record.title);
    let _ = writeln!(&mut out, "    status    {}", located.status);
    let _ = writeln!(&mut out, "    category  {}", record.category);
    let _ = writeln!(
        &mut out,
        "    upvotes   {}{}",
        record.upvotes,
        if upvoted.contains(&record.id) {
            " (upvoted)"
        } else {
            ""
        }
    );
    let _ = writeln!(&mut out, "    comments  {}", record.comment_count());
    if !record.description.is_empty() {
        out.push('\n');
        for line in record.description.lines() {
            let _ = writeln!(&mut out, "    {line}");
        }
    }
    Ok(out)
}

pub fn run_list(storage: &StorageHandle) -> Result<String> {
    let collection = storage.fetch_collection().context("loading feedback board")?;
    let upvoted = storage.fetch_upvoted_ids()?;
    let mut out = String::new();
    for (status, records) in collection.partitions() {
        let _ = writeln!(&mut out, "{status} ({})", records.len());
        if records.is_empty() {
            let _ = writeln!(&mut out, "    (empty)");
        }
        for record in records {
            let marker = if upvoted.contains(&record.id) { "▲" } else { "△" };
            let _ = writeln!(
                &mut out,
                "    #{:<4} {}  [{}]  {marker}{}",
                record.id, record.title, record.category, record.upvotes
            );
        }
        out.push('\n');
    }
    Ok(out)
}

/// Seeds a session from the stored record, applies the given edits and saves.
pub fn run_update(config: &AppConfig, storage: &StorageHandle, args: &UpdateArgs) -> Result<String> {
    let collection = storage.fetch_collection().context("loading feedback board")?;
    let located = find(&collection, args.id)?;
    let mut session = EditSession::seed(Some(located));

    if let Some(title) = &args.title {
        session.edit_title(title.as_str())?;
    }
    if let Some(category) = args.category {
        session.edit_category(category)?;
    }
    if let Some(status) = args.status {
        session.edit_status(status)?;
    }
    if let Some(description) = &args.description {
        session.edit_description(description.as_str())?;
    }

    session.normalize_title(config.editor.max_title_len)?;

    if !session.is_dirty() {
        session.cancel()?;
        return Ok(format!("No changes for feedback #{}\n", args.id));
    }

    let mut dispatcher = ActionDispatcher::new(storage);
    session.save(&mut dispatcher)?;
    dispatcher
        .finish()
        .with_context(|| format!("saving feedback #{}", args.id))?;
    Ok(format!("Updated feedback #{}\n", args.id))
}

/// Requests and confirms delete through an edit session. `confirm` is asked
/// unless `--yes` was given.
pub fn run_delete<F>(
    _config: &AppConfig,
    storage: &StorageHandle,
    args: &DeleteArgs,
    confirm: F,
) -> Result<String>
where
    F: FnOnce(&FeedbackRecord) -> Result<bool>,
{
    let collection = storage.fetch_collection().context("loading feedback board")?;
    let located = find(&collection, args.id)?;
    let record = located.record.clone();
    let mut session = EditSession::seed(Some(located));
    session.request_delete()?;

    if !args.yes && !confirm(&record)? {
        session.cancel_delete()?;
        session.cancel()?;
        return Ok("Delete aborted\n".to_string());
    }

    let mut dispatcher = ActionDispatcher::new(storage);
    let id = session.confirm_delete(&mut dispatcher)?;
    dispatcher
        .finish()
        .with_context(|| format!("deleting feedback #{id}"))?;
    Ok(format!("Deleted feedback #{id} ({})\n", record.title))
}

/// Interactive yes/no prompt; refuses outright when stdin is not a terminal.
pub fn confirm_on_terminal(record: &FeedbackRecord) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        bail!("refusing to delete without --yes when stdin is not a terminal");
    }
    let answer = prompt(&format!(
        "Delete feedback #{} '{}'? [y/N]",
        record.id, record.title
    ))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

pub fn run_upvote(storage: &StorageHandle, args: &IdArgs) -> Result<String> {
    let upvoted = storage
        .toggle_upvote(args.id)
        .with_context(|| format!("toggling upvote on feedback #{}", args.id))?;
    let collection = storage.fetch_collection()?;
    let count = find(&collection, args.id)?.record.upvotes;
    if upvoted {
        Ok(format!("Upvoted feedback #{} ({count} upvotes)\n", args.id))
    } else {
        Ok(format!(
            "Removed upvote from feedback #{} ({count} upvotes)\n",
            args.id
        ))
    }
}

pub fn run_import(storage: &StorageHandle, args: &ImportArgs) -> Result<String> {
    let raw = match &args.path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading import file {}", path.display()))?,
        None => match read_stdin()? {
            Some(raw) => raw,
            None => bail!("nothing to import: pass a file or pipe JSON on stdin"),
        },
    };
    let collection: FeedbackCollection =
        serde_json::from_str(&raw).context("parsing feedback JSON")?;
    let duplicates = collection.duplicate_ids();
    if !duplicates.is_empty() {
        let ids = duplicates
            .iter()
            .map(|id| format!("#{id}"))
            .collect::<Vec<_>>()
            .join(", ");
        bail!("import repeats feedback ids {ids}");
    }
    let imported = storage
        .import_collection(&collection)
        .context("importing feedback")?;
    Ok(format!(
        "Imported {imported} feedback record{}\n",
        if imported == 1 { "" } else { "s" }
    ))
}

fn find(collection: &FeedbackCollection, id: FeedbackId) -> Result<LocatedFeedback> {
    locate(collection, id).ok_or_else(|| StoreError::NotFound(id).into())
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{} ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}
