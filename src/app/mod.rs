use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::feedback::{FeedbackCollection, FeedbackId, Locator, UpvotedIds};
use crate::storage::StorageHandle;
use crate::ui;

pub mod actions;
pub mod state;

pub use actions::{ActionDispatcher, Dispatched};
pub use state::{ButtonAction, CursorMove, EditScreenState, FormField, TextInput};

const EDIT_HINT: &str = "Tab next field • ←/→ change dropdown • Ctrl-s save • Ctrl-d delete • Esc cancel";

enum Action {
    Leave,
    Reload,
    FocusNext,
    FocusPrevious,
    Save,
    Cancel,
    RequestDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOutcome {
    Saved(FeedbackId),
    Deleted(FeedbackId),
    Cancelled,
    Left,
}

pub struct App {
    pub config: Arc<AppConfig>,
    pub storage: StorageHandle,
    target: String,
    collection: Arc<FeedbackCollection>,
    locator: Locator,
    state: EditScreenState,
    outcome: Option<ScreenOutcome>,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        storage: StorageHandle,
        target: impl Into<String>,
    ) -> Result<Self> {
        let target = target.into();
        let collection = Arc::new(
            storage
                .fetch_collection()
                .context("loading feedback board for edit screen")?,
        );
        let upvoted = storage
            .fetch_upvoted_ids()
            .context("loading upvotes for edit screen")?;
        let mut locator = Locator::new();
        let state = build_screen(&config, &mut locator, &collection, &target, upvoted);
        Ok(Self {
            config,
            storage,
            target,
            collection,
            locator,
            state,
            outcome: None,
            tick_rate: Duration::from_millis(250),
        })
    }

    pub fn run(&mut self) -> Result<ScreenOutcome> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result?;
        Ok(self.outcome.unwrap_or(ScreenOutcome::Left))
    }

    pub fn state(&self) -> &EditScreenState {
        &self.state
    }

    pub fn outcome(&self) -> Option<ScreenOutcome> {
        self.outcome
    }

    pub fn reload(&mut self) -> Result<()> {
        let collection = self
            .storage
            .fetch_collection()
            .context("reloading feedback board")?;
        let upvoted = self
            .storage
            .fetch_upvoted_ids()
            .context("reloading upvotes")?;
        self.collection = Arc::new(collection);
        self.state = build_screen(
            &self.config,
            &mut self.locator,
            &self.collection,
            &self.target,
            upvoted,
        );
        Ok(())
    }

    pub fn retarget(&mut self, target: impl Into<String>) -> Result<()> {
        self.target = target.into();
        let upvoted = self
            .storage
            .fetch_upvoted_ids()
            .context("loading upvotes for new target")?;
        self.state = build_screen(
            &self.config,
            &mut self.locator,
            &self.collection,
            &self.target,
            upvoted,
        );
        self.outcome = None;
        Ok(())
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal
                .draw(|frame| ui::draw_edit_screen(frame, &self.state))
                .context("rendering frame")?;

            if self.outcome.is_some() {
                break;
            }

            if event::poll(self.tick_rate).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // next draw picks up the new size
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.state.session().is_confirming_delete() {
            self.handle_delete_modal_key(key);
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if !self.state.session().is_found() {
            let action = match key.code {
                KeyCode::Esc | KeyCode::Char('q') => Some(Action::Leave),
                KeyCode::Char('c') if ctrl => Some(Action::Leave),
                KeyCode::Char('r') if ctrl => Some(Action::Reload),
                _ => None,
            };
            if let Some(action) = action {
                self.handle_action(action);
            }
            return;
        }

        let action = match key.code {
            KeyCode::Char('c') if ctrl => Some(Action::Leave),
            KeyCode::Char('s') if ctrl => Some(Action::Save),
            KeyCode::Char('d') if ctrl => Some(Action::RequestDelete),
            KeyCode::Char('r') if ctrl => Some(Action::Reload),
            KeyCode::Esc => Some(Action::Cancel),
            KeyCode::Tab => Some(Action::FocusNext),
            KeyCode::BackTab => Some(Action::FocusPrevious),
            _ => None,
        };
        if let Some(action) = action {
            self.handle_action(action);
            return;
        }

        let plain = !key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let focus_is_text = matches!(self.state.focus, FormField::Title | FormField::Description);
        match key.code {
            KeyCode::Enter => {
                if let Some(button) = self.state.input_enter() {
                    self.handle_button(button);
                }
            }
            KeyCode::Char(' ') if !focus_is_text => {
                if let Some(button) = self.state.input_enter() {
                    self.handle_button(button);
                }
            }
            KeyCode::Char(ch) if plain => {
                self.state.input_char(ch);
            }
            KeyCode::Backspace => {
                self.state.backspace();
            }
            KeyCode::Delete => {
                self.state.delete_forward();
            }
            KeyCode::Left => {
                self.state.move_cursor(CursorMove::Left);
            }
            KeyCode::Right => {
                self.state.move_cursor(CursorMove::Right);
            }
            KeyCode::Up => {
                self.state.move_cursor(CursorMove::Up);
            }
            KeyCode::Down => {
                self.state.move_cursor(CursorMove::Down);
            }
            KeyCode::Home => {
                self.state.move_cursor(CursorMove::Home);
            }
            KeyCode::End => {
                self.state.move_cursor(CursorMove::End);
            }
            _ => {}
        }
    }

    fn handle_delete_modal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char('y') => self.submit_delete(),
            KeyCode::Esc | KeyCode::Char('n') => match self.state.cancel_delete() {
                Ok(()) => self.state.set_status_message(Some("Delete canceled")),
                Err(err) => self.state.set_status_message(Some(err.to_string())),
            },
            _ => {}
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Leave => {
                if let Err(err) = self.state.cancel() {
                    tracing::debug!(%err, "leaving an already finished session");
                }
                self.outcome = Some(ScreenOutcome::Left);
            }
            Action::Reload => {
                if let Err(err) = self.reload() {
                    tracing::error!(?err, "failed to reload feedback board");
                    self.state
                        .set_status_message(Some("Could not reload feedback board"));
                } else {
                    self.state
                        .set_status_message(Some("Board reloaded; unsaved edits discarded"));
                }
            }
            Action::FocusNext => self.state.focus_next(),
            Action::FocusPrevious => self.state.focus_previous(),
            Action::Save => self.submit_save(),
            Action::Cancel => self.handle_button(ButtonAction::Cancel),
            Action::RequestDelete => self.handle_button(ButtonAction::RequestDelete),
        }
    }

    fn handle_button(&mut self, button: ButtonAction) {
        match button {
            ButtonAction::RequestDelete => match self.state.request_delete() {
                Ok(()) => self
                    .state
                    .set_status_message(Some("Delete feedback: Enter confirm • Esc cancel")),
                Err(err) => self.state.set_status_message(Some(err.to_string())),
            },
            ButtonAction::Cancel => {
                let outcome = match self.state.cancel() {
                    Ok(()) => ScreenOutcome::Cancelled,
                    Err(_) => ScreenOutcome::Left,
                };
                self.outcome = Some(outcome);
            }
            ButtonAction::Save => self.submit_save(),
        }
    }

    fn submit_save(&mut self) {
        let mut dispatcher = ActionDispatcher::new(&self.storage);
        if let Err(err) = self.state.save(&mut dispatcher) {
            self.state.set_status_message(Some(err.to_string()));
            return;
        }
        match dispatcher.finish() {
            Ok(Some(Dispatched::Saved(id))) => {
                self.outcome = Some(ScreenOutcome::Saved(id));
            }
            Ok(_) => {}
            Err(err) => {
                self.state.set_status_message(Some(format!(
                    "Failed to save feedback: {err:#} • Esc to leave"
                )));
            }
        }
    }

    fn submit_delete(&mut self) {
        let mut dispatcher = ActionDispatcher::new(&self.storage);
        if let Err(err) = self.state.confirm_delete(&mut dispatcher) {
            self.state.set_status_message(Some(err.to_string()));
            return;
        }
        match dispatcher.finish() {
            Ok(Some(Dispatched::Deleted(id))) => {
                self.outcome = Some(ScreenOutcome::Deleted(id));
            }
            Ok(_) => {}
            Err(err) => {
                self.state.set_status_message(Some(format!(
                    "Failed to delete feedback: {err:#} • Esc to leave"
                )));
            }
        }
    }
}

fn build_screen(
    config: &AppConfig,
    locator: &mut Locator,
    collection: &Arc<FeedbackCollection>,
    target: &str,
    upvoted: UpvotedIds,
) -> EditScreenState {
    let located = locator.locate_param(collection, target).cloned();
    let statuses = collection.statuses().collect();
    let mut state = EditScreenState::new(target, located, statuses, upvoted, &config.editor);
    if state.session().is_found() {
        state.set_status_message(Some(EDIT_HINT));
    } else {
        tracing::info!(raw_id = target, "no feedback matches edit target");
        state.set_status_message(Some("Esc to go back"));
    }
    state
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, StorageOptions};
    use crate::feedback::{locate, Category, Status};
    use crate::storage;
    use tempfile::TempDir;

    fn setup(target: &str) -> anyhow::Result<(TempDir, App)> {
        let temp = TempDir::new()?;
        let paths = ConfigPaths::rooted(temp.path());
        paths.ensure_directories()?;
        let mut opts = StorageOptions::default();
        opts.database_path = paths.database_path.clone();
        let storage = storage::init(&paths, &opts)?;
        let app = App::new(Arc::new(AppConfig::default()), storage, target)?;
        Ok((temp, app))
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn ctrl(app: &mut App, ch: char) {
        app.handle_key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL));
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    #[test]
    fn save_writes_draft_through_the_store() -> anyhow::Result<()> {
        let (_temp, mut app) = setup("2")?;
        assert_eq!(app.state().session().draft().status, Status::Suggestion);
        type_text(&mut app, " now");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Right);
        ctrl(&mut app, 's');

        assert_eq!(app.outcome(), Some(ScreenOutcome::Saved(2)));
        let collection = app.storage.fetch_collection()?;
        let saved = locate(&collection, 2).expect("record 2");
        assert_eq!(saved.record.title, "Add a dark theme option now");
        assert_eq!(saved.record.category, Category::Ui);
        assert_eq!(saved.status, Status::Planned);
        Ok(())
    }

    #[test]
    fn save_button_matches_shortcut() -> anyhow::Result<()> {
        let (_temp, mut app) = setup("3")?;
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.state().focus, FormField::SaveButton);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.outcome(), Some(ScreenOutcome::Saved(3)));
        Ok(())
    }

    #[test]
    fn cancel_leaves_store_untouched() -> anyhow::Result<()> {
        let (_temp, mut app) = setup("1")?;
        type_text(&mut app, "zzz");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.outcome(), Some(ScreenOutcome::Cancelled));

        let collection = app.storage.fetch_collection()?;
        let record = locate(&collection, 1).expect("record 1");
        assert_eq!(record.record.title, "Add tags for solutions");
        Ok(())
    }

    #[test]
    fn delete_requires_confirmation() -> anyhow::Result<()> {
        let (_temp, mut app) = setup("4")?;
        ctrl(&mut app, 'd');
        assert!(app.state().session().is_confirming_delete());
        press(&mut app, KeyCode::Char('n'));
        assert!(!app.state().session().is_confirming_delete());
        assert!(app.outcome().is_none());
        assert!(locate(&app.storage.fetch_collection()?, 4).is_some());

        ctrl(&mut app, 'd');
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.outcome(), Some(ScreenOutcome::Deleted(4)));
        assert!(locate(&app.storage.fetch_collection()?, 4).is_none());
        Ok(())
    }

    #[test]
    fn unknown_target_only_allows_leaving() -> anyhow::Result<()> {
        let (_temp, mut app) = setup("abc")?;
        assert!(!app.state().session().is_found());
        ctrl(&mut app, 's');
        ctrl(&mut app, 'd');
        type_text(&mut app, "x");
        assert!(app.outcome().is_none());
        assert_eq!(app.state().session().draft().title, "");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.outcome(), Some(ScreenOutcome::Left));
        Ok(())
    }

    #[test]
    fn store_failure_keeps_screen_open() -> anyhow::Result<()> {
        let (_temp, mut app) = setup("5")?;
        app.storage.delete_feedback(5)?;
        ctrl(&mut app, 's');
        assert!(app.outcome().is_none());
        let message = app.state().status_message().unwrap_or_default();
        assert!(message.contains("Failed to save"), "got {message}");
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.outcome(), Some(ScreenOutcome::Left));
        Ok(())
    }

    #[test]
    fn retarget_and_reload_start_fresh_sessions() -> anyhow::Result<()> {
        let (_temp, mut app) = setup("1")?;
        type_text(&mut app, "!");
        assert!(app.state().session().is_dirty());

        app.retarget("3")?;
        assert_eq!(app.state().session().record_id(), Some(3));
        assert!(!app.state().session().is_dirty());

        app.storage.toggle_upvote(3)?;
        ctrl(&mut app, 'r');
        assert_eq!(
            app.state()
                .session()
                .original()
                .map(|found| found.record.upvotes),
            Some(124)
        );
        Ok(())
    }
}
