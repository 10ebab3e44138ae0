use strum::{EnumIter, IntoEnumIterator};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::EditorOptions;
use crate::feedback::{
    cycle_in, DeletePreview, EditSession, FeedbackSink, FeedbackId, LocatedFeedback,
    SessionError, Status, UpvotedIds,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum FormField {
    Title,
    Category,
    Status,
    Description,
    DeleteButton,
    CancelButton,
    SaveButton,
}

impl FormField {
    pub fn next(self) -> Self {
        cycle_in(&Self::iter().collect::<Vec<_>>(), self, 1)
    }

    pub fn previous(self) -> Self {
        cycle_in(&Self::iter().collect::<Vec<_>>(), self, -1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    RequestDelete,
    Cancel,
    Save,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    Left,
    Right,
    Home,
    End,
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct TextInput {
    value: String,
    cursor: usize,
    multiline: bool,
    max_graphemes: Option<usize>,
    preferred_column: Option<usize>,
}

impl TextInput {
    pub fn single_line(value: String, max_graphemes: usize) -> Self {
        Self::new(value, false, Some(max_graphemes))
    }

    pub fn multi_line(value: String) -> Self {
        Self::new(value, true, None)
    }

    fn new(value: String, multiline: bool, max_graphemes: Option<usize>) -> Self {
        let cursor = value.len();
        Self {
            value,
            cursor,
            multiline,
            max_graphemes,
            preferred_column: None,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        if ch == '\n' {
            return self.insert_newline();
        }
        if let Some(max) = self.max_graphemes {
            if self.value.graphemes(true).count() >= max {
                return false;
            }
        }
        let mut scratch = [0u8; 4];
        let encoded = ch.encode_utf8(&mut scratch);
        self.value.insert_str(self.cursor, encoded);
        self.cursor += encoded.len();
        self.preferred_column = None;
        true
    }

    pub fn insert_newline(&mut self) -> bool {
        if !self.multiline {
            return false;
        }
        self.value.insert(self.cursor, '\n');
        self.cursor += 1;
        self.preferred_column = Some(0);
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.value, self.cursor);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
        self.preferred_column = None;
        true
    }

    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.value.len() {
            return false;
        }
        let next = next_grapheme_boundary(&self.value, self.cursor);
        self.value.drain(self.cursor..next);
        self.preferred_column = None;
        true
    }

    pub fn move_cursor(&mut self, movement: CursorMove) -> bool {
        let target = match movement {
            CursorMove::Left => {
                self.preferred_column = None;
                prev_grapheme_boundary(&self.value, self.cursor)
            }
            CursorMove::Right => {
                self.preferred_column = None;
                next_grapheme_boundary(&self.value, self.cursor)
            }
            CursorMove::Home => {
                self.preferred_column = Some(0);
                line_start(&self.value, self.cursor)
            }
            CursorMove::End => {
                self.preferred_column = None;
                line_end(&self.value, self.cursor)
            }
            CursorMove::Up => return self.move_vertical(-1),
            CursorMove::Down => return self.move_vertical(1),
        };
        if target == self.cursor {
            return false;
        }
        self.cursor = target;
        true
    }

    fn move_vertical(&mut self, direction: isize) -> bool {
        let current_start = line_start(&self.value, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.value, current_start, self.cursor));
        let target_start = if direction < 0 {
            if current_start == 0 {
                return false;
            }
            line_start(&self.value, current_start - 1)
        } else {
            let current_end = line_end(&self.value, self.cursor);
            if current_end == self.value.len() {
                return false;
            }
            current_end + 1
        };
        self.cursor = position_for_column(&self.value, target_start, column);
        self.preferred_column = Some(column);
        true
    }
}

#[derive(Debug, Clone)]
pub struct EditScreenState {
    target: String,
    session: EditSession,
    statuses: Vec<Status>,
    upvoted: UpvotedIds,
    pub focus: FormField,
    title: TextInput,
    description: TextInput,
    max_title_len: usize,
    status_message: Option<String>,
}

impl EditScreenState {
    pub fn new(
        target: impl Into<String>,
        located: Option<LocatedFeedback>,
        statuses: Vec<Status>,
        upvoted: UpvotedIds,
        options: &EditorOptions,
    ) -> Self {
        let session = EditSession::seed(located);
        let title = TextInput::single_line(session.draft().title.clone(), options.max_title_len);
        let description = if options.seed_description {
            TextInput::multi_line(session.draft().description.clone())
        } else {
            TextInput::multi_line(String::new())
        };
        let statuses = if statuses.is_empty() {
            Status::iter().collect()
        } else {
            statuses
        };
        Self {
            target: target.into(),
            session,
            statuses,
            upvoted,
            focus: FormField::Title,
            title,
            description,
            max_title_len: options.max_title_len,
            status_message: None,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn statuses(&self) -> &[Status] {
        &self.statuses
    }

    pub fn title_input(&self) -> &TextInput {
        &self.title
    }

    pub fn description_input(&self) -> &TextInput {
        &self.description
    }

    pub fn delete_preview(&self) -> Option<DeletePreview<'_>> {
        self.session.delete_preview(&self.upvoted)
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message<S: Into<String>>(&mut self, message: Option<S>) {
        self.status_message = message.map(Into::into);
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_previous(&mut self) {
        self.focus = self.focus.previous();
    }

    pub fn input_char(&mut self, ch: char) -> bool {
        self.edit_focused_text(|input| input.insert_char(ch))
    }

    pub fn input_enter(&mut self) -> Option<ButtonAction> {
        match self.focus {
            FormField::Title => {
                self.focus_next();
                None
            }
            FormField::Description => {
                self.edit_focused_text(TextInput::insert_newline);
                None
            }
            FormField::Category | FormField::Status => {
                self.cycle_focused(1);
                None
            }
            FormField::DeleteButton => Some(ButtonAction::RequestDelete),
            FormField::CancelButton => Some(ButtonAction::Cancel),
            FormField::SaveButton => Some(ButtonAction::Save),
        }
    }

    pub fn backspace(&mut self) -> bool {
        self.edit_focused_text(TextInput::backspace)
    }

    pub fn delete_forward(&mut self) -> bool {
        self.edit_focused_text(TextInput::delete)
    }

    pub fn move_cursor(&mut self, movement: CursorMove) -> bool {
        match self.focus {
            FormField::Title => self.title.move_cursor(movement),
            FormField::Description => self.description.move_cursor(movement),
            FormField::Category | FormField::Status => match movement {
                CursorMove::Left | CursorMove::Up => self.cycle_focused(-1),
                CursorMove::Right | CursorMove::Down => self.cycle_focused(1),
                _ => false,
            },
            _ => false,
        }
    }

    pub fn cycle_focused(&mut self, delta: isize) -> bool {
        let result = match self.focus {
            FormField::Category => {
                let next = self.session.draft().category.cycle(delta);
                self.session.edit_category(next)
            }
            FormField::Status => {
                let next = cycle_in(&self.statuses, self.session.draft().status, delta);
                self.session.edit_status(next)
            }
            _ => return false,
        };
        self.note_session_error(result)
    }

    pub fn request_delete(&mut self) -> Result<(), SessionError> {
        self.session.request_delete()
    }

    pub fn cancel_delete(&mut self) -> Result<(), SessionError> {
        self.session.cancel_delete()
    }

    pub fn confirm_delete<S>(&mut self, sink: &mut S) -> Result<FeedbackId, SessionError>
    where
        S: FeedbackSink + ?Sized,
    {
        self.session.confirm_delete(sink)
    }

    pub fn save<S>(&mut self, sink: &mut S) -> Result<(), SessionError>
    where
        S: FeedbackSink + ?Sized,
    {
        self.session.normalize_title(self.max_title_len)?;
        self.session.save(sink)
    }

    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.session.cancel()
    }

    fn edit_focused_text<F>(&mut self, edit: F) -> bool
    where
        F: FnOnce(&mut TextInput) -> bool,
    {
        if !self.session.is_active() {
            return self.note_session_error(Err(SessionError::Ended(self.session.phase())));
        }
        let changed = match self.focus {
            FormField::Title => edit(&mut self.title),
            FormField::Description => edit(&mut self.description),
            _ => false,
        };
        changed && self.sync_focused_text()
    }

    fn sync_focused_text(&mut self) -> bool {
        let result = match self.focus {
            FormField::Title => self.session.edit_title(self.title.value()),
            FormField::Description => self.session.edit_description(self.description.value()),
            _ => return false,
        };
        self.note_session_error(result)
    }

    fn note_session_error(&mut self, result: Result<(), SessionError>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "edit rejected by session");
                self.status_message = Some(err.to_string());
                false
            }
        }
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut last = 0;
    for (idx, _) in text[..cursor].grapheme_indices(true) {
        last = idx;
    }
    last
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    if cursor >= text.len() {
        return text.len();
    }
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or_else(|| text.len())
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or_else(|| text.len())
}

fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let line_end = line_end(text, line_start);
    let mut position = line_start;
    for (count, grapheme) in text[line_start..line_end].graphemes(true).enumerate() {
        if count >= column {
            break;
        }
        position += grapheme.len();
    }
    position
}
