use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::state::{EditScreenState, FormField, TextInput};
use crate::feedback::DeletePreview;

pub fn draw_edit_screen(frame: &mut Frame, state: &EditScreenState) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.size());

    if state.session().is_found() {
        draw_form(frame, state, vertical[0]);
    } else {
        draw_not_found(frame, state, vertical[0]);
    }

    let status = Paragraph::new(build_status_line(state)).style(Style::default().fg(Color::Gray));
    frame.render_widget(status, vertical[1]);

    if let Some(preview) = state.delete_preview() {
        render_delete_modal(frame, &preview);
    }
}

fn draw_form(frame: &mut Frame, state: &EditScreenState, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(3),
        ])
        .split(area);

    let original_title = state
        .session()
        .original()
        .map(|found| found.record.title.as_str())
        .unwrap_or_default();
    let mut heading = vec![Span::styled(
        format!("Editing '{original_title}'"),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if state.session().is_dirty() {
        heading.push(Span::styled(
            "  (unsaved)",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(heading)), rows[0]);

    let title = Paragraph::new(state.title_input().value()).block(field_block(
        "Feedback Title",
        state.focus == FormField::Title,
    ));
    frame.render_widget(title, rows[1]);

    let dropdowns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[2]);
    let draft = state.session().draft();
    frame.render_widget(
        dropdown("Category", draft.category.as_ref(), state.focus == FormField::Category),
        dropdowns[0],
    );
    frame.render_widget(
        dropdown("Update Status", draft.status.as_ref(), state.focus == FormField::Status),
        dropdowns[1],
    );

    let description = Paragraph::new(state.description_input().value())
        .block(field_block(
            "Feedback Detail",
            state.focus == FormField::Description,
        ))
        .wrap(Wrap { trim: false });
    frame.render_widget(description, rows[3]);

    let buttons = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(12),
            Constraint::Min(0),
            Constraint::Length(12),
            Constraint::Length(18),
        ])
        .split(rows[4]);
    frame.render_widget(
        button("Delete", Color::Red, state.focus == FormField::DeleteButton),
        buttons[0],
    );
    frame.render_widget(
        button("Cancel", Color::Gray, state.focus == FormField::CancelButton),
        buttons[2],
    );
    frame.render_widget(
        button("Add Feedback", Color::Magenta, state.focus == FormField::SaveButton),
        buttons[3],
    );

    if !state.session().is_active() {
        return;
    }
    let cursor = match state.focus {
        FormField::Title => text_cursor_position(state.title_input(), rows[1], false),
        FormField::Description => text_cursor_position(state.description_input(), rows[3], true),
        _ => None,
    };
    if let Some((x, y)) = cursor {
        frame.set_cursor(x, y);
    }
}

fn draw_not_found(frame: &mut Frame, state: &EditScreenState, area: Rect) {
    let target = state.target().trim();
    let label = if target.is_empty() {
        "No feedback id given".to_string()
    } else {
        format!("No feedback with id '{target}'")
    };
    let text = Text::from(vec![
        Line::from(""),
        Line::from(Span::styled(
            label,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Esc/q to go back",
            Style::default().fg(Color::Gray),
        )),
    ]);
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().title("Edit Feedback").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn field_block(title: &str, focused: bool) -> Block<'_> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border)
}

fn dropdown<'a>(title: &'a str, value: &'a str, focused: bool) -> Paragraph<'a> {
    let arrow = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Paragraph::new(Line::from(vec![
        Span::styled("< ", arrow),
        Span::raw(value),
        Span::styled(" >", arrow),
    ]))
    .block(field_block(title, focused))
}

fn button(label: &str, color: Color, focused: bool) -> Paragraph<'_> {
    let mut style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    if focused {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Paragraph::new(Span::styled(label, style))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(color)))
}

fn build_status_line(state: &EditScreenState) -> Line<'static> {
    let mut spans = Vec::new();
    if let Some(id) = state.session().record_id() {
        spans.push(Span::styled(
            format!("#{id}"),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" | "));
    }
    if let Some(message) = state.status_message() {
        spans.push(Span::raw(message.to_string()));
    }
    Line::from(spans)
}

/// Screen position of the text cursor inside a bordered field.
fn text_cursor_position(input: &TextInput, area: Rect, wrap: bool) -> Option<(u16, u16)> {
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    if inner_width == 0 || inner_height == 0 {
        return None;
    }

    let width_limit = inner_width as usize;
    let value = input.value();
    let cursor = input.cursor().min(value.len());
    let mut row = 0u16;
    let mut col = 0usize;
    for grapheme in value[..cursor].graphemes(true) {
        if grapheme == "\n" {
            row += 1;
            col = 0;
            continue;
        }
        let glyph_width = UnicodeWidthStr::width(grapheme);
        if wrap && glyph_width > 0 && col + glyph_width > width_limit {
            row += 1;
            col = 0;
        }
        col += glyph_width;
    }

    let row = row.min(inner_height - 1);
    let col = col.min(width_limit - 1) as u16;
    Some((area.x + 1 + col, area.y + 1 + row))
}

fn render_delete_modal(frame: &mut Frame, preview: &DeletePreview<'_>) {
    let area = centered_rect(60, 45, frame.size());
    frame.render_widget(Clear, area);

    let record = preview.record;
    let mut meta = vec![
        Span::styled(
            record.category.to_string(),
            Style::default().fg(Color::Blue),
        ),
        Span::raw(" • "),
        Span::raw(preview.status.to_string()),
        Span::raw(" • "),
    ];
    let upvote_style = if preview.upvoted {
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    meta.push(Span::styled(format!("▲ {}", record.upvotes), upvote_style));
    let comments = record.comment_count();
    meta.push(Span::raw(format!(
        " • {comments} comment{}",
        if comments == 1 { "" } else { "s" }
    )));

    let mut lines = vec![
        Line::from(Span::styled(
            "Are you sure you want to delete this feedback?",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("#{}  {}", record.id, record.title),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(meta),
    ];
    if !record.description.is_empty() {
        lines.push(Line::from(Span::styled(
            record.description.clone(),
            Style::default().fg(Color::Gray),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter/y delete • Esc/n cancel",
        Style::default().fg(Color::Gray),
    )));

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Delete Feedback")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorOptions;
    use crate::feedback::{
        Category, FeedbackRecord, FeedbackSink, EditedFeedback, FeedbackId, LocatedFeedback,
        Status, UpvotedIds,
    };
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    struct NullSink;

    impl FeedbackSink for NullSink {
        fn save_changes(&mut self, _edited: EditedFeedback) {}
        fn delete(&mut self, _id: FeedbackId) {}
    }

    fn located() -> LocatedFeedback {
        LocatedFeedback {
            record: FeedbackRecord::new(2, "Add a dark theme option", Category::Feature)
                .with_description("Dark mode please")
                .with_upvotes(99),
            status: Status::Suggestion,
        }
    }

    fn screen(target: &str, found: Option<LocatedFeedback>, upvoted: UpvotedIds) -> EditScreenState {
        EditScreenState::new(
            target,
            found,
            vec![Status::Suggestion, Status::Planned],
            upvoted,
            &EditorOptions::default(),
        )
    }

    fn render(state: &EditScreenState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).expect("test terminal");
        terminal
            .draw(|frame| draw_edit_screen(frame, state))
            .expect("draw");
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.get(x, y).symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn form_shows_original_title_and_draft_fields() {
        let mut state = screen("2", Some(located()), UpvotedIds::new());
        state.input_char('!');
        let out = render(&state);
        assert!(out.contains("Editing 'Add a dark theme option'"));
        assert!(out.contains("Add a dark theme option!"));
        assert!(out.contains("< Feature >"));
        assert!(out.contains("< Suggestion >"));
        assert!(out.contains("Add Feedback"));
    }

    #[test]
    fn missing_record_renders_notice() {
        let out = render(&screen("42", None, UpvotedIds::new()));
        assert!(out.contains("No feedback with id '42'"));
        assert!(!out.contains("Add Feedback"));
    }

    #[test]
    fn delete_modal_previews_original_record() {
        let mut state = screen("2", Some(located()), UpvotedIds::from([2]));
        state.input_char('?');
        state.request_delete().expect("request delete");
        let out = render(&state);
        assert!(out.contains("Delete Feedback"));
        assert!(out.contains("#2  Add a dark theme option "));
        assert!(out.contains("▲ 99"));
        assert!(out.contains("Enter/y delete"));

        state.confirm_delete(&mut NullSink).expect("confirm");
        assert!(!render(&state).contains("Are you sure"));
    }

    #[test]
    fn cursor_tracks_wide_graphemes() {
        let input = TextInput::single_line("日本".into(), 20);
        let area = Rect::new(0, 0, 20, 3);
        assert_eq!(text_cursor_position(&input, area, false), Some((5, 1)));

        let wrapped = TextInput::multi_line("ab\ncd".into());
        let area = Rect::new(2, 4, 20, 6);
        assert_eq!(text_cursor_position(&wrapped, area, true), Some((5, 6)));
    }
}
