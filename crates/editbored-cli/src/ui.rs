use editbored_engine::autosave::SaveStatus;
use editbored_engine::{
    BlockId, BlockKind, Document, KeyValueStore, ListKind, Mark, Position, Run, Selection,
};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
};

use crate::app::App;

/// Document lines plus the caret as (row, column) within them.
#[derive(Debug, Default)]
pub struct DocumentView {
    pub lines: Vec<Line<'static>>,
    pub cursor: Option<(u16, u16)>,
}

impl DocumentView {
    fn push_text_block(&mut self, doc: &Document, id: BlockId, prefix: &str, base: Style, caret: Position) {
        let Some(block) = doc.get(id) else {
            return;
        };
        let mut spans = vec![Span::styled(
            prefix.to_string(),
            Style::default().fg(Color::DarkGray),
        )];
        spans.extend(
            block
                .runs
                .iter()
                .map(|run| Span::styled(run.display_text(), run_style(run, base))),
        );
        if caret.block == id {
            self.set_cursor(self.lines.len(), prefix.chars().count() + caret.offset);
        }
        self.lines.push(Line::from(spans));
    }

    fn push_code_block(&mut self, doc: &Document, id: BlockId, caret: Position) {
        let Some(block) = doc.get(id) else {
            return;
        };
        let text = block.text();
        let first_row = self.lines.len();
        let style = Style::default().fg(Color::Yellow);
        for line in text.split('\n') {
            self.lines.push(Line::from(vec![
                Span::styled("  ", Style::default().fg(Color::DarkGray)),
                Span::styled(line.to_string(), style),
            ]));
        }
        if caret.block == id {
            let before: Vec<char> = text.chars().take(caret.offset).collect();
            let row = before.iter().filter(|&&c| c == '\n').count();
            let column = before.iter().rev().take_while(|&&c| c != '\n').count();
            self.set_cursor(first_row + row, 2 + column);
        }
    }

    fn push_line(&mut self, text: String, style: Style) {
        self.lines.push(Line::from(Span::styled(text, style)));
    }

    fn set_cursor(&mut self, row: usize, column: usize) {
        let clamp = |n: usize| u16::try_from(n).unwrap_or(u16::MAX);
        self.cursor = Some((clamp(row), clamp(column)));
    }
}

/// Lay the document out one line per leaf block.
pub fn document_view(doc: &Document, selection: &Selection) -> DocumentView {
    let mut view = DocumentView::default();
    let caret = selection.focus;
    let plain = Style::default();
    for &id in doc.children(doc.root()) {
        let Some(kind) = doc.kind(id) else {
            continue;
        };
        match kind {
            BlockKind::Paragraph | BlockKind::ListItem => {
                view.push_text_block(doc, id, "", plain, caret)
            }
            BlockKind::Heading(level) => {
                let prefix = format!("{} ", "#".repeat(level.level() as usize));
                let style = plain.add_modifier(Modifier::BOLD);
                view.push_text_block(doc, id, &prefix, style, caret);
            }
            BlockKind::Blockquote => {
                view.push_text_block(doc, id, "│ ", plain.add_modifier(Modifier::ITALIC), caret)
            }
            BlockKind::List(list_kind) => {
                for (i, &item) in doc.children(id).iter().enumerate() {
                    let marker = match list_kind {
                        ListKind::Unordered => "• ".to_string(),
                        ListKind::Ordered => format!("{}. ", i + 1),
                    };
                    view.push_text_block(doc, item, &marker, plain, caret);
                }
            }
            BlockKind::CodeBlock { .. } => view.push_code_block(doc, id, caret),
            BlockKind::Embed(descriptor) => view.push_line(
                format!("▣ {} {}", descriptor.embed_type, descriptor.source_url),
                Style::default().fg(Color::Cyan),
            ),
            BlockKind::Rule => view.push_line("─".repeat(24), Style::default().fg(Color::DarkGray)),
            BlockKind::Root => {}
        }
    }
    view
}

fn run_style(run: &Run, base: Style) -> Style {
    let marks = run.marks();
    let mut style = base;
    if marks.contains(Mark::Bold) {
        style = style.add_modifier(Modifier::BOLD);
    }
    if marks.contains(Mark::Italic) {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if marks.contains(Mark::Strikethrough) {
        style = style.add_modifier(Modifier::CROSSED_OUT);
    }
    match run {
        Run::Code { placeholder, .. } => {
            let style = style.fg(Color::Yellow);
            if *placeholder {
                style.add_modifier(Modifier::DIM)
            } else {
                style
            }
        }
        Run::Link { .. } => style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED),
        Run::Mention { .. } => style.fg(Color::Magenta),
        Run::Text { .. } => style,
    }
}

fn save_label(status: SaveStatus) -> &'static str {
    match status {
        SaveStatus::Idle => "",
        SaveStatus::Pending => "editing…",
        SaveStatus::Saved => "saved",
        SaveStatus::Failed => "save failed",
    }
}

pub fn draw<S: KeyValueStore>(f: &mut Frame, app: &App<S>) {
    let [header, body, footer] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(2),
    ])
    .areas(f.area());

    let session = &app.session;
    let stats = session.stats();
    let header_line = Line::from(vec![
        Span::styled(
            session.title().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            "  {} words, {} chars  ",
            stats.words, stats.characters
        )),
        Span::styled(
            save_label(session.save_status()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    f.render_widget(Paragraph::new(header_line), header);

    draw_body(f, app, body);
    draw_footer(f, app, footer);
}

fn draw_body<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let session = &app.session;
    let view = document_view(session.document(), session.selection());
    let inner_height = area.height.saturating_sub(2);
    let scroll = match view.cursor {
        Some((row, _)) if row >= inner_height => row - inner_height + 1,
        _ => 0,
    };

    let lines = match session.placeholder() {
        Some(placeholder) => vec![Line::from(Span::styled(
            placeholder.to_string(),
            Style::default().fg(Color::DarkGray),
        ))],
        None => view.lines,
    };
    let content = Paragraph::new(lines)
        .block(Block::bordered().title("Document"))
        .scroll((scroll, 0));
    f.render_widget(content, area);

    if app.prompt.is_none()
        && let Some((row, column)) = view.cursor
    {
        f.set_cursor_position((
            area.x.saturating_add(1).saturating_add(column),
            area.y.saturating_add(1).saturating_add(row - scroll),
        ));
    }
}

fn draw_footer<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let [first, second] =
        Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area);

    if let Some(prompt) = &app.prompt {
        let text = format!("{}: {}", prompt.kind.label(), prompt.input);
        let width = u16::try_from(text.chars().count()).unwrap_or(u16::MAX);
        f.render_widget(Paragraph::new(text), first);
        f.set_cursor_position((first.x.saturating_add(width), first.y));
    } else {
        let suggestions = app.session.mention_suggestions();
        let line = if suggestions.is_empty() {
            Line::from(app.status.clone())
        } else {
            let names: Vec<String> = suggestions
                .iter()
                .map(|user| format!("@{} ({})", user.username, user.name))
                .collect();
            Line::from(vec![
                Span::styled("Tab: ", Style::default().fg(Color::DarkGray)),
                Span::styled(names.join("  "), Style::default().fg(Color::Magenta)),
            ])
        };
        f.render_widget(Paragraph::new(line), first);
    }

    let help = Line::from(vec![
        Span::raw("Esc: Quit | "),
        Span::raw("^B/^I: Bold/Italic | "),
        Span::raw("Alt+0-3/q/u/o/c: Block | "),
        Span::raw("Alt+s/k: Strike/Code | "),
        Span::raw("^L/^G: Link/Image | "),
        Span::raw("^T: Title | ^S: Save | ^E: Export | ^N: New"),
    ]);
    f.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        second,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use editbored_engine::{Collaborators, EditorOptions, EditorSession, MemoryStore};
    use pretty_assertions::assert_eq;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn test_document_view_lines_and_cursor() {
        let mut session = EditorSession::new(
            MemoryStore::new(),
            EditorOptions::default(),
            Collaborators::default(),
        );
        session.load_markdown("# Title\n\n- one\n- two\n\n---\n\nend");

        let view = document_view(session.document(), session.selection());
        let texts: Vec<String> = view.lines.iter().map(line_text).collect();

        assert_eq!(texts[0], "# Title");
        assert_eq!(texts[1], "• one");
        assert_eq!(texts[2], "• two");
        assert!(texts.iter().any(|t| t.starts_with('─')));
        assert_eq!(texts.last().map(String::as_str), Some("end"));
        assert_eq!(view.cursor, Some((texts.len() as u16 - 1, 3)));
    }

    #[test]
    fn test_code_block_cursor_tracks_lines() {
        let mut session = EditorSession::new(
            MemoryStore::new(),
            EditorOptions::default(),
            Collaborators::default(),
        );
        session.load_markdown("```\nab\ncd\n```");

        let view = document_view(session.document(), session.selection());

        assert_eq!(view.cursor, Some((1, 4)));
    }
}
