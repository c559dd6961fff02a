use crate::editing::format::FormatEngine;
use crate::models::run::{self, Mark, Marks, Run, RunLocation};
use crate::models::selection::{InlineStyle, Position};

/// Indent inserted by Tab inside a code block.
pub const CODE_INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Left,
    Right,
    Home,
    End,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        meta: false,
        alt: false,
        shift: false,
    };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn char(c: char) -> Self {
        Self::new(Key::Char(c))
    }

    pub fn command(c: char) -> Self {
        Self {
            key: Key::Char(c),
            modifiers: Modifiers {
                ctrl: true,
                ..Modifiers::NONE
            },
        }
    }
}

/// What a key press did, so the caller knows which follow-up work to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Document content changed.
    Edited,
    /// Only pending formatting or the caret changed.
    Selection,
    /// Ctrl/Cmd+S: the caller should save immediately.
    SaveRequested,
    /// Not consumed; the host should apply its default behaviour.
    NotHandled,
}

/// Apply a key press to the document through the format engine.
pub fn handle_key(engine: &mut FormatEngine<'_>, press: KeyPress) -> KeyOutcome {
    let command = press.modifiers.command();
    match press.key {
        Key::Char(c) if command => match c.to_ascii_lowercase() {
            'b' => toggled(engine, Mark::Bold),
            'i' => toggled(engine, Mark::Italic),
            's' => KeyOutcome::SaveRequested,
            _ => KeyOutcome::NotHandled,
        },
        Key::Char(c) if c.is_control() => KeyOutcome::NotHandled,
        Key::Char(c) => type_char(engine, c),
        Key::Enter => edited(engine.mutator().split_block()),
        Key::Backspace => edited(engine.mutator().delete_backward()),
        Key::Tab => {
            let at = engine.mutator().selection().focus;
            let in_code_block = engine
                .mutator()
                .document()
                .get(at.block)
                .is_some_and(|block| block.kind.is_code_block());
            if !in_code_block {
                return KeyOutcome::NotHandled;
            }
            engine.mutator().delete_selection();
            let at = engine.mutator().selection().focus;
            edited(
                engine
                    .mutator()
                    .insert_text(at, CODE_INDENT, InlineStyle::PLAIN),
            )
        }
        Key::Left | Key::Right | Key::Home | Key::End => {
            move_caret(engine, press.key);
            KeyOutcome::Selection
        }
    }
}

fn toggled(engine: &mut FormatEngine<'_>, mark: Mark) -> KeyOutcome {
    let collapsed = engine.mutator().selection().is_collapsed();
    if !engine.toggle_inline(mark) {
        return KeyOutcome::NotHandled;
    }
    if collapsed {
        KeyOutcome::Selection
    } else {
        KeyOutcome::Edited
    }
}

fn edited(changed: bool) -> KeyOutcome {
    if changed {
        KeyOutcome::Edited
    } else {
        KeyOutcome::Selection
    }
}

/// Insert one typed character.
///
/// A space typed while any inline mark is active is inserted without marks,
/// so formatting closes at the word boundary instead of sticking. Any
/// character typed at the end of a struck run lands outside it. Formatting
/// toggled on at the caret stays pending until a space or a caret move.
pub fn type_char(engine: &mut FormatEngine<'_>, c: char) -> KeyOutcome {
    engine.mutator().delete_selection();
    let pending = engine.mutator().selection().pending;
    let mut style = engine.typing_style();
    if c == ' ' {
        style.marks = Marks::NONE;
    } else if pending.is_none() && at_strikethrough_end(engine) {
        style.marks = style.marks.without(Mark::Strikethrough);
    }
    let at = engine.mutator().selection().focus;
    let mut buf = [0u8; 4];
    let changed = engine
        .mutator()
        .insert_text(at, c.encode_utf8(&mut buf), style);
    if changed && c != ' ' && pending.is_some() {
        engine.mutator().selection_mut().pending = Some(style);
    }
    edited(changed)
}

/// True when the caret sits right after a struck run that the next run
/// does not continue.
fn at_strikethrough_end(engine: &mut FormatEngine<'_>) -> bool {
    let mutator = engine.mutator();
    let at = mutator.selection().focus;
    let Some(block) = mutator.document().get(at.block) else {
        return false;
    };
    let RunLocation::Boundary { index } = run::locate(&block.runs, at.offset) else {
        return false;
    };
    let struck = |run: Option<&Run>| {
        run.is_some_and(|run| run.marks().contains(Mark::Strikethrough))
    };
    index > 0 && struck(block.runs.get(index - 1)) && !struck(block.runs.get(index))
}

fn move_caret(engine: &mut FormatEngine<'_>, key: Key) {
    let mutator = engine.mutator();
    let at = mutator.selection().focus;
    let doc = mutator.document();
    let Some(len) = doc.get(at.block).map(|b| b.len()) else {
        return;
    };
    let target = match key {
        Key::Left if at.offset > 0 => Some(Position::new(at.block, at.offset - 1)),
        Key::Left => doc.prev_text_block(at.block).map(|prev| {
            let end = doc.get(prev).map_or(0, |b| b.len());
            Position::new(prev, end)
        }),
        Key::Right if at.offset < len => Some(Position::new(at.block, at.offset + 1)),
        Key::Right => doc
            .next_text_block(at.block)
            .map(|next| Position::new(next, 0)),
        Key::Home => Some(Position::new(at.block, 0)),
        Key::End => Some(Position::new(at.block, len)),
        _ => None,
    };
    // Staying put still collapses a range and drops pending formatting.
    mutator.set_caret(target.unwrap_or(at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{Block, BlockId, Document};
    use crate::models::selection::Selection;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn press_all(doc: &mut Document, selection: &mut Selection, presses: &[KeyPress]) {
        let mut engine = FormatEngine::new(doc, selection);
        for &press in presses {
            handle_key(&mut engine, press);
        }
    }

    fn paragraph(runs: Vec<Run>) -> (Document, BlockId) {
        let doc = Document::from_blocks([Block::paragraph(runs)]);
        let id = doc.first_text_block().unwrap();
        (doc, id)
    }

    #[test]
    fn test_space_after_strikethrough_lands_outside() {
        // Given a caret at the end of struck text
        let strike = Marks::NONE.with(Mark::Strikethrough);
        let (mut doc, id) = paragraph(vec![Run::marked("done", strike)]);
        let mut selection = Selection::caret(Position::new(id, 4));

        // When a space and a letter are typed
        press_all(
            &mut doc,
            &mut selection,
            &[KeyPress::char(' '), KeyPress::char('x')],
        );

        // Then both land outside the struck run
        assert_eq!(
            doc.get(id).unwrap().runs,
            vec![Run::marked("done", strike), Run::text(" x")]
        );
    }

    #[rstest]
    #[case('x')]
    #[case('!')]
    fn test_character_after_strikethrough_lands_outside(#[case] c: char) {
        // Given a caret at the end of struck text
        let strike = Marks::NONE.with(Mark::Strikethrough);
        let (mut doc, id) = paragraph(vec![Run::marked("done", strike)]);
        let mut selection = Selection::caret(Position::new(id, 4));

        // When two characters are typed
        press_all(
            &mut doc,
            &mut selection,
            &[KeyPress::char(c), KeyPress::char('y')],
        );

        // Then both land outside the struck run
        assert_eq!(
            doc.get(id).unwrap().runs,
            vec![Run::marked("done", strike), Run::text(format!("{c}y"))]
        );
        assert_eq!(selection.focus, Position::new(id, 6));
    }

    #[test]
    fn test_character_after_strikethrough_keeps_other_marks() {
        let bold = Marks::NONE.with(Mark::Bold);
        let both = bold.with(Mark::Strikethrough);
        let (mut doc, id) = paragraph(vec![Run::marked("done", both)]);
        let mut selection = Selection::caret(Position::new(id, 4));

        press_all(&mut doc, &mut selection, &[KeyPress::char('x')]);

        assert_eq!(
            doc.get(id).unwrap().runs,
            vec![Run::marked("done", both), Run::marked("x", bold)]
        );
    }

    #[test]
    fn test_typing_inside_strikethrough_stays_struck() {
        let strike = Marks::NONE.with(Mark::Strikethrough);
        let (mut doc, id) = paragraph(vec![Run::marked("done", strike)]);
        let mut selection = Selection::caret(Position::new(id, 2));

        press_all(&mut doc, &mut selection, &[KeyPress::char('x')]);

        assert_eq!(doc.get(id).unwrap().runs, vec![Run::marked("doxne", strike)]);
    }

    #[test]
    fn test_pending_strikethrough_continues_until_space() {
        let strike = Marks::NONE.with(Mark::Strikethrough);
        let (mut doc, id) = paragraph(vec![]);
        let mut selection = Selection::caret(Position::new(id, 0));

        let mut engine = FormatEngine::new(&mut doc, &mut selection);
        engine.toggle_inline(Mark::Strikethrough);
        for c in ['g', 'o', ' ', 'n'] {
            handle_key(&mut engine, KeyPress::char(c));
        }

        assert_eq!(
            doc.get(id).unwrap().runs,
            vec![Run::marked("go", strike), Run::text(" n")]
        );
    }

    #[test]
    fn test_space_closes_pending_bold() {
        let (mut doc, id) = paragraph(vec![]);
        let mut selection = Selection::caret(Position::new(id, 0));

        press_all(
            &mut doc,
            &mut selection,
            &[
                KeyPress::command('b'),
                KeyPress::char('h'),
                KeyPress::char('i'),
                KeyPress::char(' '),
                KeyPress::char('y'),
            ],
        );

        assert_eq!(
            doc.get(id).unwrap().runs,
            vec![
                Run::marked("hi", Marks::NONE.with(Mark::Bold)),
                Run::text(" y")
            ]
        );
    }

    #[test]
    fn test_tab_in_code_block_inserts_indent() {
        let doc = Document::from_blocks([Block::code_block(None, "x")]);
        let id = doc.first_text_block().unwrap();
        let mut doc = doc;
        let mut selection = Selection::caret(Position::new(id, 0));
        let mut engine = FormatEngine::new(&mut doc, &mut selection);

        assert_eq!(
            handle_key(&mut engine, KeyPress::new(Key::Tab)),
            KeyOutcome::Edited
        );
        assert_eq!(doc.get(id).unwrap().text(), "    x");
    }

    #[test]
    fn test_tab_outside_code_is_not_handled() {
        let (mut doc, id) = paragraph(vec![Run::text("x")]);
        let mut selection = Selection::caret(Position::new(id, 0));
        let mut engine = FormatEngine::new(&mut doc, &mut selection);
        assert_eq!(
            handle_key(&mut engine, KeyPress::new(Key::Tab)),
            KeyOutcome::NotHandled
        );
    }

    #[rstest]
    #[case('s', KeyOutcome::SaveRequested)]
    #[case('S', KeyOutcome::SaveRequested)]
    #[case('b', KeyOutcome::Selection)]
    #[case('i', KeyOutcome::Selection)]
    #[case('q', KeyOutcome::NotHandled)]
    fn test_command_shortcuts(#[case] c: char, #[case] expected: KeyOutcome) {
        let (mut doc, id) = paragraph(vec![Run::text("x")]);
        let mut selection = Selection::caret(Position::new(id, 1));
        let mut engine = FormatEngine::new(&mut doc, &mut selection);
        assert_eq!(handle_key(&mut engine, KeyPress::command(c)), expected);
    }

    #[test]
    fn test_typing_replaces_selection() {
        let (mut doc, id) = paragraph(vec![Run::text("hello")]);
        let mut selection = Selection::range(Position::new(id, 1), Position::new(id, 4));

        press_all(&mut doc, &mut selection, &[KeyPress::char('a')]);

        assert_eq!(doc.get(id).unwrap().text(), "hao");
        assert_eq!(selection.focus, Position::new(id, 2));
    }

    #[test]
    fn test_arrow_keys_cross_blocks() {
        let mut doc = Document::from_blocks([
            Block::paragraph(vec![Run::text("ab")]),
            Block::paragraph(vec![Run::text("cd")]),
        ]);
        let blocks = doc.text_blocks();
        let mut selection = Selection::caret(Position::new(blocks[0], 2));

        press_all(&mut doc, &mut selection, &[KeyPress::new(Key::Right)]);
        assert_eq!(selection.focus, Position::new(blocks[1], 0));

        press_all(&mut doc, &mut selection, &[KeyPress::new(Key::Left)]);
        assert_eq!(selection.focus, Position::new(blocks[0], 2));
    }
}
