use crate::editing::mutator::{self, Mutator, Scope};
use crate::models::document::{
    Block, BlockId, BlockKind, CODE_BLOCK_PLACEHOLDER, Document, HeadingLevel, ListKind,
};
use crate::models::run::{self, Mark, Marks, Run, RunLocation};
use crate::models::selection::{BlockStyle, InlineStyle, Position, Selection};

/// Formatting active at a selection. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatState {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
    /// Target of the link under the caret, if any.
    pub link: Option<String>,
    pub block: BlockStyle,
}

impl FormatState {
    /// Walk from the selection anchor up through its run and block ancestry.
    pub fn derive(doc: &Document, selection: &Selection) -> Self {
        let block = block_style(doc, selection.anchor.block);
        let (marks, code, link) = if selection.is_collapsed() {
            caret_inline(doc, selection)
        } else {
            range_inline(doc, selection)
        };
        Self {
            bold: marks.bold,
            italic: marks.italic,
            strikethrough: marks.strikethrough,
            code,
            link,
            block,
        }
    }

    pub fn marks(&self) -> Marks {
        Marks {
            bold: self.bold,
            italic: self.italic,
            strikethrough: self.strikethrough,
        }
    }

    pub fn is_active(&self, mark: Mark) -> bool {
        self.marks().contains(mark)
    }
}

/// Block style of a leaf, looking through list items to their list.
pub fn block_style(doc: &Document, id: BlockId) -> BlockStyle {
    match doc.kind(id) {
        Some(BlockKind::Heading(HeadingLevel::H1)) => BlockStyle::Heading1,
        Some(BlockKind::Heading(HeadingLevel::H2)) => BlockStyle::Heading2,
        Some(BlockKind::Heading(HeadingLevel::H3)) => BlockStyle::Heading3,
        Some(BlockKind::Blockquote) => BlockStyle::Blockquote,
        Some(BlockKind::CodeBlock { .. }) => BlockStyle::CodeBlock,
        Some(BlockKind::ListItem) => match doc.parent(id).and_then(|list| doc.kind(list)) {
            Some(BlockKind::List(ListKind::Ordered)) => BlockStyle::NumberedList,
            _ => BlockStyle::BulletList,
        },
        _ => BlockStyle::Paragraph,
    }
}

fn caret_inline(doc: &Document, selection: &Selection) -> (Marks, bool, Option<String>) {
    if let Some(pending) = selection.pending {
        return (pending.marks, pending.code, None);
    }
    let at = selection.focus;
    let Some(block) = doc.get(at.block) else {
        return (Marks::NONE, false, None);
    };
    if block.kind.is_code_block() {
        return (Marks::NONE, false, None);
    }
    match run::locate(&block.runs, at.offset) {
        RunLocation::Inside { index, .. } => {
            let run = &block.runs[index];
            let link = match run {
                Run::Link { href, .. } => Some(href.clone()),
                _ => None,
            };
            (run.marks(), matches!(run, Run::Code { .. }), link)
        }
        RunLocation::Boundary { index } => {
            let neighbour = match index {
                0 => block.runs.first(),
                _ => block.runs.get(index - 1),
            };
            match neighbour {
                Some(run) => (run.marks(), run.is_placeholder(), None),
                None => (Marks::NONE, false, None),
            }
        }
    }
}

fn range_inline(doc: &Document, selection: &Selection) -> (Marks, bool, Option<String>) {
    let mut marks: Option<Marks> = None;
    let mut code = true;
    let mut links: Vec<Option<String>> = Vec::new();
    for (id, start, end) in mutator::selected_ranges(doc, selection) {
        let Some(block) = doc.get(id) else {
            continue;
        };
        if start >= end {
            continue;
        }
        for run in run::slice(&block.runs, start, end) {
            let run_marks = if block.kind.is_code_block() {
                Marks::NONE
            } else {
                run.marks()
            };
            marks = Some(match marks {
                Some(acc) => acc.intersect(&run_marks),
                None => run_marks,
            });
            code &= matches!(run, Run::Code { .. });
            links.push(match run {
                Run::Link { href, .. } => Some(href),
                _ => None,
            });
        }
    }
    let link = match links.first() {
        Some(Some(first)) if links.iter().all(|l| l.as_ref() == Some(first)) => Some(first.clone()),
        _ => None,
    };
    match marks {
        Some(marks) => (marks, code, link),
        None => (Marks::NONE, false, None),
    }
}

/// Toggles inline and block formatting at the current selection.
pub struct FormatEngine<'a> {
    mutator: Mutator<'a>,
}

impl<'a> FormatEngine<'a> {
    pub fn new(doc: &'a mut Document, selection: &'a mut Selection) -> Self {
        Self {
            mutator: Mutator::new(doc, selection),
        }
    }

    pub fn mutator(&mut self) -> &mut Mutator<'a> {
        &mut self.mutator
    }

    pub fn state(&self) -> FormatState {
        FormatState::derive(self.mutator.document(), self.mutator.selection())
    }

    /// Style the next typed text takes: pending formatting if set, else the
    /// formatting of the run the caret sits in or follows.
    pub fn typing_style(&self) -> InlineStyle {
        if let Some(pending) = self.mutator.selection().pending {
            return pending;
        }
        let state = self.state();
        let at = self.mutator.selection().focus;
        let inside_code = self.mutator.document().get(at.block).is_some_and(|block| {
            matches!(
                run::locate(&block.runs, at.offset),
                RunLocation::Inside { index, .. } if matches!(block.runs[index], Run::Code { .. })
            )
        });
        InlineStyle {
            marks: state.marks(),
            code: inside_code,
        }
    }

    /// Flip one inline mark. With a range this wraps or unwraps it; with a
    /// caret it changes the style of the next typed text.
    pub fn toggle_inline(&mut self, mark: Mark) -> bool {
        if self.mutator.selection().is_collapsed() {
            let mut style = self.typing_style();
            let on = !style.marks.contains(mark);
            style.marks.set(mark, on);
            self.mutator.selection_mut().pending = Some(style);
            return true;
        }
        if self.state().is_active(mark) {
            self.mutator.unwrap_format(mark, Scope::Selection)
        } else {
            self.mutator.wrap_selection(mark)
        }
    }

    /// Toggle inline code.
    ///
    /// A range becomes one code span per block, or plain text if it is all
    /// code already. A caret inserts a placeholder span, removes a
    /// placeholder it touches, or leaves a real code span for typing.
    pub fn toggle_code(&mut self) -> bool {
        let selection = *self.mutator.selection();
        if !selection.is_collapsed() {
            let to_code = !self.state().code;
            let ranges = self.mutator.selected_ranges();
            let doc = self.mutator.document_mut();
            let mut changed = false;
            for (id, start, end) in ranges {
                let Some(block) = doc.get_mut(id) else {
                    continue;
                };
                if block.kind.is_code_block() || start >= end {
                    continue;
                }
                let first = run::split_at(&mut block.runs, start);
                let last = run::split_at(&mut block.runs, end);
                if to_code {
                    let text: String = block.runs[first..last]
                        .iter()
                        .map(Run::display_text)
                        .collect();
                    block.runs.drain(first..last);
                    block.runs.insert(first, Run::code(text));
                } else {
                    for run in &mut block.runs[first..last] {
                        if let Run::Code { text, .. } = run {
                            let text = std::mem::take(text);
                            *run = Run::text(text);
                        }
                    }
                }
                run::normalize(&mut block.runs);
                changed = true;
            }
            self.mutator.repair_selection(None);
            return changed;
        }

        let at = selection.focus;
        let Some(block) = self.mutator.document().get(at.block) else {
            return false;
        };
        if block.kind.is_code_block() {
            return false;
        }
        if let Some(index) = mutator::placeholder_at(&block.runs, at.offset) {
            let start = run::run_start(&block.runs, index);
            if let Some(block) = self.mutator.document_mut().get_mut(at.block) {
                block.runs.remove(index);
                run::normalize(&mut block.runs);
            }
            self.mutator.set_caret(Position::new(at.block, start));
            return true;
        }
        let mut style = self.typing_style();
        if style.code {
            style.code = false;
            self.mutator.selection_mut().pending = Some(style);
            return true;
        }
        self.mutator.insert_inline(Run::code_placeholder(), at)
    }

    /// Set the block style of every selected block, or revert them to
    /// paragraphs when the first one already has `style`.
    pub fn toggle_block(&mut self, style: BlockStyle) -> bool {
        let blocks: Vec<BlockId> = self
            .mutator
            .selected_ranges()
            .into_iter()
            .map(|(id, _, _)| id)
            .collect();
        let Some(&first) = blocks.first() else {
            return false;
        };
        let target = if block_style(self.mutator.document(), first) == style {
            BlockStyle::Paragraph
        } else {
            style
        };
        for id in blocks {
            self.set_block_style(id, target);
        }
        self.mutator.repair_selection(None);
        true
    }

    fn set_block_style(&mut self, id: BlockId, style: BlockStyle) {
        let current = block_style(self.mutator.document(), id);
        if current == style {
            return;
        }
        if current.is_list() && style.is_list() {
            if let Some(list) = self.mutator.document().parent(id) {
                self.mutator.set_list_kind(list, list_kind(style));
            }
            return;
        }
        if current.is_list() {
            self.mutator.lift_list_item(id);
        }
        if current == BlockStyle::CodeBlock {
            self.leave_code_block(id);
        }

        match style {
            BlockStyle::Paragraph => self.mutator.set_kind(id, BlockKind::Paragraph),
            BlockStyle::Heading1 => self.mutator.set_kind(id, heading(HeadingLevel::H1)),
            BlockStyle::Heading2 => self.mutator.set_kind(id, heading(HeadingLevel::H2)),
            BlockStyle::Heading3 => self.mutator.set_kind(id, heading(HeadingLevel::H3)),
            BlockStyle::Blockquote => self.mutator.set_kind(id, BlockKind::Blockquote),
            BlockStyle::CodeBlock => self.enter_code_block(id),
            BlockStyle::BulletList | BlockStyle::NumberedList => {
                self.mutator.set_kind(id, BlockKind::Paragraph);
                self.mutator.wrap_in_list(id, list_kind(style));
            }
        }
    }

    fn enter_code_block(&mut self, id: BlockId) {
        let Some(block) = self.mutator.document_mut().get_mut(id) else {
            return;
        };
        let text = block.text();
        let placeholder = text.is_empty();
        block.runs = if placeholder {
            vec![Run::text(CODE_BLOCK_PLACEHOLDER)]
        } else {
            vec![Run::text(text)]
        };
        block.kind = BlockKind::CodeBlock {
            language: None,
            placeholder,
        };
        if placeholder {
            self.mutator.set_caret(Position::new(id, 0));
        }
    }

    fn leave_code_block(&mut self, id: BlockId) {
        let Some(block) = self.mutator.document_mut().get_mut(id) else {
            return;
        };
        if matches!(
            block.kind,
            BlockKind::CodeBlock {
                placeholder: true,
                ..
            }
        ) {
            block.runs.clear();
        }
        block.kind = BlockKind::Paragraph;
    }

    /// Wrap the current selection in a code block, or insert an empty
    /// placeholder block after the caret's block.
    pub fn insert_code_block(&mut self) -> Option<BlockId> {
        let selection = *self.mutator.selection();
        if selection.is_collapsed()
            && self
                .mutator
                .document()
                .get(selection.focus.block)
                .is_some_and(|b| !b.is_empty())
        {
            let splice = self.mutator.insert_block_at_caret(Block::new(
                BlockKind::CodeBlock {
                    language: None,
                    placeholder: true,
                },
                vec![Run::text(CODE_BLOCK_PLACEHOLDER)],
            ))?;
            self.mutator.set_caret(Position::new(splice.inserted, 0));
            return Some(splice.inserted);
        }
        self.toggle_block(BlockStyle::CodeBlock);
        Some(self.mutator.selection().focus.block)
    }
}

fn heading(level: HeadingLevel) -> BlockKind {
    BlockKind::Heading(level)
}

fn list_kind(style: BlockStyle) -> ListKind {
    match style {
        BlockStyle::NumberedList => ListKind::Ordered,
        _ => ListKind::Unordered,
    }
}
