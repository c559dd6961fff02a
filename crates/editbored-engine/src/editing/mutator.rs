use crate::models::document::{Block, BlockId, BlockKind, Document, ListKind};
use crate::models::run::{self, Mark, Run, RunLocation};
use crate::models::selection::{InlineStyle, Position, Selection};

/// How far an unwrap reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only the selected range.
    Selection,
    /// Every block the selection touches, in full.
    Block,
    /// The whole document.
    Document,
}

/// Blocks produced by [`Mutator::splice_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splice {
    /// Block holding the non-empty text that preceded the split point.
    pub before: Option<BlockId>,
    pub inserted: BlockId,
    /// Block holding the non-empty text that followed the split point.
    pub after: Option<BlockId>,
    /// Where the caret lands when the anchor held it.
    pub caret: Position,
}

/// Cursor-safe structural edits over a [`Document`].
///
/// Every operation leaves the selection pointing at an attached text block.
/// Operations whose target has been detached are no-ops and report it through
/// their return value.
pub struct Mutator<'a> {
    doc: &'a mut Document,
    selection: &'a mut Selection,
}

impl<'a> Mutator<'a> {
    pub fn new(doc: &'a mut Document, selection: &'a mut Selection) -> Self {
        Self { doc, selection }
    }

    pub fn document(&self) -> &Document {
        self.doc
    }

    pub fn selection(&self) -> &Selection {
        self.selection
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        self.doc
    }

    pub(crate) fn selection_mut(&mut self) -> &mut Selection {
        self.selection
    }

    pub fn set_caret(&mut self, at: Position) {
        *self.selection = Selection::caret(at);
    }

    /// Insert an inline run at `at` and place the caret after it.
    pub fn insert_inline(&mut self, run: Run, at: Position) -> bool {
        if !at.is_valid(self.doc) {
            log::debug!("insert_inline skipped: {at:?} is not attached");
            return false;
        }
        let Some(block) = self.doc.get_mut(at.block) else {
            return false;
        };
        if block.kind.is_code_block() {
            return false;
        }
        let len = run.len();
        let index = run::split_at(&mut block.runs, at.offset);
        let start = run::run_start(&block.runs, index);
        block.runs.insert(index, run);
        run::normalize(&mut block.runs);
        self.set_caret(Position::new(at.block, start + len));
        true
    }

    /// Insert `text` at `at` with `style`, replacing placeholder content it
    /// lands on, and place the caret after it.
    pub fn insert_text(&mut self, at: Position, text: &str, style: InlineStyle) -> bool {
        if text.is_empty() || !at.is_valid(self.doc) {
            return false;
        }
        let Some(block) = self.doc.get_mut(at.block) else {
            return false;
        };
        let inserted = text.chars().count();

        if block.kind.is_code_block() {
            let was_placeholder = matches!(
                block.kind,
                BlockKind::CodeBlock {
                    placeholder: true,
                    ..
                }
            );
            let (mut content, offset) = if was_placeholder {
                (String::new(), 0)
            } else {
                (block.text(), at.offset)
            };
            content.insert_str(run::byte_index(&content, offset), text);
            if let BlockKind::CodeBlock { placeholder, .. } = &mut block.kind {
                *placeholder = false;
            }
            block.runs = vec![Run::text(content)];
            self.set_caret(Position::new(at.block, offset + inserted));
            return true;
        }

        let runs = &mut block.runs;
        let caret = match placeholder_at(runs, at.offset) {
            Some(index) => {
                let start = run::run_start(runs, index);
                runs[index] = Run::code(text);
                start + inserted
            }
            None => insert_styled(runs, at.offset, text, style),
        };
        run::normalize(runs);
        self.set_caret(Position::new(at.block, caret));
        true
    }

    /// Add `mark` across the selected range. Collapsed selections are left
    /// alone; pending formatting belongs to the format engine.
    pub fn wrap_selection(&mut self, mark: Mark) -> bool {
        if self.selection.is_collapsed() {
            return false;
        }
        let ranges = self.selected_ranges();
        self.set_mark(&ranges, mark, true)
    }

    /// Remove `mark` from everything within `scope`.
    pub fn unwrap_format(&mut self, mark: Mark, scope: Scope) -> bool {
        let ranges = match scope {
            Scope::Selection if self.selection.is_collapsed() => return false,
            Scope::Selection => self.selected_ranges(),
            Scope::Block => self
                .selected_ranges()
                .into_iter()
                .map(|(id, _, _)| (id, 0, self.block_len(id)))
                .collect(),
            Scope::Document => self
                .doc
                .text_blocks()
                .into_iter()
                .map(|id| (id, 0, self.block_len(id)))
                .collect(),
        };
        self.set_mark(&ranges, mark, false)
    }

    fn set_mark(&mut self, ranges: &[(BlockId, usize, usize)], mark: Mark, on: bool) -> bool {
        let mut changed = false;
        for &(id, start, end) in ranges {
            let Some(block) = self.doc.get_mut(id) else {
                continue;
            };
            if block.kind.is_code_block() || start >= end {
                continue;
            }
            let first = run::split_at(&mut block.runs, start);
            let last = run::split_at(&mut block.runs, end);
            for run in &mut block.runs[first..last] {
                if let Some(marks) = run.marks_mut()
                    && marks.contains(mark) != on
                {
                    marks.set(mark, on);
                    changed = true;
                }
            }
            run::normalize(&mut block.runs);
        }
        changed
    }

    /// Per-block char ranges covered by the selection, in document order.
    pub(crate) fn selected_ranges(&self) -> Vec<(BlockId, usize, usize)> {
        selected_ranges(self.doc, self.selection)
    }

    fn block_len(&self, id: BlockId) -> usize {
        self.doc.get(id).map_or(0, Block::len)
    }

    /// Put `new` where `old` is and free `old`.
    ///
    /// A list item replaced by a non-item block is lifted out of its list
    /// first. Returns the new block, or `None` if `old` is detached or the
    /// replacement would break list structure.
    pub fn replace_node(&mut self, old: BlockId, new: Block) -> Option<BlockId> {
        if old == self.doc.root() || !self.doc.is_attached(old) {
            log::debug!("replace_node skipped: {old:?} is not attached");
            return None;
        }
        let in_list = self.doc.kind(old) == Some(&BlockKind::ListItem);
        match new.kind {
            BlockKind::Root | BlockKind::List(_) if in_list => return None,
            BlockKind::Root => return None,
            BlockKind::ListItem if !in_list => return None,
            BlockKind::ListItem => {}
            _ if in_list => {
                self.lift_list_item(old)?;
            }
            _ => {}
        }
        let held = [self.selection.anchor, self.selection.focus]
            .into_iter()
            .find(|p| p.block == old)
            .map(|p| p.offset);

        let parent = self.doc.parent(old)?;
        let index = self.doc.index_in_parent(old)?;
        let id = self.doc.insert_child(parent, index, new);
        self.doc.remove(old);

        if let Some(offset) = held
            && let Some(block) = self.doc.get(id)
            && block.kind.is_text_bearing()
        {
            let offset = offset.min(block.len());
            self.set_caret(Position::new(id, offset));
        }
        self.repair_selection(Some(id));
        Some(id)
    }

    /// Replace the text block `anchor` with `[before] inserted [after]`.
    ///
    /// Empty or missing parts are dropped. Atomic blocks (embeds and rules)
    /// always end up between two empty paragraphs so the caret can sit on
    /// either side. An anchor inside a list is lifted out first and its parts
    /// become paragraphs.
    pub fn splice_block(
        &mut self,
        anchor: BlockId,
        before: Option<Vec<Run>>,
        inserted: Block,
        after: Option<Vec<Run>>,
    ) -> Option<Splice> {
        if !self.doc.is_attached(anchor)
            || !self
                .doc
                .kind(anchor)
                .is_some_and(BlockKind::is_text_bearing)
        {
            log::debug!("splice_block skipped: anchor {anchor:?} is not an attached text block");
            return None;
        }
        if matches!(
            inserted.kind,
            BlockKind::Root | BlockKind::List(_) | BlockKind::ListItem
        ) {
            return None;
        }
        let held = self.selection.anchor.block == anchor || self.selection.focus.block == anchor;

        let part_kind = match self.doc.kind(anchor)? {
            BlockKind::ListItem => {
                self.lift_list_item(anchor)?;
                BlockKind::Paragraph
            }
            BlockKind::CodeBlock { language, .. } => BlockKind::CodeBlock {
                language: language.clone(),
                placeholder: false,
            },
            kind => kind.clone(),
        };
        let atomic = inserted.kind.is_atomic();
        let parent = self.doc.parent(anchor)?;
        let mut index = self.doc.index_in_parent(anchor)?;
        let non_empty = |runs: Option<Vec<Run>>| runs.filter(|r| run::runs_len(r) > 0);

        let before = non_empty(before).map(|runs| {
            let id = self
                .doc
                .insert_child(parent, index, Block::new(part_kind.clone(), runs));
            index += 1;
            id
        });
        let inserted = self.doc.insert_child(parent, index, inserted);
        index += 1;
        let after = non_empty(after)
            .map(|runs| self.doc.insert_child(parent, index, Block::new(part_kind, runs)));
        self.doc.remove(anchor);

        let caret_block = if atomic {
            self.doc.ensure_sentinels(inserted).map(|(_, after)| after)
        } else {
            None
        };
        let caret_block = caret_block
            .or(after)
            .or_else(|| self.doc.next_text_block(inserted))
            .or(before)
            .or_else(|| self.doc.prev_text_block(inserted))
            .unwrap_or_else(|| {
                let root = self.doc.root();
                self.doc.push_child(root, Block::empty_paragraph())
            });
        let caret = Position::new(caret_block, 0);
        if held {
            self.set_caret(caret);
        }
        self.repair_selection(Some(caret_block));
        Some(Splice {
            before,
            inserted,
            after,
            caret,
        })
    }

    /// Replace an embed with an empty paragraph and put the caret there.
    pub fn remove_embed(&mut self, id: BlockId) -> Option<BlockId> {
        if !matches!(self.doc.kind(id), Some(BlockKind::Embed(_))) {
            return None;
        }
        let paragraph = self.replace_node(id, Block::empty_paragraph())?;
        self.set_caret(Position::new(paragraph, 0));
        Some(paragraph)
    }

    /// Delete the selected content, merging the blocks at either end.
    pub fn delete_selection(&mut self) -> bool {
        if self.selection.is_collapsed() || !self.selection.is_valid(self.doc) {
            return false;
        }
        let (start, end) = self.selection.ordered(self.doc);
        if start.block == end.block {
            if let Some(block) = self.doc.get_mut(start.block) {
                delete_block_range(block, start.offset, end.offset);
            }
            self.set_caret(start);
            return true;
        }

        let tail = self
            .doc
            .get(end.block)
            .map(|b| run::slice(&b.runs, end.offset, b.len()))
            .unwrap_or_default();
        let leaves = self.doc.leaves();
        let (Some(first), Some(last)) = (
            leaves.iter().position(|&id| id == start.block),
            leaves.iter().position(|&id| id == end.block),
        ) else {
            return false;
        };
        for &id in &leaves[first + 1..=last] {
            self.doc.remove(id);
        }
        self.doc.prune_empty_lists();
        if let Some(block) = self.doc.get_mut(start.block) {
            let len = block.len();
            delete_block_range(block, start.offset, len);
            append_runs(block, tail);
        }
        self.set_caret(start);
        true
    }

    /// Backspace: delete the selection, or the char or atomic run before the
    /// caret, or merge the block into the previous one.
    pub fn delete_backward(&mut self) -> bool {
        if !self.selection.is_collapsed() {
            return self.delete_selection();
        }
        let at = self.selection.focus;
        if !at.is_valid(self.doc) {
            return false;
        }
        if at.offset > 0 {
            return self.delete_before(at);
        }

        let Some(kind) = self.doc.kind(at.block).cloned() else {
            return false;
        };
        match kind {
            BlockKind::Paragraph => self.merge_into_previous(at.block),
            BlockKind::ListItem => {
                let lifted = self.lift_list_item(at.block).is_some();
                self.set_caret(Position::new(at.block, 0));
                lifted
            }
            _ => {
                if let Some(block) = self.doc.get_mut(at.block) {
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
                true
            }
        }
    }

    fn delete_before(&mut self, at: Position) -> bool {
        let Some(block) = self.doc.get_mut(at.block) else {
            return false;
        };
        if let BlockKind::CodeBlock { placeholder, .. } = &mut block.kind
            && *placeholder
        {
            *placeholder = false;
            block.runs.clear();
            self.set_caret(Position::new(at.block, 0));
            return true;
        }
        let start = match run::locate(&block.runs, at.offset) {
            RunLocation::Boundary { index } if index > 0 => {
                let previous = &block.runs[index - 1];
                if matches!(previous, Run::Mention { .. }) || previous.is_placeholder() {
                    at.offset - previous.len()
                } else {
                    at.offset - 1
                }
            }
            _ => at.offset - 1,
        };
        delete_block_range(block, start, at.offset);
        self.set_caret(Position::new(at.block, start));
        true
    }

    fn merge_into_previous(&mut self, id: BlockId) -> bool {
        let Some(prev) = self.doc.prev_text_block(id) else {
            return false;
        };
        // Atomic blocks between the two stop the merge.
        let leaves = self.doc.leaves();
        let (Some(a), Some(b)) = (
            leaves.iter().position(|&l| l == prev),
            leaves.iter().position(|&l| l == id),
        ) else {
            return false;
        };
        if b != a + 1 {
            return false;
        }
        let runs = self
            .doc
            .get(id)
            .map(|block| block.runs.clone())
            .unwrap_or_default();
        let Some(prev_block) = self.doc.get_mut(prev) else {
            return false;
        };
        let offset = prev_block.len();
        append_runs(prev_block, runs);
        self.doc.remove(id);
        self.doc.prune_empty_lists();
        self.set_caret(Position::new(prev, offset));
        true
    }

    /// Enter: split or exit the block at the caret.
    pub fn split_block(&mut self) -> bool {
        if !self.selection.is_collapsed() {
            self.delete_selection();
        }
        let at = self.selection.focus;
        if !at.is_valid(self.doc) {
            return false;
        }
        let Some(block) = self.doc.get(at.block) else {
            return false;
        };
        let empty = block.is_empty()
            || matches!(
                block.kind,
                BlockKind::CodeBlock {
                    placeholder: true,
                    ..
                }
            );

        match block.kind.clone() {
            BlockKind::CodeBlock { .. } if empty => {
                self.set_kind(at.block, BlockKind::Paragraph);
                if let Some(block) = self.doc.get_mut(at.block) {
                    block.runs.clear();
                }
                self.set_caret(Position::new(at.block, 0));
                true
            }
            BlockKind::CodeBlock { .. } => {
                let text = block.text();
                if at.offset == block.len() && text.ends_with('\n') {
                    if let Some(block) = self.doc.get_mut(at.block) {
                        block.runs = vec![Run::text(text.trim_end_matches('\n'))];
                        run::normalize(&mut block.runs);
                    }
                    let id = self.insert_after(at.block, Block::empty_paragraph());
                    if let Some(id) = id {
                        self.set_caret(Position::new(id, 0));
                    }
                    id.is_some()
                } else {
                    self.insert_text(at, "\n", InlineStyle::PLAIN)
                }
            }
            BlockKind::ListItem if empty => {
                let lifted = self.lift_list_item(at.block).is_some();
                self.set_caret(Position::new(at.block, 0));
                lifted
            }
            BlockKind::Blockquote if empty => {
                self.set_kind(at.block, BlockKind::Paragraph);
                true
            }
            BlockKind::Heading(_) if at.offset == 0 && !empty => {
                self.insert_before(at.block, Block::empty_paragraph())
                    .is_some()
            }
            BlockKind::Heading(_) => self.split_at_caret(BlockKind::Paragraph),
            kind => self.split_at_caret(kind),
        }
    }

    /// Move everything after the caret into a new sibling of `kind`.
    pub(crate) fn split_at_caret(&mut self, kind: BlockKind) -> bool {
        let at = self.selection.focus;
        let Some(block) = self.doc.get_mut(at.block) else {
            return false;
        };
        let len = block.len();
        let tail = run::slice(&block.runs, at.offset, len);
        run::delete_range(&mut block.runs, at.offset, len);
        match self.insert_after(at.block, Block::new(kind, tail)) {
            Some(id) => {
                self.set_caret(Position::new(id, 0));
                true
            }
            None => false,
        }
    }

    fn insert_after(&mut self, id: BlockId, block: Block) -> Option<BlockId> {
        let parent = self.doc.parent(id)?;
        let index = self.doc.index_in_parent(id)?;
        Some(self.doc.insert_child(parent, index + 1, block))
    }

    fn insert_before(&mut self, id: BlockId, block: Block) -> Option<BlockId> {
        let parent = self.doc.parent(id)?;
        let index = self.doc.index_in_parent(id)?;
        Some(self.doc.insert_child(parent, index, block))
    }

    /// Insert `block` after the block holding the caret, splitting it at
    /// the caret first if text follows.
    pub fn insert_block_at_caret(&mut self, block: Block) -> Option<Splice> {
        let at = self.selection.focus;
        let current = self.doc.get(at.block)?;
        let before = run::slice(&current.runs, 0, at.offset);
        let after = run::slice(&current.runs, at.offset, current.len());
        self.splice_block(at.block, Some(before), block, Some(after))
    }

    pub(crate) fn set_kind(&mut self, id: BlockId, kind: BlockKind) {
        if let Some(block) = self.doc.get_mut(id) {
            block.kind = kind;
        }
    }

    /// Move a list item out of its list, splitting the list around it. The
    /// item keeps its id and becomes a paragraph.
    pub(crate) fn lift_list_item(&mut self, item: BlockId) -> Option<BlockId> {
        let list = self.doc.parent(item)?;
        let Some(BlockKind::List(kind)) = self.doc.kind(list).cloned() else {
            return None;
        };
        let outer = self.doc.parent(list)?;
        let list_index = self.doc.index_in_parent(list)?;
        let item_index = self.doc.index_in_parent(item)?;
        let trailing = self.doc.children(list)[item_index + 1..].to_vec();

        self.doc.detach(item);
        if !trailing.is_empty() {
            let tail = self.doc.insert_child(
                outer,
                list_index + 1,
                Block::new(BlockKind::List(kind), Vec::new()),
            );
            for (i, child) in trailing.into_iter().enumerate() {
                self.doc.detach(child);
                self.doc.attach(tail, i, child);
            }
        }
        self.doc.attach(outer, list_index + 1, item);
        self.set_kind(item, BlockKind::Paragraph);
        if self.doc.children(list).is_empty() {
            self.doc.remove(list);
        }
        Some(item)
    }

    /// Turn a top-level text block into an item of a `kind` list, joining an
    /// adjacent list of the same kind when there is one.
    pub(crate) fn wrap_in_list(&mut self, id: BlockId, kind: ListKind) -> Option<BlockId> {
        let parent = self.doc.parent(id)?;
        if parent != self.doc.root() {
            return None;
        }
        let index = self.doc.index_in_parent(id)?;
        let prev = index
            .checked_sub(1)
            .and_then(|i| self.list_at(parent, i, kind));
        let next = self.list_at(parent, index + 1, kind);

        self.doc.detach(id);
        let list = match (prev, next) {
            (Some(list), _) => {
                let end = self.doc.children(list).len();
                self.doc.attach(list, end, id);
                list
            }
            (None, Some(list)) => {
                self.doc.attach(list, 0, id);
                list
            }
            (None, None) => {
                let list =
                    self.doc
                        .insert_child(parent, index, Block::new(BlockKind::List(kind), Vec::new()));
                self.doc.attach(list, 0, id);
                list
            }
        };
        self.set_kind(id, BlockKind::ListItem);
        Some(self.merge_adjacent_lists(list))
    }

    /// Change a list's kind, merging it into same-kind neighbours.
    pub(crate) fn set_list_kind(&mut self, list: BlockId, kind: ListKind) -> Option<BlockId> {
        if !matches!(self.doc.kind(list), Some(BlockKind::List(_))) {
            return None;
        }
        self.set_kind(list, BlockKind::List(kind));
        Some(self.merge_adjacent_lists(list))
    }

    fn list_at(&self, parent: BlockId, index: usize, kind: ListKind) -> Option<BlockId> {
        self.doc
            .children(parent)
            .get(index)
            .copied()
            .filter(|&id| self.doc.kind(id) == Some(&BlockKind::List(kind)))
    }

    fn merge_adjacent_lists(&mut self, list: BlockId) -> BlockId {
        let Some(BlockKind::List(kind)) = self.doc.kind(list).cloned() else {
            return list;
        };
        let Some(parent) = self.doc.parent(list) else {
            return list;
        };
        let Some(index) = self.doc.index_in_parent(list) else {
            return list;
        };
        if let Some(next) = self.list_at(parent, index + 1, kind) {
            self.move_items(next, list);
            self.doc.remove(next);
        }
        if let Some(prev) = index
            .checked_sub(1)
            .and_then(|i| self.list_at(parent, i, kind))
        {
            self.move_items(list, prev);
            self.doc.remove(list);
            return prev;
        }
        list
    }

    fn move_items(&mut self, from: BlockId, to: BlockId) {
        for child in self.doc.children(from).to_vec() {
            self.doc.detach(child);
            let end = self.doc.children(to).len();
            self.doc.attach(to, end, child);
        }
    }

    /// Point the selection back into the document after a structural change.
    ///
    /// Out-of-range offsets are clamped; positions in freed or atomic blocks
    /// move to the text block nearest `hint`, then to the last text block.
    pub(crate) fn repair_selection(&mut self, hint: Option<BlockId>) {
        self.doc.ensure_not_empty();
        if self.selection.is_valid(self.doc) {
            return;
        }
        let clamp = |doc: &Document, p: Position| -> Option<Position> {
            let block = doc.get(p.block)?;
            (doc.is_attached(p.block) && block.kind.is_text_bearing())
                .then(|| Position::new(p.block, p.offset.min(block.len())))
        };
        if let (Some(anchor), Some(focus)) = (
            clamp(self.doc, self.selection.anchor),
            clamp(self.doc, self.selection.focus),
        ) {
            self.selection.anchor = anchor;
            self.selection.focus = focus;
            return;
        }
        let target = hint
            .and_then(|id| self.text_block_near(id))
            .or_else(|| self.doc.last_text_block())
            .unwrap_or_else(|| {
                let root = self.doc.root();
                self.doc.push_child(root, Block::empty_paragraph())
            });
        log::debug!("selection repaired to {target:?}");
        self.set_caret(Position::new(target, 0));
    }

    fn text_block_near(&self, id: BlockId) -> Option<BlockId> {
        if !self.doc.is_attached(id) {
            return None;
        }
        let kind = self.doc.kind(id)?;
        if kind.is_text_bearing() {
            return Some(id);
        }
        if kind.is_container() {
            return self
                .doc
                .children(id)
                .iter()
                .copied()
                .find(|&child| self.doc.kind(child).is_some_and(BlockKind::is_text_bearing));
        }
        self.doc
            .next_text_block(id)
            .or_else(|| self.doc.prev_text_block(id))
    }
}

pub(crate) fn selected_ranges(doc: &Document, selection: &Selection) -> Vec<(BlockId, usize, usize)> {
    let (start, end) = selection.ordered(doc);
    let blocks = doc.text_blocks();
    let (Some(first), Some(last)) = (
        blocks.iter().position(|&id| id == start.block),
        blocks.iter().position(|&id| id == end.block),
    ) else {
        return Vec::new();
    };
    blocks[first..=last]
        .iter()
        .map(|&id| {
            let len = doc.get(id).map_or(0, Block::len);
            let from = if id == start.block { start.offset } else { 0 };
            let to = if id == end.block { end.offset } else { len };
            (id, from.min(len), to.min(len))
        })
        .collect()
}

/// Index of a placeholder code run the offset touches.
pub(crate) fn placeholder_at(runs: &[Run], offset: usize) -> Option<usize> {
    let mut start = 0;
    for (index, run) in runs.iter().enumerate() {
        let end = start + run.len();
        if run.is_placeholder() && (start..=end).contains(&offset) {
            return Some(index);
        }
        start = end;
    }
    None
}

/// Whether text typed with `style` can join `run`. Links only absorb text
/// typed strictly inside them.
fn accepts(run: &Run, style: InlineStyle, interior: bool) -> bool {
    match run {
        Run::Text { marks, .. } => !style.code && *marks == style.marks,
        Run::Link { marks, .. } => interior && !style.code && *marks == style.marks,
        Run::Code {
            placeholder: false, ..
        } => style.code,
        _ => false,
    }
}

fn styled_run(text: &str, style: InlineStyle) -> Run {
    if style.code {
        Run::code(text)
    } else {
        Run::marked(text, style.marks)
    }
}

/// Insert styled text at a block offset and return the caret after it.
fn insert_styled(runs: &mut Vec<Run>, offset: usize, text: &str, style: InlineStyle) -> usize {
    let end = offset + text.chars().count();
    match run::locate(runs, offset) {
        RunLocation::Inside { index, .. } if matches!(runs[index], Run::Mention { .. }) => {
            let after = run::run_start(runs, index + 1);
            insert_styled(runs, after, text, style)
        }
        RunLocation::Inside { index, offset: inner } => {
            if accepts(&runs[index], style, true) {
                if let Some(slot) = runs[index].text_mut() {
                    let byte = run::byte_index(slot, inner);
                    slot.insert_str(byte, text);
                }
            } else {
                let index = run::split_at(runs, offset);
                runs.insert(index, styled_run(text, style));
            }
            end
        }
        RunLocation::Boundary { index } => {
            if index > 0 && accepts(&runs[index - 1], style, false) {
                if let Some(slot) = runs[index - 1].text_mut() {
                    slot.push_str(text);
                }
            } else if index < runs.len() && accepts(&runs[index], style, false) {
                if let Some(slot) = runs[index].text_mut() {
                    slot.insert_str(0, text);
                }
            } else {
                runs.insert(index, styled_run(text, style));
            }
            end
        }
    }
}

fn delete_block_range(block: &mut Block, start: usize, end: usize) {
    run::delete_range(&mut block.runs, start, end);
    run::normalize(&mut block.runs);
}

fn append_runs(block: &mut Block, runs: Vec<Run>) {
    if block.kind.is_code_block() {
        let mut text = block.text();
        text.push_str(&run::runs_text(&runs));
        block.runs = vec![Run::text(text)];
    } else {
        block.runs.extend(runs);
    }
    run::normalize(&mut block.runs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{EmbedDescriptor, EmbedType};
    use crate::models::run::Marks;
    use pretty_assertions::assert_eq;

    fn doc_with(text: &str) -> (Document, BlockId) {
        let doc = Document::from_blocks([Block::paragraph(vec![Run::text(text)])]);
        let id = doc.first_text_block().unwrap();
        (doc, id)
    }

    fn embed_block() -> Block {
        Block::embed(EmbedDescriptor::with_type(
            "https://example.com",
            EmbedType::Generic,
        ))
    }

    #[test]
    fn test_insert_text_at_strike_boundary_stays_outside() {
        // Given a strikethrough run with the caret at its end
        let strike = Marks::NONE.with(Mark::Strikethrough);
        let mut doc = Document::from_blocks([Block::paragraph(vec![Run::marked("gone", strike)])]);
        let id = doc.first_text_block().unwrap();
        let mut selection = Selection::caret(Position::new(id, 4));

        // When a plain space is inserted
        let mut mutator = Mutator::new(&mut doc, &mut selection);
        assert!(mutator.insert_text(Position::new(id, 4), " ", InlineStyle::PLAIN));

        // Then the strike run is untouched and the space is a sibling run
        assert_eq!(
            doc.get(id).unwrap().runs,
            vec![Run::marked("gone", strike), Run::text(" ")]
        );
        assert_eq!(selection.focus, Position::new(id, 5));
    }

    #[test]
    fn test_insert_text_replaces_placeholder_code() {
        let mut doc = Document::from_blocks([Block::paragraph(vec![
            Run::text("a "),
            Run::code_placeholder(),
        ])]);
        let id = doc.first_text_block().unwrap();
        let mut selection = Selection::caret(Position::new(id, 6));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        mutator.insert_text(Position::new(id, 6), "x", InlineStyle::PLAIN);

        assert_eq!(
            doc.get(id).unwrap().runs,
            vec![Run::text("a "), Run::code("x")]
        );
        assert_eq!(selection.focus.offset, 3);
    }

    #[test]
    fn test_insert_text_into_detached_block_is_noop() {
        let (mut doc, id) = doc_with("hi");
        let root = doc.root();
        let other = doc.push_child(root, Block::empty_paragraph());
        doc.remove(id);
        let mut selection = Selection::caret(Position::new(other, 0));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        assert!(!mutator.insert_text(Position::new(id, 0), "x", InlineStyle::PLAIN));
        assert!(!mutator.insert_inline(Run::text("x"), Position::new(id, 0)));
    }

    #[test]
    fn test_wrap_and_unwrap_selection() {
        let (mut doc, id) = doc_with("hello world");
        let mut selection = Selection::range(Position::new(id, 0), Position::new(id, 5));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        assert!(mutator.wrap_selection(Mark::Bold));
        assert!(mutator.unwrap_format(Mark::Bold, Scope::Selection));
        assert!(!mutator.unwrap_format(Mark::Bold, Scope::Block));

        assert_eq!(doc.get(id).unwrap().runs, vec![Run::text("hello world")]);
    }

    #[test]
    fn test_splice_embed_adds_sentinels_and_moves_caret_after() {
        let (mut doc, id) = doc_with("https://example.com");
        let mut selection = Selection::caret(Position::new(id, 19));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        let splice = mutator
            .splice_block(id, None, embed_block(), None)
            .unwrap();

        let top = doc.children(doc.root()).to_vec();
        assert_eq!(top.len(), 3);
        assert!(doc.get(top[0]).unwrap().is_empty_paragraph());
        assert_eq!(top[1], splice.inserted);
        assert!(doc.get(top[2]).unwrap().is_empty_paragraph());
        assert_eq!(selection.focus, Position::new(top[2], 0));
        assert!(doc.get(id).is_none());
    }

    #[test]
    fn test_splice_keeps_non_empty_parts_with_anchor_kind() {
        let mut doc = Document::from_blocks([Block::new(
            BlockKind::Blockquote,
            vec![Run::text("ab")],
        )]);
        let id = doc.first_text_block().unwrap();
        let mut selection = Selection::caret(Position::new(id, 0));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        let splice = mutator
            .splice_block(
                id,
                Some(vec![Run::text("a")]),
                embed_block(),
                Some(vec![Run::text("b")]),
            )
            .unwrap();

        let before = doc.get(splice.before.unwrap()).unwrap();
        assert_eq!(before.kind, BlockKind::Blockquote);
        assert_eq!(before.text(), "a");
        // before, sentinel, embed, sentinel, after
        assert_eq!(doc.block_count(), 5);
    }

    #[test]
    fn test_splice_on_detached_anchor_is_noop() {
        let (mut doc, id) = doc_with("x");
        let mut selection = Selection::caret(Position::new(id, 0));
        doc.detach(id);
        let mut mutator = Mutator::new(&mut doc, &mut selection);
        assert!(mutator.splice_block(id, None, embed_block(), None).is_none());
    }

    #[test]
    fn test_remove_embed_leaves_paragraph_with_caret() {
        let mut doc = Document::empty();
        let root = doc.root();
        let embed = doc.push_child(root, embed_block());
        let mut selection = Selection::caret(Position::new(root, 0));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        let paragraph = mutator.remove_embed(embed).unwrap();

        assert_eq!(doc.block_count(), 1);
        assert_eq!(selection.focus, Position::new(paragraph, 0));
        assert!(selection.is_valid(&doc));
    }

    #[test]
    fn test_enter_on_empty_list_item_exits_list() {
        let mut doc = Document::empty();
        let root = doc.root();
        let list = doc.push_child(root, Block::new(BlockKind::List(ListKind::Unordered), vec![]));
        doc.push_child(list, Block::new(BlockKind::ListItem, vec![Run::text("one")]));
        let empty = doc.push_child(list, Block::new(BlockKind::ListItem, vec![]));
        let mut selection = Selection::caret(Position::new(empty, 0));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        assert!(mutator.split_block());

        assert_eq!(doc.kind(empty), Some(&BlockKind::Paragraph));
        assert_eq!(doc.parent(empty), Some(root));
        assert_eq!(doc.children(list).len(), 1);
    }

    #[test]
    fn test_enter_in_code_block_after_blank_line_exits() {
        let mut doc = Document::from_blocks([Block::code_block(None, "let x = 1;\n")]);
        let id = doc.first_text_block().unwrap();
        let mut selection = Selection::caret(Position::new(id, 11));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        assert!(mutator.split_block());

        assert_eq!(doc.get(id).unwrap().text(), "let x = 1;");
        assert_eq!(doc.block_count(), 2);
        assert_ne!(selection.focus.block, id);
    }

    #[test]
    fn test_enter_in_code_block_mid_text_inserts_newline() {
        let mut doc = Document::from_blocks([Block::code_block(None, "ab")]);
        let id = doc.first_text_block().unwrap();
        let mut selection = Selection::caret(Position::new(id, 1));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        mutator.split_block();

        assert_eq!(doc.get(id).unwrap().text(), "a\nb");
        assert_eq!(selection.focus, Position::new(id, 2));
    }

    #[test]
    fn test_backspace_merges_paragraphs() {
        let mut doc = Document::from_blocks([
            Block::paragraph(vec![Run::text("ab")]),
            Block::paragraph(vec![Run::text("cd")]),
        ]);
        let blocks = doc.text_blocks();
        let mut selection = Selection::caret(Position::new(blocks[1], 0));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        assert!(mutator.delete_backward());

        assert_eq!(doc.block_count(), 1);
        assert_eq!(doc.get(blocks[0]).unwrap().text(), "abcd");
        assert_eq!(selection.focus, Position::new(blocks[0], 2));
    }

    #[test]
    fn test_backspace_removes_whole_mention() {
        let mut doc = Document::from_blocks([Block::paragraph(vec![
            Run::text("hi "),
            Run::mention("jane"),
        ])]);
        let id = doc.first_text_block().unwrap();
        let mut selection = Selection::caret(Position::new(id, 8));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        mutator.delete_backward();

        assert_eq!(doc.get(id).unwrap().runs, vec![Run::text("hi ")]);
        assert_eq!(selection.focus.offset, 3);
    }

    #[test]
    fn test_delete_selection_across_blocks() {
        let mut doc = Document::from_blocks([
            Block::paragraph(vec![Run::text("abc")]),
            Block::paragraph(vec![Run::text("middle")]),
            Block::paragraph(vec![Run::text("xyz")]),
        ]);
        let blocks = doc.text_blocks();
        let mut selection =
            Selection::range(Position::new(blocks[0], 1), Position::new(blocks[2], 2));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        assert!(mutator.delete_selection());

        assert_eq!(doc.block_count(), 1);
        assert_eq!(doc.get(blocks[0]).unwrap().text(), "az");
    }

    #[test]
    fn test_wrap_in_list_joins_neighbouring_list() {
        let mut doc = Document::empty();
        let root = doc.root();
        let list = doc.push_child(root, Block::new(BlockKind::List(ListKind::Ordered), vec![]));
        doc.push_child(list, Block::new(BlockKind::ListItem, vec![Run::text("one")]));
        let para = doc.push_child(root, Block::paragraph(vec![Run::text("two")]));
        let mut selection = Selection::caret(Position::new(para, 0));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        let joined = mutator.wrap_in_list(para, ListKind::Ordered).unwrap();

        assert_eq!(joined, list);
        assert_eq!(doc.children(list).len(), 2);
        assert_eq!(doc.block_count(), 1);
    }

    #[test]
    fn test_lift_middle_item_splits_list() {
        let mut doc = Document::empty();
        let root = doc.root();
        let list = doc.push_child(root, Block::new(BlockKind::List(ListKind::Unordered), vec![]));
        let items: Vec<BlockId> = ["a", "b", "c"]
            .into_iter()
            .map(|t| doc.push_child(list, Block::new(BlockKind::ListItem, vec![Run::text(t)])))
            .collect();
        let mut selection = Selection::caret(Position::new(items[1], 0));
        let mut mutator = Mutator::new(&mut doc, &mut selection);

        mutator.lift_list_item(items[1]);

        let top = doc.children(root).to_vec();
        assert_eq!(top.len(), 3);
        assert_eq!(top[1], items[1]);
        assert_eq!(doc.kind(items[1]), Some(&BlockKind::Paragraph));
        assert_eq!(doc.parent(items[2]), Some(top[2]));
    }
}
