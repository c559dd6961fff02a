use serde::{Deserialize, Serialize};

use crate::embed::EmbedDescriptor;
use crate::models::run::{self, Run};

/// Text shown in a code block inserted with nothing selected.
pub const CODE_BLOCK_PLACEHOLDER: &str = "// Your code here";

/// Generational handle to a block in a [`Document`] arena.
///
/// A handle outlives the block it named: once the slot is freed and reused
/// the generation no longer matches and lookups return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 | 1 => HeadingLevel::H1,
            2 => HeadingLevel::H2,
            _ => HeadingLevel::H3,
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            HeadingLevel::H1 => 1,
            HeadingLevel::H2 => 2,
            HeadingLevel::H3 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    Unordered,
    Ordered,
}

/// Structural kind of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// The editable root. Holds top-level blocks only.
    Root,
    Paragraph,
    Heading(HeadingLevel),
    Blockquote,
    /// A list container whose children are all `ListItem`s.
    List(ListKind),
    ListItem,
    /// Preformatted code held as a single unmarked text run.
    CodeBlock {
        language: Option<String>,
        placeholder: bool,
    },
    Embed(EmbedDescriptor),
    Rule,
}

impl BlockKind {
    /// Whether the caret can sit inside this block and runs may be stored.
    pub fn is_text_bearing(&self) -> bool {
        matches!(
            self,
            BlockKind::Paragraph
                | BlockKind::Heading(_)
                | BlockKind::Blockquote
                | BlockKind::ListItem
                | BlockKind::CodeBlock { .. }
        )
    }

    pub fn is_container(&self) -> bool {
        matches!(self, BlockKind::Root | BlockKind::List(_))
    }

    pub fn is_code_block(&self) -> bool {
        matches!(self, BlockKind::CodeBlock { .. })
    }

    /// Leaves the caret cannot enter.
    pub fn is_atomic(&self) -> bool {
        matches!(self, BlockKind::Embed(_) | BlockKind::Rule)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub runs: Vec<Run>,
    pub(crate) parent: Option<BlockId>,
    pub(crate) children: Vec<BlockId>,
}

impl Block {
    pub fn new(kind: BlockKind, runs: Vec<Run>) -> Self {
        Self {
            kind,
            runs,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn paragraph(runs: Vec<Run>) -> Self {
        Self::new(BlockKind::Paragraph, runs)
    }

    pub fn empty_paragraph() -> Self {
        Self::paragraph(Vec::new())
    }

    pub fn code_block(language: Option<String>, code: impl Into<String>) -> Self {
        Self::new(
            BlockKind::CodeBlock {
                language,
                placeholder: false,
            },
            vec![Run::text(code)],
        )
    }

    pub fn embed(descriptor: EmbedDescriptor) -> Self {
        Self::new(BlockKind::Embed(descriptor), Vec::new())
    }

    pub fn len(&self) -> usize {
        run::runs_len(&self.runs)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text(&self) -> String {
        run::runs_text(&self.runs)
    }

    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    pub fn children(&self) -> &[BlockId] {
        &self.children
    }

    pub fn is_empty_paragraph(&self) -> bool {
        self.kind == BlockKind::Paragraph && self.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    block: Option<Block>,
}

/// Word and character totals of the plain-text projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentStats {
    pub words: usize,
    pub characters: usize,
}

/// The editable document: an arena of blocks hanging off a single root.
///
/// Blocks are addressed through [`BlockId`]s. A block is *attached* while its
/// parent chain reaches the root; detached subtrees are freed immediately so
/// stale handles resolve to nothing.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: BlockId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A document holding one empty paragraph.
    pub fn new() -> Self {
        let mut doc = Self::empty();
        doc.ensure_not_empty();
        doc
    }

    /// A document with a root and no blocks. Callers must add at least one
    /// block before handing it to an editor.
    pub(crate) fn empty() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: BlockId {
                index: 0,
                generation: 0,
            },
        };
        doc.root = doc.alloc(Block::new(BlockKind::Root, Vec::new()));
        doc
    }

    /// Build a document from top-level blocks. List blocks are given their
    /// items through [`Document::push_child`] afterwards.
    pub fn from_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        let mut doc = Self::empty();
        for block in blocks {
            let root = doc.root;
            doc.push_child(root, block);
        }
        doc.ensure_not_empty();
        doc
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.block.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.block.as_mut())
    }

    pub fn kind(&self, id: BlockId) -> Option<&BlockKind> {
        self.get(id).map(|block| &block.kind)
    }

    pub fn children(&self, id: BlockId) -> &[BlockId] {
        self.get(id).map(|b| b.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).and_then(|b| b.parent)
    }

    /// True while the block exists and its ancestry reaches the root.
    pub fn is_attached(&self, id: BlockId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.get(current).and_then(|b| b.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    pub fn index_in_parent(&self, id: BlockId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub(crate) fn alloc(&mut self, mut block: Block) -> BlockId {
        block.parent = None;
        block.children.clear();
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation += 1;
                slot.block = Some(block);
                BlockId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    block: Some(block),
                });
                BlockId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    /// Allocate `block` and insert it under `parent` at `index`.
    pub(crate) fn insert_child(&mut self, parent: BlockId, index: usize, block: Block) -> BlockId {
        let id = self.alloc(block);
        self.attach(parent, index, id);
        id
    }

    /// Allocate `block` and append it under `parent`.
    pub fn push_child(&mut self, parent: BlockId, block: Block) -> BlockId {
        let index = self.children(parent).len();
        self.insert_child(parent, index, block)
    }

    /// Move an already allocated, detached block under `parent` at `index`.
    pub(crate) fn attach(&mut self, parent: BlockId, index: usize, id: BlockId) {
        if let Some(block) = self.get_mut(id) {
            block.parent = Some(parent);
        }
        if let Some(parent_block) = self.get_mut(parent) {
            let index = index.min(parent_block.children.len());
            parent_block.children.insert(index, id);
        }
    }

    /// Unlink a block from its parent without freeing it.
    pub(crate) fn detach(&mut self, id: BlockId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(parent_block) = self.get_mut(parent) {
            parent_block.children.retain(|&c| c != id);
        }
        if let Some(block) = self.get_mut(id) {
            block.parent = None;
        }
    }

    /// Detach a block and free it along with its subtree.
    pub(crate) fn remove(&mut self, id: BlockId) -> Option<Block> {
        if id == self.root || self.get(id).is_none() {
            return None;
        }
        self.detach(id);
        let children = self.children(id).to_vec();
        for child in children {
            self.remove(child);
        }
        let slot = self.slots.get_mut(id.index as usize)?;
        let block = slot.block.take();
        self.free.push(id.index);
        block
    }

    /// Guarantee the root holds at least one block.
    pub(crate) fn ensure_not_empty(&mut self) -> Option<BlockId> {
        if self.children(self.root).is_empty() {
            let root = self.root;
            return Some(self.push_child(root, Block::empty_paragraph()));
        }
        None
    }

    /// Blocks that can hold the caret or are atomic leaves (embeds, rules),
    /// in document order.
    pub fn leaves(&self) -> Vec<BlockId> {
        let mut out = Vec::new();
        self.collect_leaves(self.root, &mut out);
        out
    }

    fn collect_leaves(&self, id: BlockId, out: &mut Vec<BlockId>) {
        for &child in self.children(id) {
            match self.kind(child) {
                Some(kind) if kind.is_container() => self.collect_leaves(child, out),
                Some(_) => out.push(child),
                None => {}
            }
        }
    }

    /// Text-bearing leaves only.
    pub fn text_blocks(&self) -> Vec<BlockId> {
        self.leaves()
            .into_iter()
            .filter(|&id| self.kind(id).is_some_and(BlockKind::is_text_bearing))
            .collect()
    }

    /// Position of a leaf in document order.
    pub fn leaf_index(&self, id: BlockId) -> Option<usize> {
        self.leaves().iter().position(|&leaf| leaf == id)
    }

    pub fn first_text_block(&self) -> Option<BlockId> {
        self.text_blocks().first().copied()
    }

    pub fn last_text_block(&self) -> Option<BlockId> {
        self.text_blocks().last().copied()
    }

    /// Nearest text-bearing leaf after `id` in document order.
    pub fn next_text_block(&self, id: BlockId) -> Option<BlockId> {
        let leaves = self.leaves();
        let at = leaves.iter().position(|&leaf| leaf == id)?;
        leaves[at + 1..]
            .iter()
            .copied()
            .find(|&leaf| self.kind(leaf).is_some_and(BlockKind::is_text_bearing))
    }

    /// Nearest text-bearing leaf before `id` in document order.
    pub fn prev_text_block(&self, id: BlockId) -> Option<BlockId> {
        let leaves = self.leaves();
        let at = leaves.iter().position(|&leaf| leaf == id)?;
        leaves[..at]
            .iter()
            .rev()
            .copied()
            .find(|&leaf| self.kind(leaf).is_some_and(BlockKind::is_text_bearing))
    }

    /// Number of top-level blocks.
    pub fn block_count(&self) -> usize {
        self.children(self.root).len()
    }

    /// Plain-text projection, one line per leaf block.
    pub fn plain_text(&self) -> String {
        self.leaves()
            .into_iter()
            .filter_map(|id| self.get(id))
            .map(|block| match &block.kind {
                BlockKind::Embed(descriptor) => descriptor.source_url.clone(),
                _ => block.text(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn stats(&self) -> DocumentStats {
        let text = self.plain_text();
        DocumentStats {
            words: text.split_whitespace().count(),
            characters: text.chars().count(),
        }
    }

    /// Embed blocks in document order.
    pub fn embeds(&self) -> Vec<(BlockId, &EmbedDescriptor)> {
        self.leaves()
            .into_iter()
            .filter_map(|id| match self.kind(id) {
                Some(BlockKind::Embed(descriptor)) => Some((id, descriptor)),
                _ => None,
            })
            .collect()
    }

    /// Make sure the atomic block `id` has an empty paragraph immediately
    /// before and after it, reusing existing empty neighbours. Returns the
    /// two sentinels.
    pub(crate) fn ensure_sentinels(&mut self, id: BlockId) -> Option<(BlockId, BlockId)> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        let prev = index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
            .filter(|&prev| self.get(prev).is_some_and(Block::is_empty_paragraph));
        let before = match prev {
            Some(prev) => prev,
            None => self.insert_child(parent, index, Block::empty_paragraph()),
        };
        let index = self.index_in_parent(id)?;
        let next = self
            .children(parent)
            .get(index + 1)
            .copied()
            .filter(|&next| self.get(next).is_some_and(Block::is_empty_paragraph));
        let after = match next {
            Some(next) => next,
            None => self.insert_child(parent, index + 1, Block::empty_paragraph()),
        };
        Some((before, after))
    }

    /// Apply [`Document::ensure_sentinels`] to every atomic block.
    pub(crate) fn ensure_all_sentinels(&mut self) {
        let atomic: Vec<BlockId> = self
            .children(self.root)
            .iter()
            .copied()
            .filter(|&id| self.kind(id).is_some_and(BlockKind::is_atomic))
            .collect();
        for id in atomic {
            self.ensure_sentinels(id);
        }
    }

    /// Drop list containers left without items.
    pub(crate) fn prune_empty_lists(&mut self) {
        let empty: Vec<BlockId> = self
            .children(self.root)
            .iter()
            .copied()
            .filter(|&id| {
                matches!(self.kind(id), Some(BlockKind::List(_))) && self.children(id).is_empty()
            })
            .collect();
        for id in empty {
            self.remove(id);
        }
    }

    /// Remove every block, leaving a single empty paragraph.
    pub(crate) fn clear(&mut self) -> BlockId {
        for child in self.children(self.root).to_vec() {
            self.remove(child);
        }
        let root = self.root;
        self.push_child(root, Block::empty_paragraph())
    }
}
