use serde::{Deserialize, Serialize};

use crate::models::document::{BlockId, Document};
use crate::models::run::Marks;

/// A caret location: a text-bearing block and a char offset into its runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub block: BlockId,
    pub offset: usize,
}

impl Position {
    pub fn new(block: BlockId, offset: usize) -> Self {
        Self { block, offset }
    }

    /// True if the position names an attached text block and lies within it.
    pub fn is_valid(&self, doc: &Document) -> bool {
        doc.is_attached(self.block)
            && doc
                .get(self.block)
                .is_some_and(|b| b.kind.is_text_bearing() && self.offset <= b.len())
    }
}

/// Inline formatting of inserted text.
///
/// A selection carries one as `pending` after an inline toggle with nothing
/// selected; it is dropped whenever the caret moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineStyle {
    pub marks: Marks,
    pub code: bool,
}

/// Anchor/focus pair. Collapsed when both ends coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
    pub pending: Option<InlineStyle>,
}

impl InlineStyle {
    pub const PLAIN: InlineStyle = InlineStyle {
        marks: Marks::NONE,
        code: false,
    };
}

impl Selection {
    pub fn caret(at: Position) -> Self {
        Self {
            anchor: at,
            focus: at,
            pending: None,
        }
    }

    pub fn range(anchor: Position, focus: Position) -> Self {
        Self {
            anchor,
            focus,
            pending: None,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// The selection ends in document order as `(start, end)`.
    pub fn ordered(&self, doc: &Document) -> (Position, Position) {
        if self.anchor.block == self.focus.block {
            if self.anchor.offset <= self.focus.offset {
                return (self.anchor, self.focus);
            }
            return (self.focus, self.anchor);
        }
        match (
            doc.leaf_index(self.anchor.block),
            doc.leaf_index(self.focus.block),
        ) {
            (Some(a), Some(f)) if f < a => (self.focus, self.anchor),
            _ => (self.anchor, self.focus),
        }
    }

    pub fn is_valid(&self, doc: &Document) -> bool {
        self.anchor.is_valid(doc) && self.focus.is_valid(doc)
    }
}

/// Block-level formatting axis. Exactly one is active at any caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockStyle {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Blockquote,
    CodeBlock,
    BulletList,
    NumberedList,
}

impl BlockStyle {
    pub fn is_list(&self) -> bool {
        matches!(self, BlockStyle::BulletList | BlockStyle::NumberedList)
    }
}
