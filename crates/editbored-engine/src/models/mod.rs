pub mod document;
pub mod run;
pub mod selection;

pub use document::{
    Block, BlockId, BlockKind, CODE_BLOCK_PLACEHOLDER, Document, DocumentStats, HeadingLevel,
    ListKind,
};
pub use run::{CODE_SPAN_PLACEHOLDER, Mark, Marks, Run};
pub use selection::{BlockStyle, InlineStyle, Position, Selection};
