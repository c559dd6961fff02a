/*!
 * # Editing Core
 *
 * All changes to a [`Document`](crate::models::Document) flow through this
 * module. The layers build on each other:
 *
 * - **`mutator`**: cursor-safe structural primitives (`insert_inline`,
 *   `wrap_selection`, `unwrap_format`, `replace_node`, `splice_block`) plus
 *   Enter/Backspace behaviour. Operations on detached blocks are no-ops and
 *   the selection is always repaired to an attached text block.
 * - **`format`**: derives [`FormatState`] from the selection and toggles
 *   inline marks, inline code and block styles on top of the mutator.
 * - **`input`**: maps key presses to edits, including the word-boundary rule
 *   that closes active inline marks on space and Tab indentation in code
 *   blocks.
 *
 * ## Usage Pattern
 *
 * ```rust
 * use editbored_engine::editing::{FormatEngine, KeyPress, handle_key};
 * use editbored_engine::models::{BlockStyle, Document, Position, Selection};
 *
 * let mut doc = Document::new();
 * let first = doc.first_text_block().unwrap();
 * let mut selection = Selection::caret(Position::new(first, 0));
 *
 * let mut engine = FormatEngine::new(&mut doc, &mut selection);
 * for c in "Hello".chars() {
 *     handle_key(&mut engine, KeyPress::char(c));
 * }
 * engine.toggle_block(BlockStyle::Heading1);
 * assert_eq!(engine.state().block, BlockStyle::Heading1);
 * ```
 */

pub mod format;
pub mod input;
pub mod mutator;

pub use format::{FormatEngine, FormatState, block_style};
pub use input::{Key, KeyOutcome, KeyPress, Modifiers, handle_key, type_char};
pub use mutator::{Mutator, Scope, Splice};
