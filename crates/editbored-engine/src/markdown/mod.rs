/*!
 * # Markdown and HTML Projections
 *
 * The document tree is the source of truth; markdown is how it is persisted
 * and HTML is what a host displays. Both directions sit behind traits so an
 * editor session can be built with other implementations.
 *
 * - **`render`**: markdown text to a [`Document`], via `pulldown-cmark`.
 * - **`convert`**: a [`Document`] back to markdown.
 * - **`html`**: a [`Document`] to HTML, with optional code highlighting.
 *
 * Embeds are written as their bare source URL on a line of their own (images
 * as `![Image](url)`), so loading a saved body and running the link-preview
 * scan brings them back.
 *
 * ## Usage Pattern
 *
 * ```rust
 * use editbored_engine::markdown::{render_markdown, to_markdown};
 *
 * let doc = render_markdown("# Title\n\nSome **bold** text\n");
 * assert_eq!(to_markdown(&doc), "# Title\n\nSome **bold** text\n");
 * ```
 */

pub mod convert;
pub mod html;
pub mod render;

use crate::models::Document;

pub use convert::{MarkdownWriter, to_markdown};
pub use html::to_html;
pub use render::{CmarkRenderer, render_markdown};

/// Builds a document from saved markdown.
pub trait MarkdownRenderer {
    fn render(&self, markdown: &str) -> Document;
}

/// Serialises a document to markdown for saving and the source view.
pub trait MarkdownConverter {
    fn convert(&self, doc: &Document) -> String;
}

/// Turns code into highlighted HTML. The result is inserted unescaped.
pub trait Highlighter {
    fn highlight(&self, code: &str, language: Option<&str>) -> String;
}
