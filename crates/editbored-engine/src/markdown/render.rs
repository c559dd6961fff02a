//! Markdown parsing into the document tree.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::embed::{EmbedDescriptor, EmbedType};
use crate::markdown::MarkdownRenderer;
use crate::models::document::{Block, BlockId, BlockKind, Document, HeadingLevel, ListKind};
use crate::models::run::{self, Marks, Run};

/// Parse markdown into a document.
///
/// Only the constructs the editor can hold survive: headings deeper than
/// three become level three, nested lists are flattened into their top-level
/// list, and images become image embeds. Raw HTML is kept as plain text.
pub fn render_markdown(markdown: &str) -> Document {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
    let mut builder = DocumentBuilder::new();

    for event in parser {
        builder.process_event(event);
    }

    builder.finish()
}

/// [`MarkdownRenderer`] backed by `pulldown-cmark`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmarkRenderer;

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, markdown: &str) -> Document {
        render_markdown(markdown)
    }
}

/// Turns the pulldown-cmark event stream into blocks.
///
/// Inline formatting is tracked as nesting depths rather than a tag stack:
/// `**a *b***` emits Start(Strong), Text, Start(Emphasis), Text, End, End,
/// and every text event takes the marks active at that moment.
struct DocumentBuilder {
    doc: Document,
    /// Text-bearing block being filled
    current: Option<Block>,
    bold: usize,
    italic: usize,
    strikethrough: usize,
    /// Open link: destination and accumulated text
    link: Option<(String, String)>,
    /// Open image destination; its alt text is dropped
    image: Option<String>,
    /// Open code block: language and accumulated code
    code: Option<(Option<String>, String)>,
    quote_depth: usize,
    list_depth: usize,
    list_kind: ListKind,
    /// Container receiving items of the current top-level list
    list: Option<BlockId>,
}

impl DocumentBuilder {
    fn new() -> Self {
        Self {
            doc: Document::empty(),
            current: None,
            bold: 0,
            italic: 0,
            strikethrough: 0,
            link: None,
            image: None,
            code: None,
            quote_depth: 0,
            list_depth: 0,
            list_kind: ListKind::Unordered,
            list: None,
        }
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::Start(Tag::Paragraph) => {
                if self.list_depth == 0 {
                    self.flush();
                } else if self.current.as_ref().is_some_and(|b| !b.is_empty()) {
                    // Second paragraph of a loose list item
                    self.push_text(" ");
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if self.list_depth == 0 {
                    self.flush();
                }
            }
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush();
                let level = HeadingLevel::from_level(level as u8);
                self.current = Some(Block::new(BlockKind::Heading(level), Vec::new()));
            }
            Event::End(TagEnd::Heading(_)) => self.flush(),
            Event::Start(Tag::BlockQuote(_)) => {
                self.flush();
                self.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            Event::Start(Tag::List(first_number)) => {
                self.flush();
                if self.list_depth == 0 {
                    self.list_kind = if first_number.is_some() {
                        ListKind::Ordered
                    } else {
                        ListKind::Unordered
                    };
                    self.list = None;
                }
                self.list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    self.list = None;
                }
            }
            Event::Start(Tag::Item) => {
                self.flush();
                self.current = Some(Block::new(BlockKind::ListItem, Vec::new()));
            }
            Event::End(TagEnd::Item) => self.flush(),
            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                self.code = Some((language, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, mut code)) = self.code.take() {
                    if code.ends_with('\n') {
                        code.pop();
                    }
                    self.push_block(Block::code_block(language, code));
                }
            }
            Event::Start(Tag::Emphasis) => self.italic += 1,
            Event::End(TagEnd::Emphasis) => self.italic = self.italic.saturating_sub(1),
            Event::Start(Tag::Strong) => self.bold += 1,
            Event::End(TagEnd::Strong) => self.bold = self.bold.saturating_sub(1),
            Event::Start(Tag::Strikethrough) => self.strikethrough += 1,
            Event::End(TagEnd::Strikethrough) => {
                self.strikethrough = self.strikethrough.saturating_sub(1)
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                self.link = Some((dest_url.to_string(), String::new()));
            }
            Event::End(TagEnd::Link) => {
                if let Some((href, text)) = self.link.take() {
                    let marks = self.marks();
                    self.push_run(Run::Link { href, text, marks });
                }
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                self.image = Some(dest_url.to_string());
            }
            Event::End(TagEnd::Image) => {
                if let Some(url) = self.image.take() {
                    self.flush();
                    let descriptor = EmbedDescriptor::with_type(&url, EmbedType::Image);
                    self.push_block(Block::embed(descriptor));
                }
            }
            Event::Text(text) => {
                if let Some((_, code)) = &mut self.code {
                    code.push_str(&text);
                } else if self.image.is_none() {
                    self.push_text(&text);
                }
            }
            Event::Code(code) => {
                if let Some((_, link_text)) = &mut self.link {
                    link_text.push_str(&code);
                } else {
                    self.push_run(Run::code(code.to_string()));
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html),
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, code)) = &mut self.code {
                    code.push('\n');
                } else {
                    self.push_text(" ");
                }
            }
            Event::Rule => {
                self.flush();
                self.push_block(Block::new(BlockKind::Rule, Vec::new()));
            }
            _ => {}
        }
    }

    fn marks(&self) -> Marks {
        Marks {
            bold: self.bold > 0,
            italic: self.italic > 0,
            strikethrough: self.strikethrough > 0,
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some((_, link_text)) = &mut self.link {
            link_text.push_str(text);
            return;
        }
        let marks = self.marks();
        self.push_run(Run::marked(text, marks));
    }

    fn push_run(&mut self, run: Run) {
        let kind = if self.list_depth > 0 {
            BlockKind::ListItem
        } else if self.quote_depth > 0 {
            BlockKind::Blockquote
        } else {
            BlockKind::Paragraph
        };
        self.current
            .get_or_insert_with(|| Block::new(kind, Vec::new()))
            .runs
            .push(run);
    }

    /// Move the block being filled into the document. Empty paragraphs,
    /// quotes and headings are dropped.
    fn flush(&mut self) {
        let Some(mut block) = self.current.take() else {
            return;
        };
        run::normalize(&mut block.runs);
        if block.is_empty() && block.kind != BlockKind::ListItem {
            return;
        }
        self.push_block(block);
    }

    fn push_block(&mut self, block: Block) {
        let root = self.doc.root();
        if block.kind != BlockKind::ListItem {
            // Anything else landing mid-list splits it
            self.list = None;
            self.doc.push_child(root, block);
            return;
        }
        let list = match self.list {
            Some(list) => list,
            None => {
                let list = self
                    .doc
                    .push_child(root, Block::new(BlockKind::List(self.list_kind), Vec::new()));
                self.list = Some(list);
                list
            }
        };
        self.doc.push_child(list, block);
    }

    fn finish(mut self) -> Document {
        self.flush();
        self.doc.ensure_all_sentinels();
        self.doc.ensure_not_empty();
        self.doc
    }
}
