//! Document to markdown.

use crate::embed::EmbedType;
use crate::markdown::MarkdownConverter;
use crate::models::document::{BlockId, BlockKind, Document, ListKind};
use crate::models::run::{Mark, Marks, Run};

/// Serialise a document to markdown.
///
/// Empty paragraphs (including embed sentinels) are not written; blocks are
/// separated by a blank line and the output ends with a newline unless the
/// document is empty.
pub fn to_markdown(doc: &Document) -> String {
    let blocks: Vec<String> = doc
        .children(doc.root())
        .iter()
        .filter_map(|&id| write_block(doc, id))
        .collect();
    if blocks.is_empty() {
        return String::new();
    }
    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}

/// [`MarkdownConverter`] producing CommonMark with `~~` strikethrough.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownWriter;

impl MarkdownConverter for MarkdownWriter {
    fn convert(&self, doc: &Document) -> String {
        to_markdown(doc)
    }
}

fn write_block(doc: &Document, id: BlockId) -> Option<String> {
    let block = doc.get(id)?;
    match &block.kind {
        BlockKind::Paragraph if block.is_empty() => None,
        BlockKind::Paragraph => Some(escape_line_start(&write_inline(&block.runs))),
        BlockKind::Heading(level) => Some(format!(
            "{} {}",
            "#".repeat(level.level() as usize),
            write_inline(&block.runs)
        )),
        BlockKind::Blockquote => Some(format!("> {}", write_inline(&block.runs))),
        BlockKind::List(kind) => {
            let items: Vec<String> = doc
                .children(id)
                .iter()
                .filter_map(|&item| doc.get(item))
                .enumerate()
                .map(|(i, item)| {
                    let marker = match kind {
                        ListKind::Unordered => "-".to_string(),
                        ListKind::Ordered => format!("{}.", i + 1),
                    };
                    format!("{marker} {}", write_inline(&item.runs))
                })
                .collect();
            (!items.is_empty()).then(|| items.join("\n"))
        }
        BlockKind::CodeBlock {
            language,
            placeholder,
        } => {
            let code = if *placeholder {
                String::new()
            } else {
                block.text()
            };
            let fence = fence_for(&code, '`', 3);
            let language = language.as_deref().unwrap_or("");
            if code.is_empty() {
                Some(format!("{fence}{language}\n{fence}"))
            } else {
                Some(format!("{fence}{language}\n{code}\n{fence}"))
            }
        }
        BlockKind::Embed(descriptor) => match descriptor.embed_type {
            EmbedType::Image => Some(format!(
                "![Image]({})",
                write_destination(&descriptor.source_url)
            )),
            _ => Some(descriptor.source_url.clone()),
        },
        BlockKind::Rule => Some("---".to_string()),
        // Orphan items only appear transiently; write them as paragraphs
        BlockKind::ListItem => Some(escape_line_start(&write_inline(&block.runs))),
        BlockKind::Root => None,
    }
}

const MARK_ORDER: [Mark; 3] = [Mark::Strikethrough, Mark::Bold, Mark::Italic];

fn delimiter(mark: Mark) -> &'static str {
    match mark {
        Mark::Bold => "**",
        Mark::Italic => "*",
        Mark::Strikethrough => "~~",
    }
}

/// Open/close delimiters as marks change between runs.
///
/// Whitespace at the edges of a marked run is held back and written between
/// the closing and opening delimiters of the next transition, since
/// `** bold**` does not parse as emphasis.
struct InlineWriter {
    out: String,
    open: Vec<Mark>,
    pending_space: String,
}

impl InlineWriter {
    fn transition(&mut self, want: Marks) {
        while let Some(pos) = self.open.iter().position(|&m| !want.contains(m)) {
            while self.open.len() > pos {
                if let Some(mark) = self.open.pop() {
                    self.out.push_str(delimiter(mark));
                }
            }
        }
        self.out.push_str(&self.pending_space);
        self.pending_space.clear();
        for mark in MARK_ORDER {
            if want.contains(mark) && !self.open.contains(&mark) {
                self.open.push(mark);
                self.out.push_str(delimiter(mark));
            }
        }
    }

    fn marked_text(&mut self, text: &str, marks: Marks) {
        if marks.is_empty() {
            self.transition(Marks::NONE);
            self.out.push_str(&escape_text(text));
            return;
        }
        let core = text.trim();
        if core.is_empty() {
            self.pending_space.push_str(text);
            return;
        }
        let leading = &text[..text.len() - text.trim_start().len()];
        let trailing = &text[text.trim_end().len()..];
        self.pending_space.push_str(leading);
        self.transition(marks);
        self.out.push_str(&escape_text(core));
        self.pending_space.push_str(trailing);
    }

    fn finish(mut self) -> String {
        self.transition(Marks::NONE);
        self.out
    }
}

fn write_inline(runs: &[Run]) -> String {
    let mut writer = InlineWriter {
        out: String::new(),
        open: Vec::new(),
        pending_space: String::new(),
    };
    for run in runs {
        match run {
            Run::Text { text, marks } => writer.marked_text(text, *marks),
            Run::Code { placeholder: true, .. } => {}
            Run::Code { text, .. } => {
                writer.transition(Marks::NONE);
                writer.out.push_str(&code_span(text));
            }
            Run::Link { href, text, marks } => {
                writer.transition(*marks);
                writer.out.push('[');
                writer.out.push_str(&escape_text(text));
                writer.out.push_str("](");
                writer.out.push_str(&write_destination(href));
                writer.out.push(')');
            }
            Run::Mention { username } => {
                writer.transition(Marks::NONE);
                writer.out.push('@');
                writer.out.push_str(username);
            }
        }
    }
    writer.finish()
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '~' | '[' | ']' | '<') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape characters that would turn a paragraph into another block.
fn escape_line_start(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(c @ ('#' | '>' | '-' | '+' | '=')) => format!("{indent}\\{c}{}", chars.as_str()),
        Some(c) if c.is_ascii_digit() => {
            let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
            let (number, rest) = trimmed.split_at(digits);
            match rest.chars().next() {
                Some(marker @ ('.' | ')')) => {
                    format!("{indent}{number}\\{marker}{}", &rest[1..])
                }
                _ => line.to_string(),
            }
        }
        _ => line.to_string(),
    }
}

fn write_destination(href: &str) -> String {
    if href.contains([' ', '(', ')', '<', '>']) {
        format!("<{}>", href.replace('<', "%3C").replace('>', "%3E"))
    } else {
        href.to_string()
    }
}

fn code_span(code: &str) -> String {
    let fence = fence_for(code, '`', 1);
    if code.starts_with('`') || code.ends_with('`') {
        format!("{fence} {code} {fence}")
    } else {
        format!("{fence}{code}{fence}")
    }
}

/// A fence of `c` longer than any run of `c` inside `content`.
fn fence_for(content: &str, c: char, min: usize) -> String {
    let mut longest = 0;
    let mut current = 0;
    for ch in content.chars() {
        if ch == c {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    c.to_string().repeat(min.max(longest + 1))
}
