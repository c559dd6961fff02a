//! Document to HTML, the projection a host displays.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::markdown::Highlighter;
use crate::models::document::{BlockId, BlockKind, Document, ListKind};
use crate::models::run::Run;

/// Project the document to HTML.
///
/// Code blocks go through `highlighter` when one is given and are escaped
/// verbatim otherwise. Embed markup is emitted as generated.
pub fn to_html(doc: &Document, highlighter: Option<&dyn Highlighter>) -> String {
    let mut out = String::new();
    for &id in doc.children(doc.root()) {
        write_block(doc, id, highlighter, &mut out);
    }
    out
}

fn write_block(
    doc: &Document,
    id: BlockId,
    highlighter: Option<&dyn Highlighter>,
    out: &mut String,
) {
    let Some(block) = doc.get(id) else {
        return;
    };
    match &block.kind {
        BlockKind::Paragraph | BlockKind::ListItem => {
            let tag = if block.kind == BlockKind::ListItem {
                "li"
            } else {
                "p"
            };
            out.push_str(&format!("<{tag}>"));
            if block.is_empty() {
                out.push_str("<br>");
            } else {
                write_runs(&block.runs, out);
            }
            out.push_str(&format!("</{tag}>\n"));
        }
        BlockKind::Heading(level) => {
            let level = level.level();
            out.push_str(&format!("<h{level}>"));
            write_runs(&block.runs, out);
            out.push_str(&format!("</h{level}>\n"));
        }
        BlockKind::Blockquote => {
            out.push_str("<blockquote>");
            write_runs(&block.runs, out);
            out.push_str("</blockquote>\n");
        }
        BlockKind::List(kind) => {
            let tag = match kind {
                ListKind::Unordered => "ul",
                ListKind::Ordered => "ol",
            };
            out.push_str(&format!("<{tag}>\n"));
            for &item in doc.children(id) {
                write_block(doc, item, highlighter, out);
            }
            out.push_str(&format!("</{tag}>\n"));
        }
        BlockKind::CodeBlock { language, .. } => {
            let code = block.text();
            let class = language
                .as_deref()
                .map(|lang| {
                    format!(
                        r#" class="language-{}""#,
                        encode_double_quoted_attribute(lang)
                    )
                })
                .unwrap_or_default();
            let body = match highlighter {
                Some(highlighter) => highlighter.highlight(&code, language.as_deref()),
                None => encode_text(&code).into_owned(),
            };
            out.push_str(&format!("<pre><code{class}>{body}</code></pre>\n"));
        }
        BlockKind::Embed(descriptor) => {
            out.push_str(&descriptor.markup);
            out.push('\n');
        }
        BlockKind::Rule => out.push_str("<hr>\n"),
        BlockKind::Root => {}
    }
}

fn write_runs(runs: &[Run], out: &mut String) {
    for run in runs {
        match run {
            Run::Text { text, marks } | Run::Link { text, marks, .. } => {
                let mut open = Vec::new();
                if marks.strikethrough {
                    open.push("s");
                }
                if marks.bold {
                    open.push("strong");
                }
                if marks.italic {
                    open.push("em");
                }
                for tag in &open {
                    out.push_str(&format!("<{tag}>"));
                }
                match run {
                    Run::Link { href, .. } => out.push_str(&format!(
                        r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                        encode_double_quoted_attribute(href),
                        encode_text(text)
                    )),
                    _ => out.push_str(&encode_text(text)),
                }
                for tag in open.iter().rev() {
                    out.push_str(&format!("</{tag}>"));
                }
            }
            Run::Code { text, placeholder } => {
                let class = if *placeholder {
                    r#" class="code-placeholder""#
                } else {
                    ""
                };
                out.push_str(&format!("<code{class}>{}</code>", encode_text(text)));
            }
            Run::Mention { username } => out.push_str(&format!(
                r#"<span class="mention" data-username="{}">@{}</span>"#,
                encode_double_quoted_attribute(username),
                encode_text(username)
            )),
        }
    }
}
