use serde::{Deserialize, Serialize};

/// Text used for an inline code span inserted with nothing selected.
pub const CODE_SPAN_PLACEHOLDER: &str = "code";

/// An inline formatting axis that can be toggled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    Bold,
    Italic,
    Strikethrough,
}

/// The set of inline marks carried by a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Marks {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
}

impl Marks {
    pub const NONE: Marks = Marks {
        bold: false,
        italic: false,
        strikethrough: false,
    };

    pub fn contains(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Strikethrough => self.strikethrough,
        }
    }

    pub fn set(&mut self, mark: Mark, on: bool) {
        match mark {
            Mark::Bold => self.bold = on,
            Mark::Italic => self.italic = on,
            Mark::Strikethrough => self.strikethrough = on,
        }
    }

    pub fn with(mut self, mark: Mark) -> Self {
        self.set(mark, true);
        self
    }

    pub fn without(mut self, mark: Mark) -> Self {
        self.set(mark, false);
        self
    }

    pub fn is_empty(&self) -> bool {
        !(self.bold || self.italic || self.strikethrough)
    }

    /// Marks present in both sets.
    pub fn intersect(&self, other: &Marks) -> Marks {
        Marks {
            bold: self.bold && other.bold,
            italic: self.italic && other.italic,
            strikethrough: self.strikethrough && other.strikethrough,
        }
    }
}

/// An inline run inside a text-bearing block.
///
/// Offsets into a block are measured in `char`s across its runs, so every
/// variant reports its length through [`Run::len`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Run {
    /// Plain or marked text.
    Text { text: String, marks: Marks },
    /// An inline code span. Marks never apply inside code.
    Code { text: String, placeholder: bool },
    /// A hyperlink whose visible text may carry marks.
    Link {
        href: String,
        text: String,
        marks: Marks,
    },
    /// An atomic `@username` reference.
    Mention { username: String },
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Run::Text {
            text: text.into(),
            marks: Marks::NONE,
        }
    }

    pub fn marked(text: impl Into<String>, marks: Marks) -> Self {
        Run::Text {
            text: text.into(),
            marks,
        }
    }

    pub fn code(text: impl Into<String>) -> Self {
        Run::Code {
            text: text.into(),
            placeholder: false,
        }
    }

    pub fn code_placeholder() -> Self {
        Run::Code {
            text: CODE_SPAN_PLACEHOLDER.to_string(),
            placeholder: true,
        }
    }

    pub fn link(href: impl Into<String>, text: impl Into<String>) -> Self {
        Run::Link {
            href: href.into(),
            text: text.into(),
            marks: Marks::NONE,
        }
    }

    pub fn mention(username: impl Into<String>) -> Self {
        Run::Mention {
            username: username.into(),
        }
    }

    /// Length in chars as seen by the caret.
    pub fn len(&self) -> usize {
        match self {
            Run::Text { text, .. } | Run::Code { text, .. } | Run::Link { text, .. } => {
                text.chars().count()
            }
            Run::Mention { username } => 1 + username.chars().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The text a reader sees for this run.
    pub fn display_text(&self) -> String {
        match self {
            Run::Text { text, .. } | Run::Code { text, .. } | Run::Link { text, .. } => {
                text.clone()
            }
            Run::Mention { username } => format!("@{username}"),
        }
    }

    /// Inline marks of the run; code spans and mentions carry none.
    pub fn marks(&self) -> Marks {
        match self {
            Run::Text { marks, .. } | Run::Link { marks, .. } => *marks,
            Run::Code { .. } | Run::Mention { .. } => Marks::NONE,
        }
    }

    pub(crate) fn marks_mut(&mut self) -> Option<&mut Marks> {
        match self {
            Run::Text { marks, .. } | Run::Link { marks, .. } => Some(marks),
            Run::Code { .. } | Run::Mention { .. } => None,
        }
    }

    fn text_str(&self) -> Option<&str> {
        match self {
            Run::Text { text, .. } | Run::Code { text, .. } | Run::Link { text, .. } => Some(text),
            Run::Mention { .. } => None,
        }
    }

    pub(crate) fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            Run::Text { text, .. } | Run::Code { text, .. } | Run::Link { text, .. } => Some(text),
            Run::Mention { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Run::Code {
            placeholder: true,
            ..
        })
    }

    /// Split at a char offset into `(head, tail)`.
    ///
    /// Mentions are atomic and cannot be split; `None` is returned for them
    /// and for offsets at either edge.
    fn split(&self, at: usize) -> Option<(Run, Run)> {
        if at == 0 || at >= self.len() {
            return None;
        }
        let with_text = |text: String| -> Run {
            let mut run = self.clone();
            if let Some(slot) = run.text_mut() {
                *slot = text;
            }
            run
        };
        match self {
            Run::Text { text, .. } | Run::Code { text, .. } | Run::Link { text, .. } => {
                let byte = byte_index(text, at);
                Some((
                    with_text(text[..byte].to_string()),
                    with_text(text[byte..].to_string()),
                ))
            }
            Run::Mention { .. } => None,
        }
    }

    fn can_merge(&self, next: &Run) -> bool {
        match (self, next) {
            (Run::Text { marks: a, .. }, Run::Text { marks: b, .. }) => a == b,
            (
                Run::Link {
                    href: ha,
                    marks: ma,
                    ..
                },
                Run::Link {
                    href: hb,
                    marks: mb,
                    ..
                },
            ) => ha == hb && ma == mb,
            (
                Run::Code {
                    placeholder: false, ..
                },
                Run::Code {
                    placeholder: false, ..
                },
            ) => true,
            _ => false,
        }
    }
}

/// Convert a char offset into a byte index, clamping to the string end.
pub(crate) fn byte_index(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

/// Where a block offset falls among its runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLocation {
    /// Strictly inside run `index`, `offset` chars from its start.
    Inside { index: usize, offset: usize },
    /// On the boundary before run `index` (`index == runs.len()` at the end).
    Boundary { index: usize },
}

/// Total char length of a run sequence.
pub fn runs_len(runs: &[Run]) -> usize {
    runs.iter().map(Run::len).sum()
}

/// Plain text of a run sequence.
pub fn runs_text(runs: &[Run]) -> String {
    runs.iter().map(Run::display_text).collect()
}

pub fn locate(runs: &[Run], offset: usize) -> RunLocation {
    let mut start = 0;
    for (index, run) in runs.iter().enumerate() {
        let len = run.len();
        if offset == start {
            return RunLocation::Boundary { index };
        }
        if offset < start + len {
            return RunLocation::Inside {
                index,
                offset: offset - start,
            };
        }
        start += len;
    }
    RunLocation::Boundary { index: runs.len() }
}

/// Char offset at which run `index` starts.
pub fn run_start(runs: &[Run], index: usize) -> usize {
    runs.iter().take(index).map(Run::len).sum()
}

/// Ensure a run boundary exists at `offset` and return the index of the
/// first run at or after it.
///
/// An offset inside a mention snaps to the boundary after the mention.
pub fn split_at(runs: &mut Vec<Run>, offset: usize) -> usize {
    match locate(runs, offset) {
        RunLocation::Boundary { index } => index,
        RunLocation::Inside { index, offset } => match runs[index].split(offset) {
            Some((head, tail)) => {
                runs[index] = head;
                runs.insert(index + 1, tail);
                index + 1
            }
            None => index + 1,
        },
    }
}

/// Drop empty runs and merge neighbours that render identically.
pub fn normalize(runs: &mut Vec<Run>) {
    runs.retain(|run| !run.is_empty() || run.is_placeholder());
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs.drain(..) {
        if let Some(last) = merged.last_mut()
            && last.can_merge(&run)
        {
            if let (Some(dst), Some(src)) = (last.text_mut(), run.text_str()) {
                dst.push_str(src);
            }
            continue;
        }
        merged.push(run);
    }
    *runs = merged;
}

/// Remove the char range `start..end` from a run sequence.
///
/// Mentions that overlap the range are removed whole.
pub fn delete_range(runs: &mut Vec<Run>, start: usize, end: usize) {
    if start >= end {
        return;
    }
    let first = split_at(runs, start);
    let last = split_at(runs, end);
    runs.drain(first..last);
    normalize(runs);
}

/// Clone of the runs covering `start..end`.
pub fn slice(runs: &[Run], start: usize, end: usize) -> Vec<Run> {
    let mut copy = runs.to_vec();
    let tail = split_at(&mut copy, end);
    copy.truncate(tail);
    let head = split_at(&mut copy, start);
    copy.drain(..head);
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bold() -> Marks {
        Marks::NONE.with(Mark::Bold)
    }

    #[test]
    fn test_mention_length_includes_at_sign() {
        assert_eq!(Run::mention("jane").len(), 5);
        assert_eq!(Run::mention("jane").display_text(), "@jane");
    }

    #[test]
    fn test_locate_boundaries_and_interiors() {
        let runs = vec![Run::text("ab"), Run::marked("cd", bold())];
        assert_eq!(locate(&runs, 0), RunLocation::Boundary { index: 0 });
        assert_eq!(
            locate(&runs, 1),
            RunLocation::Inside {
                index: 0,
                offset: 1
            }
        );
        assert_eq!(locate(&runs, 2), RunLocation::Boundary { index: 1 });
        assert_eq!(locate(&runs, 4), RunLocation::Boundary { index: 2 });
    }

    #[test]
    fn test_split_at_inside_text() {
        let mut runs = vec![Run::text("hello")];
        let index = split_at(&mut runs, 2);
        assert_eq!(index, 1);
        assert_eq!(runs, vec![Run::text("he"), Run::text("llo")]);
    }

    #[test]
    fn test_split_at_handles_multibyte_text() {
        let mut runs = vec![Run::text("héllo")];
        split_at(&mut runs, 2);
        assert_eq!(runs, vec![Run::text("hé"), Run::text("llo")]);
    }

    #[test]
    fn test_split_inside_mention_snaps_after_it() {
        let mut runs = vec![Run::mention("jane"), Run::text("!")];
        let index = split_at(&mut runs, 2);
        assert_eq!(index, 1);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_normalize_merges_equal_marks_and_drops_empty() {
        let mut runs = vec![
            Run::text("a"),
            Run::text(""),
            Run::text("b"),
            Run::marked("c", bold()),
            Run::marked("d", bold()),
        ];
        normalize(&mut runs);
        assert_eq!(runs, vec![Run::text("ab"), Run::marked("cd", bold())]);
    }

    #[test]
    fn test_normalize_keeps_placeholder_separate() {
        let mut runs = vec![Run::code("x"), Run::code_placeholder()];
        normalize(&mut runs);
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn test_delete_range_across_runs() {
        let mut runs = vec![Run::text("abc"), Run::marked("def", bold())];
        delete_range(&mut runs, 2, 4);
        assert_eq!(runs, vec![Run::text("ab"), Run::marked("ef", bold())]);
    }

    #[test]
    fn test_slice_returns_covered_portion() {
        let runs = vec![Run::text("abc"), Run::marked("def", bold())];
        assert_eq!(
            slice(&runs, 1, 5),
            vec![Run::text("bc"), Run::marked("de", bold())]
        );
    }
}
