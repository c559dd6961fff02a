//! `@username` mentions: query detection, user lookup and completion.

use serde::{Deserialize, Serialize};

use crate::editing::Mutator;
use crate::models::document::{BlockId, Document};
use crate::models::run::{self, Run, RunLocation};
use crate::models::selection::{Position, Selection};

pub const MENTION_TRIGGER: char = '@';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionUser {
    pub username: String,
    pub name: String,
}

impl MentionUser {
    pub fn new(username: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
        }
    }
}

/// Users that can be mentioned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionDirectory {
    users: Vec<MentionUser>,
}

impl MentionDirectory {
    pub fn new(users: Vec<MentionUser>) -> Self {
        Self { users }
    }

    /// The built-in demo directory.
    pub fn sample() -> Self {
        Self::new(vec![
            MentionUser::new("johndoe", "John Doe"),
            MentionUser::new("janedoe", "Jane Doe"),
            MentionUser::new("editor", "Editor Bot"),
            MentionUser::new("admin", "Administrator"),
            MentionUser::new("team", "Team Lead"),
        ])
    }

    pub fn users(&self) -> &[MentionUser] {
        &self.users
    }

    /// Users whose username or display name contains `query`, ignoring case.
    pub fn suggestions(&self, query: &str) -> Vec<&MentionUser> {
        let query = query.to_lowercase();
        self.users
            .iter()
            .filter(|user| {
                user.username.to_lowercase().contains(&query)
                    || user.name.to_lowercase().contains(&query)
            })
            .collect()
    }
}

/// An `@query` typed immediately before the caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionQuery {
    pub block: BlockId,
    /// Offset of the `@`.
    pub start: usize,
    /// Caret offset, just after the query.
    pub end: usize,
    /// Lowercased text after the `@`.
    pub query: String,
}

/// Find the mention being typed at a collapsed caret.
///
/// Only the text run the caret sits in (or just after) is considered, and
/// the text between the last `@` and the caret must be non-empty and free of
/// whitespace.
pub fn mention_query(doc: &Document, selection: &Selection) -> Option<MentionQuery> {
    if !selection.is_collapsed() {
        return None;
    }
    let caret = selection.focus;
    let runs = &doc.get(caret.block)?.runs;
    let (index, within) = match run::locate(runs, caret.offset) {
        RunLocation::Inside { index, offset } => (index, offset),
        RunLocation::Boundary { index } if index > 0 => (index - 1, runs[index - 1].len()),
        RunLocation::Boundary { .. } => return None,
    };
    let Run::Text { text, .. } = &runs[index] else {
        return None;
    };
    let before = &text[..run::byte_index(text, within)];
    let at = before.rfind(MENTION_TRIGGER)?;
    let query = &before[at + MENTION_TRIGGER.len_utf8()..];
    if query.is_empty() || query.contains(char::is_whitespace) {
        return None;
    }
    let query_len = query.chars().count();
    Some(MentionQuery {
        block: caret.block,
        start: caret.offset - query_len - 1,
        end: caret.offset,
        query: query.to_lowercase(),
    })
}

/// Replace the `@query` with a mention of `username` and put the caret
/// after it. A no-op if the query text has changed since it was found.
pub fn complete_mention(mutator: &mut Mutator<'_>, query: &MentionQuery, username: &str) -> bool {
    let current = mention_query(mutator.document(), mutator.selection());
    if current.as_ref() != Some(query) {
        log::debug!("mention query {query:?} is stale");
        return false;
    }
    let Some(block) = mutator.document_mut().get_mut(query.block) else {
        return false;
    };
    run::delete_range(&mut block.runs, query.start, query.end);
    mutator.insert_inline(Run::mention(username), Position::new(query.block, query.start))
}
