//! Bare-URL detection and conversion into embed blocks.

pub mod processing;

use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::editing::Mutator;
use crate::embed::{EmbedDescriptor, EmbedType, classify};
use crate::models::document::{Block, BlockId, BlockKind, Document};
use crate::models::run::{self, Run};
use crate::models::selection::{Position, Selection};

pub use processing::{
    CancellationToken, EmbedProcessingTask, EmbedProcessor, MAX_RETRY_DELAY, ProcessOutcome,
    TaskStep,
};

/// Social permalinks shorter than this are assumed to be mid-type.
pub const DEFAULT_SOCIAL_MIN_URL_LEN: usize = 25;

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("Invalid URL regex"))
}

/// When a scan runs, which decides how the caret affects completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// After a keystroke. A URL run the caret is still at the end of, with
    /// no terminating whitespace typed yet, is left alone.
    Typing,
    /// After paste or load. Every bare URL run is complete.
    Settled,
}

/// A converted URL, kept for the lifetime of its embed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRecord {
    pub id: Uuid,
    pub url: String,
    pub embed_type: EmbedType,
    pub block: BlockId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    block: BlockId,
    run_index: usize,
    run_text: String,
    url: String,
    embed_type: EmbedType,
}

/// Scans text runs for bare URLs and splices embed blocks in their place.
///
/// Runs inside links, code spans, code blocks and existing embeds are never
/// candidates, so a converted URL is never seen again.
#[derive(Debug, Clone)]
pub struct LinkPreviewPipeline {
    min_social_len: usize,
    previews: Vec<PreviewRecord>,
}

impl Default for LinkPreviewPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_SOCIAL_MIN_URL_LEN)
    }
}

impl LinkPreviewPipeline {
    pub fn new(min_social_len: usize) -> Self {
        Self {
            min_social_len,
            previews: Vec::new(),
        }
    }

    pub fn previews(&self) -> &[PreviewRecord] {
        &self.previews
    }

    pub fn preview(&self, id: Uuid) -> Option<&PreviewRecord> {
        self.previews.iter().find(|p| p.id == id)
    }

    /// Drop records whose embed block is gone.
    pub fn retain_attached(&mut self, doc: &Document) {
        self.previews.retain(|p| doc.is_attached(p.block));
    }

    pub fn clear(&mut self) {
        self.previews.clear();
    }

    /// Convert every complete bare URL into an embed block.
    ///
    /// Each pass converts at most the first qualifying run per block, then
    /// rescans, until a pass finds nothing. One call may therefore splice
    /// several embeds, for example after a paste holding many URLs. Running
    /// it again on the result changes nothing.
    pub fn scan_and_convert(
        &mut self,
        doc: &mut Document,
        selection: &mut Selection,
        mode: ScanMode,
    ) -> Vec<PreviewRecord> {
        let mut converted = Vec::new();
        loop {
            let candidates = self.find_candidates(doc, selection, mode);
            if candidates.is_empty() {
                break;
            }
            let mut progressed = false;
            for candidate in candidates {
                if let Some(record) = self.convert(doc, selection, &candidate) {
                    converted.push(record);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        converted
    }

    fn find_candidates(
        &self,
        doc: &Document,
        selection: &Selection,
        mode: ScanMode,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for id in doc.text_blocks() {
            let Some(block) = doc.get(id) else {
                continue;
            };
            if block.kind.is_code_block() {
                continue;
            }
            let first = block
                .runs
                .iter()
                .enumerate()
                .find_map(|(index, run)| self.qualify(doc, selection, mode, id, index, run));
            candidates.extend(first);
        }
        candidates
    }

    fn qualify(
        &self,
        doc: &Document,
        selection: &Selection,
        mode: ScanMode,
        id: BlockId,
        index: usize,
        run: &Run,
    ) -> Option<Candidate> {
        let Run::Text { text, .. } = run else {
            return None;
        };
        let url = url_regex().find(text)?.as_str();
        if text.trim() != url {
            return None;
        }
        if mode == ScanMode::Typing && !text.ends_with(char::is_whitespace) {
            let runs = &doc.get(id)?.runs;
            let run_end = run::run_start(runs, index + 1);
            let caret = selection.focus;
            if caret.block == id && caret.offset == run_end {
                log::debug!("{url:?} still being typed");
                return None;
            }
        }
        let embed_type = classify(url)?;
        if embed_type.is_social() && url.chars().count() < self.min_social_len {
            log::debug!("{url:?} below social length threshold");
            return None;
        }
        Some(Candidate {
            block: id,
            run_index: index,
            run_text: text.clone(),
            url: url.to_string(),
            embed_type,
        })
    }

    fn convert(
        &mut self,
        doc: &mut Document,
        selection: &mut Selection,
        candidate: &Candidate,
    ) -> Option<PreviewRecord> {
        // Earlier conversions in this pass may have moved things.
        let block = doc.get(candidate.block)?;
        let still_there = doc.is_attached(candidate.block)
            && matches!(
                block.runs.get(candidate.run_index),
                Some(Run::Text { text, .. }) if *text == candidate.run_text
            );
        if !still_there {
            return None;
        }

        let runs = &block.runs;
        let run_start = run::run_start(runs, candidate.run_index);
        let run_end = run::run_start(runs, candidate.run_index + 1);
        let before = runs[..candidate.run_index].to_vec();
        let after = runs[candidate.run_index + 1..].to_vec();
        let caret = selection.focus;
        let was_in = caret.block == candidate.block;

        let descriptor = EmbedDescriptor::with_type(&candidate.url, candidate.embed_type);
        let splice = Mutator::new(doc, selection).splice_block(
            candidate.block,
            Some(before),
            Block::embed(descriptor),
            Some(after),
        )?;

        if was_in {
            let mapped = match (splice.before, splice.after) {
                (Some(before), _) if caret.offset <= run_start => {
                    Some(Position::new(before, caret.offset))
                }
                (_, Some(after)) if caret.offset >= run_end => {
                    Some(Position::new(after, caret.offset - run_end))
                }
                _ => None,
            };
            if let Some(position) = mapped {
                *selection = Selection::caret(position);
            }
        }

        let record = PreviewRecord {
            id: Uuid::new_v4(),
            url: candidate.url.clone(),
            embed_type: candidate.embed_type,
            block: splice.inserted,
        };
        log::debug!(
            "converted {:?} into {} preview {}",
            record.url,
            record.embed_type,
            record.id
        );
        self.previews.push(record.clone());
        Some(record)
    }

    /// Register embeds already present in a freshly loaded document.
    pub fn adopt_existing(&mut self, doc: &Document) {
        for (block, descriptor) in doc.embeds() {
            if self.previews.iter().any(|p| p.block == block) {
                continue;
            }
            self.previews.push(PreviewRecord {
                id: Uuid::new_v4(),
                url: descriptor.source_url.clone(),
                embed_type: descriptor.embed_type,
                block,
            });
        }
    }
}

/// True if `id` is an embed block.
pub fn is_embed(doc: &Document, id: BlockId) -> bool {
    matches!(doc.kind(id), Some(BlockKind::Embed(_)))
}
