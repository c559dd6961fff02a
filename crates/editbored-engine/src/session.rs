/*!
 * # Editor Session
 *
 * [`EditorSession`] owns one document, its selection and title, and every
 * piece of machinery that reacts to edits. Hosts construct it with a store
 * and collaborators, forward input events to it, and call
 * [`EditorSession::tick`] whenever [`EditorSession::next_deadline`] passes.
 *
 * Each content-changing operation runs the same follow-up in order: repair
 * the selection, scan for bare URLs, schedule embed processing, then push the
 * autosave deadline back.
 *
 * ## Usage Pattern
 *
 * ```rust
 * use editbored_engine::io::MemoryStore;
 * use editbored_engine::session::{Collaborators, EditorOptions, EditorSession};
 * use std::time::{Duration, Instant};
 *
 * let mut session = EditorSession::new(
 *     MemoryStore::new(),
 *     EditorOptions::default(),
 *     Collaborators::default(),
 * );
 * session.type_text("https://example.com/some-page ");
 * assert_eq!(session.document().embeds().len(), 1);
 *
 * session.tick(Instant::now() + Duration::from_secs(2));
 * assert_eq!(session.store().write_count(), 3);
 * ```
 */

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::autosave::{AutosaveScheduler, DEFAULT_AUTOSAVE_DELAY, SaveStatus};
use crate::editing::{self, FormatEngine, FormatState, Key, KeyOutcome, KeyPress, Mutator};
use crate::embed::{EmbedDescriptor, EmbedType};
use crate::io::{KeyValueStore, MemoryStore, PersistedSnapshot, StoreError};
use crate::markdown::{
    CmarkRenderer, Highlighter, MarkdownConverter, MarkdownRenderer, MarkdownWriter, to_html,
};
use crate::mentions::{self, MENTION_TRIGGER, MentionDirectory, MentionQuery, MentionUser};
use crate::models::{
    Block, BlockId, BlockKind, BlockStyle, Document, DocumentStats, InlineStyle, Mark, Position,
    Run, Selection,
};
use crate::preview::{
    CancellationToken, DEFAULT_SOCIAL_MIN_URL_LEN, EmbedProcessingTask, EmbedProcessor,
    LinkPreviewPipeline, MAX_RETRY_DELAY, PreviewRecord, ProcessOutcome, ScanMode, TaskStep,
};
use crate::scheduler::TaskQueue;

pub const UNTITLED: &str = "untitled document";
pub const DEFAULT_PLACEHOLDER: &str = "Start writing...";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// How the body is written to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyFormat {
    #[default]
    Markdown,
    /// The HTML projection. Write-only: a stored body is always loaded as
    /// markdown.
    Html,
}

#[derive(Debug, Clone)]
pub struct EditorOptions {
    pub autosave_enabled: bool,
    pub autosave_delay: Duration,
    pub link_previews: bool,
    pub placeholder: String,
    pub social_min_url_len: usize,
    pub embed_retry_attempts: u32,
    pub embed_retry_backoff: Duration,
    pub max_upload_bytes: usize,
    pub body_format: BodyFormat,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            autosave_enabled: true,
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            link_previews: true,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            social_min_url_len: DEFAULT_SOCIAL_MIN_URL_LEN,
            embed_retry_attempts: 5,
            embed_retry_backoff: Duration::from_millis(100),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            body_format: BodyFormat::Markdown,
        }
    }
}

/// External services the session calls into.
pub struct Collaborators {
    pub renderer: Box<dyn MarkdownRenderer>,
    pub converter: Box<dyn MarkdownConverter>,
    pub highlighter: Option<Box<dyn Highlighter>>,
    pub processors: Vec<Box<dyn EmbedProcessor>>,
    pub mentions: MentionDirectory,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            renderer: Box::new(CmarkRenderer),
            converter: Box::new(MarkdownWriter),
            highlighter: None,
            processors: Vec::new(),
            mentions: MentionDirectory::sample(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },
}

/// An image upload that has been accepted and is being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub id: Uuid,
    pub mime_type: String,
    caret: Position,
}

pub struct EditorSession<S: KeyValueStore = MemoryStore> {
    document: Document,
    selection: Selection,
    title: String,
    options: EditorOptions,
    collaborators: Collaborators,
    store: S,
    previews: LinkPreviewPipeline,
    autosave: AutosaveScheduler,
    tasks: TaskQueue<EmbedProcessingTask>,
    /// Shared by every queued task; replaced when the body is cleared.
    generation: CancellationToken,
    last_saved: Option<DateTime<Utc>>,
}

impl<S: KeyValueStore> EditorSession<S> {
    /// A blank, untitled session.
    pub fn new(store: S, options: EditorOptions, collaborators: Collaborators) -> Self {
        let mut document = Document::new();
        let selection = caret_at_end(&mut document);
        Self {
            document,
            selection,
            title: UNTITLED.to_string(),
            previews: LinkPreviewPipeline::new(options.social_min_url_len),
            autosave: AutosaveScheduler::new(options.autosave_enabled, options.autosave_delay),
            options,
            collaborators,
            store,
            tasks: TaskQueue::new(),
            generation: CancellationToken::new(),
            last_saved: None,
        }
    }

    /// Restore the last saved snapshot, or start blank if there is none.
    pub fn load(
        store: S,
        options: EditorOptions,
        collaborators: Collaborators,
    ) -> Result<Self, StoreError> {
        let snapshot = PersistedSnapshot::load_from(&store)?;
        let mut session = Self::new(store, options, collaborators);
        if let Some(snapshot) = snapshot {
            log::info!("loaded {:?} ({} bytes)", snapshot.title, snapshot.body.len());
            session.title = snapshot.title;
            session.last_saved = snapshot.updated_at;
            session.replace_body(&snapshot.body);
        }
        Ok(session)
    }

    // Queries

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn format_state(&self) -> FormatState {
        FormatState::derive(&self.document, &self.selection)
    }

    pub fn stats(&self) -> DocumentStats {
        self.document.stats()
    }

    pub fn previews(&self) -> &[PreviewRecord] {
        self.previews.previews()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.autosave.status()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    /// Placeholder text to show while the document is blank.
    pub fn placeholder(&self) -> Option<&str> {
        let blank =
            self.document.leaves().len() == 1 && self.document.plain_text().trim().is_empty();
        blank.then_some(self.options.placeholder.as_str())
    }

    pub fn markdown(&self) -> String {
        self.collaborators.converter.convert(&self.document)
    }

    pub fn html(&self) -> String {
        to_html(&self.document, self.collaborators.highlighter.as_deref())
    }

    /// File name for exporting the body as markdown.
    pub fn download_name(&self) -> String {
        let title = if self.title.is_empty() {
            "document"
        } else {
            self.title.as_str()
        };
        let safe: String = title
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        format!("{safe}.md")
    }

    /// The earliest instant at which [`EditorSession::tick`] has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.autosave.deadline(), self.tasks.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // Input

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.mutator().repair_selection(None);
    }

    pub fn handle_key(&mut self, press: KeyPress) -> KeyOutcome {
        let outcome = {
            let mut engine = FormatEngine::new(&mut self.document, &mut self.selection);
            editing::handle_key(&mut engine, press)
        };
        match outcome {
            KeyOutcome::Edited => self.after_edit(ScanMode::Typing),
            KeyOutcome::SaveRequested => {
                if let Err(e) = self.save_now() {
                    log::warn!("save failed: {e}");
                }
            }
            KeyOutcome::Selection | KeyOutcome::NotHandled => {}
        }
        outcome
    }

    /// Type `text` one key at a time; `\n` presses Enter.
    pub fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            let press = match c {
                '\n' => KeyPress::new(Key::Enter),
                '\t' => KeyPress::new(Key::Tab),
                c => KeyPress::char(c),
            };
            self.handle_key(press);
        }
    }

    /// Insert clipboard text without formatting. Lines become paragraphs,
    /// except inside a code block where the text goes in verbatim.
    pub fn paste(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n");
        let mut mutator = self.mutator();
        mutator.delete_selection();
        let at = mutator.selection().focus;
        let in_code_block = mutator
            .document()
            .get(at.block)
            .is_some_and(|block| block.kind.is_code_block());
        if in_code_block {
            mutator.insert_text(at, &text, InlineStyle::PLAIN);
        } else {
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    mutator.split_block();
                }
                let at = mutator.selection().focus;
                mutator.insert_text(at, line, InlineStyle::PLAIN);
            }
        }
        self.after_edit(ScanMode::Settled);
    }

    // Formatting

    pub fn toggle_inline(&mut self, mark: Mark) -> bool {
        let collapsed = self.selection.is_collapsed();
        let changed = FormatEngine::new(&mut self.document, &mut self.selection).toggle_inline(mark);
        if changed && !collapsed {
            self.after_edit(ScanMode::Typing);
        }
        changed
    }

    pub fn toggle_code(&mut self) -> bool {
        let changed = FormatEngine::new(&mut self.document, &mut self.selection).toggle_code();
        if changed {
            self.after_edit(ScanMode::Typing);
        }
        changed
    }

    pub fn toggle_block(&mut self, style: BlockStyle) -> bool {
        let changed = FormatEngine::new(&mut self.document, &mut self.selection).toggle_block(style);
        if changed {
            self.after_edit(ScanMode::Typing);
        }
        changed
    }

    pub fn insert_code_block(&mut self) -> Option<BlockId> {
        let id = FormatEngine::new(&mut self.document, &mut self.selection).insert_code_block();
        if id.is_some() {
            self.after_edit(ScanMode::Typing);
        }
        id
    }

    /// Insert a link at the caret, replacing any selected text. An empty
    /// `text` shows the URL itself.
    pub fn insert_link(&mut self, url: &str, text: &str) -> bool {
        if url.trim().is_empty() {
            return false;
        }
        let text = if text.trim().is_empty() { url } else { text };
        let mut mutator = self.mutator();
        mutator.delete_selection();
        let at = mutator.selection().focus;
        let inserted = mutator.insert_inline(Run::link(url, text), at);
        if inserted {
            self.after_edit(ScanMode::Typing);
        }
        inserted
    }

    /// Insert a horizontal rule after the caret's block.
    pub fn insert_rule(&mut self) -> Option<BlockId> {
        let splice = self
            .mutator()
            .insert_block_at_caret(Block::new(BlockKind::Rule, Vec::new()))?;
        self.after_edit(ScanMode::Typing);
        Some(splice.inserted)
    }

    // Embeds

    pub fn insert_image(&mut self, url: &str) -> Option<BlockId> {
        if url.trim().is_empty() {
            return None;
        }
        let descriptor = EmbedDescriptor::with_type(url, EmbedType::Image);
        let splice = self.mutator().insert_block_at_caret(Block::embed(descriptor))?;
        self.after_edit(ScanMode::Typing);
        Some(splice.inserted)
    }

    /// Validate an upload and remember where the caret was.
    pub fn begin_image_upload(
        &self,
        mime_type: &str,
        size: usize,
    ) -> Result<PendingUpload, UploadError> {
        if !mime_type.starts_with("image/") {
            return Err(UploadError::UnsupportedType(mime_type.to_string()));
        }
        if size > self.options.max_upload_bytes {
            return Err(UploadError::TooLarge {
                size,
                limit: self.options.max_upload_bytes,
            });
        }
        Ok(PendingUpload {
            id: Uuid::new_v4(),
            mime_type: mime_type.to_string(),
            caret: self.selection.focus,
        })
    }

    /// Insert a finished upload at the caret captured when it began, or at
    /// the end of the document if that position no longer exists.
    pub fn finish_image_upload(
        &mut self,
        pending: PendingUpload,
        data_url: &str,
    ) -> Option<BlockId> {
        let target = if pending.caret.is_valid(&self.document) {
            Some(pending.caret)
        } else {
            log::debug!("upload {} lost its caret, appending", pending.id);
            end_position(&self.document)
        };
        if let Some(target) = target {
            self.selection = Selection::caret(target);
        }
        self.insert_image(data_url)
    }

    /// Replace an embed with an empty paragraph holding the caret.
    pub fn remove_embed(&mut self, id: BlockId) -> bool {
        let removed = self.mutator().remove_embed(id).is_some();
        if removed {
            self.after_edit(ScanMode::Typing);
        }
        removed
    }

    // Mentions

    pub fn mention_query(&self) -> Option<MentionQuery> {
        mentions::mention_query(&self.document, &self.selection)
    }

    pub fn mention_suggestions(&self) -> Vec<&MentionUser> {
        match self.mention_query() {
            Some(query) => self.collaborators.mentions.suggestions(&query.query),
            None => Vec::new(),
        }
    }

    pub fn complete_mention(&mut self, username: &str) -> bool {
        let Some(query) = self.mention_query() else {
            return false;
        };
        let completed = mentions::complete_mention(&mut self.mutator(), &query, username);
        if completed {
            self.after_edit(ScanMode::Typing);
        }
        completed
    }

    pub fn insert_mention_trigger(&mut self) {
        self.handle_key(KeyPress::char(MENTION_TRIGGER));
    }

    // Title and persistence

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.autosave.notify_change(Instant::now());
    }

    /// Replace the body with parsed markdown, as when applying an edited
    /// source view.
    pub fn load_markdown(&mut self, markdown: &str) {
        self.replace_body(markdown);
        self.autosave.notify_change(Instant::now());
    }

    /// Save immediately and drop any pending autosave.
    pub fn save_now(&mut self) -> Result<(), StoreError> {
        self.autosave.cancel();
        self.persist()
    }

    /// Focus left the editor: flush a pending autosave.
    pub fn blur(&mut self) {
        if self.autosave.is_pending()
            && let Err(e) = self.save_now()
        {
            log::warn!("save on blur failed: {e}");
        }
    }

    /// Run everything due at `now`: the autosave and embed processing.
    /// Returns the processing tasks that finished.
    pub fn tick(&mut self, now: Instant) -> Vec<(BlockId, ProcessOutcome)> {
        if self.autosave.take_due(now)
            && let Err(e) = self.persist()
        {
            log::warn!("autosave failed: {e}");
        }

        let mut finished = Vec::new();
        for mut task in self.tasks.take_due(now) {
            match task.run(&mut self.document, &mut self.collaborators.processors) {
                TaskStep::Retry(delay) => self.tasks.push(now + delay, task),
                TaskStep::Finished(outcome) => finished.push((task.block, outcome)),
            }
        }
        finished
    }

    /// Title back to "untitled document", body emptied, saved at once.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.title = UNTITLED.to_string();
        self.clear()
    }

    /// Empty the body and save at once.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.discard_body();
        let first = self.document.clear();
        self.selection = Selection::caret(Position::new(first, 0));
        self.save_now()
    }

    fn mutator(&mut self) -> Mutator<'_> {
        Mutator::new(&mut self.document, &mut self.selection)
    }

    fn after_edit(&mut self, mode: ScanMode) {
        self.refresh_previews(mode);
        self.autosave.notify_change(Instant::now());
    }

    fn refresh_previews(&mut self, mode: ScanMode) {
        self.mutator().repair_selection(None);
        if self.options.link_previews {
            let converted =
                self.previews
                    .scan_and_convert(&mut self.document, &mut self.selection, mode);
            for record in converted {
                if record.embed_type.requires_processor() {
                    self.schedule_processing(record.block, record.embed_type);
                }
            }
        }
        self.previews.retain_attached(&self.document);
        self.previews.adopt_existing(&self.document);
    }

    fn schedule_processing(&mut self, block: BlockId, embed_type: EmbedType) {
        let backoff = self.options.embed_retry_backoff.min(MAX_RETRY_DELAY);
        let task = EmbedProcessingTask::new(
            block,
            embed_type,
            self.options.embed_retry_attempts,
            backoff,
            self.generation.clone(),
        );
        self.tasks.push(Instant::now() + backoff, task);
    }

    fn replace_body(&mut self, markdown: &str) {
        self.discard_body();
        self.document = self.collaborators.renderer.render(markdown);
        self.selection = caret_at_end(&mut self.document);
        self.refresh_previews(ScanMode::Settled);
        if let Some(end) = end_position(&self.document) {
            self.selection = Selection::caret(end);
        }
    }

    /// Abandon deferred work tied to the current body.
    fn discard_body(&mut self) {
        self.generation.cancel();
        self.generation = CancellationToken::new();
        self.tasks.clear();
        self.previews.clear();
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let body = match self.options.body_format {
            BodyFormat::Markdown => self.markdown(),
            BodyFormat::Html => self.html(),
        };
        let snapshot = PersistedSnapshot::new(self.title.clone(), body);
        let result = snapshot.save_to(&mut self.store);
        self.autosave.record(result.is_ok());
        if result.is_ok() {
            log::info!("saved {:?}", self.title);
            self.last_saved = snapshot.updated_at;
        }
        result
    }
}

fn caret_at_end(doc: &mut Document) -> Selection {
    let mut selection = Selection::caret(Position::new(doc.root(), 0));
    Mutator::new(doc, &mut selection).repair_selection(None);
    match end_position(doc) {
        Some(end) => Selection::caret(end),
        None => selection,
    }
}

fn end_position(doc: &Document) -> Option<Position> {
    let last = doc.last_text_block()?;
    Some(Position::new(last, doc.get(last)?.len()))
}
