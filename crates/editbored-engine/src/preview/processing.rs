//! Deferred post-processing of embeds that need a third-party script.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::embed::{EmbedDescriptor, EmbedType};
use crate::models::document::{BlockId, BlockKind, Document};

/// Longest wait between two attempts, however large the configured backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60 * 60);

/// A platform script that rewrites placeholder markup into a live embed.
pub trait EmbedProcessor {
    fn name(&self) -> &str;

    fn handles(&self, embed_type: EmbedType) -> bool;

    /// False until the platform script has loaded.
    fn is_loaded(&self) -> bool;

    /// Returns replacement markup, or `None` to leave the placeholder as is.
    fn process(&mut self, descriptor: &EmbedDescriptor) -> Option<String>;
}

/// Shared flag for abandoning a deferred task.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed,
    /// No loaded processor after the last attempt.
    GaveUp,
    /// The embed block was removed before the task ran.
    Detached,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStep {
    Retry(Duration),
    Finished(ProcessOutcome),
}

/// One embed waiting for its platform processor, retried with exponential
/// backoff up to `max_attempts` runs.
#[derive(Debug, Clone)]
pub struct EmbedProcessingTask {
    pub block: BlockId,
    pub embed_type: EmbedType,
    attempts: u32,
    max_attempts: u32,
    backoff: Duration,
    token: CancellationToken,
}

impl EmbedProcessingTask {
    pub fn new(
        block: BlockId,
        embed_type: EmbedType,
        max_attempts: u32,
        backoff: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            block,
            embed_type,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            backoff: backoff.min(MAX_RETRY_DELAY),
            token,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn run(
        &mut self,
        doc: &mut Document,
        processors: &mut [Box<dyn EmbedProcessor>],
    ) -> TaskStep {
        if self.token.is_cancelled() {
            return TaskStep::Finished(ProcessOutcome::Cancelled);
        }
        if !doc.is_attached(self.block)
            || !matches!(doc.kind(self.block), Some(BlockKind::Embed(_)))
        {
            return TaskStep::Finished(ProcessOutcome::Detached);
        }

        self.attempts += 1;
        let ready = processors
            .iter_mut()
            .find(|p| p.handles(self.embed_type) && p.is_loaded());
        if let Some(processor) = ready
            && let Some(block) = doc.get_mut(self.block)
            && let BlockKind::Embed(descriptor) = &mut block.kind
        {
            if let Some(markup) = processor.process(descriptor) {
                descriptor.markup = markup;
            }
            log::debug!("{} processed {}", processor.name(), descriptor.source_url);
            return TaskStep::Finished(ProcessOutcome::Processed);
        }

        if self.attempts >= self.max_attempts {
            log::warn!(
                "no {} processor after {} attempts, leaving placeholder",
                self.embed_type,
                self.attempts
            );
            return TaskStep::Finished(ProcessOutcome::GaveUp);
        }
        let delay = self
            .backoff
            .checked_mul(2u32.saturating_pow(self.attempts - 1))
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY));
        TaskStep::Retry(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::Block;
    use pretty_assertions::assert_eq;

    struct FakeInstagram {
        loaded: bool,
        calls: Rc<Cell<u32>>,
    }

    impl EmbedProcessor for FakeInstagram {
        fn name(&self) -> &str {
            "instagram"
        }

        fn handles(&self, embed_type: EmbedType) -> bool {
            embed_type.requires_processor()
        }

        fn is_loaded(&self) -> bool {
            self.loaded
        }

        fn process(&mut self, descriptor: &EmbedDescriptor) -> Option<String> {
            self.calls.set(self.calls.get() + 1);
            Some(format!("<iframe data-live=\"{}\"></iframe>", descriptor.source_url))
        }
    }

    fn instagram_doc() -> (Document, BlockId) {
        let url = "https://www.instagram.com/p/CxYzAbC123/";
        let descriptor = EmbedDescriptor::with_type(url, EmbedType::Instagram);
        let mut doc = Document::from_blocks([Block::embed(descriptor)]);
        let id = doc.embeds()[0].0;
        doc.ensure_all_sentinels();
        (doc, id)
    }

    fn task(block: BlockId, token: CancellationToken) -> EmbedProcessingTask {
        EmbedProcessingTask::new(
            block,
            EmbedType::Instagram,
            3,
            Duration::from_millis(100),
            token,
        )
    }

    #[test]
    fn test_loaded_processor_rewrites_markup() {
        let (mut doc, id) = instagram_doc();
        let calls = Rc::new(Cell::new(0));
        let mut processors: Vec<Box<dyn EmbedProcessor>> = vec![Box::new(FakeInstagram {
            loaded: true,
            calls: calls.clone(),
        })];

        let step = task(id, CancellationToken::new()).run(&mut doc, &mut processors);

        assert_eq!(step, TaskStep::Finished(ProcessOutcome::Processed));
        assert_eq!(calls.get(), 1);
        assert!(doc.embeds()[0].1.markup.contains("data-live"));
    }

    #[test]
    fn test_unloaded_processor_backs_off_then_gives_up() {
        let (mut doc, id) = instagram_doc();
        let mut processors: Vec<Box<dyn EmbedProcessor>> = vec![Box::new(FakeInstagram {
            loaded: false,
            calls: Rc::new(Cell::new(0)),
        })];
        let mut task = task(id, CancellationToken::new());

        assert_eq!(
            task.run(&mut doc, &mut processors),
            TaskStep::Retry(Duration::from_millis(100))
        );
        assert_eq!(
            task.run(&mut doc, &mut processors),
            TaskStep::Retry(Duration::from_millis(200))
        );
        assert_eq!(
            task.run(&mut doc, &mut processors),
            TaskStep::Finished(ProcessOutcome::GaveUp)
        );
        assert_eq!(task.attempts(), 3);
    }

    #[test]
    fn test_extreme_backoff_is_capped() {
        let (mut doc, id) = instagram_doc();
        let mut task = EmbedProcessingTask::new(
            id,
            EmbedType::Instagram,
            u32::MAX,
            Duration::from_millis(u64::MAX),
            CancellationToken::new(),
        );

        for _ in 0..40 {
            assert_eq!(
                task.run(&mut doc, &mut []),
                TaskStep::Retry(MAX_RETRY_DELAY)
            );
        }
    }

    #[test]
    fn test_no_processors_gives_up_without_panicking() {
        let (mut doc, id) = instagram_doc();
        let mut task = EmbedProcessingTask::new(
            id,
            EmbedType::Instagram,
            1,
            Duration::from_millis(10),
            CancellationToken::new(),
        );
        assert_eq!(
            task.run(&mut doc, &mut []),
            TaskStep::Finished(ProcessOutcome::GaveUp)
        );
    }

    #[test]
    fn test_removed_embed_is_detached() {
        let (mut doc, id) = instagram_doc();
        doc.remove(id);
        let step = task(id, CancellationToken::new()).run(&mut doc, &mut []);
        assert_eq!(step, TaskStep::Finished(ProcessOutcome::Detached));
    }

    #[test]
    fn test_cancelled_task_does_nothing() {
        let (mut doc, id) = instagram_doc();
        let token = CancellationToken::new();
        let mut task = task(id, token.clone());
        token.cancel();

        assert_eq!(
            task.run(&mut doc, &mut []),
            TaskStep::Finished(ProcessOutcome::Cancelled)
        );
        assert_eq!(task.attempts(), 0);
    }
}
