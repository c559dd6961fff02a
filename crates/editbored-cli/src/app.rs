use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use editbored_config::{BodyFormat as StoredBodyFormat, Config};
use editbored_engine::{
    BlockStyle, BodyFormat, EditorOptions, EditorSession, Key, KeyOutcome, KeyPress, KeyValueStore,
    Mark, Modifiers,
};
use std::time::Duration;

/// Map the config file onto the engine's session options.
pub fn editor_options(config: &Config) -> EditorOptions {
    EditorOptions {
        autosave_enabled: config.autosave.enabled,
        autosave_delay: Duration::from_millis(config.autosave.delay_ms),
        link_previews: config.link_previews,
        placeholder: config.placeholder.clone(),
        social_min_url_len: config.social_min_url_len,
        embed_retry_attempts: config.embed_retry.max_attempts,
        embed_retry_backoff: Duration::from_millis(config.embed_retry.backoff_ms),
        max_upload_bytes: config.max_upload_bytes,
        body_format: match config.body_format {
            StoredBodyFormat::Markdown => BodyFormat::Markdown,
            StoredBodyFormat::Html => BodyFormat::Html,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Title,
    Link,
    Image,
}

impl PromptKind {
    pub fn label(&self) -> &'static str {
        match self {
            PromptKind::Title => "Title",
            PromptKind::Link => "Link URL",
            PromptKind::Image => "Image URL",
        }
    }
}

/// A one-line input shown in the footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
}

pub struct App<S: KeyValueStore> {
    pub session: EditorSession<S>,
    pub prompt: Option<Prompt>,
    /// Last notice shown in the footer.
    pub status: String,
    pub should_quit: bool,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(session: EditorSession<S>) -> Self {
        Self {
            session,
            prompt: None,
            status: String::new(),
            should_quit: false,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.prompt.is_some() {
            self.handle_prompt_key(key);
        } else {
            self.handle_editor_key(key);
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('q') if ctrl => self.should_quit = true,
            KeyCode::Char('t') if ctrl => self.open_prompt(PromptKind::Title),
            KeyCode::Char('l') if ctrl => self.open_prompt(PromptKind::Link),
            KeyCode::Char('g') if ctrl => self.open_prompt(PromptKind::Image),
            KeyCode::Char('e') if ctrl => self.export(),
            KeyCode::Char('n') if ctrl => {
                self.status = match self.session.reset() {
                    Ok(()) => "New document".to_string(),
                    Err(e) => format!("Reset failed: {e}"),
                };
            }
            KeyCode::Char(c) if alt => self.handle_alt(c),
            KeyCode::Tab if self.session.mention_query().is_some() => {
                let first = self
                    .session
                    .mention_suggestions()
                    .first()
                    .map(|user| user.username.clone());
                if let Some(username) = first {
                    self.session.complete_mention(&username);
                }
            }
            _ => {
                if let Some(press) = to_key_press(key)
                    && self.session.handle_key(press) == KeyOutcome::SaveRequested
                {
                    self.status = "Saved".to_string();
                }
            }
        }
    }

    fn handle_alt(&mut self, c: char) {
        let changed = match c {
            '0' => self.session.toggle_block(BlockStyle::Paragraph),
            '1' => self.session.toggle_block(BlockStyle::Heading1),
            '2' => self.session.toggle_block(BlockStyle::Heading2),
            '3' => self.session.toggle_block(BlockStyle::Heading3),
            'q' => self.session.toggle_block(BlockStyle::Blockquote),
            'u' => self.session.toggle_block(BlockStyle::BulletList),
            'o' => self.session.toggle_block(BlockStyle::NumberedList),
            'c' => self.session.toggle_block(BlockStyle::CodeBlock),
            's' => self.session.toggle_inline(Mark::Strikethrough),
            'k' => self.session.toggle_code(),
            'r' => self.session.insert_rule().is_some(),
            '@' | 'm' => {
                self.session.insert_mention_trigger();
                true
            }
            _ => false,
        };
        if !changed {
            log::debug!("alt+{c} did nothing");
        }
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        let input = match kind {
            PromptKind::Title => self.session.title().to_string(),
            PromptKind::Link | PromptKind::Image => String::new(),
        };
        self.prompt = Some(Prompt { kind, input });
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some(prompt) = self.prompt.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Backspace => {
                prompt.input.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                prompt.input.push(c);
            }
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    self.submit_prompt(prompt);
                }
            }
            _ => {}
        }
    }

    fn submit_prompt(&mut self, prompt: Prompt) {
        let input = prompt.input.trim();
        match prompt.kind {
            PromptKind::Title => self.session.set_title(input),
            PromptKind::Link => {
                if !self.session.insert_link(input, "") {
                    self.status = "Link not inserted".to_string();
                }
            }
            PromptKind::Image => {
                if self.session.insert_image(input).is_none() {
                    self.status = "Image not inserted".to_string();
                }
            }
        }
    }

    /// Write the body as markdown to the current directory.
    fn export(&mut self) {
        let name = self.session.download_name();
        self.status = match std::fs::write(&name, self.session.markdown()) {
            Ok(()) => format!("Exported {name}"),
            Err(e) => format!("Export failed: {e}"),
        };
    }
}

/// Translate a terminal key event into an editor key press.
pub fn to_key_press(event: KeyEvent) -> Option<KeyPress> {
    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        _ => return None,
    };
    Some(KeyPress {
        key,
        modifiers: Modifiers {
            ctrl: event.modifiers.contains(KeyModifiers::CONTROL),
            meta: event.modifiers.contains(KeyModifiers::SUPER),
            alt: event.modifiers.contains(KeyModifiers::ALT),
            shift: event.modifiers.contains(KeyModifiers::SHIFT),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use editbored_engine::{Collaborators, MemoryStore};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn app() -> App<MemoryStore> {
        App::new(EditorSession::new(
            MemoryStore::new(),
            EditorOptions::default(),
            Collaborators::default(),
        ))
    }

    fn press(app: &mut App<MemoryStore>, code: KeyCode, modifiers: KeyModifiers) {
        app.handle_key(KeyEvent::new(code, modifiers));
    }

    fn type_str(app: &mut App<MemoryStore>, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c), KeyModifiers::NONE);
        }
    }

    #[test]
    fn test_editor_options_from_config() {
        let config = Config {
            link_previews: false,
            body_format: StoredBodyFormat::Html,
            ..Config::default()
        };

        let options = editor_options(&config);

        assert!(!options.link_previews);
        assert_eq!(options.body_format, BodyFormat::Html);
        assert_eq!(options.autosave_delay, Duration::from_millis(1000));
        assert_eq!(options.embed_retry_backoff, Duration::from_millis(100));
        assert_eq!(options.placeholder, "Start writing...");
    }

    #[rstest]
    #[case(KeyCode::Char('x'), KeyModifiers::NONE, Some(KeyPress::char('x')))]
    #[case(KeyCode::Char('b'), KeyModifiers::CONTROL, Some(KeyPress::command('b')))]
    #[case(KeyCode::Enter, KeyModifiers::NONE, Some(KeyPress::new(Key::Enter)))]
    #[case(KeyCode::Up, KeyModifiers::NONE, None)]
    fn test_to_key_press(
        #[case] code: KeyCode,
        #[case] modifiers: KeyModifiers,
        #[case] expected: Option<KeyPress>,
    ) {
        assert_eq!(to_key_press(KeyEvent::new(code, modifiers)), expected);
    }

    #[test]
    fn test_title_prompt_sets_title() {
        let mut app = app();

        press(&mut app, KeyCode::Char('t'), KeyModifiers::CONTROL);
        for _ in 0.."untitled document".len() {
            press(&mut app, KeyCode::Backspace, KeyModifiers::NONE);
        }
        type_str(&mut app, "Plans");
        press(&mut app, KeyCode::Enter, KeyModifiers::NONE);

        assert_eq!(app.prompt, None);
        assert_eq!(app.session.title(), "Plans");
    }

    #[test]
    fn test_tab_completes_first_mention() {
        let mut app = app();
        type_str(&mut app, "hi @doe");

        press(&mut app, KeyCode::Tab, KeyModifiers::NONE);

        assert_eq!(app.session.markdown(), "hi @johndoe\n");
    }

    #[test]
    fn test_alt_heading_and_escape_quits() {
        let mut app = app();
        type_str(&mut app, "Top");

        press(&mut app, KeyCode::Char('1'), KeyModifiers::ALT);
        press(&mut app, KeyCode::Esc, KeyModifiers::NONE);

        assert_eq!(app.session.markdown(), "# Top\n");
        assert!(app.should_quit);
    }
}
