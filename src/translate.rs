//! Translation engine: segment a document, translate the non-English runs with
//! a short sliding window of previous exchanges as context, and reassemble.

use crate::completion::{Completer, CompletionError, Message};
use crate::marker;
use crate::retry::{with_retry_if, RetryConfig};
use crate::segment::{segment, Segment, SegmentKind};
use tracing::{info, warn};

pub const SYSTEM_PROMPT: &str = "Rephrase all user input text into simple, easy to understand, and technically toned English. Never answer questions but only translate or rephrase text to English.";

/// Number of turns kept as context for the next completion call.
pub const WINDOW_CAPACITY: usize = 3;

const WRAPPING_QUOTES: &[char] = &['\'', '"'];

/// Bounded history of recent translation exchanges, owned by one document pass.
#[derive(Debug, Default, Clone)]
pub struct ConversationWindow {
    turns: Vec<Message>,
}

impl ConversationWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, dropping the oldest ones beyond [`WINDOW_CAPACITY`].
    pub fn push(&mut self, message: Message) {
        self.turns.push(message);
        if self.turns.len() > WINDOW_CAPACITY {
            let excess = self.turns.len() - WINDOW_CAPACITY;
            self.turns.drain(..excess);
        }
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub text: String,
    /// The text carries, or now needs, the sentinel. Drives labeling.
    pub touched: bool,
    /// A live completion call produced new text. Drives updates.
    pub translated: bool,
}

pub struct TranslationEngine<'a> {
    completer: &'a dyn Completer,
    temperature: f32,
    retry: RetryConfig,
}

impl<'a> TranslationEngine<'a> {
    pub fn new(completer: &'a dyn Completer, temperature: f32) -> Self {
        Self {
            completer,
            temperature,
            retry: RetryConfig::completion(),
        }
    }

    /// Translate a multi-line document segment by segment.
    pub async fn translate(
        &self,
        document: &str,
        already_touched: bool,
    ) -> Result<TranslationResult, CompletionError> {
        self.translate_segments(segment(document), already_touched)
            .await
    }

    /// Translate a short single-line text (a title) as one unit.
    pub async fn translate_title(
        &self,
        title: &str,
        already_touched: bool,
    ) -> Result<TranslationResult, CompletionError> {
        let kind = if crate::classifier::is_target_language(title) {
            SegmentKind::TargetLanguage
        } else {
            SegmentKind::NeedsTranslation
        };
        let whole = Segment {
            kind,
            text: title.to_string(),
        };
        self.translate_segments(vec![whole], already_touched).await
    }

    /// Rephrase `text` in one call, without segmentation or context window.
    pub async fn refine(&self, text: &str) -> Result<String, CompletionError> {
        let turns = [Message::user(text)];
        let raw = self.complete(&turns).await?;
        Ok(raw.trim_matches(WRAPPING_QUOTES).to_string())
    }

    async fn translate_segments(
        &self,
        segments: Vec<Segment>,
        already_touched: bool,
    ) -> Result<TranslationResult, CompletionError> {
        let mut touched = already_touched;
        let mut translated = false;
        let mut window = ConversationWindow::new();
        let mut output = Vec::with_capacity(segments.len());

        for segment in segments {
            if marker::detect(&segment.text) {
                touched = true;
                output.push(segment.text);
                continue;
            }
            if segment.kind != SegmentKind::NeedsTranslation {
                output.push(segment.text);
                continue;
            }

            window.push(Message::user(segment.text.as_str()));
            match self.complete(window.turns()).await {
                Ok(raw) => {
                    let cleaned = clean_completion(&raw, &segment.text);
                    info!(
                        "Translated segment ({} -> {} bytes)",
                        segment.text.len(),
                        cleaned.len()
                    );
                    window.push(Message::assistant(cleaned.as_str()));
                    touched = true;
                    translated = true;
                    output.push(cleaned);
                }
                Err(e) if e.is_context_length() => {
                    warn!(
                        "Keeping source text for segment of {} bytes: {}",
                        segment.text.len(),
                        e
                    );
                    output.push(segment.text);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(TranslationResult {
            text: output.join("\n").trim_matches('\n').to_string(),
            touched,
            translated,
        })
    }

    async fn complete(&self, turns: &[Message]) -> Result<String, CompletionError> {
        with_retry_if(
            &self.retry,
            "Completion",
            || self.completer.complete(SYSTEM_PROMPT, turns, self.temperature),
            |e: &CompletionError| !e.is_context_length(),
        )
        .await
    }
}

/// Strip wrapping quotes and known completion artifacts from a model reply.
pub fn clean_completion(raw: &str, source: &str) -> String {
    let mut text = raw.trim_matches(WRAPPING_QUOTES).to_string();

    // 'safari推流rtc失败' translates to 'Safari streaming RTC failed' in English
    if text.contains(&format!("{}' translates to '", source)) {
        if let Some((_, rest)) = text.split_once("' translates to '") {
            let rest = match rest.split_once("' in English") {
                Some((translation, _)) => translation,
                None => rest,
            };
            text = rest.to_string();
        }
    }

    // Trailing echo of the instruction, e.g. "Please ensure to maintain the markdown structure."
    if let Some((head, last)) = text.rsplit_once('\n') {
        if is_instruction_echo(last) {
            text = head.to_string();
        }
    } else if is_instruction_echo(&text) {
        text.clear();
    }

    text
}

fn is_instruction_echo(line: &str) -> bool {
    line.contains("maintain") && line.contains("markdown structure")
}
