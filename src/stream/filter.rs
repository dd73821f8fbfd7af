//! Token stream filtering
//!
//! Turns raw backend fragments into user-safe text: strips model control
//! tokens and re-chunks output at word boundaries for smooth display.
//! Output is withheld while the buffer tail could still turn into a
//! control token, so no emitted chunk boundary ever splits one.

use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern variants of the turn control tokens, e.g. a start-of-turn tag
/// carrying a role suffix inside the brackets.
static START_TURN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?start_of_turn[^>]*>").expect("start turn pattern"));
static END_TURN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?end_of_turn[^>]*>").expect("end turn pattern"));

/// Tunables for the filter. The token and prefix lists and both emission
/// thresholds are deliberately configuration, not constants; the test
/// suite pins down the behavior of the defaults.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Literal control tokens removed from output. Role-suffixed turn
    /// variants come before their bare tags so the longer form strips
    /// first.
    pub control_tokens: Vec<String>,
    /// Short prefixes that mark the head of the buffer as a possible
    /// control token in progress.
    pub ambiguous_prefixes: Vec<String>,
    /// Emit up to the last space once the buffer grows past this many
    /// characters.
    pub word_emit_chars: usize,
    /// Emit the whole buffer once it grows past this many characters
    /// without a space.
    pub flush_chars: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let control_tokens = [
            "<start_of_turn>model\n",
            "<start_of_turn>user\n",
            "<start_of_turn>model",
            "<start_of_turn>user",
            "</start_of_turn>",
            "<start_of_turn>",
            "</end_of_turn>",
            "<end_of_turn>",
            "<|begin_of_text|>",
            "<|start_header_id|>",
            "<|end_header_id|>",
            "<|eot_id|>",
            "<|end|>",
            "<|assistant|>",
            "<|user|>",
            "<|system|>",
            "</s>",
            "<eos>",
            "<bos>",
            "[INST]",
            "[/INST]",
        ];
        let ambiguous_prefixes = [
            "<", "</", "<|", "<e", "<s", "<b", "[", "[I", "[/", "<start", "<end",
        ];
        Self {
            control_tokens: control_tokens.iter().map(|s| s.to_string()).collect(),
            ambiguous_prefixes: ambiguous_prefixes.iter().map(|s| s.to_string()).collect(),
            word_emit_chars: 15,
            flush_chars: 50,
        }
    }
}

/// Filter lifecycle for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Holding output until it is safe and large enough to emit.
    Accumulating,
    /// The last push produced a chunk.
    Emitting,
    /// Upstream finished; the buffer has been flushed.
    Done,
}

/// Per-generation buffer that cleans and re-chunks raw fragments.
///
/// Created for one generation and discarded at its end; `finish` flushes
/// whatever remains exactly once.
pub struct TokenFilter {
    config: FilterConfig,
    buffer: String,
    state: FilterState,
    max_token_len: usize,
}

impl Default for TokenFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl TokenFilter {
    pub fn new(config: FilterConfig) -> Self {
        let max_token_len = config
            .control_tokens
            .iter()
            .map(|t| t.len())
            .max()
            .unwrap_or(0);
        Self {
            config,
            buffer: String::new(),
            state: FilterState::Accumulating,
            max_token_len,
        }
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Absorb one raw fragment, returning a cleaned chunk when one is
    /// ready to show.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        if self.state == FilterState::Done {
            return None;
        }

        self.buffer.push_str(fragment);
        self.buffer = self.strip_control_tokens(&self.buffer);

        if self.buffer.is_empty() || self.is_ambiguous(&self.buffer) {
            self.state = FilterState::Accumulating;
            return None;
        }

        let chars = self.buffer.chars().count();
        if self.buffer.contains(' ') && chars > self.config.word_emit_chars {
            // Word-boundary chunk: everything up to and including the
            // last space; the remainder stays buffered.
            let split = self.buffer.rfind(' ').expect("buffer contains a space") + 1;
            let rest = self.buffer.split_off(split);
            let chunk = std::mem::replace(&mut self.buffer, rest);
            self.state = FilterState::Emitting;
            Some(chunk)
        } else if chars > self.config.flush_chars {
            self.state = FilterState::Emitting;
            Some(std::mem::take(&mut self.buffer))
        } else {
            self.state = FilterState::Accumulating;
            None
        }
    }

    /// Flush the remaining buffer after a final strip. Safe to call once
    /// per generation; later calls return `None`.
    pub fn finish(&mut self) -> Option<String> {
        if self.state == FilterState::Done {
            return None;
        }
        self.state = FilterState::Done;
        let remaining = std::mem::take(&mut self.buffer);
        let rest = self.strip_control_tokens(&remaining);
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    fn strip_control_tokens(&self, text: &str) -> String {
        let mut cleaned = text.to_string();
        for token in &self.config.control_tokens {
            if cleaned.contains(token.as_str()) {
                cleaned = cleaned.replace(token.as_str(), "");
            }
        }
        let cleaned = START_TURN_RE.replace_all(&cleaned, "");
        END_TURN_RE.replace_all(&cleaned, "").into_owned()
    }

    /// A partial control token may be in flight if the buffer's tail is
    /// a proper prefix of any control token, or its head matches one of
    /// the configured prefixes while still short enough to complete.
    fn is_ambiguous(&self, buffer: &str) -> bool {
        let tail_matches = self.config.control_tokens.iter().any(|token| {
            (1..token.len()).any(|len| buffer.ends_with(&token[..len]))
        });
        if tail_matches {
            return true;
        }
        self.config.ambiguous_prefixes.iter().any(|prefix| {
            buffer.ends_with(prefix.as_str())
                || (buffer.len() < self.max_token_len && buffer.starts_with(prefix.as_str()))
        })
    }
}
