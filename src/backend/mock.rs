//! Mock inference backend
//!
//! Plays back a scripted fragment sequence, or echoes the prompt back
//! word by word when no script is given. Used by the test suite and for
//! running the engine without a native inference kernel.

use std::collections::VecDeque;
use std::path::Path;

use anyhow::bail;
use async_trait::async_trait;

use super::{CompletionHandle, GenerationOptions, InferenceBackend};

/// Scriptable backend stand-in.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    fragments: Option<Vec<String>>,
    reject_load: bool,
    fail_after: Option<usize>,
}

impl MockBackend {
    /// Echo mode: each completion yields the prompt's words back.
    pub fn new() -> Self {
        Self::default()
    }

    /// Play back exactly these fragments for every completion.
    pub fn with_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: Some(fragments.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Reject every artifact at load time.
    pub fn rejecting_loads() -> Self {
        Self {
            reject_load: true,
            ..Self::default()
        }
    }

    /// Fail the stream after yielding `count` fragments.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn load_model(&self, path: &Path) -> anyhow::Result<Box<dyn CompletionHandle>> {
        if self.reject_load {
            bail!("unsupported artifact format: {}", path.display());
        }
        Ok(Box::new(MockHandle {
            script: self.fragments.clone(),
            fail_after: self.fail_after,
            pending: VecDeque::new(),
            yielded: 0,
            stopped: false,
        }))
    }
}

struct MockHandle {
    script: Option<Vec<String>>,
    fail_after: Option<usize>,
    pending: VecDeque<String>,
    yielded: usize,
    stopped: bool,
}

#[async_trait]
impl CompletionHandle for MockHandle {
    async fn start_completion(
        &mut self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> anyhow::Result<()> {
        self.stopped = false;
        self.yielded = 0;
        self.pending = match &self.script {
            Some(fragments) => fragments.iter().cloned().collect(),
            None => prompt
                .split_whitespace()
                .map(|word| format!("{} ", word))
                .collect(),
        };
        Ok(())
    }

    async fn next_fragment(&mut self) -> anyhow::Result<Option<String>> {
        if self.stopped {
            return Ok(None);
        }
        if let Some(limit) = self.fail_after {
            if self.yielded >= limit {
                bail!("mock backend stream failure");
            }
        }
        match self.pending.pop_front() {
            Some(fragment) => {
                self.yielded += 1;
                Ok(Some(fragment))
            }
            None => Ok(None),
        }
    }

    fn is_finished(&self) -> bool {
        self.stopped || self.pending.is_empty()
    }

    async fn stop(&mut self) {
        self.stopped = true;
        self.pending.clear();
    }
}
