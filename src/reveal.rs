//! Progressive reveal of formatted responses
//!
//! A response is either shown atomically (anything carrying code) or
//! revealed one whitespace-separated token at a time. Token `k` is due at
//! `k × delay` after the reveal starts. Deadlines are absolute, so a slow
//! consumer never stretches the schedule.
//!
//! Every delivery carries the [`Generation`] of the turn that started it.
//! The sink rejects deliveries from superseded turns; the reveal task stops
//! on the first rejection or when its [`RevealHandle`] is cancelled.

use crate::format::render::INLINE_CODE_OPEN;
use crate::format::{render_html, FormattedSegment};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default spacing between revealed tokens
pub const REVEAL_DELAY: Duration = Duration::from_millis(75);

/// Turn epoch; bumped whenever the visible conversation is replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Generation(pub u64);

impl Generation {
    #[must_use]
    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

/// Receiver of accumulated reveal text
#[async_trait]
pub trait UpdateSink: Send + Sync + 'static {
    /// Apply `text` if `generation` is still current. Returns false when
    /// the delivery was stale and discarded.
    async fn apply_update(&self, generation: Generation, text: String) -> bool;
}

/// How a response reaches the viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealPlan {
    /// Full markup in a single delivery
    Atomic(String),
    /// Markup tokens delivered one at a time
    Progressive(Vec<String>),
}

impl RevealPlan {
    /// Render segments and pick the delivery mode.
    ///
    /// Code blocks and inline code are never revealed piecemeal: partial
    /// markup would break highlighting and the copy button.
    pub fn for_segments(segments: &[FormattedSegment]) -> Self {
        let markup = render_html(segments);
        let has_code =
            segments.iter().any(FormattedSegment::is_code_block) || markup.contains(INLINE_CODE_OPEN);
        if has_code {
            RevealPlan::Atomic(markup)
        } else {
            RevealPlan::Progressive(markup.split_whitespace().map(String::from).collect())
        }
    }

    /// Number of `apply_update` calls a full reveal makes
    #[allow(dead_code)] // Used in tests
    pub fn delivery_count(&self) -> usize {
        match self {
            RevealPlan::Atomic(_) => 1,
            RevealPlan::Progressive(tokens) => tokens.len(),
        }
    }

    /// Text visible once the reveal has finished
    #[allow(dead_code)] // Used in tests
    pub fn final_text(&self) -> String {
        match self {
            RevealPlan::Atomic(markup) => markup.clone(),
            RevealPlan::Progressive(tokens) => tokens.join(" "),
        }
    }

    pub fn steps(self, delay: Duration) -> RevealSteps {
        let tokens = match self {
            RevealPlan::Atomic(markup) => vec![markup],
            RevealPlan::Progressive(tokens) => tokens,
        };
        RevealSteps {
            tokens: tokens.into_iter(),
            accumulated: String::new(),
            index: 0,
            delay,
        }
    }
}

/// One scheduled delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealStep {
    /// Due time relative to the reveal start
    pub offset: Duration,
    pub accumulated: String,
}

/// Lazily built delivery schedule
pub struct RevealSteps {
    tokens: std::vec::IntoIter<String>,
    accumulated: String,
    index: u32,
    delay: Duration,
}

impl Iterator for RevealSteps {
    type Item = RevealStep;

    fn next(&mut self) -> Option<RevealStep> {
        let token = self.tokens.next()?;
        if !self.accumulated.is_empty() {
            self.accumulated.push(' ');
        }
        self.accumulated.push_str(&token);

        let offset = self.delay.saturating_mul(self.index);
        self.index = self.index.saturating_add(1);

        Some(RevealStep {
            offset,
            accumulated: self.accumulated.clone(),
        })
    }
}

/// Handle to a running reveal
pub struct RevealHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RevealHandle {
    /// Stop all pending deliveries
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the reveal task to end
    #[allow(dead_code)] // Used in tests
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Reveal task ended abnormally");
        }
    }
}

/// Start revealing `plan` into `sink`. Must be called inside a tokio runtime.
pub fn reveal<S: UpdateSink>(
    plan: RevealPlan,
    generation: Generation,
    delay: Duration,
    sink: Arc<S>,
) -> RevealHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let start = Instant::now();
    let steps = plan.steps(delay);

    let task = tokio::spawn(async move {
        for step in steps {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(generation = generation.0, "Reveal cancelled");
                    return;
                }
                () = tokio::time::sleep_until(start + step.offset) => {}
            }

            if !sink.apply_update(generation, step.accumulated).await {
                tracing::debug!(generation = generation.0, "Stale reveal delivery discarded");
                return;
            }
        }
    });

    RevealHandle { cancel, task }
}
