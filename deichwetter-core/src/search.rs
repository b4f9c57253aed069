//! Type-ahead location search.
//!
//! [`SuggestionFeed`] turns a stream of keystroke-level queries into
//! geocoder calls: it waits for a quiet period, skips a query identical to
//! the last one searched, and abandons an in-flight search as soon as a newer
//! query arrives. [`SearchBox`] holds what the user sees.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{geocode::Geocoder, model::LocationCandidate};

/// Results for one settled query.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionUpdate {
    pub query: String,
    pub candidates: Vec<LocationCandidate>,
}

#[derive(Debug)]
enum FeedInput {
    Query(String),
    /// The search field was cleared by a selection.
    Reset,
}

#[derive(Debug)]
pub struct SuggestionFeed {
    inputs: UnboundedSender<FeedInput>,
    task: JoinHandle<()>,
}

impl SuggestionFeed {
    /// Start the feed on the current runtime.
    ///
    /// The task stops once the returned feed is dropped or the receiver is closed.
    pub fn spawn(
        geocoder: Arc<dyn Geocoder>,
        debounce: Duration,
    ) -> (Self, UnboundedReceiver<SuggestionUpdate>) {
        let (inputs, input_rx) = mpsc::unbounded_channel();
        let (updates, update_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_feed(geocoder, debounce, input_rx, updates));

        (Self { inputs, task }, update_rx)
    }

    /// Queue the latest text of the search field.
    pub fn push(&self, query: impl Into<String>) {
        self.send(FeedInput::Query(query.into()));
    }

    /// Forget the last searched query and drop anything pending.
    ///
    /// Call after a selection cleared the search field, so typing the same
    /// place again yields suggestions again.
    pub fn reset(&self) {
        self.send(FeedInput::Reset);
    }

    fn send(&self, input: FeedInput) {
        if self.inputs.send(input).is_err() {
            tracing::debug!("suggestion feed already stopped");
        }
    }
}

impl Drop for SuggestionFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_feed(
    geocoder: Arc<dyn Geocoder>,
    debounce: Duration,
    mut inputs: UnboundedReceiver<FeedInput>,
    updates: UnboundedSender<SuggestionUpdate>,
) {
    let mut last_searched: Option<String> = None;
    let mut carried: Option<String> = None;

    'feed: loop {
        let mut query = match carried.take() {
            Some(q) => q,
            None => match inputs.recv().await {
                Some(FeedInput::Query(q)) => q,
                Some(FeedInput::Reset) => {
                    last_searched = None;
                    continue;
                }
                None => return,
            },
        };

        // Debounce: keep replacing the query until the input goes quiet.
        loop {
            match tokio::time::timeout(debounce, inputs.recv()).await {
                Ok(Some(FeedInput::Query(next))) => query = next,
                Ok(Some(FeedInput::Reset)) => {
                    tracing::trace!(dropped = %query, "search field reset while debouncing");
                    last_searched = None;
                    continue 'feed;
                }
                Ok(None) => return,
                Err(_) => break,
            }
        }

        if last_searched.as_deref() == Some(query.as_str()) {
            tracing::trace!(query = %query, "unchanged query, not searching again");
            continue;
        }

        tokio::select! {
            biased;
            next = inputs.recv() => match next {
                Some(FeedInput::Query(q)) => {
                    tracing::debug!(superseded = %query, by = %q, "dropping in-flight search");
                    carried = Some(q);
                }
                Some(FeedInput::Reset) => {
                    tracing::debug!(abandoned = %query, "search field reset during search");
                    last_searched = None;
                }
                None => return,
            },
            result = geocoder.search(&query) => {
                last_searched = Some(query.clone());
                match result {
                    Ok(candidates) => {
                        if updates.send(SuggestionUpdate { query, candidates }).is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("Location search for '{query}' failed: {e:#}"),
                }
            }
        }
    }
}

/// Search field text plus the suggestion list shown under it.
#[derive(Debug, Clone, Default)]
pub struct SearchBox {
    text: String,
    suggestions: Vec<LocationCandidate>,
    highlighted: usize,
}

impl SearchBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn suggestions(&self) -> &[LocationCandidate] {
        &self.suggestions
    }

    pub fn highlighted(&self) -> Option<usize> {
        (!self.suggestions.is_empty()).then_some(self.highlighted)
    }

    pub fn push_char(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn pop_char(&mut self) -> bool {
        self.text.pop().is_some()
    }

    pub fn set_suggestions(&mut self, suggestions: Vec<LocationCandidate>) {
        self.suggestions = suggestions;
        self.highlighted = 0;
    }

    /// Take results from the feed unless the text has moved on since.
    pub fn apply(&mut self, update: SuggestionUpdate) -> bool {
        if update.query != self.text {
            tracing::trace!(stale = %update.query, current = %self.text, "ignoring stale suggestions");
            return false;
        }
        self.set_suggestions(update.candidates);
        true
    }

    pub fn highlight_next(&mut self) {
        if !self.suggestions.is_empty() {
            self.highlighted = (self.highlighted + 1) % self.suggestions.len();
        }
    }

    pub fn highlight_prev(&mut self) {
        if !self.suggestions.is_empty() {
            self.highlighted =
                (self.highlighted + self.suggestions.len() - 1) % self.suggestions.len();
        }
    }

    /// Pick a suggestion. The list and the search text are cleared.
    pub fn select(&mut self, index: usize) -> Option<LocationCandidate> {
        if index >= self.suggestions.len() {
            return None;
        }
        let chosen = self.suggestions.swap_remove(index);
        self.suggestions.clear();
        self.highlighted = 0;
        self.text.clear();
        Some(chosen)
    }

    pub fn select_highlighted(&mut self) -> Option<LocationCandidate> {
        self.select(self.highlighted)
    }
}
