use super::types::AnalysisOutcome;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// One row on the result board
#[derive(Debug, Clone, PartialEq)]
pub struct BoardEntry {
    pub id: u64,
    pub category: String,
    /// When the request behind this entry was sent
    pub requested_at: Instant,
    /// `None` while the placeholder waits for its result
    pub outcome: Option<AnalysisOutcome>,
}

impl BoardEntry {
    pub fn is_pending(&self) -> bool {
        self.outcome.is_none()
    }
}

/// Aggregates results across capture rounds.
///
/// A settled result fills the oldest pending placeholder of the same
/// category whose request time lies within `window` of the result's own
/// request time. Anything else becomes a new entry. Each placeholder is
/// filled at most once, so two results of one category are never merged.
#[derive(Debug, Clone)]
pub struct ResultBoard {
    window: Duration,
    entries: Vec<BoardEntry>,
    next_id: u64,
}

impl ResultBoard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Add a placeholder for a request sent at `requested_at`
    pub fn add_pending(&mut self, category: &str, requested_at: Instant) -> u64 {
        let id = self.allocate_id();
        trace!("Placeholder {} for {}", id, category);
        self.entries.push(BoardEntry {
            id,
            category: category.to_string(),
            requested_at,
            outcome: None,
        });
        id
    }

    /// Record the result of a request sent at `requested_at`. Returns the
    /// id of the entry it landed in.
    pub fn record(
        &mut self,
        category: &str,
        outcome: AnalysisOutcome,
        requested_at: Instant,
    ) -> u64 {
        let window = self.window;
        let matched = self.entries.iter_mut().find(|entry| {
            entry.is_pending()
                && entry.category == category
                && abs_diff(entry.requested_at, requested_at) <= window
        });

        if let Some(entry) = matched {
            debug!("Result for {} matched placeholder {}", category, entry.id);
            entry.outcome = Some(outcome);
            return entry.id;
        }

        let id = self.allocate_id();
        debug!("Result for {} recorded as new entry {}", category, id);
        self.entries.push(BoardEntry {
            id,
            category: category.to_string(),
            requested_at,
            outcome: Some(outcome),
        });
        id
    }

    pub fn entries(&self) -> &[BoardEntry] {
        &self.entries
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    /// Most recent settled outcome for a category
    pub fn latest(&self, category: &str) -> Option<&AnalysisOutcome> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.category == category)
            .find_map(|e| e.outcome.as_ref())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn abs_diff(a: Instant, b: Instant) -> Duration {
    a.saturating_duration_since(b).max(b.saturating_duration_since(a))
}
