//! Layout session — the single-threaded state a masonry container carries between passes.
//!
//! Triggers (resize, list swap, measurement) only *request* a pass. Requests made while
//! one is already pending are coalesced, and `flush` runs at most one pass. While the
//! container has no width, `flush` hands back a deferred retry tagged with the list
//! generation and attempt number; a retry that no longer matches is abandoned.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::masonry::engine::{compute_layout, Dimensions, LayoutResult, MasonryConfig};
use crate::masonry::item::{ItemSet, LayoutRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Scheduled,
    Coalesced,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassOutcome {
    /// No pass was pending.
    Idle,
    Placed { generation: u64, pass: u64, result: LayoutResult },
    /// Width unavailable; call `retry_due(generation, attempt)` after `delay`.
    Deferred { generation: u64, attempt: u32, delay: Duration },
    /// Width still unavailable after the configured number of attempts.
    GaveUp { generation: u64 },
}

#[derive(Debug, Clone)]
pub struct LayoutSession {
    config: MasonryConfig,
    items: ItemSet,
    container_width: f64,
    pending: bool,
    attempts: u32,
    awaiting_retry: Option<u32>,
    passes: u64,
    last: Option<LayoutResult>,
}

impl LayoutSession {
    pub fn new(config: MasonryConfig) -> Self {
        Self {
            config,
            items: ItemSet::default(),
            container_width: 0.0,
            pending: false,
            attempts: 0,
            awaiting_retry: None,
            passes: 0,
            last: None,
        }
    }

    pub fn config(&self) -> &MasonryConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.items.generation()
    }

    pub fn items(&self) -> &ItemSet {
        &self.items
    }

    pub fn container_width(&self) -> f64 {
        self.container_width
    }

    pub fn last_result(&self) -> Option<&LayoutResult> {
        self.last.as_ref()
    }

    pub fn record(&self, index: usize) -> Option<&LayoutRecord> {
        self.items.items().get(index).map(|item| item.record())
    }

    // ── triggers ─────────────────────────────────────────────────────────────

    pub fn request_pass(&mut self) -> RequestOutcome {
        if self.pending {
            return RequestOutcome::Coalesced;
        }
        self.pending = true;
        RequestOutcome::Scheduled
    }

    /// Swaps the backing list. A list with identical content is a no-op.
    ///
    /// Returns true if the identity changed; any deferred retry for the old list is
    /// abandoned and the previous result discarded.
    pub fn replace_items(&mut self, records: Vec<LayoutRecord>) -> bool {
        if !self.items.replace(records) {
            return false;
        }
        debug!(
            generation = self.items.generation(),
            items = self.items.items().len(),
            "masonry item list replaced"
        );
        self.attempts = 0;
        self.awaiting_retry = None;
        self.last = None;
        self.request_pass();
        true
    }

    /// Applies an image load/error outcome for the list generation it was started for.
    pub fn record_measurement(
        &mut self,
        generation: u64,
        id: &str,
        measured: Option<Dimensions>,
    ) -> bool {
        if generation != self.items.generation() {
            debug!(generation, id, "dropping measurement for a replaced item list");
            return false;
        }
        if !self.items.measure(id, measured) {
            return false;
        }
        self.request_pass();
        true
    }

    /// Negative or non-finite widths are treated as "not laid out yet".
    pub fn resize(&mut self, width: f64) {
        self.container_width = if width.is_finite() && width > 0.0 { width } else { 0.0 };
        self.attempts = 0;
        self.awaiting_retry = None;
        self.request_pass();
    }

    /// Called when a deferred retry timer fires. Stale retries are ignored.
    pub fn retry_due(&mut self, generation: u64, attempt: u32) -> bool {
        if generation != self.items.generation() || self.awaiting_retry != Some(attempt) {
            debug!(generation, attempt, "abandoning stale masonry retry");
            return false;
        }
        self.awaiting_retry = None;
        self.request_pass();
        true
    }

    // ── pass ─────────────────────────────────────────────────────────────────

    /// Runs the pending pass, if any.
    pub fn flush(&mut self) -> PassOutcome {
        if !self.pending {
            return PassOutcome::Idle;
        }
        self.pending = false;
        let generation = self.items.generation();

        let computed = compute_layout(
            self.container_width,
            self.items.layout_inputs(),
            &self.config,
        );
        let Some(result) = computed else {
            return self.defer(generation);
        };

        self.attempts = 0;
        self.awaiting_retry = None;
        self.passes += 1;
        let placed: Vec<&str> = result.placements.iter().map(|p| p.id.as_str()).collect();
        self.items.mark_placed(&placed);
        debug!(
            generation,
            pass = self.passes,
            placed = result.placements.len(),
            height = result.height,
            "masonry pass complete"
        );
        self.last = Some(result.clone());
        PassOutcome::Placed {
            generation,
            pass: self.passes,
            result,
        }
    }

    fn defer(&mut self, generation: u64) -> PassOutcome {
        if self.attempts >= self.config.max_width_retries {
            warn!(
                generation,
                attempts = self.attempts,
                "container width still unavailable, giving up until the next trigger"
            );
            self.awaiting_retry = None;
            return PassOutcome::GaveUp { generation };
        }
        self.attempts += 1;
        self.awaiting_retry = Some(self.attempts);
        let delay = self.config.retry_delay(self.attempts);
        debug!(generation, attempt = self.attempts, ?delay, "container width unavailable, deferring pass");
        PassOutcome::Deferred {
            generation,
            attempt: self.attempts,
            delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squares(ids: &[&str]) -> Vec<LayoutRecord> {
        ids.iter()
            .map(|id| LayoutRecord::new(*id, format!("{id}.jpg")))
            .collect()
    }

    fn measure_all(session: &mut LayoutSession, ids: &[&str]) {
        let generation = session.generation();
        for id in ids {
            session.record_measurement(generation, id, Some(Dimensions::new(100.0, 100.0)));
        }
    }

    fn placed_ids(outcome: &PassOutcome) -> Vec<String> {
        match outcome {
            PassOutcome::Placed { result, .. } => {
                result.placements.iter().map(|p| p.id.clone()).collect()
            }
            other => panic!("expected Placed, got {other:?}"),
        }
    }

    #[test]
    fn test_requests_coalesce_into_one_pass() {
        let mut session = LayoutSession::new(MasonryConfig::default());
        assert_eq!(session.request_pass(), RequestOutcome::Scheduled);
        assert_eq!(session.request_pass(), RequestOutcome::Coalesced);

        session.resize(700.0);
        session.replace_items(squares(&["a", "b"]));
        measure_all(&mut session, &["a", "b"]);

        assert!(matches!(session.flush(), PassOutcome::Placed { pass: 1, .. }));
        assert_eq!(session.flush(), PassOutcome::Idle);
    }

    #[test]
    fn test_zero_width_defers_once_without_placements() {
        let mut session = LayoutSession::new(MasonryConfig::default());
        session.replace_items(squares(&["a"]));
        measure_all(&mut session, &["a"]);

        let outcome = session.flush();
        assert_eq!(
            outcome,
            PassOutcome::Deferred {
                generation: 1,
                attempt: 1,
                delay: Duration::from_millis(50),
            }
        );
        assert!(session.last_result().is_none());
        assert_eq!(session.flush(), PassOutcome::Idle);
    }

    #[test]
    fn test_deferred_retries_are_bounded() {
        let config = MasonryConfig {
            max_width_retries: 3,
            ..MasonryConfig::default()
        };
        let mut session = LayoutSession::new(config);
        session.replace_items(squares(&["a"]));

        let mut attempts = Vec::new();
        loop {
            match session.flush() {
                PassOutcome::Deferred { generation, attempt, .. } => {
                    attempts.push(attempt);
                    assert!(session.retry_due(generation, attempt));
                }
                PassOutcome::GaveUp { .. } => break,
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(attempts, vec![1, 2, 3]);
        assert_eq!(session.flush(), PassOutcome::Idle);

        // a resize starts over
        session.resize(700.0);
        assert!(matches!(session.flush(), PassOutcome::Placed { .. }));
    }

    #[test]
    fn test_retry_for_replaced_list_is_abandoned() {
        let mut session = LayoutSession::new(MasonryConfig::default());
        session.replace_items(squares(&["old-1", "old-2", "old-3"]));
        measure_all(&mut session, &["old-1", "old-2", "old-3"]);
        let PassOutcome::Deferred { generation, attempt, .. } = session.flush() else {
            panic!("expected a deferred pass");
        };

        session.replace_items(squares(&["new-1"]));
        assert!(!session.retry_due(generation, attempt));

        // a late measurement for the old list is dropped too
        assert!(!session.record_measurement(generation, "old-1", Some(Dimensions::new(1.0, 1.0))));

        measure_all(&mut session, &["new-1"]);
        session.resize(700.0);
        assert_eq!(placed_ids(&session.flush()), vec!["new-1".to_string()]);
    }

    #[test]
    fn test_resize_supersedes_pending_retry() {
        let mut session = LayoutSession::new(MasonryConfig::default());
        session.replace_items(squares(&["a"]));
        let PassOutcome::Deferred { generation, attempt, .. } = session.flush() else {
            panic!("expected a deferred pass");
        };
        session.resize(700.0);
        assert!(matches!(session.flush(), PassOutcome::Placed { .. }));
        assert!(!session.retry_due(generation, attempt));
    }

    #[test]
    fn test_unmeasured_items_join_on_later_pass() {
        let mut session = LayoutSession::new(MasonryConfig::default());
        session.resize(700.0);
        session.replace_items(squares(&["a", "b", "c"]));
        measure_all(&mut session, &["c"]);
        assert_eq!(placed_ids(&session.flush()), vec!["c".to_string()]);

        measure_all(&mut session, &["a"]);
        // list order wins over arrival order
        assert_eq!(placed_ids(&session.flush()), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_repeated_pass_is_identical() {
        let mut session = LayoutSession::new(MasonryConfig::default());
        session.resize(1024.0);
        session.replace_items(squares(&["a", "b", "c", "d"]));
        measure_all(&mut session, &["a", "b", "c", "d"]);

        let PassOutcome::Placed { result: first, .. } = session.flush() else {
            panic!("expected Placed");
        };
        session.request_pass();
        let PassOutcome::Placed { result: second, .. } = session.flush() else {
            panic!("expected Placed");
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_identical_list_does_not_trigger() {
        let mut session = LayoutSession::new(MasonryConfig::default());
        session.resize(700.0);
        session.replace_items(squares(&["a"]));
        session.flush();
        assert!(!session.replace_items(squares(&["a"])));
        assert_eq!(session.flush(), PassOutcome::Idle);
    }
}
