//! Event loop that keeps a `LayoutSession` in sync with its triggers.
#![allow(dead_code)]
//!
//! # Architecture
//! - The driver task owns the session outright; nothing else touches it, so no locks.
//! - Hosts talk to it through `LayoutHandle` (resize, list swap, measurement).
//! - Every event already queued when the driver wakes up is applied before a single
//!   `flush`, so a burst of triggers costs one pass ("one pass per frame").
//! - A resize opens a quiet period; further resizes extend it, other events don't.
//! - Deferred retries and image probes run as child tasks that report back on an
//!   internal channel. Both are aborted when the item list is swapped, and the
//!   session's generation check drops anything that still slips through.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::masonry::engine::{Dimensions, LayoutResult, MasonryConfig};
use crate::masonry::item::LayoutRecord;
use crate::masonry::probe::{measure_each, DimensionProbe};
use crate::masonry::session::{LayoutSession, PassOutcome};

#[derive(Debug, Clone)]
pub enum LayoutEvent {
    Resize(f64),
    ReplaceItems(Vec<LayoutRecord>),
    Measured {
        generation: u64,
        id: String,
        dimensions: Option<Dimensions>,
    },
    RetryDue {
        generation: u64,
        attempt: u32,
    },
}

/// A published pass result.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutFrame {
    pub generation: u64,
    pub pass: u64,
    pub result: LayoutResult,
}

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

pub struct LayoutHandle {
    events: mpsc::UnboundedSender<LayoutEvent>,
    frames: watch::Receiver<Option<LayoutFrame>>,
    task: JoinHandle<()>,
}

impl LayoutHandle {
    pub fn resize(&self, width: f64) {
        self.send(LayoutEvent::Resize(width));
    }

    pub fn replace_items(&self, records: Vec<LayoutRecord>) {
        self.send(LayoutEvent::ReplaceItems(records));
    }

    /// Reports an image load (`Some`) or error (`None`) for the given list generation.
    pub fn record_measurement(&self, generation: u64, id: &str, dimensions: Option<Dimensions>) {
        self.send(LayoutEvent::Measured {
            generation,
            id: id.to_string(),
            dimensions,
        });
    }

    pub fn latest(&self) -> Option<LayoutFrame> {
        self.frames.borrow().clone()
    }

    /// Waits for the next published frame. `None` once the driver has stopped.
    pub async fn next_frame(&mut self) -> Option<LayoutFrame> {
        self.frames.changed().await.ok()?;
        self.frames.borrow_and_update().clone()
    }

    /// Stops the driver and waits for it to release its child tasks.
    pub async fn shutdown(self) {
        drop(self.events);
        let _ = self.task.await;
    }

    fn send(&self, event: LayoutEvent) {
        if self.events.send(event).is_err() {
            debug!("layout driver already stopped; dropping event");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Driver
// ────────────────────────────────────────────────────────────────────────────

pub struct LayoutDriver {
    session: LayoutSession,
    probe: Option<Arc<dyn DimensionProbe>>,
    events: mpsc::UnboundedReceiver<LayoutEvent>,
    internal_tx: mpsc::UnboundedSender<LayoutEvent>,
    internal_rx: mpsc::UnboundedReceiver<LayoutEvent>,
    frames: watch::Sender<Option<LayoutFrame>>,
    retry_timer: Option<JoinHandle<()>>,
    probes: Option<JoinHandle<()>>,
}

impl LayoutDriver {
    /// Spawns a driver on the current runtime. With a probe, every new item list is
    /// measured automatically; without one, the host reports measurements itself.
    pub fn spawn(config: MasonryConfig, probe: Option<Arc<dyn DimensionProbe>>) -> LayoutHandle {
        let (events_tx, events) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames) = watch::channel(None);

        let driver = LayoutDriver {
            session: LayoutSession::new(config),
            probe,
            events,
            internal_tx,
            internal_rx,
            frames: frames_tx,
            retry_timer: None,
            probes: None,
        };
        let task = tokio::spawn(driver.run());

        LayoutHandle {
            events: events_tx,
            frames,
            task,
        }
    }

    async fn run(mut self) {
        while let Some(event) = self.next_event().await {
            let mut resized = self.apply(event);
            while let Some(event) = self.try_next_event() {
                resized |= self.apply(event);
            }
            if resized && !self.debounce().await {
                break;
            }
            self.flush();
        }
        self.abort_children();
        debug!("layout driver stopped");
    }

    /// `None` once every handle is gone.
    async fn next_event(&mut self) -> Option<LayoutEvent> {
        tokio::select! {
            event = self.events.recv() => event,
            Some(event) = self.internal_rx.recv() => Some(event),
        }
    }

    fn try_next_event(&mut self) -> Option<LayoutEvent> {
        self.events
            .try_recv()
            .ok()
            .or_else(|| self.internal_rx.try_recv().ok())
    }

    /// Absorbs events until no resize has arrived for the debounce window.
    /// Returns false if the handle was dropped meanwhile.
    async fn debounce(&mut self) -> bool {
        let quiet = self.session.config().resize_debounce;
        let mut deadline = Instant::now() + quiet;
        loop {
            match tokio::time::timeout_at(deadline, self.next_event()).await {
                Ok(Some(event)) => {
                    if self.apply(event) {
                        deadline = Instant::now() + quiet;
                    }
                }
                Ok(None) => return false,
                Err(_) => return true,
            }
        }
    }

    /// Returns true for resize events.
    fn apply(&mut self, event: LayoutEvent) -> bool {
        match event {
            LayoutEvent::Resize(width) => {
                self.cancel_retry();
                self.session.resize(width);
                true
            }
            LayoutEvent::ReplaceItems(records) => {
                if self.session.replace_items(records) {
                    self.cancel_retry();
                    self.start_probes();
                }
                false
            }
            LayoutEvent::Measured {
                generation,
                id,
                dimensions,
            } => {
                self.session.record_measurement(generation, &id, dimensions);
                false
            }
            LayoutEvent::RetryDue {
                generation,
                attempt,
            } => {
                self.session.retry_due(generation, attempt);
                false
            }
        }
    }

    fn flush(&mut self) {
        match self.session.flush() {
            PassOutcome::Placed {
                generation,
                pass,
                result,
            } => {
                self.frames.send_replace(Some(LayoutFrame {
                    generation,
                    pass,
                    result,
                }));
            }
            PassOutcome::Deferred {
                generation,
                attempt,
                delay,
            } => {
                self.cancel_retry();
                let tx = self.internal_tx.clone();
                self.retry_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(LayoutEvent::RetryDue {
                        generation,
                        attempt,
                    });
                }));
            }
            PassOutcome::GaveUp { generation } => {
                info!(generation, "masonry layout waiting for a resize or new items");
            }
            PassOutcome::Idle => {}
        }
    }

    fn start_probes(&mut self) {
        if let Some(task) = self.probes.take() {
            task.abort();
        }
        let Some(probe) = self.probe.clone() else {
            return;
        };
        let generation = self.session.generation();
        let records: Vec<LayoutRecord> = self.session.items().records().cloned().collect();
        let tx = self.internal_tx.clone();
        self.probes = Some(tokio::spawn(async move {
            measure_each(probe, &records, |id, dimensions| {
                let _ = tx.send(LayoutEvent::Measured {
                    generation,
                    id,
                    dimensions,
                });
            })
            .await;
        }));
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }

    fn abort_children(&mut self) {
        self.cancel_retry();
        if let Some(task) = self.probes.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use crate::masonry::probe::testing::FakeProbe;

    fn gallery(prefix: &str, n: usize) -> Vec<LayoutRecord> {
        (0..n)
            .map(|i| LayoutRecord::new(format!("{prefix}-{i}"), format!("{prefix}-{i}.jpg")))
            .collect()
    }

    fn square_probe(records: &[LayoutRecord]) -> Arc<dyn DimensionProbe> {
        let mut probe = FakeProbe::default();
        for (i, record) in records.iter().enumerate() {
            // later items finish first
            let delay = Duration::from_millis(10 * (records.len() - i) as u64);
            probe = probe.with(&record.image_ref, Dimensions::new(100.0, 100.0), delay);
        }
        Arc::new(probe)
    }

    async fn wait_for<F>(handle: &mut LayoutHandle, mut done: F) -> LayoutFrame
    where
        F: FnMut(&LayoutFrame) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                let frame = handle.next_frame().await.expect("driver stopped");
                if done(&frame) {
                    return frame;
                }
            }
        })
        .await
        .expect("layout never converged")
    }

    #[tokio::test(start_paused = true)]
    async fn test_probed_items_converge_in_list_order() {
        let records = gallery("img", 6);
        let mut handle = LayoutDriver::spawn(MasonryConfig::default(), Some(square_probe(&records)));
        handle.resize(700.0);
        handle.replace_items(records);

        let frame = wait_for(&mut handle, |f| f.result.placements.len() == 6).await;
        let columns: Vec<usize> = frame.result.placements.iter().map(|p| p.column).collect();
        assert_eq!(columns, vec![0, 1, 0, 1, 0, 1]);
        assert!((frame.result.height - (3.0 * 358.0 - 16.0)).abs() < 1e-9);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_triggers_runs_one_pass() {
        let mut handle = LayoutDriver::spawn(MasonryConfig::default(), None);
        let records = gallery("img", 6);
        handle.replace_items(records.clone());
        for record in &records {
            handle.record_measurement(1, &record.id, Some(Dimensions::new(100.0, 100.0)));
        }
        handle.resize(700.0);

        let frame = handle.next_frame().await.unwrap();
        assert_eq!(frame.pass, 1);
        assert_eq!(frame.result.placements.len(), 6);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.latest().unwrap().pass, 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_width_defers_until_resize() {
        let mut handle = LayoutDriver::spawn(MasonryConfig::default(), None);
        handle.replace_items(gallery("img", 2));
        handle.record_measurement(1, "img-0", Some(Dimensions::new(100.0, 50.0)));
        handle.record_measurement(1, "img-1", Some(Dimensions::new(100.0, 50.0)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(handle.latest().is_none());

        handle.resize(700.0);
        let frame = handle.next_frame().await.unwrap();
        assert_eq!(frame.result.placements.len(), 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_swap_never_places_stale_items() {
        let old = gallery("old", 5);
        let new = gallery("new", 2);
        let mut all = old.clone();
        all.extend(new.clone());
        let mut handle = LayoutDriver::spawn(MasonryConfig::default(), Some(square_probe(&all)));

        // width unavailable: the old list sits in deferred retries
        handle.replace_items(old);
        tokio::time::sleep(Duration::from_millis(120)).await;

        handle.replace_items(new.clone());
        handle.resize(700.0);

        let new_ids: HashSet<String> = new.iter().map(|r| r.id.clone()).collect();
        let frame = wait_for(&mut handle, |f| {
            assert_eq!(f.generation, 2, "frame published for the replaced list");
            for p in &f.result.placements {
                assert!(new_ids.contains(&p.id), "stale item {} placed", p.id);
            }
            f.result.placements.len() == 2
        })
        .await;
        assert_eq!(frame.result.placements[0].id, "new-0");

        tokio::time::sleep(Duration::from_secs(5)).await;
        let latest = handle.latest().unwrap();
        assert!(latest.result.placements.iter().all(|p| new_ids.contains(&p.id)));
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_burst_is_debounced() {
        let mut handle = LayoutDriver::spawn(MasonryConfig::default(), None);
        handle.replace_items(gallery("img", 1));
        handle.record_measurement(1, "img-0", Some(Dimensions::new(100.0, 100.0)));
        handle.resize(700.0);
        let first = handle.next_frame().await.unwrap();
        assert_eq!(first.pass, 1);

        handle.resize(900.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.resize(1100.0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.resize(1400.0);

        let frame = handle.next_frame().await.unwrap();
        assert_eq!(frame.pass, 2);
        assert!((frame.result.container_width - 1400.0).abs() < 1e-9);
        handle.shutdown().await;
    }
}
