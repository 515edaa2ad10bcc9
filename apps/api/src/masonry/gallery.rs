//! Gallery interaction state: hover, selection, and the image viewer.
#![allow(dead_code)]
//!
//! Hover is a single `Option<usize>` consulted per item, not a generated style rule per
//! index. Opening the viewer acquires the background-scroll lock through an RAII guard,
//! so every way the viewer goes away (close, reselect, list swap, drop) releases it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::masonry::item::LayoutRecord;

// ────────────────────────────────────────────────────────────────────────────
// Background-scroll lock
// ────────────────────────────────────────────────────────────────────────────

/// Shared background-scroll lock. Scrolling is locked while any guard is alive.
#[derive(Debug, Clone, Default)]
pub struct ScrollLock {
    holders: Arc<AtomicUsize>,
}

impl ScrollLock {
    pub fn acquire(&self) -> ScrollLockGuard {
        self.holders.fetch_add(1, Ordering::SeqCst);
        ScrollLockGuard {
            holders: Arc::clone(&self.holders),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.holders.load(Ordering::SeqCst) > 0
    }
}

#[derive(Debug)]
pub struct ScrollLockGuard {
    holders: Arc<AtomicUsize>,
}

impl Drop for ScrollLockGuard {
    fn drop(&mut self) {
        self.holders.fetch_sub(1, Ordering::SeqCst);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Gallery
// ────────────────────────────────────────────────────────────────────────────

/// The open viewer. Holds the scroll lock for as long as it exists.
#[derive(Debug)]
pub struct Viewer {
    record: LayoutRecord,
    _scroll: ScrollLockGuard,
}

impl Viewer {
    pub fn record(&self) -> &LayoutRecord {
        &self.record
    }
}

type SelectCallback = Box<dyn FnMut(&LayoutRecord) + Send>;

pub struct Gallery {
    records: Vec<LayoutRecord>,
    hovered: Option<usize>,
    viewer: Option<Viewer>,
    scroll_lock: ScrollLock,
    on_select: Option<SelectCallback>,
}

impl Gallery {
    pub fn new(scroll_lock: ScrollLock) -> Self {
        Self {
            records: Vec::new(),
            hovered: None,
            viewer: None,
            scroll_lock,
            on_select: None,
        }
    }

    /// Registers the callback invoked with the record when an item is selected.
    pub fn on_select<F>(&mut self, callback: F)
    where
        F: FnMut(&LayoutRecord) + Send + 'static,
    {
        self.on_select = Some(Box::new(callback));
    }

    /// Replaces the records. Hover and the viewer belong to the old list and are dropped.
    pub fn set_records(&mut self, records: Vec<LayoutRecord>) {
        self.records = records;
        self.hovered = None;
        self.viewer = None;
    }

    pub fn records(&self) -> &[LayoutRecord] {
        &self.records
    }

    pub fn hover(&mut self, index: Option<usize>) {
        self.hovered = index.filter(|&i| i < self.records.len());
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn is_hovered(&self, index: usize) -> bool {
        self.hovered == Some(index)
    }

    /// Selects an item: fires the callback and opens the viewer on it.
    pub fn select(&mut self, index: usize) -> bool {
        let Some(record) = self.records.get(index).cloned() else {
            return false;
        };
        if let Some(callback) = self.on_select.as_mut() {
            callback(&record);
        }
        debug!(id = %record.id, "opening image viewer");
        // release the previous guard before taking a new one
        self.viewer = None;
        self.viewer = Some(Viewer {
            record,
            _scroll: self.scroll_lock.acquire(),
        });
        true
    }

    pub fn close(&mut self) {
        self.viewer = None;
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    /// The prompt text of the open image, for copying to the clipboard.
    pub fn copy_prompt(&self) -> Option<&str> {
        self.viewer
            .as_ref()
            .and_then(|viewer| viewer.record.caption.as_deref())
            .filter(|prompt| !prompt.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn records() -> Vec<LayoutRecord> {
        let mut with_prompt = LayoutRecord::new("1", "one.png");
        with_prompt.caption = Some("a chrome teapot, studio light".to_string());
        vec![with_prompt, LayoutRecord::new("2", "two.png")]
    }

    fn gallery() -> (Gallery, ScrollLock) {
        let lock = ScrollLock::default();
        let mut gallery = Gallery::new(lock.clone());
        gallery.set_records(records());
        (gallery, lock)
    }

    #[test]
    fn test_hover_is_a_single_index() {
        let (mut gallery, _) = gallery();
        gallery.hover(Some(1));
        assert!(gallery.is_hovered(1));
        assert!(!gallery.is_hovered(0));

        gallery.hover(Some(0));
        assert_eq!(gallery.hovered(), Some(0));
        assert!(!gallery.is_hovered(1));

        gallery.hover(Some(9));
        assert_eq!(gallery.hovered(), None);
    }

    #[test]
    fn test_select_invokes_callback_and_locks_scroll() {
        let (mut gallery, lock) = gallery();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        gallery.on_select(move |record| sink.lock().unwrap().push(record.id.clone()));

        assert!(gallery.select(0));
        assert!(lock.is_locked());
        assert_eq!(*seen.lock().unwrap(), vec!["1".to_string()]);
        assert_eq!(gallery.copy_prompt(), Some("a chrome teapot, studio light"));

        gallery.close();
        assert!(!lock.is_locked());
        assert_eq!(gallery.copy_prompt(), None);
    }

    #[test]
    fn test_reselect_holds_exactly_one_lock() {
        let (mut gallery, lock) = gallery();
        gallery.select(0);
        gallery.select(1);
        assert_eq!(lock.holders.load(Ordering::SeqCst), 1);
        assert_eq!(gallery.viewer().unwrap().record().id, "2");
        assert_eq!(gallery.copy_prompt(), None);
    }

    #[test]
    fn test_out_of_range_select_is_ignored() {
        let (mut gallery, lock) = gallery();
        assert!(!gallery.select(5));
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_teardown_releases_scroll_lock() {
        let (mut gallery, lock) = gallery();
        gallery.select(1);
        assert!(lock.is_locked());
        drop(gallery);
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_list_swap_closes_viewer() {
        let (mut gallery, lock) = gallery();
        gallery.hover(Some(1));
        gallery.select(1);
        gallery.set_records(vec![LayoutRecord::new("3", "three.png")]);
        assert!(!lock.is_locked());
        assert_eq!(gallery.hovered(), None);
        assert!(gallery.viewer().is_none());
    }
}
