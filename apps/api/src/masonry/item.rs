//! Layout items and their measurement lifecycle.
//!
//! Each item moves `Unmeasured → Measured → Placed`. A load failure is treated like a
//! load: the item becomes `Measured` if the record carries fallback dimensions and
//! stays `Unmeasured` forever otherwise. Nothing leaves `Placed`; every pass
//! re-derives placement from the dimensions alone.

use serde::{Deserialize, Serialize};

use crate::masonry::engine::Dimensions;

/// One entry of the ordered list supplied by the hosting page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRecord {
    pub id: String,
    /// Opaque reference to the raster image (usually a URL).
    pub image_ref: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Dimensions to use when the image itself cannot be measured.
    #[serde(default)]
    pub fallback: Option<Dimensions>,
}

impl LayoutRecord {
    pub fn new(id: impl Into<String>, image_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image_ref: image_ref.into(),
            title: None,
            caption: None,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, dimensions: Dimensions) -> Self {
        self.fallback = Some(dimensions);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemState {
    Unmeasured,
    Measured { dimensions: Dimensions },
    Placed { dimensions: Dimensions },
}

impl ItemState {
    pub fn dimensions(&self) -> Option<Dimensions> {
        match self {
            ItemState::Unmeasured => None,
            ItemState::Measured { dimensions } | ItemState::Placed { dimensions } => {
                Some(*dimensions)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayoutItem {
    record: LayoutRecord,
    state: ItemState,
}

impl LayoutItem {
    pub fn new(record: LayoutRecord) -> Self {
        Self {
            record,
            state: ItemState::Unmeasured,
        }
    }

    pub fn record(&self) -> &LayoutRecord {
        &self.record
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    /// Applies a load/error outcome. `None` (or unusable dimensions) means the image
    /// failed; the record's fallback is used if it has one.
    ///
    /// Returns true if the item became `Measured`.
    pub fn measure(&mut self, measured: Option<Dimensions>) -> bool {
        if self.state != ItemState::Unmeasured {
            return false;
        }
        let dimensions = measured
            .filter(Dimensions::is_usable)
            .or_else(|| self.record.fallback.filter(Dimensions::is_usable));
        match dimensions {
            Some(dimensions) => {
                self.state = ItemState::Measured { dimensions };
                true
            }
            None => false,
        }
    }

    pub fn mark_placed(&mut self) {
        if let ItemState::Measured { dimensions } = self.state {
            self.state = ItemState::Placed { dimensions };
        }
    }
}

/// The current item list plus a generation counter bumped on every identity change.
#[derive(Debug, Clone, Default)]
pub struct ItemSet {
    generation: u64,
    items: Vec<LayoutItem>,
}

impl ItemSet {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn items(&self) -> &[LayoutItem] {
        &self.items
    }

    pub fn records(&self) -> impl Iterator<Item = &LayoutRecord> {
        self.items.iter().map(|item| &item.record)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replaces the list if its content differs. Items are recreated unmeasured.
    ///
    /// Returns true if the identity changed.
    pub fn replace(&mut self, records: Vec<LayoutRecord>) -> bool {
        if self.items.len() == records.len()
            && self.items.iter().zip(&records).all(|(item, r)| &item.record == r)
        {
            return false;
        }
        self.generation += 1;
        self.items = records.into_iter().map(LayoutItem::new).collect();
        true
    }

    /// Applies a measurement to every item with the given id.
    pub fn measure(&mut self, id: &str, measured: Option<Dimensions>) -> bool {
        let mut changed = false;
        for item in self.items.iter_mut().filter(|item| item.record.id == id) {
            changed |= item.measure(measured);
        }
        changed
    }

    /// `(id, dimensions)` pairs in list order, as consumed by a layout pass.
    pub fn layout_inputs(&self) -> impl Iterator<Item = (&str, Option<Dimensions>)> {
        self.items
            .iter()
            .map(|item| (item.record.id.as_str(), item.state.dimensions()))
    }

    pub fn mark_placed(&mut self, ids: &[&str]) {
        for item in self.items.iter_mut() {
            if ids.contains(&item.record.id.as_str()) {
                item.mark_placed();
            }
        }
    }

    pub fn unmeasured_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.state == ItemState::Unmeasured)
            .map(|item| item.record.id.clone())
            .collect()
    }
}
