//! Masonry layout pass — greedy shortest-column placement.
//!
//! A pass is a pure function of the container width, the measured items in list
//! order, and the configured column constraints. Nothing is carried between passes,
//! so running the same pass twice yields identical output.
//!
//! # Algorithm
//! 1. `N = max(1, floor((W + G) / (M + G)))`
//! 2. `Cw = (W - G·(N-1)) / N`
//! 3. Items are visited in list order (never load order). Each measured item goes to
//!    the column with the smallest accumulated height, lowest index on ties.
//! 4. The container height is the tallest column without its trailing gap, or the
//!    placeholder height when nothing could be placed.

use std::time::Duration;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Column constraints and retry tuning for masonry layout.
///
/// The retry values are tuning choices; only convergence and idempotence matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasonryConfig {
    /// Minimum column width `M`, in pixels.
    pub min_column_width: f64,
    /// Gap `G` between columns and between stacked items, in pixels.
    pub gap: f64,
    /// Height reported for a container with no placeable items.
    pub placeholder_height: f64,
    /// Deferred passes allowed while the container width is unavailable.
    pub max_width_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Quiet period after the last resize before a pass runs.
    pub resize_debounce: Duration,
}

impl Default for MasonryConfig {
    fn default() -> Self {
        Self {
            min_column_width: 250.0,
            gap: 16.0,
            placeholder_height: 400.0,
            max_width_retries: 8,
            retry_base_delay: Duration::from_millis(50),
            retry_max_delay: Duration::from_millis(1000),
            resize_debounce: Duration::from_millis(150),
        }
    }
}

impl MasonryConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.min_column_width.is_finite() && self.min_column_width > 0.0,
            "min column width must be a positive number, got {}",
            self.min_column_width
        );
        ensure!(
            self.gap.is_finite() && self.gap >= 0.0,
            "gap must be a non-negative number, got {}",
            self.gap
        );
        ensure!(
            self.placeholder_height.is_finite() && self.placeholder_height >= 0.0,
            "placeholder height must be a non-negative number, got {}",
            self.placeholder_height
        );
        ensure!(
            self.retry_base_delay <= self.retry_max_delay,
            "retry base delay must not exceed the retry max delay"
        );
        Ok(())
    }

    /// Delay before deferred attempt `attempt` (1-based): doubles from the base, capped.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.retry_base_delay
            .saturating_mul(1 << shift)
            .min(self.retry_max_delay)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Input / output types
// ────────────────────────────────────────────────────────────────────────────

/// Intrinsic pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// `height / width`, or `None` when either side is non-finite or not positive.
    pub fn aspect_ratio(&self) -> Option<f64> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(self.width) || !usable(self.height) {
            return None;
        }
        let ratio = self.height / self.width;
        usable(ratio).then_some(ratio)
    }

    pub fn is_usable(&self) -> bool {
        self.aspect_ratio().is_some()
    }
}

/// Column count and width derived from a container width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnGrid {
    pub count: usize,
    pub width: f64,
}

/// Where one item landed in a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: String,
    /// Position of the item in the original list (including skipped items).
    pub index: usize,
    pub column: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Output of one layout pass. Superseded by the next pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub container_width: f64,
    pub column_count: usize,
    pub column_width: f64,
    pub placements: Vec<Placement>,
    pub height: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Layout pass
// ────────────────────────────────────────────────────────────────────────────

/// Derives the column grid, or `None` while the container has no usable width.
pub fn column_grid(container_width: f64, config: &MasonryConfig) -> Option<ColumnGrid> {
    if !container_width.is_finite() || container_width <= 0.0 {
        return None;
    }
    let gap = config.gap;
    let fitted = ((container_width + gap) / (config.min_column_width + gap)).floor();
    let count = if fitted.is_finite() && fitted >= 1.0 {
        fitted as usize
    } else {
        1
    };
    let width = (container_width - gap * (count as f64 - 1.0)) / count as f64;
    Some(ColumnGrid { count, width })
}

/// Runs one full layout pass.
///
/// `items` yields `(id, dimensions)` in list order; unmeasured or unusable items are
/// skipped but keep their list index. Returns `None` when the width is unavailable,
/// which callers treat as "defer and retry".
pub fn compute_layout<'a, I>(
    container_width: f64,
    items: I,
    config: &MasonryConfig,
) -> Option<LayoutResult>
where
    I: IntoIterator<Item = (&'a str, Option<Dimensions>)>,
{
    let grid = column_grid(container_width, config)?;
    let gap = config.gap;
    let items: Vec<(&str, Option<Dimensions>)> = items.into_iter().collect();
    // Empty columns fill left to right, so columns past the item count stay empty.
    let mut columns = vec![0.0_f64; grid.count.min(items.len()).max(1)];
    let mut placements = Vec::new();

    for (index, (id, dimensions)) in items.into_iter().enumerate() {
        let Some(ratio) = dimensions.and_then(|d| d.aspect_ratio()) else {
            continue;
        };
        let item_height = grid.width * ratio;
        if !item_height.is_finite() || item_height <= 0.0 {
            continue;
        }

        let column = shortest_column(&columns);
        let top = columns[column];
        placements.push(Placement {
            id: id.to_string(),
            index,
            column,
            x: column as f64 * (grid.width + gap),
            y: top,
            width: grid.width,
            height: item_height,
        });
        columns[column] += item_height + gap;
    }

    let height = if placements.is_empty() {
        config.placeholder_height
    } else {
        let tallest = columns.iter().copied().fold(0.0_f64, f64::max);
        (tallest - gap).max(0.0)
    };

    Some(LayoutResult {
        container_width,
        column_count: grid.count,
        column_width: grid.width,
        placements,
        height,
    })
}

/// Index of the shortest column; the first one wins ties.
fn shortest_column(columns: &[f64]) -> usize {
    let mut best = 0;
    for (i, &h) in columns.iter().enumerate().skip(1) {
        if h < columns[best] {
            best = i;
        }
    }
    best
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
