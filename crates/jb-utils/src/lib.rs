//! Shared layout helpers for Jotbook.
//!
//! Everything here is plain arithmetic over terminal cell counts so the
//! renderer and the tests agree on column widths.

/// Format used for entry timestamps in the list.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Printed width of [`TIMESTAMP_FORMAT`].
pub const TIMESTAMP_WIDTH: usize = 19;

/// Marker appended to text cut short by [`truncate_with_ellipsis`].
pub const CONTINUATION_CHAR: char = '…';

const MAX_NAME_WIDTH: usize = 45;

// Columns this narrow are dropped instead of rendered as a stub.
const MIN_NAME_AND_TAG_WIDTH: usize = 5;

/// Coarse width classes used to decide which entry columns to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Wide,
    Medium,
    Narrow,
    Sliver,
}

// Widest class first; the first threshold the width exceeds wins.
const SIZE_CLASS_THRESHOLDS: [(SizeClass, usize); 3] = [
    (SizeClass::Wide, 150),
    (SizeClass::Medium, 120),
    (SizeClass::Narrow, 80),
];

impl SizeClass {
    /// Classify a component width.
    pub fn for_width(width: usize) -> Self {
        SIZE_CLASS_THRESHOLDS
            .iter()
            .find(|(_, threshold)| width > *threshold)
            .map_or(SizeClass::Sliver, |(class, _)| *class)
    }

    /// Width of the selection marker column.
    pub fn checkmark_width(self) -> usize {
        match self {
            SizeClass::Wide => 5,
            SizeClass::Medium => 4,
            SizeClass::Narrow => 3,
            SizeClass::Sliver => 2,
        }
    }

    /// Width of the timestamp column, zero when it is hidden.
    pub fn timestamp_width(self) -> usize {
        match self {
            SizeClass::Wide => TIMESTAMP_WIDTH + 4,
            SizeClass::Medium => TIMESTAMP_WIDTH + 2,
            SizeClass::Narrow | SizeClass::Sliver => 0,
        }
    }
}

/// Column widths for one entry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub checkmark: usize,
    pub timestamp: usize,
    /// Zero when the column is hidden.
    pub name: usize,
    /// Zero when the column is hidden.
    pub tags: usize,
}

/// Split a row of `width` cells into entry columns.
pub fn row_layout(width: usize) -> RowLayout {
    let class = SizeClass::for_width(width);
    let checkmark = class.checkmark_width();
    let timestamp = class.timestamp_width();
    let remaining = width.saturating_sub(checkmark + timestamp);

    let name = MAX_NAME_WIDTH.min(remaining * 3 / 5);
    let tags = remaining - name;

    RowLayout {
        checkmark,
        timestamp,
        name: if name > MIN_NAME_AND_TAG_WIDTH { name } else { 0 },
        tags: if tags > MIN_NAME_AND_TAG_WIDTH { tags } else { 0 },
    }
}

/// Shorten `text` so it fits in `width` cells, leaving one spare cell.
///
/// Counts chars, not display cells.
pub fn truncate_with_ellipsis(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let len = text.chars().count();
    if len < width {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(width.saturating_sub(2)).collect();
    truncated.push(CONTINUATION_CHAR);
    truncated
}

// (threshold, pad): the pad applies when the size is greater than the threshold.
const HORIZONTAL_PAD_THRESHOLDS: [(usize, usize); 2] = [(120, 2), (60, 1)];
const VERTICAL_PAD_THRESHOLDS: [(usize, usize); 1] = [(40, 1)];

fn pad_for(size: usize, thresholds: &[(usize, usize)]) -> usize {
    thresholds
        .iter()
        .find(|(threshold, _)| size > *threshold)
        .map_or(0, |(_, pad)| *pad)
}

/// Horizontal and vertical padding around the whole screen.
pub fn pads_for_size(width: usize, height: usize) -> (usize, usize) {
    (
        pad_for(width, &HORIZONTAL_PAD_THRESHOLDS),
        pad_for(height, &VERTICAL_PAD_THRESHOLDS),
    )
}
