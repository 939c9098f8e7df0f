//! Filterable, scrollable and selectable item lists.
//!
//! Items live in an append-only [`ItemStore`], so an item's original index is
//! its identity for as long as the list exists. [`FilterableList`] keeps the
//! indices that pass the active predicate plus a highlight cursor into that
//! filtered view, and [`Checklist`] layers a selection set over it.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use tracing::debug;

type Predicate<T> = Box<dyn Fn(usize, &T) -> bool>;

/// Append-only, insertion-ordered item storage.
#[derive(Debug, Clone)]
pub struct ItemStore<T> {
    items: Vec<T>,
}

impl<T> Default for ItemStore<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> ItemStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose original indices follow the order of `items`.
    pub fn from_items(items: Vec<T>) -> Self {
        Self { items }
    }

    /// All items, in original-index order.
    pub fn get_all(&self) -> &[T] {
        &self.items
    }

    /// Look up an item by original index.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Append an item and return its original index.
    pub fn append(&mut self, item: T) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate `(original_index, item)` pairs.
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items.iter().enumerate()
    }
}

/// Half-open range of filtered-view positions to render.
///
/// The highlighted row stays centred while there are enough rows on both
/// sides; near either end the window is clamped so it never scrolls past the
/// list.
pub fn visible_range(highlighted: usize, total: usize, height: usize) -> Range<usize> {
    let half = height / 2;
    let first = highlighted
        .saturating_sub(half)
        .min(total.saturating_sub(height));
    let last = total.min(first + height);
    first..last
}

/// One rendered row of a [`FilterableList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRow<'a, T> {
    /// Position inside the filtered view.
    pub position: usize,
    /// Index inside the item store.
    pub original_index: usize,
    pub item: &'a T,
    pub highlighted: bool,
}

/// A list of items filtered by a predicate, with a highlight cursor.
pub struct FilterableList<T> {
    store: ItemStore<T>,
    predicate: Option<Predicate<T>>,
    // Original indices of the items passing `predicate`, ascending.
    filtered: Vec<usize>,
    // Position inside `filtered`, not an original index.
    highlighted: usize,
    width: usize,
    height: usize,
}

impl<T: fmt::Debug> fmt::Debug for FilterableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterableList")
            .field("store", &self.store)
            .field("filtered", &self.filtered)
            .field("highlighted", &self.highlighted)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl<T> Default for FilterableList<T> {
    fn default() -> Self {
        Self {
            store: ItemStore::new(),
            predicate: None,
            filtered: Vec::new(),
            highlighted: 0,
            width: 0,
            height: 0,
        }
    }
}

impl<T> FilterableList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<T>) -> Self {
        let mut list = Self::new();
        list.set_items(items);
        list
    }

    /// Replace every item. The filter resets to "accept all" and the cursor
    /// to the top; no attempt is made to keep the old highlight.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.store = ItemStore::from_items(items);
        self.predicate = None;
        self.filtered = (0..self.store.len()).collect();
        self.highlighted = 0;
    }

    /// Append an item and return its original index.
    ///
    /// The active predicate is re-applied, so the new item only shows up if it
    /// passes the current filter.
    pub fn push(&mut self, item: T) -> usize {
        let index = self.store.append(item);
        self.refilter();
        index
    }

    /// Install a new predicate and recompute the filtered view.
    ///
    /// If the highlighted item still passes, it stays highlighted; otherwise
    /// the cursor goes back to the first row.
    pub fn update_filter<F>(&mut self, predicate: F)
    where
        F: Fn(usize, &T) -> bool + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self.refilter();
    }

    fn refilter(&mut self) {
        let anchor = self.highlighted_original_index();
        let predicate = self.predicate.as_deref();
        let filtered: Vec<usize> = self
            .store
            .iter_indexed()
            .filter(|(index, item)| predicate.map_or(true, |accept| accept(*index, *item)))
            .map(|(index, _)| index)
            .collect();

        self.highlighted = anchor
            .and_then(|anchor| filtered.binary_search(&anchor).ok())
            .unwrap_or(0);
        self.filtered = filtered;
        debug!(
            total = self.store.len(),
            matched = self.filtered.len(),
            highlighted = self.highlighted,
            "recomputed filtered view"
        );
    }

    /// Move the cursor by `delta` rows, clamped to the filtered view.
    pub fn scroll(&mut self, delta: isize) {
        if self.filtered.is_empty() {
            return;
        }
        let last = self.filtered.len() - 1;
        self.highlighted = if delta < 0 {
            self.highlighted.saturating_sub(delta.unsigned_abs())
        } else {
            self.highlighted.saturating_add(delta.unsigned_abs()).min(last)
        };
    }

    pub fn page_down(&mut self) {
        self.scroll(isize::try_from(self.height).unwrap_or(isize::MAX));
    }

    pub fn page_up(&mut self) {
        self.scroll(-isize::try_from(self.height).unwrap_or(isize::MAX));
    }

    pub fn scroll_to_first(&mut self) {
        self.highlighted = 0;
    }

    pub fn scroll_to_last(&mut self) {
        self.highlighted = self.filtered.len().saturating_sub(1);
    }

    /// Only the height takes part in scrolling; the width is kept for
    /// renderers.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    /// Width from the last [`FilterableList::resize`], used to lay out rows.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Every item, filtered or not.
    pub fn items(&self) -> &[T] {
        self.store.get_all()
    }

    /// Original indices of the items passing the current filter.
    pub fn filtered_indices(&self) -> &[usize] {
        &self.filtered
    }

    /// Cursor position inside the filtered view (0 when it is empty).
    pub fn highlighted_position(&self) -> usize {
        self.highlighted
    }

    pub fn highlighted_original_index(&self) -> Option<usize> {
        self.filtered.get(self.highlighted).copied()
    }

    pub fn highlighted_item(&self) -> Option<&T> {
        self.highlighted_original_index()
            .and_then(|index| self.store.get(index))
    }

    pub fn visible_range(&self) -> Range<usize> {
        visible_range(self.highlighted, self.filtered.len(), self.height)
    }

    /// Rows inside the current viewport.
    pub fn visible_rows(&self) -> Vec<VisibleRow<'_, T>> {
        let range = self.visible_range();
        self.filtered[range.clone()]
            .iter()
            .zip(range)
            .filter_map(|(&original_index, position)| {
                self.store.get(original_index).map(|item| VisibleRow {
                    position,
                    original_index,
                    item,
                    highlighted: position == self.highlighted,
                })
            })
            .collect()
    }
}

/// A [`FilterableList`] with a set of selected items.
///
/// Selection is keyed by original index, so it survives filter changes and
/// scrolling; only the selection operations and [`Checklist::set_items`]
/// change it.
#[derive(Debug)]
pub struct Checklist<T> {
    list: FilterableList<T>,
    selected: BTreeSet<usize>,
}

impl<T> Default for Checklist<T> {
    fn default() -> Self {
        Self {
            list: FilterableList::new(),
            selected: BTreeSet::new(),
        }
    }
}

impl<T> Checklist<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<T>) -> Self {
        Self {
            list: FilterableList::with_items(items),
            selected: BTreeSet::new(),
        }
    }

    pub fn list(&self) -> &FilterableList<T> {
        &self.list
    }

    /// Replace every item and clear the selection.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.selected.clear();
        self.list.set_items(items);
    }

    pub fn push(&mut self, item: T) -> usize {
        self.list.push(item)
    }

    pub fn update_filter<F>(&mut self, predicate: F)
    where
        F: Fn(usize, &T) -> bool + 'static,
    {
        self.list.update_filter(predicate);
    }

    pub fn scroll(&mut self, delta: isize) {
        self.list.scroll(delta);
    }

    pub fn page_down(&mut self) {
        self.list.page_down();
    }

    pub fn page_up(&mut self) {
        self.list.page_up();
    }

    pub fn scroll_to_first(&mut self) {
        self.list.scroll_to_first();
    }

    pub fn scroll_to_last(&mut self) {
        self.list.scroll_to_last();
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.list.resize(width, height);
    }

    /// Flip the selection of the highlighted item.
    pub fn toggle_highlighted(&mut self) {
        let Some(index) = self.list.highlighted_original_index() else {
            return;
        };
        let selected = self.selected.contains(&index);
        self.set_item_selection(index, !selected);
    }

    pub fn set_highlighted_selection(&mut self, selected: bool) {
        if let Some(index) = self.list.highlighted_original_index() {
            self.set_item_selection(index, selected);
        }
    }

    /// Apply to every item passing the current filter, whether or not it is
    /// inside the viewport.
    pub fn set_all_visible_selection(&mut self, selected: bool) {
        let indices = self.list.filtered_indices().to_vec();
        for &index in &indices {
            self.set_item_selection(index, selected);
        }
        debug!(count = indices.len(), selected, "updated visible selection");
    }

    /// Apply to every item in the store, ignoring the filter.
    pub fn set_all_items_selection(&mut self, selected: bool) {
        if selected {
            self.selected = (0..self.list.store.len()).collect();
        } else {
            self.selected.clear();
        }
        debug!(count = self.list.store.len(), selected, "updated selection of all items");
    }

    pub fn selected_indices(&self) -> &BTreeSet<usize> {
        &self.selected
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    /// Selected items in original-index order.
    pub fn selected_items(&self) -> impl Iterator<Item = &T> {
        self.selected
            .iter()
            .filter_map(|&index| self.list.store.get(index))
    }

    fn set_item_selection(&mut self, index: usize, selected: bool) {
        if index >= self.list.store.len() {
            return;
        }
        if selected {
            self.selected.insert(index);
        } else {
            self.selected.remove(&index);
        }
    }
}
