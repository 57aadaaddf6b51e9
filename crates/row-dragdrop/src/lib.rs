//! Row DragDrop Utilities
//!
//! Drag-and-drop gesture state for table rows, independent of any UI toolkit.
//! The host forwards its row events (drag start, enter, over, drop, end) and
//! receives the resolved move once a drop lands on a different row.

/// A resolved row move: remove at `from`, insert at `to`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowMove {
    pub from: usize,
    pub to: usize,
}

/// Gesture state for one list
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DragState {
    /// Row index the drag started from
    source: Option<usize>,
    /// Row index currently hovered
    over: Option<usize>,
}

impl DragState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row the drag started from
    pub fn source(&self) -> Option<usize> {
        self.source
    }

    /// Row currently hovered
    pub fn over(&self) -> Option<usize> {
        self.over
    }

    pub fn is_dragging(&self) -> bool {
        self.source.is_some()
    }

    /// Whether `index` should render as the drop target
    pub fn is_drop_target(&self, index: usize) -> bool {
        self.over == Some(index) && self.source != Some(index)
    }

    /// Record the source row
    pub fn start(&mut self, index: usize) {
        self.source = Some(index);
        self.over = None;
    }

    /// Record the hovered row. Returns true when the target changed, so
    /// repeated dragover events for the same row are cheap no-ops.
    pub fn enter(&mut self, index: usize) -> bool {
        if self.over == Some(index) {
            return false;
        }
        self.over = Some(index);
        true
    }

    /// Same as [`DragState::enter`]; browsers fire dragover continuously
    pub fn hover(&mut self, index: usize) -> bool {
        self.enter(index)
    }

    /// Finish the gesture on `index`.
    ///
    /// The last hovered row wins over the row the drop event fired on.
    /// Returns `None` when nothing was being dragged or the row did not move.
    /// The state is cleared either way.
    pub fn drop_on(&mut self, index: usize) -> Option<RowMove> {
        let from = self.source.take();
        let to = self.over.take().or(Some(index));
        match (from, to) {
            (Some(from), Some(to)) if from != to => Some(RowMove { from, to }),
            _ => None,
        }
    }

    /// Drag ended without a drop (or after one)
    pub fn end(&mut self) {
        self.source = None;
        self.over = None;
    }
}

/// Splice-move: remove the element at `from` and insert it at `to`.
///
/// Out-of-range indices leave the slice untouched and return false.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    if from == to {
        return true;
    }
    let moved = items.remove(from);
    items.insert(to, moved);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_moves_from_source_to_hovered_row() {
        let mut drag = DragState::new();
        drag.start(2);
        assert!(drag.enter(0));
        assert_eq!(drag.drop_on(0), Some(RowMove { from: 2, to: 0 }));
        assert!(!drag.is_dragging());
    }

    #[test]
    fn test_repeated_hover_is_idempotent() {
        let mut drag = DragState::new();
        drag.start(0);
        assert!(drag.hover(1));
        assert!(!drag.hover(1));
        assert!(!drag.enter(1));
        assert_eq!(drag.over(), Some(1));
        assert!(drag.is_drop_target(1));
        assert!(!drag.is_drop_target(0));
    }

    #[test]
    fn test_drop_on_source_is_noop() {
        let mut drag = DragState::new();
        drag.start(1);
        drag.enter(1);
        assert_eq!(drag.drop_on(1), None);
    }

    #[test]
    fn test_drop_without_start_is_noop() {
        let mut drag = DragState::new();
        drag.enter(3);
        assert_eq!(drag.drop_on(3), None);
        assert_eq!(drag.over(), None);
    }

    #[test]
    fn test_drop_falls_back_to_event_row() {
        let mut drag = DragState::new();
        drag.start(0);
        assert_eq!(drag.drop_on(2), Some(RowMove { from: 0, to: 2 }));
    }

    #[test]
    fn test_move_item() {
        let mut items = vec!["a", "b", "c"];
        assert!(move_item(&mut items, 2, 0));
        assert_eq!(items, vec!["c", "a", "b"]);

        assert!(move_item(&mut items, 0, 2));
        assert_eq!(items, vec!["a", "b", "c"]);

        assert!(!move_item(&mut items, 5, 0));
        assert_eq!(items, vec!["a", "b", "c"]);
    }
}
