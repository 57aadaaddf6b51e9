//! Display Order Overlay
//!
//! A local permutation of record ids layered over the mirror so rows can be
//! dragged without waiting for a round trip.

use row_dragdrop::{move_item, DragState, RowMove};

/// Whether the order is written back to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderMode {
    /// The store's `order` field is authoritative; every push resets the overlay
    Persisted,
    /// Client-side only; pushes are reconciled into the existing order
    Local,
}

#[derive(Debug, Clone)]
pub struct DisplayOrder {
    mode: OrderMode,
    ids: Vec<String>,
    drag: DragState,
}

impl DisplayOrder {
    pub fn new(mode: OrderMode) -> Self {
        Self {
            mode,
            ids: Vec::new(),
            drag: DragState::new(),
        }
    }

    pub fn mode(&self) -> OrderMode {
        self.mode
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Follow a mirror push
    pub fn sync(&mut self, mirror_ids: &[String]) {
        match self.mode {
            OrderMode::Persisted => self.reset(mirror_ids),
            OrderMode::Local => self.reconcile(mirror_ids),
        }
    }

    /// Keep known ids in their current order, append new ones, drop the rest
    pub fn reconcile(&mut self, mirror_ids: &[String]) {
        self.ids.retain(|id| mirror_ids.contains(id));
        for id in mirror_ids {
            if !self.ids.contains(id) {
                self.ids.push(id.clone());
            }
        }
    }

    /// Take the mirror's order as-is
    pub fn reset(&mut self, mirror_ids: &[String]) {
        self.ids = mirror_ids.to_vec();
    }

    pub fn drag_start(&mut self, index: usize) {
        self.drag.start(index);
    }

    /// Returns true when the hovered row changed
    pub fn drag_enter(&mut self, index: usize) -> bool {
        self.drag.enter(index)
    }

    pub fn drag_over(&mut self, index: usize) -> bool {
        self.drag.hover(index)
    }

    /// Resolve the gesture; indices refer to whatever rows were displayed
    pub fn drop_on(&mut self, index: usize) -> Option<RowMove> {
        self.drag.drop_on(index)
    }

    pub fn drag_end(&mut self) {
        self.drag.end();
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn is_drop_target(&self, index: usize) -> bool {
        self.drag.is_drop_target(index)
    }

    /// Apply a move expressed over the full list
    pub fn move_row(&mut self, mv: RowMove) -> bool {
        move_item(&mut self.ids, mv.from, mv.to)
    }

    /// Apply a move expressed over a filtered `view`. Rows hidden by the
    /// filter keep their relative order after the visible ones.
    pub fn apply_view_move(&mut self, view: &[String], mv: RowMove) -> bool {
        let mut moved = view.to_vec();
        if !move_item(&mut moved, mv.from, mv.to) {
            return false;
        }
        let hidden: Vec<String> = self
            .ids
            .iter()
            .filter(|id| !view.contains(id))
            .cloned()
            .collect();
        moved.extend(hidden);
        self.ids = moved;
        true
    }

    /// `(id, position)` for every row
    pub fn positions(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reconcile_keeps_appends_drops() {
        let mut order = DisplayOrder::new(OrderMode::Local);
        order.sync(&ids(&["a", "b", "c"]));
        order.move_row(RowMove { from: 2, to: 0 });
        assert_eq!(order.ids(), ids(&["c", "a", "b"]).as_slice());

        order.sync(&ids(&["a", "b", "c", "d"]));
        assert_eq!(order.ids(), ids(&["c", "a", "b", "d"]).as_slice());

        order.sync(&ids(&["d", "b", "c"]));
        assert_eq!(order.ids(), ids(&["c", "b", "d"]).as_slice());
    }

    #[test]
    fn test_persisted_mode_resets() {
        let mut order = DisplayOrder::new(OrderMode::Persisted);
        order.sync(&ids(&["a", "b", "c"]));
        order.move_row(RowMove { from: 0, to: 2 });
        order.sync(&ids(&["a", "b", "c"]));
        assert_eq!(order.ids(), ids(&["a", "b", "c"]).as_slice());
    }

    #[test]
    fn test_gesture_moves_row() {
        let mut order = DisplayOrder::new(OrderMode::Local);
        order.sync(&ids(&["a", "b", "c"]));
        order.drag_start(2);
        assert!(order.drag_enter(0));
        assert!(!order.drag_over(0));
        let mv = order.drop_on(1).unwrap();
        assert!(order.move_row(mv));
        assert_eq!(order.ids(), ids(&["c", "a", "b"]).as_slice());
        assert!(!order.is_dragging());
    }

    #[test]
    fn test_drop_on_source_does_nothing() {
        let mut order = DisplayOrder::new(OrderMode::Local);
        order.sync(&ids(&["a", "b"]));
        order.drag_start(1);
        assert_eq!(order.drop_on(1), None);
        assert_eq!(order.drop_on(0), None);
    }

    #[test]
    fn test_view_move_appends_hidden_rows() {
        let mut order = DisplayOrder::new(OrderMode::Local);
        order.sync(&ids(&["a", "x", "b", "y", "c"]));
        let view = ids(&["a", "b", "c"]);
        assert!(order.apply_view_move(&view, RowMove { from: 2, to: 0 }));
        assert_eq!(order.ids(), ids(&["c", "a", "b", "x", "y"]).as_slice());
        assert!(!order.apply_view_move(&view, RowMove { from: 5, to: 0 }));
    }

    #[test]
    fn test_positions_are_contiguous() {
        let mut order = DisplayOrder::new(OrderMode::Persisted);
        order.sync(&ids(&["a", "b", "c"]));
        order.move_row(RowMove { from: 2, to: 0 });
        let positions: Vec<(&str, i64)> = order.positions().collect();
        assert_eq!(positions, vec![("c", 0), ("a", 1), ("b", 2)]);
    }
}
