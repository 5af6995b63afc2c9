//! Interactive session state.
//!
//! One explicit state object instead of ambient flags: view mode, folder
//! drill-down, note editing, and multi-selection all transition through
//! named methods so the reachable states stay enumerable.

use std::collections::BTreeSet;

use crate::feed::NoteType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Feed,
    Organized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditState {
    pub note_id: String,
    pub original_text: String,
}

#[derive(Debug, Default)]
pub struct Session {
    view_mode: ViewMode,
    active_folder: Option<NoteType>,
    editing: Option<EditState>,
    multi_select: bool,
    selected: BTreeSet<String>,
    anchor: Option<usize>,
}

impl Session {
    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn active_folder(&self) -> Option<NoteType> {
        self.active_folder
    }

    pub fn editing(&self) -> Option<&EditState> {
        self.editing.as_ref()
    }

    pub fn multi_select(&self) -> bool {
        self.multi_select
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    /// Switching views drops folder drill-down, selection and edit mode.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if self.view_mode == mode {
            return;
        }
        self.view_mode = mode;
        self.active_folder = None;
        self.exit_multi_select();
        self.exit_edit();
    }

    pub fn open_folder(&mut self, folder: NoteType) {
        if self.view_mode == ViewMode::Organized {
            self.active_folder = Some(folder);
        }
    }

    pub fn close_folder(&mut self) {
        self.active_folder = None;
    }

    /// Entering edit mode is refused while multi-selecting or while another
    /// note is already being edited.
    pub fn enter_edit(&mut self, note_id: &str, original_text: &str) -> bool {
        if self.multi_select || self.editing.is_some() {
            return false;
        }
        self.editing = Some(EditState {
            note_id: note_id.to_string(),
            original_text: original_text.to_string(),
        });
        true
    }

    pub fn exit_edit(&mut self) {
        self.editing = None;
    }

    pub fn exit_multi_select(&mut self) {
        self.multi_select = false;
        self.selected.clear();
        self.anchor = None;
    }

    /// Toggle one note's selection, entering multi-select on first use and
    /// leaving it when the last selection is removed. `index` is the note's
    /// position in the current feed order and becomes the range anchor.
    pub fn toggle_selected(&mut self, note_id: &str, index: usize) {
        if self.editing.is_some() {
            return;
        }
        self.multi_select = true;

        if !self.selected.remove(note_id) {
            self.selected.insert(note_id.to_string());
        }
        self.anchor = Some(index);

        if self.selected.is_empty() {
            self.exit_multi_select();
        }
    }

    /// Select every note between the anchor and `target_index`, inclusive.
    /// Without an anchor this behaves like a single toggle-on.
    pub fn select_range(&mut self, ordered_ids: &[&str], target_index: usize) {
        if self.editing.is_some() || target_index >= ordered_ids.len() {
            return;
        }
        self.multi_select = true;

        let Some(anchor) = self.anchor else {
            self.selected.insert(ordered_ids[target_index].to_string());
            self.anchor = Some(target_index);
            return;
        };

        let (from, to) = if anchor <= target_index {
            (anchor, target_index)
        } else {
            (target_index, anchor)
        };
        for id in &ordered_ids[from..=to] {
            self.selected.insert(id.to_string());
        }
    }

    /// Drop selections for notes that disappeared from the working set.
    pub fn prune_selection<'a, I: IntoIterator<Item = &'a str>>(&mut self, existing_ids: I) {
        let existing: BTreeSet<&str> = existing_ids.into_iter().collect();
        self.selected.retain(|id| existing.contains(id.as_str()));
        if self.multi_select && self.selected.is_empty() {
            self.exit_multi_select();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_enters_and_exits_multi_select() {
        let mut session = Session::default();
        session.toggle_selected("a", 0);
        assert!(session.multi_select());
        assert!(session.selected().contains("a"));

        session.toggle_selected("a", 0);
        assert!(!session.multi_select());
        assert!(session.selected().is_empty());
    }

    #[test]
    fn test_range_select_uses_anchor() {
        let ids = ["a", "b", "c", "d"];
        let mut session = Session::default();
        session.toggle_selected("b", 1);
        session.select_range(&ids, 3);
        assert_eq!(
            session.selected().iter().cloned().collect::<Vec<_>>(),
            vec!["b", "c", "d"]
        );
    }

    #[test]
    fn test_range_select_backwards() {
        let ids = ["a", "b", "c", "d"];
        let mut session = Session::default();
        session.toggle_selected("c", 2);
        session.select_range(&ids, 0);
        assert_eq!(session.selected().len(), 3);
        assert!(!session.selected().contains("d"));
    }

    #[test]
    fn test_edit_blocks_selection_and_vice_versa() {
        let mut session = Session::default();
        assert!(session.enter_edit("a", "text"));
        session.toggle_selected("b", 1);
        assert!(session.selected().is_empty());

        session.exit_edit();
        session.toggle_selected("b", 1);
        assert!(!session.enter_edit("a", "text"));
    }

    #[test]
    fn test_view_switch_resets_transient_state() {
        let mut session = Session::default();
        session.toggle_selected("a", 0);
        session.set_view_mode(ViewMode::Organized);
        session.open_folder(NoteType::Task);

        assert!(!session.multi_select());
        assert_eq!(session.active_folder(), Some(NoteType::Task));

        session.set_view_mode(ViewMode::Feed);
        assert_eq!(session.active_folder(), None);
    }

    #[test]
    fn test_folder_requires_organized_mode() {
        let mut session = Session::default();
        session.open_folder(NoteType::Task);
        assert_eq!(session.active_folder(), None);
    }

    #[test]
    fn test_prune_selection() {
        let mut session = Session::default();
        session.toggle_selected("a", 0);
        session.toggle_selected("b", 1);
        session.prune_selection(["b"]);
        assert_eq!(session.selected().len(), 1);
        session.prune_selection([]);
        assert!(!session.multi_select());
    }
}
