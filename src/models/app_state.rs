use tracing::debug;

use crate::models::records::{Automation, Document, Integration, Note, Notification, Profile, Record};
use crate::utils::error::CommandError;

/// Names used when an index lookup fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLabel {
    pub kind: &'static str,
    pub plural: &'static str,
    pub list_command: &'static str,
}

pub const DOCUMENT_LABEL: ListLabel = ListLabel { kind: "Document", plural: "documents", list_command: "/d" };
pub const NOTE_LABEL: ListLabel = ListLabel { kind: "Note", plural: "notes", list_command: "/n" };
pub const INTEGRATION_LABEL: ListLabel = ListLabel { kind: "Integration", plural: "integrations", list_command: "/i" };
pub const AUTOMATION_LABEL: ListLabel = ListLabel { kind: "Automation", plural: "automations", list_command: "/auto" };
pub const NOTIFICATION_LABEL: ListLabel = ListLabel { kind: "Notification", plural: "notifications", list_command: "/notifs" };

/// Last fetched list of one resource plus its 1-based index
#[derive(Debug, Clone)]
pub struct IndexedList<T> {
    label: ListLabel,
    items: Vec<T>,
    index: Vec<String>,
}

impl<T: Record + Clone> IndexedList<T> {
    pub fn new(label: ListLabel) -> Self {
        Self {
            label,
            items: Vec::new(),
            index: Vec::new(),
        }
    }

    /// Replace the cached list, rebuilding the index `1..=N` in response order
    pub fn replace(&mut self, items: Vec<T>) {
        self.index = items.iter().map(|item| item.id().to_string()).collect();
        self.items = items;
        debug!(kind = self.label.kind, count = self.index.len(), "index rebuilt");
    }

    /// Drop the cached list after a mutation
    pub fn invalidate(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Identifier captured for index `n` at the last refresh
    pub fn resolve(&self, n: usize) -> Result<&str, CommandError> {
        if n == 0 || n > self.index.len() {
            return Err(self.not_found(n));
        }
        Ok(&self.index[n - 1])
    }

    /// Record captured for index `n` at the last refresh
    pub fn get(&self, n: usize) -> Result<&T, CommandError> {
        if n == 0 || n > self.items.len() {
            return Err(self.not_found(n));
        }
        Ok(&self.items[n - 1])
    }

    fn not_found(&self, n: usize) -> CommandError {
        CommandError::IndexNotFound {
            kind: self.label.kind.to_string(),
            index: n,
            list_command: self.label.list_command.to_string(),
            plural: self.label.plural.to_string(),
        }
    }
}

/// Parse a 1-based index typed by the user
pub fn parse_index(label: ListLabel, raw: &str) -> Result<usize, CommandError> {
    raw.trim().parse::<usize>().map_err(|_| CommandError::InvalidIndex {
        kind: label.kind.to_lowercase(),
        value: raw.to_string(),
    })
}

/// Session state shared by command handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub profile: Option<Profile>,
    pub documents: IndexedList<Document>,
    pub notes: IndexedList<Note>,
    pub integrations: IndexedList<Integration>,
    pub automations: IndexedList<Automation>,
    pub notifications: IndexedList<Notification>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            profile: None,
            documents: IndexedList::new(DOCUMENT_LABEL),
            notes: IndexedList::new(NOTE_LABEL),
            integrations: IndexedList::new(INTEGRATION_LABEL),
            automations: IndexedList::new(AUTOMATION_LABEL),
            notifications: IndexedList::new(NOTIFICATION_LABEL),
        }
    }

    /// Forget everything fetched with the previous credential
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notes(ids: &[&str]) -> Vec<Note> {
        ids.iter()
            .map(|id| serde_json::from_value(json!({"id": id, "title": id, "content": ""})).unwrap())
            .collect()
    }

    #[test]
    fn test_replace_rebuilds_index_in_order() {
        let mut list = IndexedList::new(NOTE_LABEL);
        list.replace(notes(&["a", "b", "c"]));

        assert_eq!(list.len(), 3);
        assert_eq!(list.resolve(1).unwrap(), "a");
        assert_eq!(list.resolve(3).unwrap(), "c");

        list.replace(notes(&["z"]));
        assert_eq!(list.len(), 1);
        assert_eq!(list.resolve(1).unwrap(), "z");
        assert!(list.resolve(2).is_err());
    }

    #[test]
    fn test_resolve_out_of_range() {
        let mut list = IndexedList::new(NOTE_LABEL);
        list.replace(notes(&["a", "b"]));

        let error = list.resolve(3).unwrap_err();
        assert_eq!(error.to_string(), "Note #3 not found. Use /n to list notes.");
        assert!(list.resolve(0).is_err());
    }

    #[test]
    fn test_invalidate_drops_index() {
        let mut list = IndexedList::new(DOCUMENT_LABEL);
        list.replace(
            vec![serde_json::from_value::<Document>(json!({"id": "d1", "file_name": "x.pdf"})).unwrap()],
        );
        list.invalidate();

        assert!(list.is_empty());
        assert!(list.get(1).is_err());
    }

    #[test]
    fn test_parse_index_rejects_non_numbers() {
        match parse_index(NOTE_LABEL, "abc") {
            Err(CommandError::InvalidIndex { kind, value }) => {
                assert_eq!(kind, "note");
                assert_eq!(value, "abc");
            }
            other => panic!("Expected InvalidIndex, got {:?}", other),
        }
    }

    #[test]
    fn test_app_state_clear() {
        let mut state = AppState::new();
        state.notes.replace(notes(&["a"]));
        state.clear();

        assert!(state.notes.is_empty());
        assert!(state.profile.is_none());
    }
}
