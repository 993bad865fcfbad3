use crate::tracker::Tracker;

/// Which tracker the operator is watching. Once selected, never deselected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Selection {
    #[default]
    NoSelection,
    Selected(String),
}

impl Selection {
    pub fn id(&self) -> Option<&str> {
        match self {
            Selection::NoSelection => None,
            Selection::Selected(id) => Some(id),
        }
    }

    /// Picks the first tracker when nothing is selected yet.
    pub fn auto_select(&mut self, trackers: &[Tracker]) -> bool {
        if *self != Selection::NoSelection {
            return false;
        }
        match trackers.first() {
            Some(first) => {
                *self = Selection::Selected(first.id.clone());
                true
            }
            None => false,
        }
    }

    /// Returns whether the selection changed.
    pub fn select(&mut self, id: &str) -> bool {
        if self.id() == Some(id) {
            return false;
        }
        *self = Selection::Selected(id.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_selects_first() {
        let trackers = vec![
            Tracker::new("T1", "a"),
            Tracker::new("T2", "b"),
            Tracker::new("T3", "c"),
        ];
        let mut selection = Selection::default();
        assert!(selection.auto_select(&trackers));
        assert_eq!(selection, Selection::Selected("T1".to_string()));
    }

    #[test]
    fn test_auto_select_keeps_existing() {
        let trackers = vec![Tracker::new("T1", "a"), Tracker::new("T2", "b")];
        let mut selection = Selection::Selected("T2".to_string());
        assert!(!selection.auto_select(&trackers));
        assert_eq!(selection.id(), Some("T2"));
    }

    #[test]
    fn test_auto_select_empty_list() {
        let mut selection = Selection::default();
        assert!(!selection.auto_select(&[]));
        assert_eq!(selection, Selection::NoSelection);
    }

    #[test]
    fn test_select() {
        let mut selection = Selection::default();
        assert!(selection.select("T1"));
        assert!(!selection.select("T1"));
        assert!(selection.select("T2"));
        assert_eq!(selection.id(), Some("T2"));
    }
}
