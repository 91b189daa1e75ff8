//! Pure membership diff for a list-valued attribute

/// Desired presence of an item in its parent's list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
}

/// Result of reconciling a list against a desired presence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The list already satisfied the desired presence; nothing to write
    Unchanged,
    /// The list was modified and must be written back
    Mutated,
}

impl Reconciliation {
    pub fn is_mutated(self) -> bool {
        matches!(self, Reconciliation::Mutated)
    }
}

/// Bring `items` into agreement with the desired presence of `value`
///
/// Only the target entry is touched: it is appended when missing, or its first
/// occurrence is removed. The relative order of every other entry is kept and
/// pre-existing duplicates are left alone.
pub fn reconcile(items: &mut Vec<String>, value: &str, presence: Presence) -> Reconciliation {
    let position = items.iter().position(|item| item == value);

    match (presence, position) {
        (Presence::Present, Some(_)) | (Presence::Absent, None) => Reconciliation::Unchanged,
        (Presence::Present, None) => {
            items.push(value.to_string());
            Reconciliation::Mutated
        }
        (Presence::Absent, Some(index)) => {
            items.remove(index);
            Reconciliation::Mutated
        }
    }
}
