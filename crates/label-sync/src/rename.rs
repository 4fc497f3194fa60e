//! Rename detection for `edited` label events.
//!
//! The hosting webhook fires `edited` for any field change and never flags a
//! rename directly. The only signal is the optional previous name attached to
//! the payload.

/// Decide whether an edit changed the label's name.
///
/// Returns `true` iff `previous_name` is present, non-empty and differs from
/// `new_name`. Edits that only touched color or description carry no previous
/// name and yield `false`.
#[must_use]
pub fn is_rename(previous_name: Option<&str>, new_name: &str) -> bool {
    match previous_name {
        Some(previous) => !previous.is_empty() && previous != new_name,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_previous_name_is_not_rename() {
        assert!(!is_rename(None, "bug"));
    }

    #[test]
    fn test_empty_previous_name_is_not_rename() {
        assert!(!is_rename(Some(""), "bug"));
    }

    #[test]
    fn test_same_name_is_not_rename() {
        assert!(!is_rename(Some("bug"), "bug"));
    }

    #[test]
    fn test_different_name_is_rename() {
        assert!(is_rename(Some("bug"), "defect"));
    }

    #[test]
    fn test_case_change_is_rename() {
        assert!(is_rename(Some("bug"), "Bug"));
    }
}
