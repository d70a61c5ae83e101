//! Shared utility functions used across multiple modules.

/// Current Unix timestamp in seconds.
pub fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Append `value` unless it is already present, keeping insertion order.
pub(crate) fn push_unique<T: PartialEq>(values: &mut Vec<T>, value: T) -> bool {
    if values.contains(&value) {
        false
    } else {
        values.push(value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" alice@example.com ".to_string())),
            Some("alice@example.com".to_string())
        );
    }

    #[test]
    fn push_unique_skips_duplicates() {
        let mut values = vec![1, 2];
        assert!(!push_unique(&mut values, 2));
        assert!(push_unique(&mut values, 3));
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn unix_timestamp_now_is_positive() {
        assert!(unix_timestamp_now() > 0);
    }
}
