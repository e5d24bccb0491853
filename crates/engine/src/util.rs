//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use unicode_normalization::UnicodeNormalization;

use crate::{EngineError, ResultEngine};

/// Trim and NFC-normalize a display name, rejecting empty input.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.nfc().collect())
}

/// Case-insensitive lookup key for a name already passed through
/// [`normalize_required_name`].
pub(crate) fn normalize_name_key(value: &str) -> String {
    value.to_lowercase()
}

/// Drop empty optional text instead of storing "".
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_normalization_trims_and_rejects_empty() {
        assert_eq!(normalize_required_name("  Travel ", "category").unwrap(), "Travel");
        assert!(normalize_required_name("   ", "category").is_err());
    }

    #[test]
    fn optional_text_drops_blank() {
        assert_eq!(normalize_optional_text(Some("  ")), None);
        assert_eq!(normalize_optional_text(Some(" note ")), Some("note".to_string()));
        assert_eq!(normalize_optional_text(None), None);
    }
}
