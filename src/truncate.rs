use crate::error::FormatterError;

/// Marker appended to every truncated value.
pub const TRUNCATION_SUFFIX: &str = "...[TRUNCATED]";

const SUFFIX_LEN: usize = TRUNCATION_SUFFIX.len();

/// Bound `value` to `limit` characters.
///
/// Returns `None` when the value already fits (or `limit` is `None`),
/// otherwise the first `limit - 14` characters followed by
/// [`TRUNCATION_SUFFIX`], exactly `limit` characters in total. Lengths are
/// counted in `char`s so a multi-byte code point is never split.
pub fn truncate(value: &str, limit: Option<usize>) -> Option<String> {
    let limit = limit?;
    // Cheap bound first: a string never has more chars than bytes.
    if value.len() <= limit || value.chars().count() <= limit {
        return None;
    }

    if limit < SUFFIX_LEN {
        return Some(TRUNCATION_SUFFIX[..limit].to_string());
    }

    let keep = limit - SUFFIX_LEN;
    let end = value
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(value.len());
    let mut out = String::with_capacity(end + SUFFIX_LEN);
    out.push_str(&value[..end]);
    out.push_str(TRUNCATION_SUFFIX);
    Some(out)
}

/// [`truncate`] a named attribute, recording a diagnostic in `errors`
/// when the limit is exceeded.
pub fn truncate_field(
    value: String,
    limit: Option<usize>,
    field: &str,
    errors: &mut Vec<FormatterError>,
) -> String {
    match truncate(&value, limit) {
        Some(truncated) => {
            errors.push(FormatterError::new(format!(
                "Attribute '{}' value is too long: {} (limit: {})",
                field,
                value.chars().count(),
                limit.unwrap_or_default(),
            )));
            truncated
        }
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_limit_never_truncates() {
        let value = "x".repeat(100_000);
        assert_eq!(truncate(&value, None), None);
    }

    #[test]
    fn value_at_limit_is_kept() {
        assert_eq!(truncate(&"*".repeat(100), Some(100)), None);
    }

    #[test]
    fn over_limit_is_cut_to_exact_length() {
        let value = format!("hello world{}", "*".repeat(100));
        let out = truncate(&value, Some(100)).unwrap();
        assert_eq!(out.chars().count(), 100);
        assert!(out.starts_with("hello world"));
        assert!(out.ends_with(TRUNCATION_SUFFIX));
    }

    #[test]
    fn counts_chars_not_bytes() {
        let value = "é".repeat(20);
        assert_eq!(truncate(&value, Some(20)), None);

        let out = truncate(&value, Some(16)).unwrap();
        assert_eq!(out, format!("éé{}", TRUNCATION_SUFFIX));
    }

    #[test]
    fn tiny_limit_keeps_part_of_the_suffix() {
        assert_eq!(truncate("abcdefghijklmnopqrstuvwxyz", Some(3)).unwrap(), "...");
        assert_eq!(truncate("abcdefghijklmnopqrstuvwxyz", Some(0)).unwrap(), "");
    }

    #[test]
    fn truncate_field_reports_length_and_limit() {
        let mut errors = Vec::new();
        let out = truncate_field("a".repeat(30), Some(20), "message", &mut errors);
        assert_eq!(out.len(), 20);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Attribute 'message' value is too long: 30 (limit: 20)"
        );

        let out = truncate_field("short".to_string(), Some(20), "message", &mut errors);
        assert_eq!(out, "short");
        assert_eq!(errors.len(), 1);
    }
}
