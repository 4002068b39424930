//! Character-based truncation for text that ends up in model context.

/// Cap `s` at `max_chars` characters, appending a marker that records the
/// original length when anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((cutoff, _)) => {
            let total = s.chars().count();
            format!("{}...(truncated, len={total})", &s[..cutoff])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn long_text_keeps_prefix_and_records_length() {
        let out = truncate_chars("abcdefgh", 3);
        assert_eq!(out, "abc...(truncated, len=8)");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let s = "按钮按钮按钮";
        let out = truncate_chars(s, 2);
        assert!(out.starts_with("按钮..."));
        assert!(out.ends_with("len=6)"));
    }
}
