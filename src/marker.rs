//! Idempotency sentinel appended to machine-translated text, plus the label
//! names used to tag processed objects.
//!
//! Every update path goes through [`wrap`]; every read path checks [`detect`].
//! A re-run over an object whose texts carry the sentinel performs no
//! completion calls.

/// Sentinel token, rendered as an inline code span.
pub const SENTINEL: &str = "TRANS_BY_GPT4";

/// Separator between the body, an optional metadata block and the sentinel.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Delimiter between free text and metadata blocks in PR bodies.
pub const PR_METADATA_DELIMITER: &str = "---------";

/// Label applied to objects whose tree was machine-translated.
pub const LABEL_TRANSLATED: &str = "TransByAI";

/// Label applied to PRs whose title/body was refined.
pub const LABEL_REFINED: &str = "RefinedByAI";

/// Label marking objects written in English by humans; excluded from backlog searches.
pub const LABEL_ENGLISH_NATIVE: &str = "EnglishNative";

pub fn detect(text: &str) -> bool {
    text.contains(SENTINEL)
}

/// Append the sentinel to `text` unless it is already there.
pub fn wrap(text: &str) -> String {
    wrap_with(text, "")
}

/// Like [`wrap`], placing `extra_block` between the body and the sentinel.
pub fn wrap_with(text: &str, extra_block: &str) -> String {
    if detect(text) {
        return text.to_string();
    }

    let mut wrapped = String::with_capacity(text.len() + extra_block.len() + SENTINEL.len() + 8);
    wrapped.push_str(text);
    if !extra_block.is_empty() {
        wrapped.push_str(BLOCK_SEPARATOR);
        wrapped.push_str(extra_block);
    }
    wrapped.push_str(BLOCK_SEPARATOR);
    wrapped.push('`');
    wrapped.push_str(SENTINEL);
    wrapped.push('`');
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_appends_sentinel_code_span() {
        assert_eq!(wrap("Hello"), "Hello\n\n`TRANS_BY_GPT4`");
    }

    #[test]
    fn test_wrap_never_double_wraps() {
        let once = wrap("Hello");
        assert_eq!(wrap(&once), once);
        assert_eq!(wrap_with(&once, "Co-authored-by: a <a@b.c>"), once);
    }

    #[test]
    fn test_wrap_with_extra_block() {
        assert_eq!(
            wrap_with("Body", "Co-authored-by: Octo <octo@example.com>"),
            "Body\n\nCo-authored-by: Octo <octo@example.com>\n\n`TRANS_BY_GPT4`"
        );
    }

    #[test]
    fn test_detect_is_substring_test() {
        assert!(detect("text\n\n`TRANS_BY_GPT4`"));
        assert!(detect("inline TRANS_BY_GPT4 mention"));
        assert!(!detect("TRANS_BY_GPT3"));
        assert!(!detect(""));
    }
}
