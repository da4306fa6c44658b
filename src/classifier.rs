//! "Already English" heuristic.
//!
//! A string counts as target-language when every character is single-byte in
//! UTF-8, with emoji exempted. This is not language detection: the sentinel
//! bookkeeping only needs the answer to be stable across runs.

/// True when `text` needs no translation.
pub fn is_target_language(text: &str) -> bool {
    text.chars().all(|c| c.len_utf8() == 1 || is_emoji(c))
}

/// Whether `c` on its own is a known emoji, against current Unicode emoji data.
fn is_emoji(c: char) -> bool {
    let mut buf = [0u8; 4];
    emojis::get(c.encode_utf8(&mut buf)).is_some()
}
