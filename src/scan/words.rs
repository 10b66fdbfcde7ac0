//! Whitespace-delimited word counting.
//!
//! Both the counting pass and the marking pass must tokenize text identically,
//! or inserted page numbers drift from the reported totals. Everything that
//! counts words goes through this module.

/// Count whitespace-separated words in a text run containing no markup.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Byte offset just past the end of the `n`-th word (1-based) of `text`.
///
/// Used to splice a page marker into a run after exactly `n` more words.
/// Returns `None` if the run holds fewer than `n` words.
pub fn offset_after_word(text: &str, n: usize) -> Option<usize> {
    if n == 0 {
        return Some(0);
    }
    let mut seen = 0usize;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                seen += 1;
                if seen == n {
                    return Some(i);
                }
                in_word = false;
            }
        } else {
            in_word = true;
        }
    }
    if in_word {
        seen += 1;
        if seen == n {
            return Some(text.len());
        }
    }
    None
}
