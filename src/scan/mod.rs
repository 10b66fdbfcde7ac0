//! Content-document scanning: a light single-pass lexer over XHTML plus the
//! passes built on it. Content files are never parsed as XML; everything
//! outside the inserted markers is copied through byte for byte.

pub mod inserter;
pub mod matcher;
pub mod planner;
pub mod tokenizer;
pub mod words;
pub mod xmlns;

use memchr::{memchr, memmem};

use crate::error::{Error, Result};
use tokenizer::{MarkupKind, next_markup};

/// Walk the text runs inside `<body>`, in document order, skipping markup,
/// comments and whole `<nav>` blocks. Both the counting pass and the marking
/// pass identify runs through this walk, so their word totals agree.
pub fn walk_text_runs<F>(input: &str, file: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&str),
{
    let body = memmem::find(input.as_bytes(), b"<body").ok_or_else(|| Error::Malformed {
        file: file.to_string(),
        detail: "no <body> element".to_string(),
    })?;
    let buf = &input[body..];
    let mut pos = 0;
    while pos < buf.len() {
        let rest = &buf[pos..];
        if rest.starts_with('<') {
            let m = next_markup(rest, file)?;
            if m.kind == MarkupKind::BodyEnd {
                break;
            }
            pos += m.end;
        } else {
            let loc = memchr(b'<', rest.as_bytes()).unwrap_or(rest.len());
            visit(&rest[..loc]);
            pos += loc;
        }
    }
    Ok(())
}

/// Total whitespace-separated words in the body of a content document.
pub fn count_body_words(input: &str, file: &str) -> Result<usize> {
    let mut total = 0;
    walk_text_runs(input, file, |run| total += words::count_words(run))?;
    Ok(total)
}
