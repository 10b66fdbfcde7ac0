//! Single-pass markup tokenizer for content-file scanning.
//!
//! This is intentionally not an XML parser: content files are scanned linearly
//! with minimal lookahead, distinguishing markup from text just well enough to
//! count words and splice markers. Package-level XML (container, OPF) goes
//! through quick-xml instead; see `crate::epub::package`.

use memchr::memchr;
use memchr::memmem;

use crate::error::{Error, Result};

/// One classified run of markup starting at `<`.
#[derive(Debug, PartialEq, Eq)]
pub struct Markup<'a> {
    /// The complete raw markup text, `<` through `>` inclusive. Comments run
    /// through `-->`; `<nav>` blocks run through `</nav>`.
    pub raw: &'a str,
    /// Byte offset into the scanned buffer just past `raw`.
    pub end: usize,
    pub kind: MarkupKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind {
    /// An ordinary element, copied or inspected by the caller.
    Element,
    /// A comment (`<!-- … -->`), opaque to word counting.
    Comment,
    /// A whole `<nav>…</nav>` block, never scanned for words or boundaries.
    Nav,
    /// `</body>`; the per-file scan stops here.
    BodyEnd,
}

/// Tokenize the markup starting at `buf[0]`, which must be `<`.
///
/// Returns the complete raw element and the offset at which scanning resumes.
/// An element whose terminator never appears is a fatal condition for the
/// file; `file` only labels the error.
pub fn next_markup<'a>(buf: &'a str, file: &str) -> Result<Markup<'a>> {
    debug_assert!(buf.starts_with('<'));

    let gt = memchr(b'>', buf.as_bytes()).ok_or_else(|| Error::Malformed {
        file: file.to_string(),
        detail: format!("unterminated element: {}", preview(buf)),
    })?;

    let name = element_name(&buf[1..gt + 1]);

    if buf.starts_with("<!--") {
        // Comments may contain '>', so scan for the literal terminator.
        let close = memmem::find(buf.as_bytes(), b"-->").ok_or_else(|| Error::Malformed {
            file: file.to_string(),
            detail: format!("unterminated comment: {}", preview(buf)),
        })?;
        let end = close + 3;
        return Ok(Markup {
            raw: &buf[..end],
            end,
            kind: MarkupKind::Comment,
        });
    }

    match name {
        "nav" => {
            // Navigation blocks are consumed whole; their text is never
            // word-counted and never receives markers.
            let close = memmem::find(buf.as_bytes(), b"</nav").ok_or_else(|| Error::Malformed {
                file: file.to_string(),
                detail: "unterminated <nav> block".to_string(),
            })?;
            let close_gt =
                memchr(b'>', buf[close..].as_bytes()).ok_or_else(|| Error::Malformed {
                    file: file.to_string(),
                    detail: "unterminated </nav>".to_string(),
                })?;
            let end = close + close_gt + 1;
            Ok(Markup {
                raw: &buf[..end],
                end,
                kind: MarkupKind::Nav,
            })
        }
        "/body" => Ok(Markup {
            raw: &buf[..gt + 1],
            end: gt + 1,
            kind: MarkupKind::BodyEnd,
        }),
        _ => Ok(Markup {
            raw: &buf[..gt + 1],
            end: gt + 1,
            kind: MarkupKind::Element,
        }),
    }
}

/// Element name: characters after `<` up to whitespace, `>` or `/>`.
fn element_name(inner: &str) -> &str {
    let bytes = inner.as_bytes();
    let mut end = 0;
    while end < bytes.len() {
        match bytes[end] {
            b' ' | b'\t' | b'\n' | b'\r' | b'>' => break,
            b'/' if end > 0 => break, // keep "/body", stop before self-close
            _ => end += 1,
        }
    }
    &inner[..end]
}

fn preview(buf: &str) -> String {
    let mut end = buf.len().min(40);
    while !buf.is_char_boundary(end) {
        end -= 1;
    }
    buf[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_element() {
        let m = next_markup("<p class=\"x\">text", "f").unwrap();
        assert_eq!(m.raw, "<p class=\"x\">");
        assert_eq!(m.end, 13);
        assert_eq!(m.kind, MarkupKind::Element);
    }

    #[test]
    fn test_self_closing_span() {
        let m = next_markup("<span id=\"a\"/>rest", "f").unwrap();
        assert_eq!(m.raw, "<span id=\"a\"/>");
        assert_eq!(m.kind, MarkupKind::Element);
    }

    #[test]
    fn test_body_end() {
        let m = next_markup("</body></html>", "f").unwrap();
        assert_eq!(m.raw, "</body>");
        assert_eq!(m.kind, MarkupKind::BodyEnd);
    }

    #[test]
    fn test_comment_with_gt() {
        let m = next_markup("<!-- a > b --> after", "f").unwrap();
        assert_eq!(m.raw, "<!-- a > b -->");
        assert_eq!(m.end, 14);
        assert_eq!(m.kind, MarkupKind::Comment);
    }

    #[test]
    fn test_nav_block_consumed_whole() {
        let buf = "<nav epub:type=\"toc\"><ol><li>one</li></ol></nav><p>x</p>";
        let m = next_markup(buf, "f").unwrap();
        assert!(m.raw.ends_with("</nav>"));
        assert_eq!(&buf[m.end..], "<p>x</p>");
        assert_eq!(m.kind, MarkupKind::Nav);
    }

    #[test]
    fn test_unterminated_element_is_fatal() {
        let err = next_markup("<p class=\"never", "ch1.xhtml").unwrap_err();
        match err {
            Error::Malformed { file, .. } => assert_eq!(file, "ch1.xhtml"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unterminated_comment_is_fatal() {
        assert!(next_markup("<!-- no close >", "f").is_err());
    }
}
