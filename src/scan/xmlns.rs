//! The pagebreak anchors use the `epub:type` attribute, which is only valid
//! when the content document declares the EPUB ops namespace on its root
//! element. Files converted from EPUB2 frequently lack it.

use crate::error::{Error, Result};
use crate::fragments::EPUB_NS_DECL;

/// Ensure the `<html>` element declares `xmlns:epub`. Returns the input
/// unchanged when the declaration (or the ops namespace URI) is present.
pub fn ensure_epub_namespace(input: &str, file: &str) -> Result<String> {
    let html_at = input.find("<html").ok_or_else(|| Error::Malformed {
        file: file.to_string(),
        detail: "no <html> element while checking xmlns".to_string(),
    })?;
    let tag_len = input[html_at..].find('>').ok_or_else(|| Error::Malformed {
        file: file.to_string(),
        detail: "unterminated <html> element while checking xmlns".to_string(),
    })?;
    let html_el = &input[html_at..html_at + tag_len];
    if html_el.contains("xmlns:epub") || html_el.contains("http://www.idpf.org/2007/ops") {
        return Ok(input.to_string());
    }

    let mut out = String::with_capacity(input.len() + EPUB_NS_DECL.len() + 1);
    out.push_str(&input[..html_at + "<html".len()]);
    out.push(' ');
    out.push_str(EPUB_NS_DECL);
    out.push_str(&input[html_at + "<html".len()..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_added_when_missing() {
        let input = "<?xml version=\"1.0\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\
                     <body/></html>";
        let got = ensure_epub_namespace(input, "f").unwrap();
        assert!(got.starts_with(
            "<?xml version=\"1.0\"?>\n<html xmlns:epub=\"http://www.idpf.org/2007/ops\" \
             xmlns=\"http://www.w3.org/1999/xhtml\">"
        ));
        assert!(got.ends_with("<body/></html>"));
    }

    #[test]
    fn test_existing_declaration_left_alone() {
        let input = "<html xmlns:epub=\"http://www.idpf.org/2007/ops\"><body/></html>";
        assert_eq!(ensure_epub_namespace(input, "f").unwrap(), input);
        let by_uri = "<html xmlns=\"http://www.idpf.org/2007/ops\"><body/></html>";
        assert_eq!(ensure_epub_namespace(by_uri, "f").unwrap(), by_uri);
    }

    #[test]
    fn test_missing_html_is_fatal() {
        assert!(ensure_epub_namespace("<body/>", "f").is_err());
    }
}
