//! Match mode: decorate a book's existing pagination instead of inventing a
//! new one. Existing pagebreak anchors are located by string search, their
//! page labels extracted, and superscripts/pagelines spliced in around them.
//! The anchors themselves are never moved or rewritten.

use memchr::memmem;

use crate::config::PaginationConfig;
use crate::error::Result;
use crate::fragments;

const EPUB_TYPE_MARK: &str = "epub:type=\"pagebreak\"";
const ROLE_MARK: &str = "role=\"doc-pagebreak\"";

/// Rewritten file plus the warnings the pass produced. Match mode never
/// fails on a single bad anchor; it warns and keeps the input bytes.
pub struct MatchOutcome {
    pub output: String,
    pub warnings: Vec<String>,
    /// Anchors decorated, which is also the section page count consumed.
    pub anchors: u32,
}

/// Existing anchors in a file. ARIA-only books carry `role="doc-pagebreak"`
/// without the epub:type attribute, so the role count wins when present.
pub fn count_existing_anchors(data: &str) -> u32 {
    let roles = memmem::find_iter(data.as_bytes(), ROLE_MARK.as_bytes()).count() as u32;
    if roles > 0 {
        roles
    } else {
        memmem::find_iter(data.as_bytes(), EPUB_TYPE_MARK.as_bytes()).count() as u32
    }
}

/// Rewrite one content file in match mode. With both the superscript and the
/// pageline disabled the output is byte-identical to the input.
pub fn rewrite_matched(
    input: &str,
    file: &str,
    cfg: &PaginationConfig,
    total_pages: u32,
    section_total: u32,
) -> Result<MatchOutcome> {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    let mut warnings = Vec::new();
    let mut rest = input;
    let mut section_page: u32 = 1;
    let mut anchors: u32 = 0;

    loop {
        let Some(mark) = next_anchor_mark(rest) else {
            out.push_str(rest);
            break;
        };
        // Attributes may precede the pagebreak marker, so back up to the
        // opening <span.
        let Some(span_start) = rest[..mark].rfind("<span") else {
            let w = format!("Warning: {file}: pagebreak marker outside a <span> element");
            warnings.push(w);
            let (copied, remainder) = rest.split_at(mark + 1);
            out.push_str(copied);
            rest = remainder;
            continue;
        };
        out.push_str(&rest[..span_start]);
        rest = &rest[span_start..];

        // The whole anchor element: the open tag, plus any content and the
        // </span> closer when it is not self-closed.
        let tag_end = match rest.find('>') {
            Some(i) => i + 1,
            None => {
                let w = format!("Warning: {file}: unterminated pagebreak <span>");
                warnings.push(w);
                out.push_str(rest);
                break;
            }
        };
        let tag = &rest[..tag_end];
        let page = match extract_page_label(tag) {
            Some(p) => p,
            None => {
                let w = format!(
                    "Warning: {file}: no title, aria-label or id found for pagebreak"
                );
                warnings.push(w);
                out.push_str(rest);
                break;
            }
        };
        let element_end = if tag.ends_with("/>") {
            tag_end
        } else {
            match rest.find("</span>") {
                Some(i) => i + "</span>".len(),
                None => {
                    let w = format!(
                        "Warning: {file}: no closing span found for pagebreak"
                    );
                    warnings.push(w);
                    tag_end
                }
            }
        };
        out.push_str(&rest[..element_end]);
        rest = &rest[element_end..];
        anchors += 1;

        if cfg.superscript {
            out.push_str(&fragments::superscript(
                cfg,
                &page,
                total_pages,
                section_page,
                section_total,
            ));
        }
        // The pageline goes after the enclosing paragraph. If none follows,
        // warn and keep scanning; the next anchor search resumes from here.
        if cfg.pageline {
            match rest.find("</p>") {
                Some(i) => {
                    let end = i + "</p>".len();
                    out.push_str(&rest[..end]);
                    rest = &rest[end..];
                    out.push_str(&fragments::pageline(
                        cfg,
                        &page,
                        total_pages,
                        section_page,
                        section_total,
                    ));
                }
                None => {
                    let w = format!(
                        "Warning: {file}: no </p> found for matched pageline, page {page}"
                    );
                    warnings.push(w);
                }
            }
        }
        section_page += 1;
    }

    Ok(MatchOutcome {
        output: out,
        warnings,
        anchors,
    })
}

fn next_anchor_mark(data: &str) -> Option<usize> {
    let a = memmem::find(data.as_bytes(), EPUB_TYPE_MARK.as_bytes());
    let b = memmem::find(data.as_bytes(), ROLE_MARK.as_bytes());
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

/// Page label from an anchor tag, by attribute priority: title, then
/// aria-label, then the digits of the id.
fn extract_page_label(tag: &str) -> Option<String> {
    if let Some(v) = attr_value(tag, "title=") {
        return Some(v.to_string());
    }
    if let Some(v) = attr_value(tag, "aria-label=") {
        return Some(v.to_string());
    }
    if let Some(v) = attr_value(tag, "id=") {
        let digits: String = v.chars().filter(|c| c.is_ascii_digit()).collect();
        return Some(if digits.is_empty() { v.to_string() } else { digits });
    }
    None
}

fn attr_value<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let at = tag.find(name)? + name.len();
    let rest = tag.get(at..)?.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(&rest[..end])
}
