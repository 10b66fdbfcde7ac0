//! The marking pass: rewrites one content file, splicing page anchors,
//! superscripts and staged pagelines at planned boundaries.
//!
//! Output is byte-faithful to the input outside the inserted (and, for
//! converted books, removed) spans: no reflowing, no whitespace
//! normalization, no attribute reordering.

use memchr::memchr;
use memchr::memmem;

use crate::config::PaginationConfig;
use crate::error::{Error, Result};
use crate::fragments::{self, PageList};
use crate::scan::planner::BoundaryPlanner;
use crate::scan::tokenizer::{MarkupKind, next_markup};
use crate::scan::words::{count_words, offset_after_word};

/// Per-file context for the marking pass.
pub struct SectionInfo<'a> {
    /// Label used in error messages (the on-disk path, usually).
    pub file: &'a str,
    /// Page-list href for this file; empty when no page-list is generated.
    pub href: &'a str,
    /// Pages started within this file, from the counting pass.
    pub section_pages: u32,
}

/// Rewrite one content file, inserting markers at boundaries decided by
/// `planner` and registering anchors into `page_list`.
///
/// When `converted` is set, page-anchor spans left over from the source of an
/// EPUB2 conversion are suppressed together with their closers (both the
/// self-closed and the `</span>`-closed form).
pub fn rewrite_file(
    input: &str,
    section: &SectionInfo<'_>,
    cfg: &PaginationConfig,
    total_pages: u32,
    converted: bool,
    planner: &mut BoundaryPlanner,
    page_list: &mut PageList,
) -> Result<String> {
    let body = memmem::find(input.as_bytes(), b"<body").ok_or_else(|| Error::Malformed {
        file: section.file.to_string(),
        detail: "no <body> element".to_string(),
    })?;

    let mut out = String::with_capacity(input.len() + input.len() / 8);
    out.push_str(&input[..body]);
    let buf = &input[body..];

    let mut pos = 0;
    let mut staged_pagelines: Vec<String> = Vec::new();
    let mut drop_span_close = false;

    while pos < buf.len() {
        let rest = &buf[pos..];
        if rest.starts_with('<') {
            let m = next_markup(rest, section.file)?;
            pos += m.end;
            match m.kind {
                MarkupKind::BodyEnd => {
                    // Everything from </body> on is copied through unexamined.
                    out.push_str(m.raw);
                    out.push_str(&buf[pos..]);
                    return Ok(out);
                }
                MarkupKind::Comment | MarkupKind::Nav => out.push_str(m.raw),
                MarkupKind::Element => {
                    if drop_span_close && m.raw == "</span>" {
                        drop_span_close = false;
                        continue;
                    }
                    if converted && is_page_anchor(m.raw) {
                        // Stale anchor from the pre-conversion pagination:
                        // drop it, and its closer if it is not self-closed.
                        if !m.raw.ends_with("/>") {
                            drop_span_close = true;
                        }
                        continue;
                    }
                    out.push_str(m.raw);
                    if m.raw == "</p>" || m.raw == "</div>" {
                        for pl in staged_pagelines.drain(..) {
                            out.push_str(&pl);
                        }
                    }
                }
            }
        } else {
            let loc = memchr(b'<', rest.as_bytes()).unwrap_or(rest.len());
            let run = &rest[..loc];
            pos += loc;

            let events = planner.advance(count_words(run));
            if events.is_empty() {
                out.push_str(run);
                continue;
            }

            let mut cursor = 0;
            for ev in &events {
                let split = if ev.word_offset == 0 {
                    0
                } else {
                    offset_after_word(run, ev.word_offset).unwrap_or(run.len())
                };
                out.push_str(&run[cursor..split]);
                cursor = split;

                if cfg.generate_page_list {
                    out.push_str(&fragments::page_anchor(ev.page));
                    page_list.push(ev.page, section.href);
                }
                if cfg.superscript {
                    out.push_str(&fragments::superscript(
                        cfg,
                        &ev.page.to_string(),
                        total_pages,
                        ev.section_page,
                        section.section_pages,
                    ));
                }
                if cfg.pageline {
                    staged_pagelines.push(fragments::pageline(
                        cfg,
                        &ev.page.to_string(),
                        total_pages,
                        ev.section_page,
                        section.section_pages,
                    ));
                }
            }
            out.push_str(&run[cursor..]);
        }
    }

    // No </body>; the counting pass accepts this, so the marking pass does too.
    Ok(out)
}

/// A previously inserted zero-width page anchor, in either legacy form.
fn is_page_anchor(raw: &str) -> bool {
    raw.starts_with("<span")
        && (raw.contains("epub:type=\"pagebreak\"") || raw.contains("role=\"doc-pagebreak\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> PaginationConfig {
        PaginationConfig {
            words_per_page: 5,
            generate_page_list: true,
            pageline: false,
            superscript: false,
            chapter_totals: false,
            start_window: 2,
            ..Default::default()
        }
    }

    fn run(input: &str, cfg: &PaginationConfig, converted: bool) -> (String, PageList) {
        let mut planner = BoundaryPlanner::new(cfg.words_per_page, cfg.start_window);
        let mut page_list = PageList::new();
        let section = SectionInfo {
            file: "ch1.xhtml",
            href: "ch1.xhtml",
            section_pages: 3,
        };
        let out = rewrite_file(
            input,
            &section,
            cfg,
            10,
            converted,
            &mut planner,
            &mut page_list,
        )
        .unwrap();
        (out, page_list)
    }

    #[test]
    fn test_anchor_spliced_at_word_offset() {
        let input = "<html><body><p>one two three four five six seven</p></body></html>";
        let (out, pl) = run(input, &cfg(), false);
        assert!(out.contains("five<span epub:type=\"pagebreak\" id=\"foliopg1\""));
        assert_eq!(pl.len(), 1);
        // Markup outside the insertion is untouched.
        assert!(out.starts_with("<html><body><p>one two three four five"));
        assert!(out.ends_with("six seven</p></body></html>"));
    }

    #[test]
    fn test_boundary_near_run_start_goes_before_run() {
        // Page ends 4 words into the first paragraph; second boundary then
        // lands 1 word into the second run, inside the start window.
        let input = "<html><body><p>a b c d</p><p>e f g h i j</p></body></html>";
        let (out, _) = run(input, &cfg(), false);
        assert!(out.contains("<p><span epub:type=\"pagebreak\" id=\"foliopg1\""));
    }

    #[test]
    fn test_no_markers_before_body_or_after_body_end() {
        let input = "<html><head><title>w w w w w w</title></head>\
                     <body><p>one two three four five six</p></body><p>x y z</p></html>";
        let (out, _) = run(input, &cfg(), false);
        let body_at = out.find("<body").unwrap();
        let anchor_at = out.find("foliopg").unwrap();
        assert!(anchor_at > body_at);
        let after_body_end = &out[out.find("</body>").unwrap()..];
        assert!(!after_body_end.contains("foliopg"));
        // Head text is never counted, so only one page boundary fires.
        assert!(out.matches("foliopg").count() == 1);
    }

    #[test]
    fn test_nav_and_comments_not_counted() {
        let input = "<html><body><nav epub:type=\"toc\"><ol><li>one two three four five six\
                     </li></ol></nav><!-- seven eight > nine ten eleven --><p>a b</p></body></html>";
        let (out, pl) = run(input, &cfg(), false);
        assert_eq!(pl.len(), 0);
        assert!(!out.contains("foliopg"));
    }

    #[test]
    fn test_pageline_flushed_at_paragraph_close() {
        let mut c = cfg();
        c.pageline = true;
        c.generate_page_list = false;
        let input = "<html><body><p>one two three four five <i>six</i> seven</p></body></html>";
        let (out, _) = run(input, &c, false);
        // The pageline lands after </p>, never inside the italics.
        let pageline_at = out.find("margin: 0 0 0 0").unwrap();
        assert!(pageline_at > out.find("</p>").unwrap());
        assert!(out.find("</i>").unwrap() < pageline_at);
    }

    #[test]
    fn test_stale_self_closed_anchor_removed_when_converted() {
        let input = "<html><body><p>one \
                     <span epub:type=\"pagebreak\" id=\"page3\" title=\"3\"/> two</p></body></html>";
        let (out, _) = run(input, &cfg(), true);
        assert!(!out.contains("id=\"page3\""));
        assert!(out.contains("one  two"));
    }

    #[test]
    fn test_stale_open_anchor_and_closer_removed_when_converted() {
        let input = "<html><body><p>one \
                     <span epub:type=\"pagebreak\" id=\"page3\" title=\"3\"></span> two</p></body></html>";
        let (out, _) = run(input, &cfg(), true);
        assert!(!out.contains("pagebreak"));
        assert!(!out.contains("</span>"));
        assert!(out.contains("one  two"));
    }

    #[test]
    fn test_stale_anchor_kept_when_not_converted() {
        let input = "<html><body><p>one \
                     <span role=\"doc-pagebreak\" id=\"page3\"/> two</p></body></html>";
        let (out, _) = run(input, &cfg(), false);
        assert!(out.contains("role=\"doc-pagebreak\""));
    }

    #[test]
    fn test_word_count_symmetry_with_walker() {
        // The counting pass and the marking pass must agree on word totals.
        let input = "<html><body><h1>Title words here</h1><p>one two <b>three</b> four\
                     </p><!-- not counted --><p>five six seven eight nine ten</p></body></html>";
        let counted = crate::scan::count_body_words(input, "f").unwrap();
        let c = cfg();
        let mut planner = BoundaryPlanner::new(c.words_per_page, c.start_window);
        let mut page_list = PageList::new();
        let section = SectionInfo {
            file: "f",
            href: "f",
            section_pages: 1,
        };
        rewrite_file(input, &section, &c, 10, false, &mut planner, &mut page_list).unwrap();
        assert_eq!(planner.counters.total_words, counted as u64);
    }

    #[test]
    fn test_missing_body_is_fatal() {
        let err = run_err("<html><p>no body here</p></html>");
        match err {
            Error::Malformed { file, detail } => {
                assert_eq!(file, "ch1.xhtml");
                assert!(detail.contains("<body>"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn run_err(input: &str) -> Error {
        let c = cfg();
        let mut planner = BoundaryPlanner::new(c.words_per_page, c.start_window);
        let mut page_list = PageList::new();
        let section = SectionInfo {
            file: "ch1.xhtml",
            href: "ch1.xhtml",
            section_pages: 0,
        };
        rewrite_file(input, &section, &c, 10, false, &mut planner, &mut page_list).unwrap_err()
    }
}
