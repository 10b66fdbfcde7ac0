//! Markup fragments emitted at page boundaries.
//!
//! Page anchors are zero-width spans the navigation page-list points at.
//! Superscripts ride inline at the exact boundary. Pagelines are standalone
//! paragraphs flushed after the enclosing `</p>`/`</div>` so they never land
//! inside inline formatting.

use crate::config::PaginationConfig;

/// Id prefix for inserted page anchors. Deliberately unusual so generated ids
/// cannot collide with pre-existing `page7`-style ids.
pub const ANCHOR_ID_PREFIX: &str = "foliopg";

/// EPUB operations namespace declaration added where missing.
pub const EPUB_NS_DECL: &str = "xmlns:epub=\"http://www.idpf.org/2007/ops\"";

/// The zero-width page anchor registered in the navigation page-list.
pub fn page_anchor(page: u32) -> String {
    format!(
        "<span epub:type=\"pagebreak\" id=\"{ANCHOR_ID_PREFIX}{page}\" \
         role=\"doc-pagebreak\" title=\"{page}\"/>"
    )
}

/// Page text shared by pagelines and superscripts: bracketed book page
/// (optionally with total), optionally followed by bracketed chapter
/// page/total.
fn page_text(
    cfg: &PaginationConfig,
    book_total: bool,
    page: &str,
    total_pages: u32,
    section_page: u32,
    section_total: u32,
) -> String {
    let (lb, rb) = cfg.pageline_bracket.pair();
    let mut text = if book_total {
        format!("{lb}{page}/{total_pages}{rb}")
    } else {
        format!("{lb}{page}{rb}")
    };
    if cfg.chapter_totals {
        let (clb, crb) = cfg.chapter_bracket.pair();
        text.push_str(&format!(" {clb}{section_page}/{section_total}{crb}"));
    }
    text
}

/// A visible pageline paragraph. Zero margins keep it from disturbing
/// paragraph spacing; sibling-selector CSS is why it cannot live inside the
/// paragraph it follows.
pub fn pageline(
    cfg: &PaginationConfig,
    page: &str,
    total_pages: u32,
    section_page: u32,
    section_total: u32,
) -> String {
    let text = page_text(
        cfg,
        cfg.pageline_book_total,
        page,
        total_pages,
        section_page,
        section_total,
    );
    match &cfg.pageline_color {
        Some(color) => format!(
            "<p style=\"font-size:{}; text-align:{}; color:{}; margin: 0 0 0 0\">{}</p>",
            cfg.pageline_font_size, cfg.pageline_align, color, text
        ),
        None => format!(
            "<p style=\"font-size:{}; text-align:{}; margin: 0 0 0 0\">{}</p>",
            cfg.pageline_font_size, cfg.pageline_align, text
        ),
    }
}

/// An inline superscripted page number.
pub fn superscript(
    cfg: &PaginationConfig,
    page: &str,
    total_pages: u32,
    section_page: u32,
    section_total: u32,
) -> String {
    let text = page_text(
        cfg,
        cfg.superscript_book_total,
        page,
        total_pages,
        section_page,
        section_total,
    );
    match &cfg.superscript_color {
        Some(color) => format!(
            "<span style=\"font-size:{};vertical-align:super; color:{}\">{}</span>",
            cfg.superscript_font_size, color, text
        ),
        None => format!(
            "<span style=\"font-size:{};vertical-align:super\">{}</span>",
            cfg.superscript_font_size, text
        ),
    }
}

/// Accumulates page-list targets across the whole run; serialized once into
/// the navigation document.
#[derive(Debug, Default)]
pub struct PageList {
    entries: Vec<(u32, String)>,
}

impl PageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, page: u32, href: &str) {
        self.entries.push((page, href.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The hidden `<nav epub:type="page-list">` fragment for insertion before
    /// the navigation document's `</body>`. The epub namespace is declared
    /// locally: a document-level declaration may be absent, and repeating it
    /// is harmless.
    pub fn to_nav_fragment(&self) -> String {
        let mut nav = format!(
            "<nav {EPUB_NS_DECL} epub:type=\"page-list\" id=\"page-list\" \
             hidden=\"hidden\"><ol>\n"
        );
        for (page, href) in &self.entries {
            nav.push_str(&format!(
                "  <li><a href=\"{href}#{ANCHOR_ID_PREFIX}{page}\">{page}</a></li>\n"
            ));
        }
        nav.push_str("</ol></nav>\n");
        nav
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bracket;

    #[test]
    fn test_page_anchor() {
        let a = page_anchor(12);
        assert!(a.contains("epub:type=\"pagebreak\""));
        assert!(a.contains("id=\"foliopg12\""));
        assert!(a.contains("role=\"doc-pagebreak\""));
        assert!(a.contains("title=\"12\""));
        assert!(a.ends_with("/>"));
    }

    #[test]
    fn test_pageline_with_totals() {
        let cfg = PaginationConfig {
            pageline_book_total: true,
            chapter_totals: true,
            ..Default::default()
        };
        let p = pageline(&cfg, "34", 190, 3, 12);
        assert!(p.contains("&lt;34/190&gt;"));
        assert!(p.contains("&lt;3/12&gt;"));
        assert!(p.starts_with("<p style=\"font-size:75%;"));
        assert!(p.contains("margin: 0 0 0 0"));
    }

    #[test]
    fn test_pageline_plain() {
        let cfg = PaginationConfig {
            pageline_book_total: false,
            chapter_totals: false,
            pageline_bracket: Bracket::None,
            pageline_color: Some("red".into()),
            ..Default::default()
        };
        let p = pageline(&cfg, "7", 100, 1, 1);
        assert!(p.contains(">7</p>"));
        assert!(p.contains("color:red"));
    }

    #[test]
    fn test_superscript() {
        let cfg = PaginationConfig {
            superscript_book_total: false,
            chapter_totals: false,
            pageline_bracket: Bracket::None,
            ..Default::default()
        };
        let s = superscript(&cfg, "7", 100, 1, 1);
        assert_eq!(
            s,
            "<span style=\"font-size:60%;vertical-align:super\">7</span>"
        );
    }

    #[test]
    fn test_page_list_fragment() {
        let mut pl = PageList::new();
        pl.push(1, "ch1.xhtml");
        pl.push(2, "ch2.xhtml");
        let nav = pl.to_nav_fragment();
        assert!(nav.starts_with("<nav xmlns:epub="));
        assert!(nav.contains("epub:type=\"page-list\""));
        assert!(nav.contains("<li><a href=\"ch1.xhtml#foliopg1\">1</a></li>"));
        assert!(nav.contains("<li><a href=\"ch2.xhtml#foliopg2\">2</a></li>"));
        assert!(nav.trim_end().ends_with("</ol></nav>"));
    }
}
