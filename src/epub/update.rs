//! In-place edits to the navigation document and the OPF after a successful
//! marking pass. Both edits are plain string splices so the surrounding
//! document bytes survive untouched.

use crate::error::{Error, Result};
use crate::fragments::PageList;

/// Insert the generated page-list nav element just before the navigation
/// document's `</body>`.
pub fn insert_page_list(nav_data: &str, page_list: &PageList) -> Result<String> {
    let at = nav_data.find("</body>").ok_or_else(|| {
        Error::MissingElement("</body> in navigation document".to_string())
    })?;
    let fragment = page_list.to_nav_fragment();
    let mut out = String::with_capacity(nav_data.len() + fragment.len());
    out.push_str(&nav_data[..at]);
    out.push_str(&fragment);
    out.push_str(&nav_data[at..]);
    Ok(out)
}

/// Stamp word and page totals into the OPF metadata. A missing `</metadata>`
/// leaves the document unchanged; the stamps are informational only.
pub fn stamp_opf(opf_data: &str, words: u64, pages: u32) -> String {
    let Some(at) = opf_data.find("</metadata>") else {
        return opf_data.to_string();
    };
    let mut out = String::with_capacity(opf_data.len() + 160);
    out.push_str(&opf_data[..at]);
    out.push_str(&format!(
        "<meta name=\"folio:words\" content=\"{words}\"/>\n"
    ));
    out.push_str(&format!(
        "<meta name=\"folio:pages\" content=\"{pages}\"/>\n"
    ));
    out.push_str("<meta name=\"folio:modified\" content=\"True\"/>\n");
    out.push_str(&opf_data[at..]);
    out
}

/// Highest numeric page target in an existing page-list nav element. Used in
/// match mode to report the paged total. Non-numeric targets (roman
/// numerals, usually) are skipped.
pub fn nav_page_count(nav_data: &str) -> Result<u32> {
    let start = nav_data.find("epub:type=\"page-list\"").ok_or_else(|| {
        Error::MissingElement("page-list in navigation document".to_string())
    })?;
    let mut rest = &nav_data[start..];
    let mut max_page = 0u32;
    while let Some(at) = rest.find("<a href") {
        rest = &rest[at..];
        let open_end = rest.find("\">").ok_or_else(|| Error::Malformed {
            file: "navigation document".to_string(),
            detail: "unclosed <a href in page-list".to_string(),
        })? + 2;
        rest = &rest[open_end..];
        let close = rest.find("</a>").ok_or_else(|| Error::Malformed {
            file: "navigation document".to_string(),
            detail: "no </a> in page-list".to_string(),
        })?;
        if let Ok(page) = rest[..close].trim().parse::<u32>() {
            max_page = max_page.max(page);
        }
        rest = &rest[close..];
    }
    Ok(max_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_list_inserted_before_body_end() {
        let mut pl = PageList::new();
        pl.push(1, "ch1.xhtml");
        pl.push(2, "ch2.xhtml");
        let nav = "<html><body><nav epub:type=\"toc\"><ol/></nav></body></html>";
        let out = insert_page_list(nav, &pl).unwrap();
        let plist_at = out.find("epub:type=\"page-list\"").unwrap();
        assert!(plist_at < out.find("</body>").unwrap());
        assert!(out.contains("<li><a href=\"ch2.xhtml#foliopg2\">2</a></li>"));
        assert!(out.ends_with("</body></html>"));
    }

    #[test]
    fn test_page_list_requires_body_end() {
        assert!(insert_page_list("<html><nav/></html>", &PageList::new()).is_err());
    }

    #[test]
    fn test_opf_stamp() {
        let opf = "<package><metadata><dc:title>B</dc:title></metadata><manifest/></package>";
        let out = stamp_opf(opf, 57000, 197);
        assert!(out.contains("<meta name=\"folio:words\" content=\"57000\"/>"));
        assert!(out.contains("<meta name=\"folio:pages\" content=\"197\"/>"));
        assert!(out.contains("<meta name=\"folio:modified\" content=\"True\"/>"));
        let stamp_at = out.find("folio:words").unwrap();
        assert!(stamp_at < out.find("</metadata>").unwrap());
    }

    #[test]
    fn test_opf_stamp_without_metadata_is_noop() {
        assert_eq!(stamp_opf("<package/>", 1, 1), "<package/>");
    }

    #[test]
    fn test_nav_page_count_max_numeric() {
        let nav = "<nav epub:type=\"page-list\"><ol>\
                   <li><a href=\"a.xhtml#p1\">iv</a></li>\
                   <li><a href=\"a.xhtml#p2\">12</a></li>\
                   <li><a href=\"b.xhtml#p3\">9</a></li>\
                   </ol></nav>";
        assert_eq!(nav_page_count(nav).unwrap(), 12);
    }

    #[test]
    fn test_nav_page_count_requires_page_list() {
        assert!(nav_page_count("<nav epub:type=\"toc\"/>").is_err());
    }
}
