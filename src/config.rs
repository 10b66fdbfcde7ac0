//! Pagination configuration.
//!
//! Every recognized option is an explicit, defaulted field. The struct is
//! validated once at the boundary; the core never consults loosely typed
//! key/value maps.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Alignment of the pageline paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    #[default]
    Right,
    Center,
}

impl fmt::Display for Align {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Align::Left => f.write_str("left"),
            Align::Right => f.write_str("right"),
            Align::Center => f.write_str("center"),
        }
    }
}

/// Characters used to bracket page numbers in pagelines and superscripts.
///
/// `Angle` renders as the XML-escaped `&lt;…&gt;` pair so the output stays
/// well formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Bracket {
    #[default]
    Angle,
    Dash,
    None,
}

impl Bracket {
    pub fn pair(self) -> (&'static str, &'static str) {
        match self {
            Bracket::Angle => ("&lt;", "&gt;"),
            Bracket::Dash => ("-", "-"),
            Bracket::None => ("", ""),
        }
    }
}

/// All options a pagination run consumes.
///
/// `words_per_page` and `total_pages` are mutually exclusive sizing inputs:
/// when `total_pages` is nonzero the effective page size is derived as
/// `total_words / total_pages` during the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Directory receiving the paged epub, the run log, and the work tree.
    pub outdir: PathBuf,
    /// Reuse existing page anchors instead of computing new boundaries when
    /// the book already carries a page-list.
    pub match_existing: bool,
    /// Generate the page-list navigation element and page anchors.
    pub generate_page_list: bool,
    /// Words per page; 0 means derive from `total_pages`.
    pub words_per_page: u32,
    /// Target page count; 0 means use `words_per_page`.
    pub total_pages: u32,

    /// Insert visible pageline paragraphs at page boundaries.
    pub pageline: bool,
    pub pageline_align: Align,
    /// CSS color for the pageline, `None` for unstyled.
    pub pageline_color: Option<String>,
    pub pageline_bracket: Bracket,
    /// Relative font size, e.g. "75%".
    pub pageline_font_size: String,
    /// Show "page/total" rather than the bare page number.
    pub pageline_book_total: bool,

    /// Insert a superscripted page number at the exact boundary point.
    pub superscript: bool,
    pub superscript_color: Option<String>,
    pub superscript_font_size: String,
    pub superscript_book_total: bool,

    /// Append chapter page / chapter total to pagelines and superscripts.
    pub chapter_totals: bool,
    pub chapter_bracket: Bracket,

    /// EPUB2 -> EPUB3 converter executable (e.g. Calibre's ebook-convert).
    pub converter: Option<PathBuf>,
    /// epubcheck executable.
    pub epubcheck: Option<PathBuf>,
    /// Validate the original file before pagination.
    pub check_original: bool,
    /// Validate the paged file after pagination.
    pub check_paged: bool,
    /// Kill converter/epubcheck subprocesses after this many seconds.
    pub tool_timeout_secs: u64,

    /// Boundaries computed within this many words of a run's start are placed
    /// before the run instead of spliced into it. Policy value, not derived;
    /// roughly one line of text.
    pub start_window: u32,

    /// Suppress stdout reporting.
    pub quiet: bool,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("."),
            match_existing: false,
            generate_page_list: true,
            words_per_page: 300,
            total_pages: 0,
            pageline: false,
            pageline_align: Align::Right,
            pageline_color: None,
            pageline_bracket: Bracket::Angle,
            pageline_font_size: "75%".to_string(),
            pageline_book_total: true,
            superscript: false,
            superscript_color: None,
            superscript_font_size: "60%".to_string(),
            superscript_book_total: true,
            chapter_totals: true,
            chapter_bracket: Bracket::Angle,
            converter: None,
            epubcheck: None,
            check_original: false,
            check_paged: false,
            tool_timeout_secs: 300,
            start_window: 10,
            quiet: false,
        }
    }
}

impl PaginationConfig {
    /// Validate cross-field constraints once, at the boundary.
    pub fn validate(&self) -> Result<()> {
        if self.words_per_page != 0 && self.total_pages != 0 {
            return Err(Error::InvalidConfig(
                "words_per_page and total_pages are mutually exclusive; set one to 0".into(),
            ));
        }
        if self.generate_page_list
            && !self.match_existing
            && self.words_per_page == 0
            && self.total_pages == 0
        {
            return Err(Error::InvalidConfig(
                "cannot determine page size: set words_per_page or total_pages".into(),
            ));
        }
        if !self.pageline_font_size.ends_with('%') {
            return Err(Error::InvalidConfig(format!(
                "pageline_font_size must be a percentage, got {:?}",
                self.pageline_font_size
            )));
        }
        if !self.superscript_font_size.ends_with('%') {
            return Err(Error::InvalidConfig(format!(
                "superscript_font_size must be a percentage, got {:?}",
                self.superscript_font_size
            )));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file.
    #[cfg(feature = "cli")]
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&data)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        PaginationConfig::default().validate().unwrap();
    }

    #[test]
    fn test_exclusive_sizing() {
        let cfg = PaginationConfig {
            words_per_page: 300,
            total_pages: 200,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_no_page_size() {
        let cfg = PaginationConfig {
            words_per_page: 0,
            total_pages: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        // Fine when matching: page size is derived from the existing list.
        let cfg = PaginationConfig {
            words_per_page: 0,
            total_pages: 0,
            match_existing: true,
            ..Default::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn test_font_size_must_be_percentage() {
        let cfg = PaginationConfig {
            pageline_font_size: "12pt".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bracket_pairs() {
        assert_eq!(Bracket::Angle.pair(), ("&lt;", "&gt;"));
        assert_eq!(Bracket::Dash.pair(), ("-", "-"));
        assert_eq!(Bracket::None.pair(), ("", ""));
    }
}
