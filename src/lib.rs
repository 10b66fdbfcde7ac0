//! # folio
//!
//! Paginate EPUB3 ebooks the way paper books are paginated: scan the text,
//! insert a page anchor every N words, and register the anchors in the
//! navigation document's page-list so reading systems can show real page
//! numbers.
//!
//! ## Features
//!
//! - Word-accounting pagination with page boundaries that carry across
//!   paragraph, chapter and file breaks
//! - EPUB3 `page-list` navigation generation with `doc-pagebreak` anchors
//! - Optional visible pagelines and superscripted page numbers
//! - Match mode: decorate a book's existing pagination instead of
//!   generating a new one
//! - EPUB2 handling via an external converter, validation via epubcheck
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use folio::{PaginationConfig, Paginator};
//!
//! let cfg = PaginationConfig {
//!     words_per_page: 300,
//!     pageline: true,
//!     ..Default::default()
//! };
//! let summary = Paginator::new(cfg).unwrap().paginate(Path::new("book.epub"));
//! if !summary.fatal {
//!     println!("{} pages at {}", summary.pages, summary.out_file.display());
//! }
//! ```

pub mod check;
pub mod config;
pub mod convert;
pub mod epub;
pub mod error;
pub mod fragments;
pub mod paginator;
pub mod scan;

pub use config::{Align, Bracket, PaginationConfig};
pub use error::{Error, Result};
pub use paginator::{Paginator, RunSummary};
