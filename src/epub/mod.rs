//! EPUB container and package handling: unzip/rezip, OPF and container.xml
//! parsing, and the post-pagination nav and OPF edits.

pub mod archive;
pub mod package;
pub mod update;

pub use archive::{unzip_epub, zip_epub};
pub use package::{ManifestItem, PackageDoc, parse_container, parse_opf};
