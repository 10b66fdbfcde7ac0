//! Conversion of EPUB2 books to EPUB3 via an external converter (Calibre's
//! ebook-convert, in practice). Pagination needs the EPUB3 navigation
//! document, so version 2 books are converted first when a converter is
//! configured.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use log::info;

use crate::check::run_tool;
use crate::error::{Error, Result};

/// Convert `src` to an EPUB3 file next to it, returning the new path. The
/// output name appends `_epub3` to the source stem.
pub fn convert_to_epub3(exe: &Path, src: &Path, timeout: Duration) -> Result<PathBuf> {
    let dst = epub3_sibling(src);
    info!(
        "converting {} to EPUB3 with {}",
        src.display(),
        exe.display()
    );
    let mut cmd = Command::new(exe);
    cmd.arg(src).arg(&dst).args(["--epub-version", "3"]);
    let (status, output) = run_tool(&mut cmd, "ebook-convert", timeout)?;
    if !status.success() {
        let mut lines: Vec<&str> = output.lines().rev().take(5).collect();
        lines.reverse();
        let tail = lines.join(" | ");
        return Err(Error::ToolFailed(format!(
            "ebook-convert exited with {status}: {tail}"
        )));
    }
    Ok(dst)
}

pub(crate) fn epub3_sibling(src: &Path) -> PathBuf {
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string());
    src.with_file_name(format!("{stem}_epub3.epub"))
}
