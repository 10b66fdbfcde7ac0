//! Unpacking and repacking the EPUB container.
//!
//! An EPUB is a ZIP file whose first entry must be an uncompressed
//! `mimetype`. Repacking writes that entry first with Stored compression and
//! everything else Deflated, preserving the original entry order.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{Error, Result};

const MIMETYPE: &str = "application/epub+zip";

/// Extract an EPUB into `dest`, returning the entry names in archive order.
pub fn unzip_epub(epub_path: &Path, dest: &Path) -> Result<Vec<String>> {
    let file = File::open(epub_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel) = entry.enclosed_name() else {
            return Err(Error::InvalidEpub(format!(
                "unsafe path in archive: {}",
                entry.name()
            )));
        };
        let out_path = dest.join(&rel);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;
        names.push(entry.name().to_string());
    }
    debug!("extracted {} entries from {}", names.len(), epub_path.display());
    Ok(names)
}

/// Repack `src_dir` into an EPUB at `epub_path`, writing `entries` in order.
/// Entry names are archive paths relative to `src_dir`, `/`-separated.
pub fn zip_epub(src_dir: &Path, epub_path: &Path, entries: &[String]) -> Result<()> {
    if !src_dir.join("mimetype").is_file() {
        return Err(Error::InvalidEpub(
            "no mimetype file to repack".to_string(),
        ));
    }

    let file = File::create(epub_path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    let options_stored =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    // The mimetype entry must come first and uncompressed.
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE.as_bytes())?;

    for name in entries {
        if name == "mimetype" {
            continue;
        }
        let disk_path: PathBuf = src_dir.join(name.replace('/', std::path::MAIN_SEPARATOR_STR));
        let mut data = Vec::new();
        File::open(&disk_path)?.read_to_end(&mut data)?;
        zip.start_file(name.as_str(), options_deflate)?;
        zip.write_all(&data)?;
    }

    zip.finish()?;
    debug!("packed {} entries into {}", entries.len(), epub_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_fixture(dir: &Path) -> Vec<String> {
        fs::create_dir_all(dir.join("META-INF")).unwrap();
        fs::create_dir_all(dir.join("OEBPS")).unwrap();
        fs::write(dir.join("mimetype"), MIMETYPE).unwrap();
        fs::write(
            dir.join("META-INF/container.xml"),
            "<container><rootfiles><rootfile full-path=\"OEBPS/content.opf\"/>\
             </rootfiles></container>",
        )
        .unwrap();
        fs::write(dir.join("OEBPS/content.opf"), "<package version=\"3.0\"/>").unwrap();
        vec![
            "mimetype".to_string(),
            "META-INF/container.xml".to_string(),
            "OEBPS/content.opf".to_string(),
        ]
    }

    #[test]
    fn test_round_trip_preserves_entries_and_order() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("book");
        let entries = build_fixture(&src);
        let epub = tmp.path().join("book.epub");
        zip_epub(&src, &epub, &entries).unwrap();

        let out = tmp.path().join("unpacked");
        let names = unzip_epub(&epub, &out).unwrap();
        assert_eq!(names, entries);
        assert_eq!(
            fs::read_to_string(out.join("OEBPS/content.opf")).unwrap(),
            "<package version=\"3.0\"/>"
        );
    }

    #[test]
    fn test_mimetype_is_first_and_stored() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("book");
        // Entry list deliberately puts mimetype last; the writer reorders.
        let mut entries = build_fixture(&src);
        entries.rotate_left(1);
        let epub = tmp.path().join("book.epub");
        zip_epub(&src, &epub, &entries).unwrap();

        let mut archive = ZipArchive::new(File::open(&epub).unwrap()).unwrap();
        let first = archive.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
    }

    #[test]
    fn test_missing_mimetype_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("book");
        fs::create_dir_all(&src).unwrap();
        let epub = tmp.path().join("book.epub");
        assert!(matches!(
            zip_epub(&src, &epub, &[]),
            Err(Error::InvalidEpub(_))
        ));
    }
}
