//! The pagination driver: unpack, scan, mark, repack.
//!
//! A run never panics its way out. Fatal problems are recorded in the
//! [`RunSummary`] and the summary is returned, so batch callers can keep
//! going and report per-book results.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use zip::ZipArchive;

use crate::check::{self, ValidationReport};
use crate::config::PaginationConfig;
use crate::convert;
use crate::epub::{self, PackageDoc, update};
use crate::error::{Error, Result};
use crate::fragments::PageList;
use crate::scan::{self, inserter, matcher, xmlns};
use crate::scan::inserter::SectionInfo;
use crate::scan::planner::BoundaryPlanner;

/// Characters kept verbatim in page-list hrefs. Everything else is
/// percent-encoded.
const HREF_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'.')
    .remove(b'_')
    .remove(b'-')
    .remove(b'~');

/// epubcheck counts for one validated file.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CheckCounts {
    pub fatals: u32,
    pub errors: u32,
    pub secs: f64,
}

impl From<&ValidationReport> for CheckCounts {
    fn from(r: &ValidationReport) -> Self {
        CheckCounts {
            fatals: r.fatals,
            errors: r.errors,
            secs: r.elapsed.as_secs_f64(),
        }
    }
}

/// Everything a caller might want to know about one pagination run.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    /// Book name derived from the source file name.
    pub title: String,
    pub out_file: PathBuf,
    pub log_file: PathBuf,
    pub epub_version: String,
    /// True when the book was converted from EPUB2 before paging.
    pub converted: bool,
    /// True when the book arrived with a page-list nav element.
    pub had_page_list: bool,
    /// True when existing pagination was matched instead of generated.
    pub matched: bool,
    pub words: u64,
    pub pages: u32,
    pub words_per_page: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// A fatal error stopped the run; `out_file` was not produced.
    pub fatal: bool,
    pub orig_check: Option<CheckCounts>,
    pub paged_check: Option<CheckCounts>,
    pub convert_secs: f64,
    pub paginate_secs: f64,
}

impl RunSummary {
    fn error(&mut self, log: &mut RunLog, msg: String) {
        log.echo(&format!("Fatal error: {msg}"));
        self.errors.push(msg);
        self.fatal = true;
    }

    fn warning(&mut self, log: &mut RunLog, msg: String) {
        log.echo(&format!("Warning: {msg}"));
        self.warnings.push(msg);
    }
}

/// Accumulates the run log; written next to the output file at the end.
struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    fn new() -> Self {
        RunLog { lines: Vec::new() }
    }

    /// Log to file only.
    fn note(&mut self, msg: &str) {
        debug!("{msg}");
        self.lines.push(msg.to_string());
    }

    /// Log to file and console.
    fn echo(&mut self, msg: &str) {
        info!("{msg}");
        self.lines.push(msg.to_string());
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.lines.join("\n") + "\n")?;
        Ok(())
    }
}

/// One spine entry selected for scanning.
struct ContentFile {
    disk_path: PathBuf,
    /// href used in page-list targets; empty when no page-list is generated.
    href: String,
    /// Pages starting in this file, filled by the section scan.
    section_pages: u32,
}

pub struct Paginator {
    cfg: PaginationConfig,
}

impl Paginator {
    pub fn new(cfg: PaginationConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Paginator { cfg })
    }

    /// Paginate one EPUB. Always returns a summary; check
    /// [`RunSummary::fatal`] before trusting `out_file`.
    pub fn paginate(&self, source: &Path) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut log = RunLog::new();

        if let Err(e) = self.run(source, &mut summary, &mut log) {
            summary.error(&mut log, e.to_string());
            // A fatal run leaves no work files behind either.
            if !summary.title.is_empty() {
                let work_dir = self.cfg.outdir.join(&summary.title);
                let orig_copy = self
                    .cfg
                    .outdir
                    .join(format!("{}_orig.epub", summary.title));
                let converted = convert::epub3_sibling(&orig_copy);
                cleanup(&work_dir, &orig_copy, &converted);
                // No partial output either, should packaging have started.
                let _ = fs::remove_file(&summary.out_file);
            }
        }
        summary.paginate_secs = started.elapsed().as_secs_f64()
            - summary.convert_secs
            - summary.orig_check.as_ref().map_or(0.0, |c| c.secs)
            - summary.paged_check.as_ref().map_or(0.0, |c| c.secs);

        if summary.log_file.as_os_str().is_empty() {
            return summary;
        }
        if let Err(e) = log.write_to(&summary.log_file) {
            warn!("could not write run log: {e}");
        }
        summary
    }

    fn run(&self, source: &Path, summary: &mut RunSummary, log: &mut RunLog) -> Result<()> {
        let cfg = &self.cfg;
        if !source.is_file() {
            return Err(Error::InvalidEpub(format!(
                "source epub not found: {}",
                source.display()
            )));
        }
        fs::create_dir_all(&cfg.outdir)?;

        summary.title = title_of(source);
        summary.log_file = cfg.outdir.join(format!("{}.log", summary.title));
        summary.out_file = cfg.outdir.join(format!("{}_paged.epub", summary.title));
        let work_dir = cfg.outdir.join(&summary.title);
        let orig_copy = cfg.outdir.join(format!("{}_orig.epub", summary.title));
        fs::copy(source, &orig_copy)?;
        log.echo(&format!("Paginating {}", source.display()));
        log.note(&format!("Configuration: {cfg:?}"));

        let mut work_epub = orig_copy.clone();
        let timeout = Duration::from_secs(cfg.tool_timeout_secs);

        // Effective switches for this run. They start from the config and
        // are narrowed by what the book turns out to support.
        let mut genplist = cfg.generate_page_list;
        let mut match_mode = false;

        // Version gate: page-list navigation needs EPUB3. Convert when a
        // converter is configured, otherwise disable the page-list.
        let version = epub_version_of(&work_epub)?;
        log.echo(&format!("Original file is epub version {version}"));
        if !version.starts_with('3') {
            if let Some(converter) = &cfg.converter {
                let t = Instant::now();
                work_epub = convert::convert_to_epub3(converter, &work_epub, timeout)?;
                summary.convert_secs = t.elapsed().as_secs_f64();
                summary.converted = true;
                let v = epub_version_of(&work_epub)?;
                if !v.starts_with('3') {
                    return Err(Error::InvalidEpub(format!(
                        "conversion produced version {v}, not 3"
                    )));
                }
                log.echo(&format!(
                    "Converted to epub3 in {:.2} seconds",
                    summary.convert_secs
                ));
            } else {
                summary.warning(
                    log,
                    "epub version is not 3, page-list navigation disabled".to_string(),
                );
                genplist = false;
            }
        }

        if cfg.check_original && let Some(exe) = &cfg.epubcheck {
            let report = check::run_epubcheck(exe, &work_epub, timeout)?;
            self.log_check(log, "original", &report);
            summary.orig_check = Some((&report).into());
        }

        let entries = epub::unzip_epub(&work_epub, &work_dir)?;

        // Locate and parse the package document.
        let container = fs::read(work_dir.join("META-INF/container.xml"))?;
        let opf_rel = epub::parse_container(&container)?;
        let opf_path = work_dir.join(&opf_rel);
        let opf_dir = match opf_rel.rfind('/') {
            Some(i) => opf_rel[..=i].to_string(),
            None => String::new(),
        };
        let opf_data = fs::read_to_string(&opf_path)?;
        let package = epub::parse_opf(&opf_data)?;
        summary.epub_version = package.version.clone();

        // Navigation document and existing page-list detection.
        let nav = package.nav_item().cloned();
        let nav_path = nav
            .as_ref()
            .map(|n| work_dir.join(format!("{opf_dir}{}", n.href)));
        if genplist {
            let Some(nav_path) = &nav_path else {
                return Err(Error::MissingElement(
                    "navigation document in manifest".to_string(),
                ));
            };
            let nav_data = fs::read_to_string(nav_path)?;
            if nav_data.contains("epub:type=\"page-list\"") {
                summary.had_page_list = true;
                genplist = false;
                log.echo("This epub file already has a page-list navigation element.");
                if cfg.match_existing {
                    match_mode = true;
                    summary.matched = true;
                    summary.pages = update::nav_page_count(&nav_data)?;
                }
            }
        }

        if summary.had_page_list && !cfg.pageline && !cfg.superscript {
            summary.warning(
                log,
                "existing pagelist and neither pagelines nor superscripts requested, \
                 nothing to do"
                    .to_string(),
            );
            cleanup(&work_dir, &orig_copy, &work_epub);
            return Ok(());
        }
        // With nothing to insert the run degrades to a count-only report.
        let count_only = !genplist && !match_mode && !cfg.pageline && !cfg.superscript;

        let nav_href = nav.as_ref().map(|n| n.href.clone()).unwrap_or_default();
        let mut files = build_spine(&package, &work_dir, &opf_dir, &nav_href, genplist, log)?;
        if files.is_empty() {
            return Err(Error::InvalidEpub(
                "no content files found in the spine".to_string(),
            ));
        }

        // Counting pass.
        for file in &files {
            let data = fs::read_to_string(&file.disk_path)?;
            summary.words += scan::count_body_words(&data, &file.disk_path.to_string_lossy())?
                as u64;
        }
        log.note(&format!("Word count: {}", summary.words));

        let words_per_page = if match_mode {
            // Informational only; existing boundaries are reused.
            if summary.pages > 0 {
                (summary.words / summary.pages as u64) as u32
            } else {
                0
            }
        } else if cfg.total_pages > 0 {
            let wpp = (summary.words / cfg.total_pages as u64).max(1) as u32;
            if genplist {
                log.echo(&format!(
                    "Generating pagelist with calculated {wpp} words per page."
                ));
            }
            wpp
        } else {
            if genplist {
                log.echo(&format!(
                    "Generating pagelist with {} words per page.",
                    cfg.words_per_page
                ));
            }
            cfg.words_per_page
        };
        summary.words_per_page = words_per_page;

        // Matching was requested but the book has nothing to match, and no
        // page size was configured to fall back on.
        if !match_mode && words_per_page == 0 {
            return Err(Error::InvalidConfig(
                "cannot determine how to paginate: no existing page-list to \
                 match and no words per page or total pages given"
                    .to_string(),
            ));
        }

        // Section scan: per-file page counts for the chapter totals.
        if match_mode {
            for file in &mut files {
                let data = fs::read_to_string(&file.disk_path)?;
                file.section_pages = matcher::count_existing_anchors(&data);
            }
        } else {
            let mut dry = BoundaryPlanner::new(words_per_page, cfg.start_window);
            for file in &mut files {
                let data = fs::read_to_string(&file.disk_path)?;
                dry.start_section();
                let mut pages = 0u32;
                scan::walk_text_runs(&data, &file.disk_path.to_string_lossy(), |run| {
                    pages += dry.advance(scan::words::count_words(run)).len() as u32;
                })?;
                file.section_pages = pages;
            }
        }

        if count_only {
            summary.pages = files.iter().map(|f| f.section_pages).sum::<u32>() + 1;
            log.echo("No pagination was selected.");
            log.echo(&format!("Pages: {}", summary.pages));
            log.echo(&format!("Words: {}", summary.words));
            cleanup(&work_dir, &orig_copy, &work_epub);
            return Ok(());
        }

        // Marking pass. The page-list switch may have been narrowed since
        // the config was built, so the scan passes see the effective value.
        let mut run_cfg = cfg.clone();
        run_cfg.generate_page_list = genplist;
        // The planner goes unused in match mode, where words_per_page can
        // legitimately be 0.
        let mut planner = BoundaryPlanner::new(words_per_page.max(1), cfg.start_window);
        let mut page_list = PageList::new();
        let total_pages = if match_mode {
            summary.pages
        } else {
            // The dry scan already walked the whole book with the same
            // planner parameters.
            files.iter().map(|f| f.section_pages).sum::<u32>() + 1
        };
        for file in &files {
            let label = file.disk_path.to_string_lossy().into_owned();
            log.note(&format!("Scanning {label}"));
            let data = fs::read_to_string(&file.disk_path)?;
            let marked = if match_mode {
                let outcome = matcher::rewrite_matched(
                    &data,
                    &label,
                    &run_cfg,
                    total_pages,
                    file.section_pages,
                )?;
                for w in outcome.warnings {
                    summary.warning(log, w);
                }
                outcome.output
            } else {
                planner.start_section();
                let section = SectionInfo {
                    file: &label,
                    href: &file.href,
                    section_pages: file.section_pages,
                };
                inserter::rewrite_file(
                    &data,
                    &section,
                    &run_cfg,
                    total_pages,
                    summary.converted,
                    &mut planner,
                    &mut page_list,
                )?
            };
            let patched = xmlns::ensure_epub_namespace(&marked, &label)?;
            fs::write(&file.disk_path, patched)?;
        }
        if !match_mode {
            summary.pages = planner.counters.current_page;
        }
        log.echo(&format!(
            "    {} words;    {} pages",
            summary.words, summary.pages
        ));

        // Nav and OPF updates.
        if genplist && let Some(nav_path) = &nav_path {
            let nav_data = fs::read_to_string(nav_path)?;
            fs::write(nav_path, update::insert_page_list(&nav_data, &page_list)?)?;
        }
        let opf_data = fs::read_to_string(&opf_path)?;
        fs::write(&opf_path, update::stamp_opf(&opf_data, summary.words, summary.pages))?;

        epub::zip_epub(&work_dir, &summary.out_file, &entries)?;
        log.echo(&format!(
            "The paged epub is at: {}",
            summary.out_file.display()
        ));

        if cfg.check_paged && let Some(exe) = &cfg.epubcheck {
            let report = check::run_epubcheck(exe, &summary.out_file, timeout)?;
            self.log_check(log, "paged", &report);
            summary.paged_check = Some((&report).into());
        }

        cleanup(&work_dir, &orig_copy, &work_epub);
        Ok(())
    }

    fn log_check(&self, log: &mut RunLog, which: &str, report: &ValidationReport) {
        if report.clean() {
            log.echo(&format!("epubcheck ({which}): no errors were reported"));
        } else {
            log.echo(&format!(
                "epubcheck ({which}): {} fatals, {} errors",
                report.fatals, report.errors
            ));
        }
        log.note(&report.raw);
        log.echo(&format!(
            "    epubcheck took {:.2} seconds.",
            report.elapsed.as_secs_f64()
        ));
    }
}

/// Book name from the source file name, spaces removed.
fn title_of(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().replace(' ', ""))
        .unwrap_or_else(|| "book".to_string())
}

/// Resolve the spine against the manifest into the ordered list of content
/// files to scan, dropping table-of-contents files.
fn build_spine(
    package: &PackageDoc,
    work_dir: &Path,
    opf_dir: &str,
    nav_href: &str,
    genplist: bool,
    log: &mut RunLog,
) -> Result<Vec<ContentFile>> {
    let mut files = Vec::with_capacity(package.spine_ids.len());
    for id in &package.spine_ids {
        let Some(item) = package.item_by_id(id) else {
            log.note(&format!("spine idref {id} not in manifest, skipped"));
            continue;
        };
        let lower = item.href.to_lowercase();
        if lower.contains("toc") || lower.contains("contents") {
            log.echo(&format!("Skipping file {} because TOC.", item.href));
            continue;
        }
        // On-disk name: percent decoding undone, plus the entity hack some
        // books use in file names.
        let decoded = percent_decode_str(&item.href)
            .decode_utf8()
            .map_err(|e| Error::InvalidEpub(format!("bad href {}: {e}", item.href)))?
            .replace("&amp;", "&");
        let href = if genplist {
            page_list_href(opf_dir, nav_href, &item.href)
        } else {
            String::new()
        };
        files.push(ContentFile {
            disk_path: work_dir.join(format!("{opf_dir}{decoded}")),
            href,
            section_pages: 0,
        });
    }
    Ok(files)
}

/// Page-list hrefs are resolved from the navigation document, not the OPF,
/// so when the two live at different directory levels the manifest href
/// cannot be used as-is.
fn page_list_href(opf_dir: &str, nav_href: &str, manifest_href: &str) -> String {
    let encode = |s: &str| utf8_percent_encode(s, HREF_SET).to_string();
    let Some(nav_slash) = nav_href.rfind('/') else {
        // Nav sits next to the OPF; manifest hrefs resolve identically.
        return encode(manifest_href);
    };
    let nav_dir = format!("{opf_dir}{}", &nav_href[..=nav_slash]);
    let (manifest_dir, file_name) = match manifest_href.rfind('/') {
        Some(i) => (
            format!("{opf_dir}{}", &manifest_href[..=i]),
            &manifest_href[i + 1..],
        ),
        None => (opf_dir.to_string(), manifest_href),
    };
    if manifest_dir == nav_dir {
        encode(file_name)
    } else {
        encode(manifest_href)
    }
}

/// EPUB version from the package document, read without unpacking.
fn epub_version_of(epub: &Path) -> Result<String> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(epub)?))?;
    let mut container = Vec::new();
    archive
        .by_name("META-INF/container.xml")?
        .read_to_end(&mut container)?;
    let opf_rel = epub::parse_container(&container)?;
    let mut opf = String::new();
    archive.by_name(&opf_rel)?.read_to_string(&mut opf)?;
    Ok(epub::parse_opf(&opf)?.version)
}

fn cleanup(work_dir: &Path, orig_copy: &Path, work_epub: &Path) {
    let _ = fs::remove_dir_all(work_dir);
    let _ = fs::remove_file(orig_copy);
    if work_epub != orig_copy {
        let _ = fs::remove_file(work_epub);
    }
}
