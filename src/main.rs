//! folio - EPUB3 pagination tool

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use folio::{Align, Bracket, PaginationConfig, Paginator};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Paginate an EPUB file", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio book.epub                          Generate a page-list, 300 words/page
    folio --pageline --total-pages 250 book.epub
    folio --match --superscript book.epub    Decorate existing pagination")]
struct Cli {
    /// The EPUB file to paginate
    #[arg(value_name = "EPUB_FILE")]
    epub_file: PathBuf,

    /// JSON configuration file; replaces all other options
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the paged EPUB and the run log
    #[arg(long, default_value = "./")]
    outdir: PathBuf,

    /// If the book already has a page-list, match it
    #[arg(long = "match")]
    match_existing: bool,

    /// Do not generate the page-list navigation element
    #[arg(long)]
    no_page_list: bool,

    /// Words per page; 0 to derive from --total-pages
    #[arg(long, default_value_t = 300)]
    words_per_page: u32,

    /// Total pages; when nonzero the page size is words/pages
    #[arg(long, default_value_t = 0)]
    total_pages: u32,

    /// Insert visible pagelines at page boundaries
    #[arg(long)]
    pageline: bool,

    /// Pageline alignment: left, right or center
    #[arg(long, value_parser = parse_align, default_value = "right")]
    pageline_align: Align,

    /// HTML color for pagelines, e.g. red
    #[arg(long)]
    pageline_color: Option<String>,

    /// Bracket style for page numbers: angle, dash or none
    #[arg(long, value_parser = parse_bracket, default_value = "angle")]
    pageline_bracket: Bracket,

    /// Pageline font size as a percentage of the book font
    #[arg(long, default_value = "75%")]
    pageline_font_size: String,

    /// Omit the book total from pagelines
    #[arg(long)]
    no_pageline_total: bool,

    /// Insert superscripted page numbers at page boundaries
    #[arg(long)]
    superscript: bool,

    /// HTML color for superscripts
    #[arg(long)]
    superscript_color: Option<String>,

    /// Superscript font size as a percentage of the book font
    #[arg(long, default_value = "60%")]
    superscript_font_size: String,

    /// Omit the book total from superscripts
    #[arg(long)]
    no_superscript_total: bool,

    /// Omit chapter page/total from pagelines and superscripts
    #[arg(long)]
    no_chapter_totals: bool,

    /// Bracket style for chapter totals: angle, dash or none
    #[arg(long, value_parser = parse_bracket, default_value = "angle")]
    chapter_bracket: Bracket,

    /// EPUB2 to EPUB3 converter executable (e.g. ebook-convert)
    #[arg(long, value_name = "EXE")]
    converter: Option<PathBuf>,

    /// epubcheck executable
    #[arg(long, value_name = "EXE")]
    epubcheck: Option<PathBuf>,

    /// Run epubcheck on the original file
    #[arg(long)]
    check_original: bool,

    /// Run epubcheck on the paged file
    #[arg(long)]
    check_paged: bool,

    /// Kill external tools after this many seconds
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,
}

fn parse_align(s: &str) -> Result<Align, String> {
    match s {
        "left" => Ok(Align::Left),
        "right" => Ok(Align::Right),
        "center" => Ok(Align::Center),
        other => Err(format!("unknown alignment: {other}")),
    }
}

fn parse_bracket(s: &str) -> Result<Bracket, String> {
    match s {
        "angle" | "<" => Ok(Bracket::Angle),
        "dash" | "-" => Ok(Bracket::Dash),
        "none" => Ok(Bracket::None),
        other => Err(format!("unknown bracket style: {other}")),
    }
}

impl Cli {
    /// Build the run configuration. A config file replaces the flag values
    /// wholesale, mirroring how batch users drive the tool.
    fn into_config(self) -> Result<PaginationConfig, folio::Error> {
        if let Some(path) = &self.config {
            let mut cfg = PaginationConfig::from_json_file(path)?;
            cfg.quiet = cfg.quiet || self.quiet;
            return Ok(cfg);
        }
        let cfg = PaginationConfig {
            outdir: self.outdir,
            match_existing: self.match_existing,
            generate_page_list: !self.no_page_list,
            // --total-pages supersedes the words-per-page default.
            words_per_page: if self.total_pages > 0 {
                0
            } else {
                self.words_per_page
            },
            total_pages: self.total_pages,
            pageline: self.pageline,
            pageline_align: self.pageline_align,
            pageline_color: self.pageline_color,
            pageline_bracket: self.pageline_bracket,
            pageline_font_size: self.pageline_font_size,
            pageline_book_total: !self.no_pageline_total,
            superscript: self.superscript,
            superscript_color: self.superscript_color,
            superscript_font_size: self.superscript_font_size,
            superscript_book_total: !self.no_superscript_total,
            chapter_totals: !self.no_chapter_totals,
            chapter_bracket: self.chapter_bracket,
            converter: self.converter,
            epubcheck: self.epubcheck,
            check_original: self.check_original,
            check_paged: self.check_paged,
            tool_timeout_secs: self.timeout,
            quiet: self.quiet,
            ..Default::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let epub_file = cli.epub_file.clone();
    let want_json = cli.json;
    let cfg = match cli.into_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let paginator = match Paginator::new(cfg) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let summary = paginator.paginate(&epub_file);

    if want_json {
        match serde_json::to_string_pretty(&summary) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("error: could not serialize summary: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if !summary.fatal {
        println!(
            "{}: {} words, {} pages -> {}",
            summary.title,
            summary.words,
            summary.pages,
            summary.out_file.display()
        );
        for w in &summary.warnings {
            println!("warning: {w}");
        }
    }

    if summary.fatal {
        for e in &summary.errors {
            eprintln!("error: {e}");
        }
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
