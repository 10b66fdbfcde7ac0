//! External epubcheck integration.
//!
//! epubcheck is a Java tool; it is invoked as a subprocess and its summary
//! line is parsed from stdout:
//!
//! ```text
//! Messages: 0 fatals / 0 errors / 2 warnings / 0 infos
//! ```

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::{Error, Result};

/// Parsed epubcheck results for one run.
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    pub fatals: u32,
    pub errors: u32,
    /// Full tool output, for the run log.
    pub raw: String,
    pub elapsed: Duration,
}

impl ValidationReport {
    pub fn clean(&self) -> bool {
        self.fatals == 0 && self.errors == 0
    }
}

/// Run epubcheck against `epub` and parse its summary.
pub fn run_epubcheck(exe: &Path, epub: &Path, timeout: Duration) -> Result<ValidationReport> {
    info!("running epubcheck on {}", epub.display());
    let started = Instant::now();
    let mut cmd = Command::new(exe);
    cmd.arg(epub);
    // epubcheck exits non-zero when the book has errors; the Messages line
    // is still there to parse.
    let (_, output) = run_tool(&mut cmd, "epubcheck", timeout)?;

    let mut report = ValidationReport {
        raw: output,
        elapsed: started.elapsed(),
        ..Default::default()
    };
    for line in report.raw.lines() {
        if line.contains("Messages:") {
            let (fatals, errors) = parse_messages_line(line)?;
            report.fatals = fatals;
            report.errors = errors;
        }
    }
    debug!(
        "epubcheck finished in {:.2}s: {} fatals, {} errors",
        report.elapsed.as_secs_f64(),
        report.fatals,
        report.errors
    );
    Ok(report)
}

/// The counts from a `Messages: X fatals / Y errors ...` line.
fn parse_messages_line(line: &str) -> Result<(u32, u32)> {
    let words: Vec<&str> = line.trim().split(' ').collect();
    let parse = |w: Option<&&str>| -> Result<u32> {
        w.and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::ToolFailed(format!("unparseable epubcheck summary: {line}")))
    };
    Ok((parse(words.get(1))?, parse(words.get(4))?))
}

/// Run a subprocess with a deadline, returning its exit status and combined
/// stdout and stderr. The child is killed when the deadline passes. Callers
/// decide what a non-zero exit means for their tool.
pub(crate) fn run_tool(
    cmd: &mut Command,
    tool: &str,
    timeout: Duration,
) -> Result<(std::process::ExitStatus, String)> {
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| Error::ToolFailed(format!("could not launch {tool}: {e}")))?;

    // Drain the pipes on threads so a chatty child cannot block on a full
    // pipe buffer while we poll for exit.
    let stdout = reader_thread(child.stdout.take());
    let stderr = reader_thread(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                kill_quiet(&mut child);
                return Err(Error::ToolTimeout {
                    tool: tool.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            None => thread::sleep(Duration::from_millis(100)),
        }
    };

    let mut raw = join_reader(stdout);
    let err_text = join_reader(stderr);
    if !err_text.is_empty() {
        raw.push('\n');
        raw.push_str(&err_text);
    }
    if !status.success() && raw.is_empty() {
        return Err(Error::ToolFailed(format!("{tool} exited with {status}")));
    }
    Ok((status, raw))
}

fn reader_thread(pipe: Option<impl Read + Send + 'static>) -> Option<thread::JoinHandle<String>> {
    pipe.map(|mut p| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = p.read_to_string(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

fn kill_quiet(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
