//! Handles all user-facing output for the CLI.
//!
//! Verdict banners, failed-check messages with text diffs, and batch
//! summaries. Color is used only when stdout is a terminal.

use difference::{Changeset, Difference};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use unicode_width::UnicodeWidthStr;

use crate::orchestrator::{CheckResult, RunReport, TextMismatch};

pub fn color_choice() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

pub fn stdout() -> StandardStream {
    StandardStream::stdout(color_choice())
}

// ============================================================================
// RUN REPORT
// ============================================================================

/// What to print for one run.
#[derive(Debug, Clone, Copy)]
pub struct ReportStyle {
    pub show_verdict: bool,
    /// 0 prints every failure.
    pub max_messages: usize,
}

pub fn print_report(out: &mut dyn WriteColor, report: &RunReport, style: ReportStyle) -> io::Result<()> {
    if let Some(failure) = &report.setup_failure {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        writeln!(out, "Setup failed, no checks were run")?;
        out.reset()?;
        writeln!(out, "  {}", failure)?;
    }

    let failures: Vec<&CheckResult> = report.failures().collect();
    let shown = match style.max_messages {
        0 => failures.len(),
        cap => cap.min(failures.len()),
    };
    for result in &failures[..shown] {
        print_failure(out, result)?;
    }
    if shown < failures.len() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(out, "... (+{} more failed checks)", failures.len() - shown)?;
        out.reset()?;
    }

    if style.show_verdict {
        let summary = format!(
            "{}/{} checks passed",
            report.executed() - failures.len(),
            report.total_checks
        );
        print_banner(out, report.passed(), &report.test_name, &summary)?;
    }
    Ok(())
}

fn print_failure(out: &mut dyn WriteColor, result: &CheckResult) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    writeln!(out, "✗ Check {}: {}", result.check_id, result.name)?;
    out.reset()?;
    if let Some(message) = &result.message {
        writeln!(out, "  {}", message)?;
    }
    out.set_color(ColorSpec::new().set_dimmed(true))?;
    writeln!(out, "  {}", result.explanation)?;
    out.reset()?;
    if let Some(mismatch) = &result.mismatch {
        print_diff(out, mismatch)?;
    }
    Ok(())
}

fn print_diff(out: &mut dyn WriteColor, mismatch: &TextMismatch) -> io::Result<()> {
    let changeset = Changeset::new(mismatch.expected.trim(), mismatch.actual.trim(), "\n");
    for diff in &changeset.diffs {
        match diff {
            Difference::Same(x) => {
                out.reset()?;
                for line in x.lines() {
                    writeln!(out, "    {}", line)?;
                }
            }
            Difference::Add(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                for line in x.lines() {
                    writeln!(out, "  + {}", line)?;
                }
            }
            Difference::Rem(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                for line in x.lines() {
                    writeln!(out, "  - {}", line)?;
                }
            }
        }
    }
    out.reset()
}

/// A boxed verdict, sized to its widest line.
pub fn print_banner(out: &mut dyn WriteColor, passed: bool, title: &str, summary: &str) -> io::Result<()> {
    let verdict = if passed { "PASSED" } else { "FAILED" };
    let lines = [verdict, title, summary];
    let width = lines.iter().map(|l| UnicodeWidthStr::width(*l)).max().unwrap_or(0) + 4;
    let color = if passed { Color::Green } else { Color::Red };

    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    writeln!(out, "╔{}╗", "═".repeat(width))?;
    for line in lines {
        let pad = width - UnicodeWidthStr::width(line);
        let left = pad / 2;
        writeln!(out, "║{}{}{}║", " ".repeat(left), line, " ".repeat(pad - left))?;
    }
    writeln!(out, "╚{}╝", "═".repeat(width))?;
    out.reset()
}

// ============================================================================
// BATCH
// ============================================================================

pub enum BatchLine<'a> {
    Finished { path: &'a str, report: &'a RunReport },
    Errored { path: &'a str, error: String },
}

pub fn print_batch_line(out: &mut dyn WriteColor, line: BatchLine<'_>) -> io::Result<()> {
    let (tag, color, detail) = match &line {
        BatchLine::Finished { path, report } => {
            let failed = report.failed_checks().len();
            let detail = format!("{} ({}) {} failed", report.test_name, path, failed);
            if report.passed() {
                ("PASS ", Color::Green, detail)
            } else {
                ("FAIL ", Color::Red, detail)
            }
        }
        BatchLine::Errored { path, error } => ("ERROR", Color::Yellow, format!("{}: {}", path, error)),
    };
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{}", tag)?;
    out.reset()?;
    writeln!(out, " {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::RunPhase;
    use termcolor::Buffer;

    fn failed(id: i64) -> CheckResult {
        CheckResult {
            check_id: id,
            name: format!("check {}", id),
            passed: false,
            message: Some(format!("message {}", id)),
            explanation: "explanation".into(),
            mismatch: None,
        }
    }

    fn report(results: Vec<CheckResult>) -> RunReport {
        RunReport {
            test_id: 1,
            test_name: "sample".into(),
            phase: RunPhase::Done,
            total_checks: results.len(),
            results,
            setup_failure: None,
            aborted_after: None,
        }
    }

    fn render(report: &RunReport, style: ReportStyle) -> String {
        let mut buffer = Buffer::no_color();
        print_report(&mut buffer, report, style).unwrap();
        String::from_utf8(buffer.into_inner()).unwrap()
    }

    #[test]
    fn test_failures_are_capped() {
        let style = ReportStyle {
            show_verdict: false,
            max_messages: 1,
        };
        let text = render(&report(vec![failed(1), failed(2), failed(3)]), style);
        assert!(text.contains("✗ Check 1: check 1"));
        assert!(!text.contains("check 2"));
        assert!(text.contains("... (+2 more failed checks)"));
    }

    #[test]
    fn test_batch_line_tags_follow_the_verdict() {
        let mut buffer = Buffer::no_color();
        let passing = report(vec![]);
        let failing = report(vec![failed(1)]);
        print_batch_line(&mut buffer, BatchLine::Finished { path: "a.json", report: &passing }).unwrap();
        print_batch_line(&mut buffer, BatchLine::Finished { path: "b.json", report: &failing }).unwrap();
        let text = String::from_utf8(buffer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["PASS  sample (a.json) 0 failed", "FAIL  sample (b.json) 1 failed"]);
    }

    #[test]
    fn test_banner_lines_have_equal_width() {
        let mut buffer = Buffer::no_color();
        print_banner(&mut buffer, true, "ünïcode title", "1/1 checks passed").unwrap();
        let text = String::from_utf8(buffer.into_inner()).unwrap();
        let widths: Vec<usize> = text.lines().map(UnicodeWidthStr::width).collect();
        assert_eq!(widths.len(), 5);
        assert!(widths.iter().all(|w| *w == widths[0]));
        assert!(text.contains("PASSED"));
    }
}
