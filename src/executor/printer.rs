use std::fmt::Write as _;

use colored::{Color, Colorize};
use serde_json::Value;

use crate::assertions::{SpecResult, TestResult};
use crate::runner::{BundleReport, RequestOutcome, RequestReport};

use super::models::ResponseData;

#[derive(Debug, Clone, Copy, Default)]
pub struct PrintOptions {
    /// Show passing assertions and bodies of passing requests too.
    pub verbose: bool,
}

pub fn print_request_report(report: &RequestReport, options: &PrintOptions) {
    print!("{}", format_request_report(report, options));
}

pub fn print_bundle_report(report: &BundleReport, options: &PrintOptions) {
    for request in &report.requests {
        print_request_report(request, options);
    }
    print!("{}", format_summary(report));
}

pub fn format_request_report(report: &RequestReport, options: &PrintOptions) -> String {
    let mut out = String::new();
    let title = match &report.request {
        Some(spec) => format!(
            "{} {} {}",
            report.name.bold(),
            spec.http.method.bold(),
            spec.full_url().cyan()
        ),
        None => report.name.bold().to_string(),
    };

    match &report.outcome {
        RequestOutcome::Failed { error } => {
            let _ = writeln!(out, "{} {}", "ERROR".red().bold(), title);
            let _ = writeln!(out, "  {}", error.to_string().red());
        }
        RequestOutcome::Cancelled => {
            let _ = writeln!(out, "{} {}", "CANCELLED".yellow().bold(), title);
        }
        RequestOutcome::Completed {
            response,
            results,
            warnings,
        } => {
            let failed = results.has_blocking_failure();
            let badge = if failed {
                "FAIL".red().bold()
            } else {
                "PASS".green().bold()
            };
            let _ = writeln!(out, "{} {}", badge, title);
            let _ = writeln!(
                out,
                "  {} {}",
                format_status(response),
                format!("({:.1} ms)", response.execution_time_ms).dimmed()
            );

            write_results(&mut out, results, 1, false, options.verbose);

            for warning in warnings {
                let _ = writeln!(out, "  {} {}", "warning:".yellow(), warning);
            }

            let request_options = report.options();
            if request_options.show_headers {
                let _ = writeln!(out, "  {}", "Response headers".bold());
                for (name, value) in &response.headers {
                    let _ = writeln!(out, "    {}: {}", name.cyan(), value.dimmed());
                }
            }
            if failed || request_options.show_headers || options.verbose {
                if let Some(body) = format_body(response, request_options.keep_raw_json) {
                    let _ = writeln!(out, "  {}", "Body".bold());
                    for line in body.lines() {
                        let _ = writeln!(out, "    {}", line.dimmed());
                    }
                }
            }
        }
    }

    out
}

fn format_status(response: &ResponseData) -> String {
    if let Some(error) = &response.error {
        return format!("{}: {}", error.name, error.message).red().to_string();
    }
    let Some(status) = response.status else {
        return "no status".red().to_string();
    };

    let color = if status >= 400 {
        Color::Red
    } else if status >= 300 {
        Color::Yellow
    } else {
        Color::Green
    };
    let text = match &response.status_text {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    };
    text.color(color).to_string()
}

/// Pretty JSON unless raw output is asked for; plain bodies are shown as is.
fn format_body(response: &ResponseData, keep_raw: bool) -> Option<String> {
    if response.body.is_empty() {
        return None;
    }
    match (&response.json, keep_raw) {
        (Some(json), false) => serde_json::to_string_pretty(json).ok(),
        _ => Some(response.body.clone()),
    }
}

fn write_results(
    out: &mut String,
    node: &SpecResult,
    depth: usize,
    inherited_skip: bool,
    verbose: bool,
) {
    let skipped = inherited_skip || node.skipped;
    let indent = "  ".repeat(depth);

    for result in &node.results {
        if result.pass && !verbose {
            continue;
        }
        let spec = node.spec.as_deref().unwrap_or("");
        let _ = writeln!(out, "{indent}{}", format_result(spec, result, skipped));
    }
    for sub in &node.sub_results {
        write_results(out, sub, depth, skipped, verbose);
    }
}

fn format_result(spec: &str, result: &TestResult, skipped: bool) -> String {
    let expected = compact(Some(&result.expected));
    if skipped {
        return format!("{} {} {} {}", "-".dimmed(), spec, result.op, expected)
            .dimmed()
            .to_string();
    }
    if result.pass {
        return format!("{} {} {} {}", "✓".green(), spec, result.op, expected);
    }

    let mut line = format!(
        "{} {} {} {}, received {}",
        "✗".red(),
        spec,
        result.op,
        expected,
        compact(result.received.as_ref()).red()
    );
    if let Some(message) = &result.message {
        let _ = write!(line, " ({message})");
    }
    line
}

fn compact(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(value) => value.to_string(),
    }
}

pub fn format_summary(report: &BundleReport) -> String {
    let counts = report.counts();
    let mut out = String::new();
    let mut parts = vec![
        format!("{} passed", counts.passed).green().to_string(),
        format!("{} failed", counts.failed).red().to_string(),
    ];
    if counts.skipped > 0 {
        parts.push(format!("{} skipped", counts.skipped).dimmed().to_string());
    }
    if report.errored() > 0 {
        parts.push(format!("{} errored", report.errored()).red().to_string());
    }
    let _ = writeln!(out, "{} {}", "Tests:".bold(), parts.join(", "));

    if !report.cancelled.is_empty() {
        let _ = writeln!(
            out,
            "{} {}",
            "Cancelled:".bold(),
            report.cancelled.join(", ").yellow()
        );
    }
    if !report.not_run.is_empty() {
        let _ = writeln!(
            out,
            "{} {}",
            "Not run:".bold(),
            report.not_run.join(", ").dimmed()
        );
    }
    out
}
