// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputWriter, ResultStyles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use junit_outcomes::{JunitXmlParser, OutcomeKind, ParseError, ParsedReport};
use jvm_runner::config::JvmTestConfig;
use owo_colors::OwoColorize;
use regex::Regex;
use serde::Serialize;
use std::{error::Error, io::Write};

#[derive(Debug, Args)]
pub(super) struct ParseOpts {
    /// JUnit XML files, or directories containing them
    #[arg(required = true, value_name = "FILES")]
    files: Vec<Utf8PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t, value_name = "FORMAT")]
    message_format: MessageFormat,

    /// Interpret timestamps without a zone as local time
    #[arg(long, conflicts_with = "utc")]
    local_time: bool,

    /// Interpret timestamps without a zone as UTC
    #[arg(long)]
    utc: bool,

    /// Keep every line of failure details
    #[arg(long)]
    full_details: bool,

    /// Drop failure detail lines matching this regex
    #[arg(long, value_name = "REGEX")]
    exclude_pattern: Option<String>,

    /// Separator between a test's class and its name
    #[arg(long, value_name = "SEP")]
    separator: Option<String>,

    /// Regex matched against the start of each test identifier; the match is removed
    #[arg(long, value_name = "REGEX")]
    id_prefix: Option<String>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum MessageFormat {
    /// A line per outcome
    #[default]
    Human,
    /// A JSON array with an entry per file
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    path: &'a Utf8Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a ParsedReport>,
}

impl ParseOpts {
    pub(super) fn exec(
        self,
        config: &JvmTestConfig,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let parser = JunitXmlParser::new(self.parser_options(config)?);
        let files = expand_inputs(&self.files)?;
        let results = parser.parse_files(&files);

        let mut writer = output_writer.stdout_writer();
        match self.message_format {
            MessageFormat::Human => {
                let styles = output.stdout_styles();
                for (path, result) in &results {
                    match result {
                        Ok(report) => {
                            write_report(&mut writer, path, report, output.verbose, &styles)
                                .map_err(ExpectedError::write_output)?
                        }
                        Err(err) => {
                            tracing::error!("{}", error_chain(err));
                        }
                    }
                }
            }
            MessageFormat::Json => {
                let entries: Vec<_> = results
                    .iter()
                    .map(|(path, result)| JsonReport {
                        path,
                        error: result.as_ref().err().map(error_chain),
                        report: result.as_ref().ok(),
                    })
                    .collect();
                serde_json::to_writer_pretty(&mut writer, &entries)
                    .map_err(|err| ExpectedError::Json { err })?;
                writeln!(writer).map_err(ExpectedError::write_output)?;
            }
        }
        writer.flush().map_err(ExpectedError::write_output)?;

        let count = results.iter().filter(|(_, result)| result.is_err()).count();
        if count > 0 {
            return Err(ExpectedError::ReportParseFailed { count });
        }
        Ok(crate::JvmTestExitCode::OK)
    }

    fn parser_options(&self, config: &JvmTestConfig) -> Result<junit_outcomes::ParserOptions> {
        let mut options = config.parser_options();
        if self.local_time {
            options.timestamp_local_time = Some(true);
        } else if self.utc {
            options.timestamp_local_time = Some(false);
        }
        if self.full_details {
            options.full_details = true;
        }
        if let Some(pattern) = &self.exclude_pattern {
            options.exclude_details = Some(compile_regex("--exclude-pattern", pattern)?);
        }
        if let Some(separator) = &self.separator {
            options.separator = separator.clone();
        }
        if let Some(pattern) = &self.id_prefix {
            options.id_prefix = Some(compile_regex("--id-prefix", pattern)?);
        }
        Ok(options)
    }
}

fn compile_regex(option: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| ExpectedError::InvalidRegex { option, err })
}

/// Replaces directories with the `.xml` files directly inside them, in file name order.
fn expand_inputs(inputs: &[Utf8PathBuf]) -> Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let entries = input
            .read_dir_utf8()
            .map_err(|err| ExpectedError::ReadInput {
                path: input.clone(),
                err,
            })?;
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ExpectedError::ReadInput {
                path: input.clone(),
                err,
            })?;
            if entry.path().extension() == Some("xml") && entry.path().is_file() {
                found.push(entry.into_path());
            }
        }
        found.sort();
        files.extend(found);
    }

    if files.is_empty() {
        return Err(ExpectedError::NoReportFiles {
            inputs: inputs.to_vec(),
        });
    }
    Ok(files)
}

fn write_report(
    writer: &mut dyn Write,
    path: &Utf8Path,
    report: &ParsedReport,
    verbose: bool,
    styles: &ResultStyles,
) -> std::io::Result<()> {
    let mut summary = Vec::new();
    for kind in [
        OutcomeKind::Passed,
        OutcomeKind::Failed,
        OutcomeKind::Errored,
        OutcomeKind::Skipped,
        OutcomeKind::Inconclusive,
    ] {
        let count = report.outcomes_of_kind(kind).count();
        if count > 0 {
            summary.push(format!("{count} {kind}"));
        }
    }
    let total = report.outcomes.len();
    writeln!(
        writer,
        "{}: {} {} ({})",
        path.style(styles.path),
        total.style(styles.count),
        if total == 1 { "testcase" } else { "testcases" },
        if summary.is_empty() {
            "empty".to_owned()
        } else {
            summary.join(", ")
        },
    )?;

    for outcome in &report.outcomes {
        let style = match outcome.kind {
            OutcomeKind::Passed => styles.pass,
            OutcomeKind::Skipped => styles.skip,
            OutcomeKind::Failed | OutcomeKind::Errored | OutcomeKind::Inconclusive => styles.fail,
        };
        write!(
            writer,
            "  {:>12} [{:>8.3}s] {}",
            outcome.kind.as_str().to_uppercase().style(style),
            outcome.duration_secs,
            outcome.id,
        )?;
        if outcome.reruns > 0 {
            write!(writer, " (after {} reruns)", outcome.reruns)?;
        }
        if !outcome.reason.is_empty() {
            write!(writer, ": {}", outcome.reason)?;
        }
        writeln!(writer)?;

        if verbose
            && outcome.is_problem()
            && let Some(details) = &outcome.details
        {
            for line in details.lines() {
                writeln!(writer, "      {line}")?;
            }
        }
    }
    Ok(())
}

fn error_chain(err: &ParseError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
