// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregating parsed JUnit reports into an overall verdict for a run.
//!
//! Each outcome maps to a [`Verdict`], and the run's verdict is the most severe one seen. A run
//! where nothing ran is blocked, since that usually means the selection is wrong.

use junit_outcomes::{OutcomeKind, OutcomeRecord, ParseError, ParsedReport};
use serde::Serialize;
use std::{collections::HashSet, fmt};
use tracing::{debug, info};

/// The verdict for a single testcase or for a whole run, ordered from least to most severe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// The test passed.
    Passed,

    /// The test was not run.
    Skipped,

    /// An assertion failed.
    Failed,

    /// The test failed because it timed out.
    TimedOut,

    /// The test could not produce a meaningful result, for example because of an unexpected
    /// exception.
    Blocked,
}

impl Verdict {
    /// Returns the verdict for one outcome.
    ///
    /// Errors and inconclusive outcomes are blocked. Failures and errors whose type mentions
    /// `Timeout` are timeouts.
    pub fn for_outcome(record: &OutcomeRecord) -> Self {
        let verdict = match record.kind {
            OutcomeKind::Passed => Verdict::Passed,
            OutcomeKind::Failed => Verdict::Failed,
            OutcomeKind::Skipped => Verdict::Skipped,
            OutcomeKind::Errored | OutcomeKind::Inconclusive => Verdict::Blocked,
        };
        let is_timeout = record
            .outcome_type
            .as_deref()
            .is_some_and(|ty| ty.contains("Timeout"));
        if is_timeout && matches!(verdict, Verdict::Failed | Verdict::Blocked) {
            Verdict::TimedOut
        } else {
            verdict
        }
    }

    /// Returns the string representation of this verdict.
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::Skipped => "skipped",
            Verdict::Failed => "failed",
            Verdict::TimedOut => "timed out",
            Verdict::Blocked => "blocked",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many testcases ended with each verdict.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct VerdictCounts {
    /// Passed testcases.
    pub passed: usize,
    /// Skipped testcases.
    pub skipped: usize,
    /// Failed testcases.
    pub failed: usize,
    /// Testcases that timed out.
    pub timed_out: usize,
    /// Blocked testcases.
    pub blocked: usize,
}

impl VerdictCounts {
    /// Returns the number of testcases with the given verdict.
    pub fn get(&self, verdict: Verdict) -> usize {
        match verdict {
            Verdict::Passed => self.passed,
            Verdict::Skipped => self.skipped,
            Verdict::Failed => self.failed,
            Verdict::TimedOut => self.timed_out,
            Verdict::Blocked => self.blocked,
        }
    }

    /// Returns the total number of testcases.
    pub fn total(&self) -> usize {
        self.passed + self.skipped + self.failed + self.timed_out + self.blocked
    }

    fn increment(&mut self, verdict: Verdict) {
        let count = match verdict {
            Verdict::Passed => &mut self.passed,
            Verdict::Skipped => &mut self.skipped,
            Verdict::Failed => &mut self.failed,
            Verdict::TimedOut => &mut self.timed_out,
            Verdict::Blocked => &mut self.blocked,
        };
        *count += 1;
    }
}

impl fmt::Display for VerdictCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for verdict in [
            Verdict::Passed,
            Verdict::Failed,
            Verdict::TimedOut,
            Verdict::Blocked,
            Verdict::Skipped,
        ] {
            let count = self.get(verdict);
            if count == 0 {
                continue;
            }
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{count} {verdict}")?;
            first = false;
        }
        if first {
            f.write_str("no tests")?;
        }
        Ok(())
    }
}

/// The verdict of one testcase.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TestcaseVerdict {
    /// The identifier of the testcase.
    pub id: String,

    /// The verdict.
    pub verdict: Verdict,

    /// Why the testcase didn't pass. Empty for passed testcases.
    pub reason: String,

    /// How long the testcase took, in seconds.
    pub duration_secs: f64,
}

/// The overall result of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunVerdict {
    /// The most severe verdict seen.
    pub verdict: Verdict,

    /// The reason for the verdict. Empty if the run passed.
    pub reason: String,

    /// How many testcases ended with each verdict.
    pub counts: VerdictCounts,

    /// Every testcase that counted towards the verdict, in the order seen.
    pub testcases: Vec<TestcaseVerdict>,

    /// The number of duplicate testcases that were ignored.
    pub duplicates: usize,
}

impl RunVerdict {
    /// Returns the verdict for a run whose JVM couldn't be launched or didn't finish, so there
    /// are no reports to aggregate.
    pub fn for_launch_failure(verdict: Verdict, reason: impl Into<String>) -> Self {
        Self {
            verdict,
            reason: reason.into(),
            counts: VerdictCounts::default(),
            testcases: Vec::new(),
            duplicates: 0,
        }
    }
}

/// Builds a [`RunVerdict`] from the reports written by one run.
#[derive(Debug)]
pub struct VerdictAggregator {
    custom_selection: bool,
    verdict: Verdict,
    reason: String,
    counts: VerdictCounts,
    testcases: Vec<TestcaseVerdict>,
    seen: HashSet<String>,
    duplicates: usize,
}

impl VerdictAggregator {
    /// Creates an aggregator.
    ///
    /// `custom_selection` should be true if the run was given arguments that may legitimately
    /// select no tests, such as tag filters. A run that finds no tests is then skipped rather than
    /// blocked.
    pub fn new(custom_selection: bool) -> Self {
        Self {
            custom_selection,
            verdict: Verdict::Passed,
            reason: String::new(),
            counts: VerdictCounts::default(),
            testcases: Vec::new(),
            seen: HashSet::new(),
            duplicates: 0,
        }
    }

    /// Adds the outcomes from one report.
    ///
    /// Reports whose suites declare no tests are ignored, as are testcases that have already been
    /// seen in an earlier report: Ant sometimes reports nested test classes twice.
    pub fn add_report(&mut self, report: &ParsedReport) {
        let declared: usize = report
            .suites
            .iter()
            .map(|suite| suite.tests.unwrap_or(0) + suite.skipped.unwrap_or(0))
            .sum();
        if declared == 0 && report.outcomes.is_empty() {
            if let Some(suite) = report.suites.first() {
                debug!("ignoring suite \"{}\", which contains no tests", suite.name);
            }
            return;
        }

        for record in report.outcomes.iter().chain(&skipped_suite_record(report)) {
            let key = match &record.classname {
                Some(classname) => format!("{classname}.{}", record.name),
                None => record.id.clone(),
            };
            if !self.seen.insert(key) {
                info!("ignoring duplicate results for {}", record.id);
                self.duplicates += 1;
                continue;
            }
            self.add_record(record);
        }
    }

    /// Records a report that could not be parsed. This blocks the run.
    pub fn add_parse_error(&mut self, error: &ParseError) {
        self.raise(Verdict::Blocked, error.to_string());
    }

    /// Returns the overall verdict.
    pub fn finish(mut self) -> RunVerdict {
        let total = self.counts.total();
        if total == 0 && self.verdict == Verdict::Passed {
            if self.custom_selection {
                self.verdict = Verdict::Skipped;
                self.reason =
                    "No tests were found (likely the result of the specified arguments)".to_owned();
            } else {
                self.verdict = Verdict::Blocked;
                self.reason = "No tests were found".to_owned();
            }
        } else if total > 0 && self.counts.skipped == total && self.verdict == Verdict::Passed {
            let last_reason = self
                .testcases
                .last()
                .map(|testcase| testcase.reason.as_str())
                .filter(|reason| !reason.is_empty())
                .unwrap_or("<no reason>");
            self.verdict = Verdict::Skipped;
            self.reason = format!("All {total} JUnit tests are skipped: {last_reason}");
        }

        RunVerdict {
            verdict: self.verdict,
            reason: self.reason,
            counts: self.counts,
            testcases: self.testcases,
            duplicates: self.duplicates,
        }
    }

    fn add_record(&mut self, record: &OutcomeRecord) {
        let verdict = Verdict::for_outcome(record);
        self.counts.increment(verdict);
        let reason = if record.reason.is_empty() {
            "<unknown reason>"
        } else {
            record.reason.as_str()
        };
        debug!(
            "-- {}: {} ({:.1}s)",
            record.id, record.kind, record.duration_secs
        );

        // Skipped testcases don't affect the verdict unless everything is skipped.
        if matches!(verdict, Verdict::Failed | Verdict::TimedOut | Verdict::Blocked) {
            self.raise(
                verdict,
                format!("JUnit {}: {reason} [in {}]", record.kind, record.id),
            );
        }

        self.testcases.push(TestcaseVerdict {
            id: record.id.clone(),
            verdict,
            reason: if verdict == Verdict::Passed {
                String::new()
            } else {
                reason.to_owned()
            },
            duration_secs: record.duration_secs,
        });
    }

    // The first reason at the highest severity is kept.
    fn raise(&mut self, verdict: Verdict, reason: String) {
        if verdict > self.verdict {
            self.verdict = verdict;
            self.reason = reason;
        }
    }
}

/// Returns a skipped placeholder for a suite that declares skipped tests but has no testcases.
///
/// Ant writes such a suite when a whole class is ignored. The JUnit 5 console launcher lists
/// skipped tests individually, so its suites never get a placeholder.
pub fn skipped_suite_record(report: &ParsedReport) -> Option<OutcomeRecord> {
    if !report.outcomes.is_empty() {
        return None;
    }
    let suite = report.suites.first()?;
    if suite.is_junit_platform() || suite.skipped.unwrap_or(0) == 0 {
        return None;
    }

    let mut record = OutcomeRecord::new(format!("{}.class", suite.name), "class");
    record
        .set_classname(suite.name.clone())
        .set_outcome(OutcomeKind::Skipped, "Test suite is skipped")
        .set_duration_secs(0.0);
    if let Some(timestamp) = suite.timestamp {
        record.set_timestamp(timestamp);
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use junit_outcomes::{JunitXmlParser, ParserOptions};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn parse(xml: &str) -> ParsedReport {
        JunitXmlParser::new(ParserOptions::default())
            .parse_str(xml)
            .unwrap()
    }

    #[test_case("<failure message='m'/>", None, Verdict::Failed ; "failure")]
    #[test_case("<error message='m'/>", None, Verdict::Blocked ; "error")]
    #[test_case("<skipped/>", None, Verdict::Skipped ; "skipped")]
    #[test_case("", None, Verdict::Passed ; "passed")]
    #[test_case(
        "<error type='java.util.concurrent.TimeoutException'/>",
        Some("java.util.concurrent.TimeoutException"),
        Verdict::TimedOut ;
        "timeout error"
    )]
    fn verdict_for_outcome(marker: &str, expected_type: Option<&str>, expected: Verdict) {
        let report = parse(&format!(
            "<testsuite name='s' tests='1'><testcase classname='C' name='t'>{marker}</testcase></testsuite>"
        ));
        let record = &report.outcomes[0];
        if expected_type.is_some() {
            assert_eq!(record.outcome_type.as_deref(), expected_type);
        }
        assert_eq!(Verdict::for_outcome(record), expected);
    }

    #[test]
    fn most_severe_verdict_wins() {
        let mut aggregator = VerdictAggregator::new(false);
        aggregator.add_report(&parse(
            "<testsuite name='s' tests='3'>
                <testcase classname='C' name='a'/>
                <testcase classname='C' name='b'><failure message='expected 1 but was 2'/></testcase>
                <testcase classname='C' name='c'><error message='boom' type='IllegalStateException'/></testcase>
            </testsuite>",
        ));
        let run = aggregator.finish();
        assert_eq!(run.verdict, Verdict::Blocked);
        assert!(run.reason.contains("[in C.c]"), "{}", run.reason);
        assert_eq!(run.counts.total(), 3);
        assert_eq!(run.counts.to_string(), "1 passed, 1 failed, 1 blocked");
    }

    #[test]
    fn duplicates_and_empty_suites_are_ignored() {
        let report = parse(
            "<testsuite name='s' tests='1'><testcase classname='C' name='a'/></testsuite>",
        );
        let mut aggregator = VerdictAggregator::new(false);
        aggregator.add_report(&report);
        aggregator.add_report(&report);
        aggregator.add_report(&parse("<testsuite name='empty' tests='0'/>"));
        let run = aggregator.finish();
        assert_eq!(run.verdict, Verdict::Passed);
        assert_eq!(run.counts.passed, 1);
        assert_eq!(run.duplicates, 1);
    }

    #[test_case(false, Verdict::Blocked, "No tests were found" ; "default selection")]
    #[test_case(
        true,
        Verdict::Skipped,
        "No tests were found (likely the result of the specified arguments)" ;
        "custom selection"
    )]
    fn no_tests(custom_selection: bool, verdict: Verdict, reason: &str) {
        let run = VerdictAggregator::new(custom_selection).finish();
        assert_eq!(run.verdict, verdict);
        assert_eq!(run.reason, reason);
    }

    #[test]
    fn skipped_suite_placeholder() {
        let report = parse("<testsuite name='myorg.IgnoredTests' tests='0' skipped='1'/>");
        let record = skipped_suite_record(&report).unwrap();
        assert_eq!(record.id, "myorg.IgnoredTests.class");
        assert_eq!(record.classname.as_deref(), Some("myorg.IgnoredTests"));
        assert_eq!(record.kind, OutcomeKind::Skipped);

        let mut aggregator = VerdictAggregator::new(false);
        aggregator.add_report(&report);
        let run = aggregator.finish();
        assert_eq!(run.verdict, Verdict::Skipped);
        assert_eq!(
            run.reason,
            "All 1 JUnit tests are skipped: Test suite is skipped"
        );

        let platform = parse("<testsuite name='JUnit Jupiter' tests='0' skipped='1'/>");
        assert_eq!(skipped_suite_record(&platform), None);
    }

    #[test]
    fn parse_errors_block() {
        let parser = JunitXmlParser::new(ParserOptions::default());
        let err = parser.parse_str("<testsuite>").unwrap_err();
        let mut aggregator = VerdictAggregator::new(false);
        aggregator.add_report(&parse(
            "<testsuite name='s' tests='1'><testcase classname='C' name='a'/></testsuite>",
        ));
        aggregator.add_parse_error(&err);
        assert_eq!(aggregator.finish().verdict, Verdict::Blocked);
    }
}
