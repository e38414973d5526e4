// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, FixedOffset};
use indexmap::map::IndexMap;
use serde::Serialize;
use std::fmt;

/// Everything read out of one JUnit XML document.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ParsedReport {
    /// The test suites found in the document, in document order.
    ///
    /// Nested suites are listed after the suite enclosing them.
    pub suites: Vec<SuiteInfo>,

    /// One outcome per `<testcase>` element, in document order.
    pub outcomes: Vec<OutcomeRecord>,
}

impl ParsedReport {
    /// Returns true if the document did not contain any test cases.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns the outcomes with the given kind.
    pub fn outcomes_of_kind(&self, kind: OutcomeKind) -> impl Iterator<Item = &OutcomeRecord> {
        self.outcomes.iter().filter(move |outcome| outcome.kind == kind)
    }
}

/// Represents a single `<testsuite>` element.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[non_exhaustive]
pub struct SuiteInfo {
    /// The name of this testsuite.
    pub name: String,

    /// The declared number of tests.
    ///
    /// Ant excludes skipped tests from this count while the JUnit 5 console launcher includes
    /// them, so this is not necessarily the number of outcomes.
    pub tests: Option<usize>,

    /// The declared number of failures.
    pub failures: Option<usize>,

    /// The declared number of errors (`aborted` in some dialects).
    pub errors: Option<usize>,

    /// The declared number of skipped tests.
    pub skipped: Option<usize>,

    /// The overall time taken by the testsuite, in seconds.
    pub duration_secs: f64,

    /// The time at which the testsuite began execution.
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// Data written to standard output by the whole suite, for dialects (like Ant) that don't
    /// record it per testcase.
    pub stdout: Option<String>,

    /// Data written to standard error by the whole suite.
    pub stderr: Option<String>,

    /// The JUnit Platform unique ID, present if this suite was written by the JUnit 5 console
    /// launcher.
    pub unique_id: Option<String>,

    /// Custom properties recorded for the suite, e.g. system properties.
    pub properties: IndexMap<String, String>,

    /// Other attributes, such as "hostname" or "package".
    pub extra: IndexMap<String, String>,
}

impl SuiteInfo {
    /// Creates a new `SuiteInfo` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns true if the suite was written by the JUnit 5 console launcher.
    pub fn is_junit_platform(&self) -> bool {
        self.unique_id.is_some() || JUNIT_PLATFORM_SUITE_NAMES.contains(&self.name.as_str())
    }
}

/// Suite names used by the JUnit 5 console launcher's legacy XML reporter.
pub(crate) static JUNIT_PLATFORM_SUITE_NAMES: &[&str] =
    &["JUnit Jupiter", "JUnit Vintage", "JUnit Platform Suite"];

/// The normalized outcome of a single test case.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[non_exhaustive]
pub struct OutcomeRecord {
    /// The qualified identifier of the test case.
    ///
    /// This is not guaranteed to be unique: reruns may produce several records with the same
    /// identifier.
    pub id: String,

    /// The "classname" of the testcase, if present.
    pub classname: Option<String>,

    /// The name of the testcase, typically a method name possibly with a suffix such as
    /// `foo()[2]`.
    pub name: String,

    /// The classification of this test case.
    pub kind: OutcomeKind,

    /// A short, single-line reason for the outcome. Empty for passed tests.
    pub reason: String,

    /// The Java class of the failure or error, if known.
    pub outcome_type: Option<String>,

    /// Multi-line details for the outcome, typically a filtered stack trace.
    pub details: Option<String>,

    /// The unfiltered details. Only retained when full details are requested.
    pub details_full: Option<String>,

    /// The time taken to execute this testcase, in seconds.
    pub duration_secs: f64,

    /// The time at which this testcase (or its suite) began execution.
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// Expected and actual values, for assertion failures that report them.
    pub comparison: Option<Comparison>,

    /// Data written to standard output by this testcase.
    pub stdout: Option<String>,

    /// Data written to standard error by this testcase.
    pub stderr: Option<String>,

    /// The JUnit Platform unique ID of this testcase.
    pub unique_id: Option<String>,

    /// The display name, if it was reported separately from the name.
    pub display_name: Option<String>,

    /// The line within the test class where the failure occurred, found from the stack trace.
    pub source_line: Option<u32>,

    /// The number of earlier flaky or rerun attempts recorded for this testcase.
    pub reruns: usize,
}

impl OutcomeRecord {
    /// Creates a new record for a passed test.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            classname: None,
            name: name.into(),
            kind: OutcomeKind::Passed,
            reason: String::new(),
            outcome_type: None,
            details: None,
            details_full: None,
            duration_secs: 0.0,
            timestamp: None,
            comparison: None,
            stdout: None,
            stderr: None,
            unique_id: None,
            display_name: None,
            source_line: None,
            reruns: 0,
        }
    }

    /// Sets the kind and reason.
    pub fn set_outcome(&mut self, kind: OutcomeKind, reason: impl Into<String>) -> &mut Self {
        self.kind = kind;
        self.reason = reason.into();
        self
    }

    /// Sets the classname.
    pub fn set_classname(&mut self, classname: impl Into<String>) -> &mut Self {
        self.classname = Some(classname.into());
        self
    }

    /// Sets the duration in seconds.
    pub fn set_duration_secs(&mut self, duration_secs: f64) -> &mut Self {
        self.duration_secs = duration_secs;
        self
    }

    /// Sets the start timestamp.
    pub fn set_timestamp(&mut self, timestamp: impl Into<DateTime<FixedOffset>>) -> &mut Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Returns true if the test did not pass and was not skipped.
    pub fn is_problem(&self) -> bool {
        self.kind.is_problem()
    }
}

/// The classification of a test case.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeKind {
    /// The test passed.
    Passed,

    /// The test failed in an expected way, typically an assertion.
    Failed,

    /// The test failed in an unexpected way, for example an exception.
    Errored,

    /// The test was not run.
    Skipped,

    /// The report did not contain enough consistent information to classify the test.
    Inconclusive,
}

impl OutcomeKind {
    /// Returns true if this represents something going wrong.
    pub fn is_problem(self) -> bool {
        matches!(
            self,
            OutcomeKind::Failed | OutcomeKind::Errored | OutcomeKind::Inconclusive
        )
    }

    /// Returns the string representation of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Passed => "passed",
            OutcomeKind::Failed => "failed",
            OutcomeKind::Errored => "errored",
            OutcomeKind::Skipped => "skipped",
            OutcomeKind::Inconclusive => "inconclusive",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected and actual values extracted from an assertion message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Comparison {
    /// The expected value.
    pub expected: String,

    /// The actual value.
    pub actual: String,
}

impl Comparison {
    /// Creates a new `Comparison`.
    pub fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Removes terminal escapes and non-printable control characters from report text.
pub(crate) fn clean_text(text: &str) -> String {
    let text = if text.contains('\x1b') {
        strip_ansi_escapes::strip_str(text)
    } else {
        text.to_owned()
    };
    text.replace(
        |c| matches!(c, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f'),
        "",
    )
}
