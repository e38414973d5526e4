// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of test cases across JUnit XML dialects.
//!
//! Each `<testcase>` element is first collected into a [`CaseElement`], a view that doesn't depend
//! on how the dialect laid out the XML. A fixed list of [`DetectionRule`]s is then evaluated in
//! priority order, and the first rule that matches decides the [`OutcomeKind`].

use crate::outcome::OutcomeKind;

/// A `<failure>`, `<error>` or `<skipped>` child of a testcase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Marker {
    pub(crate) kind: MarkerKind,
    pub(crate) message: Option<String>,
    pub(crate) ty: Option<String>,
    pub(crate) text: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum MarkerKind {
    #[default]
    Failure,
    Error,
    Skipped,
}

impl MarkerKind {
    pub(crate) fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "failure" => Some(MarkerKind::Failure),
            "error" => Some(MarkerKind::Error),
            "skipped" => Some(MarkerKind::Skipped),
            _ => None,
        }
    }
}

/// Returns true for the elements Surefire-style reports use to record earlier attempts, e.g.
/// `<flakyFailure>` or `<rerunError>`.
pub(crate) fn is_rerun_element(name: &str) -> bool {
    name.starts_with("flaky") || name.starts_with("rerun")
}

/// Everything collected from a `<testcase>` element and its children.
#[derive(Clone, Debug, Default)]
pub(crate) struct CaseElement {
    pub(crate) name: Option<String>,
    pub(crate) classname: Option<String>,
    pub(crate) time: Option<String>,
    pub(crate) timestamp: Option<String>,
    /// The `status` attribute, or failing that the `result` attribute.
    pub(crate) status: Option<String>,
    pub(crate) markers: Vec<Marker>,
    pub(crate) stdout: Vec<String>,
    pub(crate) stderr: Vec<String>,
    pub(crate) reruns: usize,
    /// Problems with the element itself, e.g. a missing attribute.
    pub(crate) anomalies: Vec<String>,
}

impl CaseElement {
    fn marker(&self, kind: MarkerKind) -> Option<&Marker> {
        self.markers.iter().find(|marker| marker.kind == kind)
    }
}

/// The rules used to classify a testcase, in the order they are evaluated.
pub(crate) static DETECTION_RULES: &[DetectionRule] = &[
    DetectionRule::ErrorElement,
    DetectionRule::FailureElement,
    DetectionRule::SkippedElement,
    DetectionRule::StatusAttribute,
    DetectionRule::Passed,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum DetectionRule {
    ErrorElement,
    FailureElement,
    SkippedElement,
    StatusAttribute,
    Passed,
}

/// The result of classifying a testcase.
#[derive(Clone, Debug)]
pub(crate) struct Detection<'a> {
    pub(crate) rule: DetectionRule,
    pub(crate) kind: OutcomeKind,
    /// The marker element the kind was derived from, if any.
    pub(crate) marker: Option<&'a Marker>,
}

impl DetectionRule {
    pub(crate) fn name(self) -> &'static str {
        match self {
            DetectionRule::ErrorElement => "error-element",
            DetectionRule::FailureElement => "failure-element",
            DetectionRule::SkippedElement => "skipped-element",
            DetectionRule::StatusAttribute => "status-attribute",
            DetectionRule::Passed => "passed",
        }
    }

    fn detect(self, case: &CaseElement) -> Option<Detection<'_>> {
        let from_marker = |marker_kind, kind| {
            case.marker(marker_kind).map(|marker| Detection {
                rule: self,
                kind,
                marker: Some(marker),
            })
        };

        match self {
            DetectionRule::ErrorElement => from_marker(MarkerKind::Error, OutcomeKind::Errored),
            DetectionRule::FailureElement => from_marker(MarkerKind::Failure, OutcomeKind::Failed),
            DetectionRule::SkippedElement => {
                from_marker(MarkerKind::Skipped, OutcomeKind::Skipped)
            }
            DetectionRule::StatusAttribute => case.status.as_deref().map(|status| Detection {
                rule: self,
                kind: status_kind(status),
                marker: None,
            }),
            DetectionRule::Passed => Some(Detection {
                rule: self,
                kind: OutcomeKind::Passed,
                marker: None,
            }),
        }
    }
}

/// Classifies a testcase: the first matching rule in [`DETECTION_RULES`] wins.
pub(crate) fn classify(case: &CaseElement) -> Detection<'_> {
    DETECTION_RULES
        .iter()
        .find_map(|rule| rule.detect(case))
        .unwrap_or(Detection {
            rule: DetectionRule::Passed,
            kind: OutcomeKind::Passed,
            marker: None,
        })
}

/// Maps the value of a `status` or `result` attribute to a kind.
pub fn status_kind(status: &str) -> OutcomeKind {
    match status.trim().to_ascii_lowercase().as_str() {
        "passed" | "pass" | "success" | "successful" | "ok" | "run" => OutcomeKind::Passed,
        "failed" | "failure" | "fail" => OutcomeKind::Failed,
        "error" | "errored" => OutcomeKind::Errored,
        "skipped" | "skip" | "disabled" | "ignored" | "notrun" | "not_run" => OutcomeKind::Skipped,
        _ => OutcomeKind::Inconclusive,
    }
}
