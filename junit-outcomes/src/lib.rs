// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Read JUnit XML reports written by Java test runners into a normalized set of outcomes.
//!
//! JUnit XML is less a format than a family of dialects: Ant's JUnit task, JUnit 4 runners and the
//! JUnit 5 console launcher all nest suites differently, signal status differently and disagree
//! about timestamps. [`JunitXmlParser`] accepts all of them and produces one [`OutcomeRecord`] per
//! `<testcase>` element.
//!
//! ```
//! use junit_outcomes::{JunitXmlParser, OutcomeKind, ParserOptions};
//!
//! let parser = JunitXmlParser::new(ParserOptions::default());
//! let report = parser
//!     .parse_str(r#"<testsuite name="s"><testcase name="t" classname="C" time="0.5"/></testsuite>"#)
//!     .unwrap();
//! assert_eq!(report.outcomes[0].id, "C.t");
//! assert_eq!(report.outcomes[0].kind, OutcomeKind::Passed);
//! ```

mod details;
mod dialect;
mod errors;
mod outcome;
mod parse;
mod timestamp;

pub use details::{DEFAULT_MAX_DETAIL_LINES, DetailFilter, JAVA_FRAMEWORK_FRAMES_PATTERN};
pub use dialect::status_kind;
pub use errors::ParseError;
pub use outcome::*;
pub use parse::{JunitXmlParser, ParserOptions};
pub use timestamp::{TimestampZone, parse_timestamp};
