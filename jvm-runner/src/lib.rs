// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for jvmtest: launching JVM programs and JUnit runs, collecting JaCoCo
//! coverage, and turning JUnit XML reports into verdicts.
//!
//! The usual flow is:
//!
//! 1. Read a [`config::JvmTestConfig`].
//! 2. Optionally [`compile`] the test sources, and [discover](descriptor::discover_test_classes)
//!    one [`descriptor::JunitDescriptor`] per test class.
//! 3. Run each descriptor with [`launcher::JvmLauncher::run_junit`], each with its own
//!    [`session::SessionId`]. Runs may happen concurrently.
//! 4. Aggregate the parsed reports with [`reports::VerdictAggregator`].
//! 5. Once every JVM has exited, produce the coverage report with
//!    [`coverage::CoverageBuilder::finalize`].

pub mod classpath;
pub mod compile;
pub mod config;
pub mod coverage;
pub mod descriptor;
pub mod errors;
pub mod helpers;
pub mod launcher;
pub mod reports;
pub mod session;
mod time;
