// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs JUnit tests on the JVM, collects JaCoCo coverage and reads JUnit XML reports.
//!
//! The heavy lifting is done by the `junit-outcomes` and `jvm-runner` crates. This crate is the
//! command-line front end for them.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
