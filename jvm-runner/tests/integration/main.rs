// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Launcher and coverage tests against a fake JDK. The fake `java` is a shell script, so these
//! only run on Unix.

#[cfg(unix)]
mod coverage;
#[cfg(unix)]
mod fixtures;
#[cfg(unix)]
mod launcher;
