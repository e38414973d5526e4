// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use libc::SIGKILL;
use std::os::unix::process::CommandExt;

/// Pre-execution configuration on Unix.
///
/// This sets up just the process group ID.
pub(super) fn set_process_group(cmd: &mut std::process::Command) {
    cmd.process_group(0);
}

/// The process groups led by a started expression's children, so that processes started by the
/// JVM (such as forked test JVMs) go away with it.
#[derive(Debug)]
pub(super) struct ProcessTree {
    pgids: Vec<i32>,
}

impl ProcessTree {
    pub(super) fn attach(handle: &duct::Handle) -> Self {
        // Each child is the leader of its own process group, so its pid is also the group id.
        let pgids = handle
            .pids()
            .into_iter()
            .filter_map(|pid| i32::try_from(pid).ok())
            .collect();
        Self { pgids }
    }

    pub(super) fn kill(&self) {
        for &pgid in &self.pgids {
            unsafe {
                libc::kill(-pgid, SIGKILL);
            }
        }
    }
}
