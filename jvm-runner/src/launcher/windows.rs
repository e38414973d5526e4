// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use tracing::debug;
use win32job::{ExtendedLimitInfo, Job, JobError};
use windows_sys::Win32::{
    Foundation::CloseHandle,
    System::{
        JobObjects::TerminateJobObject,
        Threading::{OpenProcess, PROCESS_SET_QUOTA, PROCESS_TERMINATE},
    },
};

pub(super) fn set_process_group(_cmd: &mut std::process::Command) {
    // Descendants are tracked through a job object instead, see ProcessTree.
}

/// A job object holding a started expression's children. Processes they start later join the job
/// too, and terminating the job kills all of them.
pub(super) struct ProcessTree {
    job: Option<Job>,
}

impl ProcessTree {
    pub(super) fn attach(handle: &duct::Handle) -> Self {
        // Failing to set up the job only loses the descendants; the child itself is still killed
        // through the duct handle.
        let job = match create_job(handle) {
            Ok(job) => Some(job),
            Err(err) => {
                debug!("error assigning process to job object: {err}");
                None
            }
        };
        Self { job }
    }

    pub(super) fn kill(&self) {
        if let Some(job) = &self.job {
            // SAFETY: Win32 call, the job handle is owned by `job` and still open.
            unsafe {
                // Ignore the error here, it's likely due to the processes having exited.
                // Note: 1 is the exit code returned by Windows.
                _ = TerminateJobObject(job.handle() as _, 1);
            }
        }
    }
}

fn create_job(handle: &duct::Handle) -> Result<Job, JobError> {
    let job = Job::create_with_limit_info(ExtendedLimitInfo::new().limit_breakaway_ok())?;
    for pid in handle.pids() {
        // SAFETY: Win32 call, a failure is reported as a null handle.
        let process = unsafe { OpenProcess(PROCESS_SET_QUOTA | PROCESS_TERMINATE, 0, pid) };
        if process.is_null() {
            // The process has already exited.
            continue;
        }
        let assigned = job.assign_process(process as isize);
        // SAFETY: Win32 call, `process` was opened above and is closed exactly once.
        unsafe {
            CloseHandle(process);
        }
        assigned?;
    }
    Ok(job)
}
