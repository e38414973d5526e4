// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{ExpectedError, JvmTestExitCode, Result, output::OutputWriter};
use camino::Utf8PathBuf;
use clap::Args;
use jvm_runner::{
    compile::{CompileRequest, JavaCompiler},
    classpath::split_classpath,
    config::JvmTestConfig,
    helpers::plural,
    launcher::CancellationFlag,
};
use std::io::Write;

#[derive(Debug, Args)]
pub(super) struct CompileOpts {
    /// Java source files, or directories to search for them
    #[arg(required = true, value_name = "INPUTS")]
    inputs: Vec<Utf8PathBuf>,

    /// Directory the classes are written into
    #[arg(long, value_name = "DIR")]
    output: Utf8PathBuf,

    /// Classpath entries or globs [default: `compile.classpath` from the config]
    ///
    /// Entries may be separated with `;` or the platform's path separator, as with `javac -cp`.
    #[arg(long = "classpath", value_name = "ENTRIES")]
    classpath: Vec<String>,

    /// Argument for javac, replacing `compile.javac-args` from the config
    #[arg(long = "javac-arg", value_name = "ARG", allow_hyphen_values = true)]
    javac_args: Vec<String>,

    /// Directory javac's output is written into [default: parent of the output directory]
    #[arg(long, value_name = "DIR")]
    log_dir: Option<Utf8PathBuf>,
}

impl CompileOpts {
    pub(super) fn exec(self, config: &JvmTestConfig, output_writer: &mut OutputWriter) -> Result<i32> {
        let mut request = CompileRequest::new(self.inputs, self.output);
        request.classpath = self
            .classpath
            .iter()
            .flat_map(|entries| split_classpath(entries))
            .collect();
        request.javac_args = (!self.javac_args.is_empty()).then_some(self.javac_args);
        request.log_dir = self.log_dir;

        let outcome = JavaCompiler::new(config).compile(&request, &CancellationFlag::new())?;

        let mut writer = output_writer.stdout_writer();
        writeln!(
            writer,
            "compiled {} {} into {}",
            outcome.source_files.len(),
            plural::files_str(outcome.source_files.len()),
            outcome.output_dir,
        )
        .map_err(ExpectedError::write_output)?;
        writer.flush().map_err(ExpectedError::write_output)?;
        Ok(JvmTestExitCode::OK)
    }
}
