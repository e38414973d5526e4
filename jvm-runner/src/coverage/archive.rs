// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{errors::ArchiveError, helpers::convert_rel_path_to_forward_slash};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    io::{self, BufWriter, Write},
    time::Instant,
};
use tracing::info;
use zstd::Encoder;

const ZSTD_LEVEL: i32 = 3;

/// Archives a coverage report directory to the given file.
///
/// The output file is a Zstandard-compressed tarball (`.tar.zst`), written atomically: readers
/// never observe a partially written archive. Entries are stored under the report directory's own
/// name. Returns the number of entries written.
pub fn archive_report_dir(
    report_dir: &Utf8Path,
    output_file: &Utf8Path,
) -> Result<usize, ArchiveError> {
    if !output_file.as_str().ends_with(".tar.zst") {
        return Err(ArchiveError::UnsupportedExtension {
            path: output_file.to_owned(),
        });
    }

    let file = AtomicFile::new(output_file, OverwriteBehavior::AllowOverwrite);
    let start_time = Instant::now();
    let base_name = Utf8Path::new(report_dir.file_name().unwrap_or("coverage-report"));

    let file_count = file
        .write(|file| {
            let archiver = Archiver::new(output_file, file)?;
            let (_, file_count) = archiver.archive(base_name, report_dir)?;
            Ok(file_count)
        })
        .map_err(|err| match err {
            atomicwrites::Error::Internal(error) => ArchiveError::OutputArchiveIo {
                path: output_file.to_owned(),
                error,
            },
            atomicwrites::Error::User(err) => err,
        })?;

    info!(
        "archived {file_count} coverage report entries to {output_file} in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(file_count)
}

/// Removes the report directory after it has been archived.
pub(super) fn remove_report_dir(report_dir: &Utf8Path) -> Result<(), ArchiveError> {
    std::fs::remove_dir_all(report_dir).map_err(|error| ArchiveError::RemoveReportDir {
        path: report_dir.to_owned(),
        error,
    })
}

struct Archiver<'a, W: Write> {
    output_file: &'a Utf8Path,
    builder: tar::Builder<Encoder<'static, BufWriter<W>>>,
    file_count: usize,
}

impl<'a, W: Write> Archiver<'a, W> {
    fn new(output_file: &'a Utf8Path, writer: W) -> Result<Self, ArchiveError> {
        let buf_writer = BufWriter::new(writer);
        let mut encoder = zstd::Encoder::new(buf_writer, ZSTD_LEVEL)
            .map_err(|error| Self::output_error(output_file, error))?;
        encoder
            .include_checksum(true)
            .map_err(|error| Self::output_error(output_file, error))?;
        let builder = tar::Builder::new(encoder);

        Ok(Self {
            output_file,
            builder,
            file_count: 0,
        })
    }

    fn archive(
        mut self,
        rel_path: &Utf8Path,
        src_path: &Utf8Path,
    ) -> Result<(W, usize), ArchiveError> {
        self.append_dir_all(rel_path, src_path)?;

        // Finish writing the archive.
        let encoder = self
            .builder
            .into_inner()
            .map_err(|error| Self::output_error(self.output_file, error))?;
        // Finish writing the zstd stream.
        let buf_writer = encoder
            .finish()
            .map_err(|error| Self::output_error(self.output_file, error))?;
        let writer = buf_writer
            .into_inner()
            .map_err(|err| Self::output_error(self.output_file, err.into_error()))?;

        Ok((writer, self.file_count))
    }

    fn output_error(output_file: &Utf8Path, error: io::Error) -> ArchiveError {
        ArchiveError::OutputArchiveIo {
            path: output_file.to_owned(),
            error,
        }
    }

    // Adapted from tar-rs's source, with tracking for file counts.
    fn append_dir_all(&mut self, rel_path: &Utf8Path, src_path: &Utf8Path) -> Result<(), ArchiveError> {
        let mut stack: Vec<(Utf8PathBuf, bool)> = vec![(src_path.to_path_buf(), true)];

        while let Some((src, is_dir)) = stack.pop() {
            let input_error = |error| ArchiveError::InputFileRead {
                path: src.clone(),
                is_dir: Some(is_dir),
                error,
            };
            let dest = match src.strip_prefix(src_path) {
                Ok(suffix) => convert_rel_path_to_forward_slash(&rel_path.join(suffix)),
                Err(_) => continue,
            };
            if is_dir {
                for entry in src.read_dir_utf8().map_err(input_error)? {
                    let entry = entry.map_err(input_error)?;
                    let file_type = entry.file_type().map_err(input_error)?;
                    stack.push((entry.into_path(), file_type.is_dir()));
                }
                self.builder
                    .append_dir(&dest, &src)
                    .map_err(|error| Self::output_error(self.output_file, error))?;
            } else {
                self.builder
                    .append_path_with_name(&src, &dest)
                    .map_err(input_error)?;
            }
            self.file_count += 1;
        }

        Ok(())
    }
}
