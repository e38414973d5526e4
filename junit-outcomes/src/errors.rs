// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

/// An error that occurs while reading a JUnit XML document.
///
/// This is distinct from a test failing: it means the document itself could not be read. Problems
/// with individual `<testcase>` elements are not reported as errors, but as inconclusive
/// outcomes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The file could not be read.
    #[error("failed to read JUnit XML file `{path}`")]
    Read {
        /// The path that was being read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },

    /// The document is not well-formed XML.
    #[error("JUnit XML{} is not well-formed (at byte {position})", DisplaySource(.path))]
    Malformed {
        /// The path of the document, if it was read from a file.
        path: Option<Utf8PathBuf>,

        /// The byte offset where the problem was detected.
        position: u64,

        /// The underlying error.
        #[source]
        err: quick_xml::Error,
    },

    /// The document ended before all elements were closed.
    #[error("JUnit XML{} ended with unclosed element `<{element}>`", DisplaySource(.path))]
    Unclosed {
        /// The path of the document, if it was read from a file.
        path: Option<Utf8PathBuf>,

        /// The innermost element that was not closed.
        element: String,
    },
}

impl ParseError {
    pub(crate) fn with_path(self, new_path: &camino::Utf8Path) -> Self {
        match self {
            Self::Malformed { position, err, .. } => Self::Malformed {
                path: Some(new_path.to_owned()),
                position,
                err,
            },
            Self::Unclosed { element, .. } => Self::Unclosed {
                path: Some(new_path.to_owned()),
                element,
            },
            other @ Self::Read { .. } => other,
        }
    }

    /// Returns the path of the document that failed to parse, if known.
    pub fn path(&self) -> Option<&camino::Utf8Path> {
        match self {
            Self::Read { path, .. } => Some(path),
            Self::Malformed { path, .. } | Self::Unclosed { path, .. } => path.as_deref(),
        }
    }
}

struct DisplaySource<'a>(&'a Option<Utf8PathBuf>);

impl fmt::Display for DisplaySource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(path) => write!(f, " file `{path}`"),
            None => Ok(()),
        }
    }
}
