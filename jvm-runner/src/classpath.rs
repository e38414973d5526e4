// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classpath construction.
//!
//! Classpath entries may be glob patterns such as `lib/*.jar`. Patterns are expanded against the
//! filesystem when the classpath is resolved, and a pattern that matches nothing is an error since
//! it almost always indicates a missing build step.

use crate::{errors::ClasspathError, helpers::resolve_path};
use camino::{Utf8Path, Utf8PathBuf};
use globset::GlobBuilder;
use itertools::Itertools;
use std::fmt;
use tracing::debug;
use walkdir::WalkDir;

/// The separator between classpath entries on this platform.
pub const CLASSPATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Splits a classpath string into entries.
///
/// If the string contains `;` it is split on that (this allows a portable classpath to be written
/// in configuration files); otherwise it is split on newlines and the platform's separator.
/// Surrounding whitespace is removed and empty entries are dropped.
pub fn split_classpath(classpath: &str) -> Vec<String> {
    let entries: Vec<&str> = if classpath.contains(';') {
        classpath.split(';').collect()
    } else {
        classpath
            .lines()
            .flat_map(|line| line.split(CLASSPATH_SEPARATOR))
            .collect()
    };
    entries
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

/// A resolved classpath, with every pattern expanded.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Classpath {
    entries: Vec<Utf8PathBuf>,
}

impl Classpath {
    /// Creates an empty classpath.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves classpath entries relative to `base_dir`, expanding glob patterns.
    pub fn resolve<I, S>(entries: I, base_dir: &Utf8Path) -> Result<Self, ClasspathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classpath = Self::new();
        for entry in entries {
            for path in expand_pattern(entry.as_ref(), base_dir)? {
                classpath.push(path);
            }
        }
        Ok(classpath)
    }

    /// Adds an entry to the end of the classpath, unless it's already present.
    pub fn push(&mut self, entry: impl Into<Utf8PathBuf>) {
        let entry = entry.into();
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// Adds every entry of `other` to the end of this classpath.
    pub fn extend(&mut self, other: &Classpath) {
        for entry in &other.entries {
            self.push(entry.clone());
        }
    }

    /// Returns the entries.
    pub fn entries(&self) -> &[Utf8PathBuf] {
        &self.entries
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the first jar whose file name starts with `prefix` and ends with `.jar`.
    pub fn find_jar(&self, prefix: &str) -> Option<&Utf8Path> {
        self.entries
            .iter()
            .find(|entry| {
                entry
                    .file_name()
                    .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".jar"))
            })
            .map(|entry| entry.as_path())
    }

    /// Returns the first entry whose file name contains `needle`.
    pub fn find_containing(&self, needle: &str) -> Option<&Utf8Path> {
        self.entries
            .iter()
            .find(|entry| entry.file_name().is_some_and(|name| name.contains(needle)))
            .map(|entry| entry.as_path())
    }

    /// Returns the classpath as a single string, joined with [`CLASSPATH_SEPARATOR`].
    pub fn to_arg(&self) -> String {
        self.entries.iter().join(&CLASSPATH_SEPARATOR.to_string())
    }
}

impl fmt::Display for Classpath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_arg())
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Expands a single classpath entry, returning matches in sorted order.
///
/// Entries without glob metacharacters are returned as-is, without checking that they exist.
pub fn expand_pattern(pattern: &str, base_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, ClasspathError> {
    let path = resolve_path(base_dir, Utf8Path::new(pattern));
    if !is_glob(pattern) {
        return Ok(vec![path]);
    }

    // Walk from the deepest directory that doesn't contain a metacharacter.
    let mut root = Utf8PathBuf::new();
    let mut rest = Vec::new();
    for component in path.components() {
        if rest.is_empty() && !is_glob(component.as_str()) {
            root.push(component);
        } else {
            rest.push(component.as_str());
        }
    }
    let rel_pattern = rest.join("/");
    let matcher = GlobBuilder::new(&rel_pattern)
        .literal_separator(true)
        .backslash_escape(false)
        .build()
        .map_err(|err| ClasspathError::InvalidGlob {
            pattern: pattern.to_owned(),
            err,
        })?
        .compile_matcher();

    let mut walker = WalkDir::new(&root).min_depth(1).follow_links(true);
    if !rel_pattern.contains("**") {
        walker = walker.max_depth(rest.len());
    }

    let mut matches = Vec::new();
    if root.is_dir() {
        for entry in walker {
            let entry = entry.map_err(|err| ClasspathError::ReadDir {
                path: root.clone(),
                err,
            })?;
            let entry_path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
                ClasspathError::NonUtf8Path {
                    path: entry.path().to_owned(),
                }
            })?;
            let Ok(rel_path) = entry_path.strip_prefix(&root) else {
                continue;
            };
            let rel_path = rel_path.components().map(|c| c.as_str()).join("/");
            if matcher.is_match(&rel_path) {
                matches.push(entry_path.to_owned());
            }
        }
    }

    if matches.is_empty() {
        return Err(ClasspathError::NoMatches {
            pattern: pattern.to_owned(),
        });
    }
    matches.sort();
    debug!(
        "classpath pattern {pattern} matched {} {}",
        matches.len(),
        crate::helpers::plural::files_str(matches.len())
    );
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    fn touch(dir: &Utf8Path, rel: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn split() {
        assert_eq!(split_classpath("a.jar; b.jar ;;c"), ["a.jar", "b.jar", "c"]);
        assert_eq!(split_classpath("a.jar\n\n  b.jar\n"), ["a.jar", "b.jar"]);
        #[cfg(unix)]
        assert_eq!(split_classpath("a.jar:b.jar\nc.jar"), ["a.jar", "b.jar", "c.jar"]);
    }

    #[test]
    fn expands_patterns() {
        let dir = Utf8TempDir::new().unwrap();
        touch(dir.path(), "lib/b.jar");
        touch(dir.path(), "lib/a.jar");
        touch(dir.path(), "lib/readme.txt");
        touch(dir.path(), "lib/nested/c.jar");

        let matches = expand_pattern("lib/*.jar", dir.path()).unwrap();
        assert_eq!(matches, [dir.path().join("lib/a.jar"), dir.path().join("lib/b.jar")]);

        let matches = expand_pattern("lib/**/*.jar", dir.path()).unwrap();
        assert_eq!(matches.len(), 3);

        let literal = expand_pattern("classes", dir.path()).unwrap();
        assert_eq!(literal, [dir.path().join("classes")]);

        let err = expand_pattern("missing/*.jar", dir.path()).unwrap_err();
        assert!(matches!(err, ClasspathError::NoMatches { .. }), "{err:?}");
    }

    #[test]
    fn resolve_and_find() {
        let dir = Utf8TempDir::new().unwrap();
        touch(dir.path(), "jacoco/jacocoagent.jar");
        touch(dir.path(), "jacoco/jacococli-0.8.11.jar");
        touch(dir.path(), "junit/junit-platform-console-standalone-1.10.0.jar");

        let classpath =
            Classpath::resolve(["jacoco/*.jar", "junit/*.jar", "jacoco/*.jar"], dir.path()).unwrap();
        assert_eq!(classpath.entries().len(), 3);
        assert_eq!(
            classpath.find_jar("jacococli").map(|p| p.file_name()),
            Some(Some("jacococli-0.8.11.jar"))
        );
        assert!(classpath.find_jar("jacocoagent").is_some());
        assert!(
            classpath
                .find_containing("junit-platform-console-standalone")
                .is_some()
        );
        assert!(classpath.find_jar("missing").is_none());

        let arg = classpath.to_arg();
        assert_eq!(arg.matches(CLASSPATH_SEPARATOR).count(), 2);
    }
}
