// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `-javaagent` argument for the JaCoCo agent.
//!
//! The agent receives its options as a single string, `key=value` pairs joined by commas. JaCoCo
//! splits that string at every comma that is followed by an identifier and `=`, so a value
//! containing such a sequence can't be passed through. Commas elsewhere in values (for example in
//! a path) are fine.

use crate::errors::CoverageError;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

const JAVAAGENT_PREFIX: &str = "-javaagent:";

static OPTION_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(",[A-Za-z0-9_-]+=").expect("option boundary regex is valid"));

static OPTION_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Za-z0-9_-]+$").expect("option key regex is valid"));

/// A parsed `-javaagent` argument.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AgentArg {
    /// The agent jar.
    pub agent_jar: Utf8PathBuf,

    /// The agent options, in order.
    pub options: IndexMap<String, String>,
}

impl AgentArg {
    /// Returns the `destfile` option.
    pub fn dest_file(&self) -> Option<&Utf8Path> {
        self.options.get("destfile").map(|dest| Utf8Path::new(dest))
    }

    /// Returns the `sessionid` option.
    pub fn session_id(&self) -> Option<&str> {
        self.options.get("sessionid").map(String::as_str)
    }
}

/// Builds a `-javaagent` argument, rejecting anything the agent would misread.
pub(crate) fn format_agent_arg<'a>(
    agent_jar: &Utf8Path,
    options: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<String, CoverageError> {
    if agent_jar.as_str().contains('=') {
        return Err(CoverageError::AgentPathHasEquals {
            path: agent_jar.to_owned(),
        });
    }

    let mut arg = format!("{JAVAAGENT_PREFIX}{agent_jar}");
    for (index, (key, value)) in options.into_iter().enumerate() {
        if !OPTION_KEY.is_match(key) {
            return Err(CoverageError::UnrepresentableOption {
                key: key.to_owned(),
                value: value.to_owned(),
                reason: "keys may only contain letters, digits, `-` and `_`",
            });
        }
        if OPTION_BOUNDARY.is_match(value) {
            return Err(CoverageError::UnrepresentableOption {
                key: key.to_owned(),
                value: value.to_owned(),
                reason: "the value contains a comma followed by `name=`",
            });
        }
        arg.push(if index == 0 { '=' } else { ',' });
        arg.push_str(key);
        arg.push('=');
        arg.push_str(value);
    }
    Ok(arg)
}

/// Parses a `-javaagent` argument the way the JaCoCo agent would.
pub fn parse_agent_jvm_arg(arg: &str) -> Result<AgentArg, CoverageError> {
    let malformed = |reason| CoverageError::MalformedAgentArg {
        arg: arg.to_owned(),
        reason,
    };

    let rest = arg
        .strip_prefix(JAVAAGENT_PREFIX)
        .ok_or_else(|| malformed("does not start with `-javaagent:`"))?;
    let (agent_jar, options_str) = match rest.split_once('=') {
        Some((agent_jar, options)) => (agent_jar, Some(options)),
        None => (rest, None),
    };
    if agent_jar.is_empty() {
        return Err(malformed("no agent jar"));
    }

    let mut options = IndexMap::new();
    if let Some(options_str) = options_str {
        // Split at every boundary, keeping the leading comma out of the next option.
        let mut starts: Vec<usize> = vec![0];
        starts.extend(OPTION_BOUNDARY.find_iter(options_str).map(|m| m.start() + 1));
        let ends = starts
            .iter()
            .skip(1)
            .map(|start| start - 1)
            .chain(std::iter::once(options_str.len()));

        for (start, end) in starts.iter().copied().zip(ends) {
            let option = &options_str[start..end];
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| malformed("option without `=`"))?;
            options.insert(key.to_owned(), value.to_owned());
        }
    }

    Ok(AgentArg {
        agent_jar: agent_jar.into(),
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn format_and_parse() {
        let arg = format_agent_arg(
            Utf8Path::new("/opt/jacoco/jacocoagent.jar"),
            [
                ("destfile", "/tmp/cov,v1/NestedTest.4000.javacoverage"),
                ("sessionid", "NestedTest.4000"),
                ("includes", "myorg.*"),
            ],
        )
        .unwrap();
        assert_eq!(
            arg,
            "-javaagent:/opt/jacoco/jacocoagent.jar=destfile=/tmp/cov,v1/NestedTest.4000.javacoverage,\
             sessionid=NestedTest.4000,includes=myorg.*"
        );

        let parsed = parse_agent_jvm_arg(&arg).unwrap();
        assert_eq!(parsed.agent_jar, "/opt/jacoco/jacocoagent.jar");
        assert_eq!(
            parsed.dest_file(),
            Some(Utf8Path::new("/tmp/cov,v1/NestedTest.4000.javacoverage"))
        );
        assert_eq!(parsed.session_id(), Some("NestedTest.4000"));
        assert_eq!(parsed.options.get("includes").map(String::as_str), Some("myorg.*"));
    }

    #[test]
    fn no_options() {
        let parsed = parse_agent_jvm_arg("-javaagent:agent.jar").unwrap();
        assert_eq!(parsed.agent_jar, "agent.jar");
        assert!(parsed.options.is_empty());
    }

    #[test]
    fn rejects_equals_in_agent_path() {
        let err = format_agent_arg(Utf8Path::new("/opt/a=b/jacocoagent.jar"), []).unwrap_err();
        assert!(matches!(err, CoverageError::AgentPathHasEquals { .. }), "{err:?}");
    }

    #[test_case("includes", "a,excludes=b" ; "value splits")]
    #[test_case("bad key", "x" ; "invalid key")]
    fn rejects_unrepresentable(key: &str, value: &str) {
        let err = format_agent_arg(Utf8Path::new("agent.jar"), [(key, value)]).unwrap_err();
        assert!(matches!(err, CoverageError::UnrepresentableOption { .. }), "{err:?}");
    }

    #[test_case("-agentlib:foo" ; "wrong prefix")]
    #[test_case("-javaagent:=destfile=x" ; "empty jar")]
    #[test_case("-javaagent:agent.jar=destfile" ; "missing value")]
    fn malformed(arg: &str) {
        let err = parse_agent_jvm_arg(arg).unwrap_err();
        assert!(matches!(err, CoverageError::MalformedAgentArg { .. }), "{err:?}");
    }
}
