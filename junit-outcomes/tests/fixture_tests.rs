// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use chrono::DateTime;
use junit_outcomes::{
    Comparison, JAVA_FRAMEWORK_FRAMES_PATTERN, JunitXmlParser, OutcomeKind, OutcomeRecord,
    ParseError, ParserOptions, TimestampZone, parse_timestamp,
};
use pretty_assertions::assert_eq;
use regex::Regex;

fn fixture(name: &str) -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn java_parser() -> JunitXmlParser {
    JunitXmlParser::new(ParserOptions {
        exclude_details: Some(Regex::new(JAVA_FRAMEWORK_FRAMES_PATTERN).unwrap()),
        ..Default::default()
    })
}

fn find<'a>(outcomes: &'a [OutcomeRecord], name: &str) -> &'a OutcomeRecord {
    outcomes
        .iter()
        .find(|outcome| outcome.name == name)
        .unwrap_or_else(|| panic!("no outcome named {name}"))
}

#[test]
fn ant_junit4() {
    let report = java_parser()
        .parse_file(&fixture("ant-junit4.xml"))
        .expect("fixture parses");

    let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["shouldPass", "shouldFail", "shouldError", "shouldSkip"]);

    let suite = &report.suites[0];
    assert_eq!(suite.name, "myorg.mytest.JUnit4Tests");
    assert_eq!(suite.tests, Some(4));
    assert_eq!(suite.skipped, Some(1));
    assert_eq!(suite.stdout.as_deref(), Some("Hello from shouldPass"));
    assert_eq!(suite.stderr, None);
    assert_eq!(
        suite.properties.get("java.vendor").map(String::as_str),
        Some("AdoptOpenJDK")
    );
    assert!(!suite.is_junit_platform());
    assert_eq!(
        suite.timestamp,
        Some(DateTime::parse_from_rfc3339("2021-03-02T12:55:29Z").unwrap())
    );

    let passed = find(&report.outcomes, "shouldPass");
    assert_eq!(passed.id, "myorg.mytest.JUnit4Tests.shouldPass");
    assert_eq!(passed.kind, OutcomeKind::Passed);
    assert_eq!(passed.duration_secs, 0.001);
    assert_eq!(passed.timestamp, suite.timestamp);

    let failed = find(&report.outcomes, "shouldFail");
    assert_eq!(failed.kind, OutcomeKind::Failed);
    assert_eq!(failed.reason, "expected:<1> but was:<2>");
    assert_eq!(failed.outcome_type.as_deref(), Some("java.lang.AssertionError"));
    assert_eq!(failed.comparison, Some(Comparison::new("1", "2")));
    assert_eq!(failed.source_line, Some(18));
    assert_eq!(
        failed.details.as_deref(),
        Some(
            "java.lang.AssertionError: expected:<1> but was:<2>\n\
             \tat myorg.mytest.JUnit4Tests.shouldFail(JUnit4Tests.java:18)"
        )
    );

    let errored = find(&report.outcomes, "shouldError");
    assert_eq!(errored.kind, OutcomeKind::Errored);
    assert_eq!(errored.reason, "java.lang.RuntimeException: Simulated problem");
    assert_eq!(errored.source_line, Some(23));
    assert_eq!(
        errored.details.as_deref(),
        Some(
            "java.lang.RuntimeException: Simulated problem\n\
             \tat myorg.mytest.JUnit4Tests.shouldError(JUnit4Tests.java:23)"
        )
    );

    let skipped = find(&report.outcomes, "shouldSkip");
    assert_eq!(skipped.kind, OutcomeKind::Skipped);
    assert_eq!(skipped.reason, "Not implemented yet");
}

#[test]
fn junit5_jupiter() {
    let report = java_parser()
        .parse_file(&fixture("junit5-jupiter.xml"))
        .expect("fixture parses");
    assert_eq!(report.outcomes.len(), 3);

    let suite = &report.suites[0];
    assert!(suite.is_junit_platform());
    assert_eq!(suite.unique_id.as_deref(), Some("[engine:junit-jupiter]"));
    assert_eq!(suite.stdout, None);

    // The console launcher writes local time.
    let local = parse_timestamp("2021-03-02T12:55:29", TimestampZone::Local);
    assert_eq!(suite.timestamp, local);

    let passed = find(&report.outcomes, "shouldPass()");
    assert_eq!(passed.kind, OutcomeKind::Passed);
    assert_eq!(
        passed.unique_id.as_deref(),
        Some("[engine:junit-jupiter]/[class:myorg.mytest.JUnit5Tests]/[method:shouldPass()]")
    );
    assert_eq!(passed.display_name, None);
    assert_eq!(passed.stdout, None);
    assert_eq!(passed.timestamp, local);

    let failed = find(&report.outcomes, "shouldFail()");
    assert_eq!(failed.kind, OutcomeKind::Failed);
    assert_eq!(failed.id, "myorg.mytest.JUnit5Tests.shouldFail()");
    assert_eq!(failed.reason, "expected: <hello> but was: <world>");
    assert_eq!(failed.comparison, Some(Comparison::new("hello", "world")));
    assert_eq!(failed.display_name.as_deref(), Some("Fails with a friendly name"));
    assert_eq!(failed.stdout.as_deref(), Some("captured output"));
    assert_eq!(failed.source_line, Some(31));
    assert_eq!(
        failed.details.as_deref(),
        Some(
            "org.opentest4j.AssertionFailedError: expected: <hello> but was: <world>\n\
             \tat myorg.mytest.JUnit5Tests.shouldFail(JUnit5Tests.java:31)"
        )
    );

    let skipped = find(&report.outcomes, "shouldBeDisabled()");
    assert_eq!(skipped.kind, OutcomeKind::Skipped);
    assert_eq!(
        skipped.reason,
        "public void myorg.mytest.JUnit5Tests.shouldBeDisabled() is @Disabled"
    );
}

#[test]
fn nested_suites() {
    let parser = JunitXmlParser::new(ParserOptions {
        timestamp_local_time: Some(false),
        ..Default::default()
    });
    let report = parser
        .parse_file(&fixture("nested-suites.xml"))
        .expect("fixture parses");

    let ids: Vec<_> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, ["outer.inner.first", "outer.inner.second", "outer.third"]);

    let suite_names: Vec<_> = report.suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(suite_names, ["outer", "inner"]);

    let outer_timestamp = DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z").unwrap();
    assert_eq!(report.outcomes[0].timestamp, Some(outer_timestamp));
    assert_eq!(report.outcomes[1].kind, OutcomeKind::Failed);
    assert_eq!(report.outcomes[1].reason, r#"test status "failed""#);

    let third = &report.outcomes[2];
    assert_eq!(third.duration_secs, 1000.5);
    assert_eq!(
        third.timestamp.map(|t| t.timestamp()),
        Some(outer_timestamp.timestamp() + 30 * 60 - 60 * 60)
    );
}

#[test]
fn latin1_fallback() {
    let report = java_parser()
        .parse_file(&fixture("latin1.xml"))
        .expect("fixture parses");
    assert_eq!(report.outcomes[0].id, "myorg.Latin1Tests.café");
    assert_eq!(report.outcomes[0].duration_secs, 0.3);
}

#[test]
fn parse_files_reports_each_file() {
    let paths = [
        fixture("ant-junit4.xml"),
        fixture("mismatched-tags.xml"),
        fixture("does-not-exist.xml"),
    ];
    let results = java_parser().parse_files(&paths);
    assert_eq!(results.len(), 3);

    let (path, result) = &results[0];
    assert_eq!(path, &paths[0]);
    assert_eq!(result.as_ref().map(|r| r.outcomes.len()).ok(), Some(4));

    let (_, result) = &results[1];
    let err = result.as_ref().expect_err("mismatched tags are an error");
    assert!(matches!(err, ParseError::Malformed { .. }), "{err:?}");
    assert_eq!(err.path(), Some(paths[1].as_path()));
    assert!(err.to_string().contains("mismatched-tags.xml"), "{err}");

    let (_, result) = &results[2];
    let err = result.as_ref().expect_err("missing file is an error");
    assert!(matches!(err, ParseError::Read { .. }), "{err:?}");
}

#[test]
fn parser_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<JunitXmlParser>();

    let parser = java_parser();
    let path = fixture("ant-junit4.xml");
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| parser.parse_file(&path).expect("fixture parses")))
            .collect();
        let reports: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread did not panic"))
            .collect();
        assert!(reports.windows(2).all(|pair| pair[0] == pair[1]));
    });
}
