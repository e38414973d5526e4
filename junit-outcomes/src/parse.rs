// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    details::{DEFAULT_MAX_DETAIL_LINES, DetailFilter},
    dialect::{self, CaseElement, Marker, MarkerKind},
    errors::ParseError,
    outcome::{Comparison, OutcomeKind, OutcomeRecord, ParsedReport, SuiteInfo, clean_text},
    timestamp::{TimestampZone, parse_timestamp},
};
use camino::{Utf8Path, Utf8PathBuf};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use regex::Regex;
use std::{borrow::Cow, fs, sync::LazyLock};
use tracing::debug;

static COMPARISON_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^expected: ?<(.*)> but was: ?<(.*)>$").expect("comparison regex is valid")
});

static GROUPED_DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}(,\d{3})+(\.\d+)?$").expect("grouped duration regex is valid")
});

/// Options controlling how JUnit XML is turned into outcomes.
#[derive(Clone, Debug)]
pub struct ParserOptions {
    /// The separator placed between the qualifier and the name of a test. Defaults to `.`.
    pub separator: String,

    /// A pattern matched against the start of each identifier; the matched text is removed.
    pub id_prefix: Option<Regex>,

    /// Whether timestamps without a zone are in local time (`Some(true)`) or UTC
    /// (`Some(false)`).
    ///
    /// If `None`, the zone is chosen from the suite name: the JUnit 5 console launcher writes local
    /// time, while Ant writes UTC.
    pub timestamp_local_time: Option<bool>,

    /// Lines of outcome details matching this pattern are dropped.
    ///
    /// [`JAVA_FRAMEWORK_FRAMES_PATTERN`](crate::JAVA_FRAMEWORK_FRAMES_PATTERN) is a good choice for
    /// Java stack traces.
    pub exclude_details: Option<Regex>,

    /// The maximum number of detail lines to keep. Ignored if `full_details` is set.
    pub max_detail_lines: usize,

    /// Keep every detail line, and also retain the unfiltered details.
    pub full_details: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            separator: ".".to_owned(),
            id_prefix: None,
            timestamp_local_time: None,
            exclude_details: None,
            max_detail_lines: DEFAULT_MAX_DETAIL_LINES,
            full_details: false,
        }
    }
}

/// Parses JUnit XML documents written by Ant, JUnit 4 and the JUnit 5 console launcher (among
/// others) into [`OutcomeRecord`]s.
///
/// A parser holds no state besides its options, so one instance can be shared between threads.
#[derive(Clone, Debug)]
pub struct JunitXmlParser {
    options: ParserOptions,
    filter: DetailFilter,
}

impl JunitXmlParser {
    /// Creates a new parser.
    pub fn new(options: ParserOptions) -> Self {
        let mut filter = DetailFilter::new();
        if let Some(exclude) = &options.exclude_details {
            filter.set_exclude_lines(exclude.clone());
        }
        filter.set_max_lines((!options.full_details).then_some(options.max_detail_lines));
        Self { options, filter }
    }

    /// Returns the options this parser was created with.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parses a JUnit XML file.
    pub fn parse_file(&self, path: &Utf8Path) -> Result<ParsedReport, ParseError> {
        let bytes = fs::read(path).map_err(|err| ParseError::Read {
            path: path.to_owned(),
            err,
        })?;
        debug!("parsing JUnit XML file {path} ({} bytes)", bytes.len());
        self.parse_bytes(&bytes).map_err(|err| err.with_path(path))
    }

    /// Parses several files. Each file gets its own result, so a malformed file doesn't prevent
    /// the others from being read.
    pub fn parse_files<I, P>(&self, paths: I) -> Vec<(Utf8PathBuf, Result<ParsedReport, ParseError>)>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        paths
            .into_iter()
            .map(|path| {
                let path = path.as_ref();
                (path.to_owned(), self.parse_file(path))
            })
            .collect()
    }

    /// Parses raw bytes.
    ///
    /// A leading byte order mark is skipped. Input that isn't valid UTF-8 is decoded as Latin-1,
    /// whatever the XML declaration says.
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<ParsedReport, ParseError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => {
                debug!("JUnit XML is not valid UTF-8, decoding as Latin-1");
                Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())
            }
        };
        self.parse_str(&text)
    }

    /// Parses a document held in memory.
    pub fn parse_str(&self, text: &str) -> Result<ParsedReport, ParseError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = Reader::from_str(text);
        let mut state = DocumentState::new(self);

        loop {
            let event = reader.read_event().map_err(|err| ParseError::Malformed {
                path: None,
                position: reader.buffer_position() as u64,
                err,
            })?;
            match event {
                Event::Start(start) => {
                    let name = element_name(&start);
                    state.open(&name, &start, false);
                    state.open_elements.push(name);
                }
                Event::Empty(start) => {
                    let name = element_name(&start);
                    state.open(&name, &start, true);
                }
                Event::End(_) => {
                    // quick-xml has already checked that the end tag matches.
                    if let Some(name) = state.open_elements.pop() {
                        state.close(&name);
                    }
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned().into());
                    state.text(&text);
                }
                Event::CData(cdata) => {
                    state.text(&String::from_utf8_lossy(&cdata.into_inner()));
                }
                Event::Eof => break,
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            }
        }

        if let Some(element) = state.open_elements.pop() {
            return Err(ParseError::Unclosed {
                path: None,
                element,
            });
        }

        debug!(
            "parsed {} testcase(s) in {} testsuite(s)",
            state.report.outcomes.len(),
            state.report.suites.len()
        );
        Ok(state.report)
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

/// Reads every attribute of an element.
///
/// Attributes that come after a syntax error are lost, and the error is returned alongside.
fn read_attributes(start: &BytesStart<'_>) -> (Vec<(String, String)>, Option<String>) {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = match attribute {
            Ok(attribute) => attribute,
            Err(err) => return (attributes, Some(err.to_string())),
        };
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = match attribute.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attribute.value).into_owned(),
        };
        attributes.push((key, value));
    }
    (attributes, None)
}

struct SuiteFrame {
    index: usize,
    name: String,
    timestamp: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Capture {
    Marker,
    CaseStdout,
    CaseStderr,
    SuiteStdout,
    SuiteStderr,
}

struct DocumentState<'p> {
    parser: &'p JunitXmlParser,
    report: ParsedReport,
    open_elements: Vec<String>,
    suites: Vec<SuiteFrame>,
    case: Option<CaseElement>,
    marker: Option<Marker>,
    capture: Option<(Capture, String)>,
    /// Set while inside an element whose contents are skipped, to the depth of that element.
    ignore_depth: Option<usize>,
}

impl<'p> DocumentState<'p> {
    fn new(parser: &'p JunitXmlParser) -> Self {
        Self {
            parser,
            report: ParsedReport::default(),
            open_elements: Vec::new(),
            suites: Vec::new(),
            case: None,
            marker: None,
            capture: None,
            ignore_depth: None,
        }
    }

    fn open(&mut self, name: &str, start: &BytesStart<'_>, empty: bool) {
        if self.ignore_depth.is_some() {
            return;
        }

        if let Some(case) = &mut self.case {
            if let Some(kind) = MarkerKind::from_element_name(name) {
                let (attributes, error) = read_attributes(start);
                if let Some(error) = error {
                    case.anomalies
                        .push(format!("malformed attribute on <{name}>: {error}"));
                }
                let mut marker = Marker {
                    kind,
                    ..Default::default()
                };
                for (key, value) in attributes {
                    match key.as_str() {
                        "message" => marker.message = Some(value),
                        "type" => marker.ty = Some(value),
                        _ => {}
                    }
                }
                if empty {
                    case.markers.push(marker);
                } else {
                    self.marker = Some(marker);
                    self.capture = Some((Capture::Marker, String::new()));
                }
            } else if dialect::is_rerun_element(name) {
                case.reruns += 1;
                if !empty {
                    self.ignore_depth = Some(self.open_elements.len());
                }
            } else if !empty {
                match name {
                    "system-out" => self.capture = Some((Capture::CaseStdout, String::new())),
                    "system-err" => self.capture = Some((Capture::CaseStderr, String::new())),
                    _ => {}
                }
            }
            return;
        }

        match name {
            "testsuite" => self.open_suite(start, empty),
            "testcase" => {
                let case = self.read_case(start);
                if empty {
                    self.finish_case(case);
                } else {
                    self.case = Some(case);
                }
            }
            "property" => {
                let (attributes, _) = read_attributes(start);
                let mut name = None;
                let mut value = None;
                for (key, attr_value) in attributes {
                    match key.as_str() {
                        "name" => name = Some(attr_value),
                        "value" => value = Some(attr_value),
                        _ => {}
                    }
                }
                if let (Some(frame), Some(name)) = (self.suites.last(), name) {
                    self.report.suites[frame.index]
                        .properties
                        .insert(name, value.unwrap_or_default());
                }
            }
            "system-out" if !empty && !self.suites.is_empty() => {
                self.capture = Some((Capture::SuiteStdout, String::new()));
            }
            "system-err" if !empty && !self.suites.is_empty() => {
                self.capture = Some((Capture::SuiteStderr, String::new()));
            }
            _ => {}
        }
    }

    fn open_suite(&mut self, start: &BytesStart<'_>, empty: bool) {
        let (attributes, error) = read_attributes(start);
        if let Some(error) = error {
            debug!("ignoring malformed testsuite attribute: {error}");
        }

        let mut info = SuiteInfo::default();
        let mut raw_timestamp = None;
        let count = |value: &str| value.trim().parse::<usize>().ok();
        for (key, value) in attributes {
            match key.as_str() {
                "name" => info.name = value,
                "tests" => info.tests = count(&value),
                "failures" => info.failures = count(&value),
                "errors" | "aborted" => info.errors = count(&value),
                "skipped" => info.skipped = count(&value),
                "time" => {
                    info.duration_secs = parse_duration(&value).unwrap_or_default();
                }
                "timestamp" => raw_timestamp = Some(value),
                _ => {
                    info.extra.insert(key, value);
                }
            }
        }

        if let Some(raw) = &raw_timestamp {
            info.timestamp = parse_timestamp(raw, self.zone_for(&info.name));
        }

        let index = self.report.suites.len();
        let frame = SuiteFrame {
            index,
            name: info.name.clone(),
            timestamp: raw_timestamp,
        };
        self.report.suites.push(info);
        if !empty {
            self.suites.push(frame);
        }
    }

    fn read_case(&self, start: &BytesStart<'_>) -> CaseElement {
        let (attributes, error) = read_attributes(start);
        let mut case = CaseElement::default();
        if let Some(error) = error {
            case.anomalies
                .push(format!("malformed testcase attribute: {error}"));
        }

        let mut result = None;
        for (key, value) in attributes {
            match key.as_str() {
                "name" => case.name = Some(value),
                "classname" => case.classname = Some(value),
                "time" => case.time = Some(value),
                "timestamp" => case.timestamp = Some(value),
                "status" => case.status = Some(value),
                "result" => result = Some(value),
                _ => {}
            }
        }
        if case.status.is_none() {
            case.status = result;
        }
        case
    }

    fn text(&mut self, text: &str) {
        if let Some((_, buf)) = &mut self.capture {
            buf.push_str(text);
        }
    }

    fn close(&mut self, name: &str) {
        if let Some(depth) = self.ignore_depth {
            if self.open_elements.len() == depth {
                self.ignore_depth = None;
            }
            return;
        }

        if let Some(case) = &mut self.case {
            if let Some(kind) = MarkerKind::from_element_name(name) {
                if let Some(mut marker) = self.marker.take().filter(|marker| marker.kind == kind) {
                    if let Some((Capture::Marker, text)) = self.capture.take() {
                        marker.text = text;
                    }
                    case.markers.push(marker);
                }
                return;
            }
            match name {
                "system-out" | "system-err" => {
                    match self.capture.take() {
                        Some((Capture::CaseStdout, text)) => case.stdout.push(text),
                        Some((Capture::CaseStderr, text)) => case.stderr.push(text),
                        other => self.capture = other,
                    }
                    return;
                }
                "testcase" => {
                    if let Some(case) = self.case.take() {
                        self.finish_case(case);
                    }
                    return;
                }
                _ => return,
            }
        }

        match name {
            "testsuite" => {
                self.suites.pop();
            }
            "system-out" | "system-err" => {
                let Some(frame) = self.suites.last() else {
                    return;
                };
                let suite = &mut self.report.suites[frame.index];
                match self.capture.take() {
                    Some((Capture::SuiteStdout, text)) => {
                        let (metadata, rest) = split_platform_metadata(&text);
                        if let Some(metadata) = metadata {
                            suite.unique_id = Some(metadata.unique_id);
                        }
                        append_output(&mut suite.stdout, &rest);
                    }
                    Some((Capture::SuiteStderr, text)) => append_output(&mut suite.stderr, &text),
                    other => self.capture = other,
                }
            }
            _ => {}
        }
    }

    fn zone_for(&self, innermost_suite: &str) -> TimestampZone {
        match self.parser.options.timestamp_local_time {
            Some(is_local_time) => TimestampZone::from_is_local_time(is_local_time),
            None => {
                let is_local = std::iter::once(innermost_suite)
                    .chain(self.suites.iter().map(|frame| frame.name.as_str()))
                    .any(|name| TimestampZone::for_suite(name) == TimestampZone::Local);
                TimestampZone::from_is_local_time(is_local)
            }
        }
    }

    fn finish_case(&mut self, mut case: CaseElement) {
        let parser = self.parser;
        let options = &parser.options;

        let name = match case.name.take() {
            Some(name) => name,
            None => {
                case.anomalies
                    .push("testcase has no name attribute".to_owned());
                String::new()
            }
        };
        let classname = case.classname.take().filter(|c| !c.is_empty());

        let qualifier = match &classname {
            Some(classname) => classname.clone(),
            None => self
                .suites
                .iter()
                .map(|frame| frame.name.as_str())
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
                .join(&options.separator),
        };
        let id = match (qualifier.is_empty(), name.is_empty()) {
            (true, _) => name.clone(),
            (false, true) => qualifier,
            (false, false) => format!("{qualifier}{}{name}", options.separator),
        };
        let id = match &options.id_prefix {
            Some(prefix) => match prefix.find(&id) {
                Some(m) if m.start() == 0 => id[m.end()..].to_owned(),
                _ => id,
            },
            None => id,
        };

        let mut record = OutcomeRecord::new(id, name);
        record.classname = classname;

        match case.time.as_deref().map(parse_duration) {
            Some(Some(duration)) => {
                record.set_duration_secs(duration);
            }
            Some(None) => {
                let time = case.time.as_deref().unwrap_or_default();
                case.anomalies
                    .push(format!("testcase has invalid time attribute {time:?}"));
            }
            None => {}
        }

        let raw_timestamp = case.timestamp.as_deref().or_else(|| {
            self.suites
                .iter()
                .rev()
                .find_map(|frame| frame.timestamp.as_deref())
        });
        let innermost = self.suites.last().map_or("", |frame| frame.name.as_str());
        record.timestamp = raw_timestamp.and_then(|raw| parse_timestamp(raw, self.zone_for(innermost)));

        let detection = dialect::classify(&case);
        debug!(
            "testcase {} classified as {} by rule {}",
            record.id,
            detection.kind,
            detection.rule.name()
        );
        record.kind = detection.kind;

        if let Some(marker) = detection.marker {
            self.apply_marker(&mut record, marker);
        } else if detection.kind != OutcomeKind::Passed {
            let status = case.status.as_deref().unwrap_or_default().trim();
            record.reason = match detection.kind {
                OutcomeKind::Inconclusive => format!("unrecognized test status {status:?}"),
                _ => format!("test status {status:?}"),
            };
        }

        for text in &case.stdout {
            let (metadata, rest) = split_platform_metadata(text);
            if let Some(metadata) = metadata {
                record.unique_id = Some(metadata.unique_id);
                if metadata.display_name != record.name {
                    record.display_name = Some(metadata.display_name);
                }
            }
            append_output(&mut record.stdout, &rest);
        }
        for text in &case.stderr {
            append_output(&mut record.stderr, text);
        }
        record.reruns = case.reruns;

        if !case.anomalies.is_empty() {
            let diagnostic = case.anomalies.join("\n");
            record.details = Some(match record.details.take() {
                Some(details) => format!("{details}\n\n{diagnostic}"),
                None => diagnostic,
            });
            if matches!(record.kind, OutcomeKind::Passed | OutcomeKind::Skipped) {
                record.kind = OutcomeKind::Inconclusive;
                record.reason = case.anomalies[0].clone();
            }
        }

        self.report.outcomes.push(record);
    }

    fn apply_marker(&self, record: &mut OutcomeRecord, marker: &Marker) {
        let message = marker
            .message
            .as_deref()
            .map(|message| clean_text(message.trim()))
            .filter(|message| !message.is_empty());
        let text = clean_text(marker.text.trim_start());
        let ty = marker.ty.clone().filter(|ty| !ty.is_empty());

        let reason = match &message {
            Some(message) => {
                if let Some(captures) = COMPARISON_REGEX.captures(message) {
                    if captures[1] != captures[2] {
                        record.comparison = Some(Comparison::new(&captures[1], &captures[2]));
                    }
                }
                match &ty {
                    Some(ty) if marker.kind == MarkerKind::Error && !message.contains(ty.as_str()) => {
                        format!("{ty}: {message}")
                    }
                    _ => message.clone(),
                }
            }
            None => text
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_owned)
                .or_else(|| ty.clone())
                .unwrap_or_default(),
        };
        record.reason = reason;
        record.outcome_type = ty;

        let full = if text.trim().is_empty() {
            message.unwrap_or_default()
        } else {
            text
        };
        if let Some(classname) = &record.classname {
            record.source_line = find_source_line(&full, classname);
        }
        record.details = self.parser.filter.apply(&full);
        if self.parser.options.full_details && !full.is_empty() {
            record.details_full = Some(full);
        }
    }
}

fn parse_duration(time: &str) -> Option<f64> {
    let time = time.trim();
    // Some writers group thousands with commas. Any other comma (such as a decimal comma) makes
    // the time invalid.
    let time = if GROUPED_DURATION_REGEX.is_match(time) {
        Cow::Owned(time.replace(',', ""))
    } else {
        Cow::Borrowed(time)
    };
    if time.is_empty() {
        return Some(0.0);
    }
    time.parse::<f64>()
        .ok()
        .filter(|duration| duration.is_finite() && *duration >= 0.0)
}

struct PlatformMetadata {
    unique_id: String,
    display_name: String,
}

/// The JUnit 5 console launcher records the unique ID and display name of each test as
/// `unique-id: ...` and `display-name: ...` lines in `system-out`.
fn split_platform_metadata(text: &str) -> (Option<PlatformMetadata>, String) {
    let text = text.trim();
    let mut lines = text.lines();
    let unique_id = lines.next().and_then(|line| line.strip_prefix("unique-id: "));
    let display_name = lines.next().and_then(|line| line.strip_prefix("display-name: "));
    match (unique_id, display_name) {
        (Some(unique_id), Some(display_name)) => {
            let rest = lines.collect::<Vec<_>>().join("\n");
            (
                Some(PlatformMetadata {
                    unique_id: unique_id.trim().to_owned(),
                    display_name: display_name.trim().to_owned(),
                }),
                rest,
            )
        }
        _ => (None, text.to_owned()),
    }
}

fn append_output(output: &mut Option<String>, text: &str) {
    let text = clean_text(text.trim());
    if text.is_empty() {
        return;
    }
    match output {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(&text);
        }
        None => *output = Some(text),
    }
}

/// Finds the line number of the first stack frame in the test class itself.
fn find_source_line(details: &str, classname: &str) -> Option<u32> {
    let unqualified = classname.rsplit('.').next()?.split('$').next()?;
    if unqualified.is_empty() {
        return None;
    }
    let needle = format!("({unqualified}");

    details.lines().find_map(|line| {
        let frame = line.strip_prefix([' ', '\t'])?.trim_start_matches([' ', '\t']);
        let frame = frame.strip_prefix("at ")?;
        let after = &frame[frame.find(&needle)? + needle.len()..];
        let after = &after[after.find(':')? + 1..];
        let digits: String = after.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    })
}
