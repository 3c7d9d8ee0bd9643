// rundex - core/parser.rs
//
// Streaming log-line parser. Two physical-line grammars are accepted,
// tested most-specific first:
//
//   1. LEVEL:TIMESTAMP || SOURCE | MESSAGE
//   2. LEVEL:TIMESTAMP |{2,3} MESSAGE
//
// Any line matching neither is a continuation of the previous record: its
// trimmed text is folded into that record's message with a newline
// separator. A continuation with no prior record is malformed input.
//
// This grammar is the one bit-exact external contract of the whole core;
// changes here break every consumer of the run logs.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::core::model::{LineOutcome, LogRecord};
use crate::util::constants::{
    DEBUG_MAX_LINE_PREVIEW, MAX_RECORD_MESSAGE_BYTES, TRUNCATION_MARKER,
};
use crate::util::error::ParseError;

// =============================================================================
// Grammars
// =============================================================================

/// Grammar 1: level, timestamp, source token, message.
fn grammar_with_source() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\w+):(\S+) \|\| (\S+) \| (.*)$").unwrap_or_else(|e| {
            unreachable!("grammar pattern is a tested literal: {e}");
        })
    })
}

/// Grammar 2: level, timestamp, message; the source token is omitted and
/// the separator widens to two or three bars.
fn grammar_bare() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\w+):(\S+) \|{2,3} (.*)$").unwrap_or_else(|e| {
            unreachable!("grammar pattern is a tested literal: {e}");
        })
    })
}

/// Clock formats tried against the raw timestamp token, most precise
/// first. Time-only stamps are anchored to the epoch date so record
/// ordering still works across a parse.
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];
    for format in DATE_TIME_FORMATS {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(stamp);
        }
    }

    const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S"];
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(raw, format) {
            return NaiveDate::from_ymd_opt(1970, 1, 1).map(|date| date.and_time(time));
        }
    }
    None
}

/// Splits a source token on its last ":" into (file, function). A token
/// without ":" is all file.
fn split_source(token: &str) -> (Option<String>, Option<String>) {
    match token.rsplit_once(':') {
        Some((file, func)) if !func.is_empty() => {
            (Some(file.to_string()), Some(func.to_string()))
        }
        _ => (Some(token.to_string()), None),
    }
}

// =============================================================================
// LineParser
// =============================================================================

/// Incremental line-by-line parser holding the ordered record list.
///
/// Feed physical lines in file order through `parse_line`; records
/// accumulate until `clear` (a full re-parse starts from a cleared
/// parser, not a rewound one).
#[derive(Debug, Default)]
pub struct LineParser {
    records: Vec<LogRecord>,
    line_number: u64,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one physical line.
    ///
    /// Returns the index of the record created or extended. Trailing line
    /// terminators are ignored; everything else in the line is
    /// significant.
    pub fn parse_line(&mut self, line: &str) -> Result<LineOutcome, ParseError> {
        self.line_number += 1;
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(caps) = grammar_with_source().captures(line) {
            let (source_file, source_func) = split_source(&caps[3]);
            return Ok(self.push_record(&caps[1], &caps[2], &caps[4], source_file, source_func));
        }
        if let Some(caps) = grammar_bare().captures(line) {
            return Ok(self.push_record(&caps[1], &caps[2], &caps[3], None, None));
        }

        match self.records.last_mut() {
            Some(record) => {
                append_limited(&mut record.message, line.trim());
                Ok(LineOutcome::Continuation(self.records.len() - 1))
            }
            None => Err(ParseError::MalformedLog {
                line_number: self.line_number,
                line_preview: preview(line),
            }),
        }
    }

    fn push_record(
        &mut self,
        level: &str,
        raw_timestamp: &str,
        message: &str,
        source_file: Option<String>,
        source_func: Option<String>,
    ) -> LineOutcome {
        let mut text = String::new();
        if message.len() > MAX_RECORD_MESSAGE_BYTES {
            let mut cut = MAX_RECORD_MESSAGE_BYTES;
            while cut > 0 && !message.is_char_boundary(cut) {
                cut -= 1;
            }
            text.push_str(&message[..cut]);
            text.push_str(TRUNCATION_MARKER);
        } else {
            text.push_str(message);
        }

        self.records.push(LogRecord {
            timestamp: parse_timestamp(raw_timestamp),
            raw_timestamp: raw_timestamp.to_string(),
            level: level.to_string(),
            message: text,
            source_file,
            source_func,
            line_number: self.line_number,
        });
        LineOutcome::Record(self.records.len() - 1)
    }

    /// Records parsed so far, in input order.
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record and rewinds the line counter. Used when the
    /// backing file is reopened for a full re-parse.
    pub fn clear(&mut self) {
        self.records.clear();
        self.line_number = 0;
    }
}

/// Folds continuation text into a message, capped at the record message
/// limit. Once the marker is placed no further text is accepted.
fn append_limited(message: &mut String, text: &str) {
    if message.ends_with(TRUNCATION_MARKER) {
        return;
    }
    if message.len() + 1 + text.len() > MAX_RECORD_MESSAGE_BYTES {
        let available = MAX_RECORD_MESSAGE_BYTES.saturating_sub(message.len() + 1);
        let mut cut = available.min(text.len());
        while cut > 0 && !text.is_char_boundary(cut) {
            cut -= 1;
        }
        message.push('\n');
        message.push_str(&text[..cut]);
        message.push_str(TRUNCATION_MARKER);
    } else {
        message.push('\n');
        message.push_str(text);
    }
}

fn preview(line: &str) -> String {
    if line.len() > DEBUG_MAX_LINE_PREVIEW {
        let mut cut = DEBUG_MAX_LINE_PREVIEW;
        while cut > 0 && !line.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &line[..cut])
    } else {
        line.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
