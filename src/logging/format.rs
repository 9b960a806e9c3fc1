//! Console and parseable formatting
//!
//! The parseable format is one record per message: nine comma-separated fields
//! terminated by `;\n`, with `\`, `,` and `;` escaped by a backslash inside each
//! field. Newlines inside fields are passed through as-is.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::message::{short_filename, LogMessage};

/// Custom formatter overriding both console and parseable output for one level
pub type Formatter = Arc<dyn Fn(&LogMessage) -> String + Send + Sync>;

/// Number of fields in a parseable record
pub const RECORD_FIELDS: usize = 9;

/// Per-level custom formatters
#[derive(Default, Clone)]
pub struct FormatterRegistry {
    formatters: HashMap<i32, Formatter>,
}

impl FormatterRegistry {
    /// Set the formatter for a level, replacing any previous one
    pub fn insert(&mut self, level: i32, formatter: Formatter) {
        self.formatters.insert(level, formatter);
    }

    pub fn get(&self, level: i32) -> Option<Formatter> {
        self.formatters.get(&level).cloned()
    }

    pub fn len(&self) -> usize {
        self.formatters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatters.is_empty()
    }
}

/// Human-readable console line: `[LEVEL]: From location: details\n`
pub fn format_default(msg: &LogMessage, level_name: &str, project_marker: &str) -> String {
    let location = msg.location.to_string();
    format!(
        "[{}]: From {}: {}\n",
        level_name,
        short_filename(&location, project_marker),
        msg.details
    )
}

/// Machine-parseable record for listeners
pub fn format_parseable(msg: &LogMessage, level_name: &str, code_message: &str) -> String {
    let fields = [
        msg.level.to_string(),
        level_name.to_string(),
        msg.code.to_string(),
        code_message.to_string(),
        msg.location.to_string(),
        msg.timestamp_millis().to_string(),
        msg.stacktrace.clone(),
        msg.originator.clone(),
        msg.details.clone(),
    ];

    let mut record = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    record.push_str(";\n");
    record
}

/// Escape one field; backslashes go first so later escapes are not doubled
pub fn escape_field(field: &str) -> String {
    field
        .replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

/// Undo [`escape_field`]
pub fn unescape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('\\' | ',' | ';')) => out.push(next),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Errors decoding a stream of parseable records
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("record {record}: expected {RECORD_FIELDS} fields, found {found}")]
    FieldCount { record: usize, found: usize },

    #[error("record {record}: field '{field}' is not a valid number: {value:?}")]
    InvalidNumber {
        record: usize,
        field: &'static str,
        value: String,
    },

    #[error("record {record}: terminator ';' not followed by a newline")]
    MissingNewline { record: usize },

    #[error("record {record}: input ended before the record terminator")]
    Unterminated { record: usize },
}

/// A decoded parseable record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub level: i32,
    pub level_name: String,
    pub code: i32,
    pub code_message: String,
    pub location: String,
    pub timestamp_ms: u64,
    pub stacktrace: String,
    pub originator: String,
    pub details: String,
}

impl LogRecord {
    fn from_fields(record: usize, fields: Vec<String>) -> Result<Self, ParseError> {
        if fields.len() != RECORD_FIELDS {
            return Err(ParseError::FieldCount {
                record,
                found: fields.len(),
            });
        }
        let mut it = fields.into_iter();
        let mut next = || it.next().unwrap_or_default();

        let level = next();
        let level_name = next();
        let code = next();
        let code_message = next();
        let location = next();
        let timestamp = next();

        Ok(Self {
            level: parse_number(record, "level", level)?,
            level_name,
            code: parse_number(record, "code", code)?,
            code_message,
            location,
            timestamp_ms: parse_number(record, "timestamp", timestamp)?,
            stacktrace: next(),
            originator: next(),
            details: next(),
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    record: usize,
    field: &'static str,
    value: String,
) -> Result<T, ParseError> {
    value
        .parse()
        .map_err(|_| ParseError::InvalidNumber {
            record,
            field,
            value,
        })
}

/// Decode every record in `text`
///
/// Fields are unescaped as they are split, so a record's details come back
/// exactly as they were logged.
pub fn parse_records(text: &str) -> Result<Vec<LogRecord>, ParseError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('\\' | ',' | ';')) => current.push(next),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            ',' => fields.push(std::mem::take(&mut current)),
            ';' => {
                if chars.next() != Some('\n') {
                    return Err(ParseError::MissingNewline {
                        record: records.len(),
                    });
                }
                fields.push(std::mem::take(&mut current));
                let record = LogRecord::from_fields(records.len(), std::mem::take(&mut fields))?;
                records.push(record);
            }
            other => current.push(other),
        }
    }

    if !fields.is_empty() || !current.trim().is_empty() {
        return Err(ParseError::Unterminated {
            record: records.len(),
        });
    }
    Ok(records)
}
