//! Rendering of [`LogRecord`]s for sinks.
//!
//! Both modes borrow the record and are pure: the same record rendered twice
//! in the same mode yields identical output.

use crate::record::LogRecord;
use crate::severity::Level;
use crate::value::AttributeValue;
use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

/// Attribute whose map value is flattened after the top-level attributes
/// in human output.
pub const EXTRA_GROUP: &str = "extra";

const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const KEY_COLOR: &str = "\x1b[38;2;92;75;236m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// One line of text for people.
    #[default]
    Human,
    /// A JSON document for stores and log shippers.
    Machine,
}

/// A rendered record.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Text(String),
    Document(Value),
}

impl Output {
    pub fn kind(&self) -> &'static str {
        match self {
            Output::Text(_) => "text",
            Output::Document(_) => "document",
        }
    }

    /// Single-line form, used by stream sinks.
    pub fn to_line(&self) -> String {
        match self {
            Output::Text(s) => s.clone(),
            Output::Document(v) => v.to_string(),
        }
    }
}

pub fn render(record: &LogRecord, mode: RenderMode, colorize: bool) -> Output {
    match mode {
        RenderMode::Human => Output::Text(render_human(record, colorize)),
        RenderMode::Machine => Output::Document(render_machine(record)),
    }
}

/// Replace template delimiters so attribute values cannot be read as
/// markup: `{` and `>` become `[`, `}` and `<` become `]`.
pub fn escape(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '{' | '>' => '[',
            '}' | '<' => ']',
            other => other,
        })
        .collect()
}

/// Attributes in display order: top-level ones first, then the members of
/// a nested `extra` map.
fn display_attributes(record: &LogRecord) -> Vec<(&str, &AttributeValue)> {
    let mut top = Vec::with_capacity(record.attributes().len());
    let mut nested: &[(String, AttributeValue)] = &[];
    for (k, v) in record.attributes().iter() {
        match v {
            AttributeValue::Map(entries) if k == EXTRA_GROUP => nested = entries.as_slice(),
            _ => top.push((k, v)),
        }
    }
    top.extend(nested.iter().map(|(k, v)| (k.as_str(), v)));
    top
}

fn body_text(body: &AttributeValue) -> String {
    match body {
        AttributeValue::Str(s) => s.clone(),
        other => other.to_json_string(),
    }
}

/// `2024-05-01 12:30:00.000 | INFO     | app.users:get_user:42 - message :: key=value`
pub fn render_human(record: &LogRecord, colorize: bool) -> String {
    let time = record.timestamp().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
    let level = format!("{:<8}", record.severity_text());
    let source = record.source();
    let function = source.function.as_deref().unwrap_or("?");
    let line = source.line.map(|l| l.to_string()).unwrap_or_else(|| "?".to_string());
    let message = body_text(record.body());

    let pairs: Vec<String> = display_attributes(record)
        .into_iter()
        .map(|(k, v)| {
            let value = escape(&v.to_json_string());
            if colorize {
                format!("{KEY_COLOR}{k}{RESET}={value}")
            } else {
                format!("{k}={value}")
            }
        })
        .collect();

    let mut out = if colorize {
        let lc = Level::from_ordinal(record.severity().ordinal).color();
        format!(
            "{GREEN}{time}{RESET} | {lc}{level}{RESET} | {CYAN}{name}{RESET}:{CYAN}{function}{RESET}:{CYAN}{line}{RESET} - {lc}{message}{RESET}",
            name = source.name,
        )
    } else {
        format!("{time} | {level} | {}:{function}:{line} - {message}", source.name)
    };

    if !pairs.is_empty() {
        out.push_str(" :: ");
        if colorize {
            out.push_str(BOLD);
        }
        out.push_str(&pairs.join(" "));
        if colorize {
            out.push_str(RESET);
        }
    }
    out
}

fn hex_or_empty(id: String, zero: bool) -> String {
    if zero {
        String::new()
    } else {
        format!("0x{}", id)
    }
}

/// Field-named JSON document describing the whole record.
pub fn render_machine(record: &LogRecord) -> Value {
    let attributes: Map<String, Value> = record
        .attributes()
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::to_value(v).unwrap_or(Value::Null)))
        .collect();

    let trace_flags = if record.has_trace() { Some(record.trace_flags()) } else { None };

    json!({
        "body": serde_json::to_value(record.body()).unwrap_or(Value::Null),
        "severity_number": record.severity_number(),
        "severity_text": record.severity_text(),
        "attributes": attributes,
        "dropped_attributes": record.dropped_attributes(),
        "timestamp": record.timestamp().to_rfc3339_opts(SecondsFormat::Nanos, true),
        "observed_timestamp": record.observed_timestamp().to_rfc3339_opts(SecondsFormat::Nanos, true),
        "trace_id": hex_or_empty(format!("{:032x}", record.trace_id()), record.trace_id() == 0),
        "span_id": hex_or_empty(format!("{:016x}", record.span_id()), record.span_id() == 0),
        "trace_flags": trace_flags,
        "resource": record.resource().to_json(),
        "source": serde_json::to_value(record.source()).unwrap_or(Value::Null),
        "thread": record.thread(),
        "text": render_human(record, false),
    })
}
