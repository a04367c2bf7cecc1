//! Pulls attributes out of a [`LogEvent`].

use crate::event::LogEvent;
use crate::value::AttributeValue;

/// Field names owned by the logging machinery itself. They are carried as
/// dedicated record fields and never appear among attributes.
pub const RESERVED_FIELDS: [&str; 24] = [
    "args",
    "asctime",
    "created",
    "exc_info",
    "exc_text",
    "filename",
    "funcName",
    "getMessage",
    "levelname",
    "levelno",
    "lineno",
    "message",
    "module",
    "msecs",
    "msg",
    "name",
    "pathname",
    "process",
    "processName",
    "relativeCreated",
    "stack_info",
    "thread",
    "threadName",
    "taskName",
];

/// Raw request objects are never logged; only [`RequestContext`](crate::event::RequestContext)
/// contributes request data.
pub const REQUEST_FIELD: &str = "request";

pub const SERVER_ADDRESS: &str = "server.address";
pub const URL_PATH: &str = "url.path";
pub const EXCEPTION_TYPE: &str = "exception.type";
pub const EXCEPTION_MESSAGE: &str = "exception.message";
pub const EXCEPTION_STACKTRACE: &str = "exception.stacktrace";

pub fn is_reserved(key: &str) -> bool {
    key == REQUEST_FIELD || RESERVED_FIELDS.contains(&key)
}

/// Collect the attributes of an event: user fields minus reserved names,
/// then request metadata, then exception details.
pub fn extract_attributes(event: &LogEvent) -> Vec<(String, AttributeValue)> {
    let mut out: Vec<(String, AttributeValue)> = event
        .fields
        .iter()
        .filter(|(k, _)| !is_reserved(k))
        .cloned()
        .collect();

    if let Some(request) = &event.request {
        if let Some(host) = &request.host {
            out.push((SERVER_ADDRESS.to_string(), host.clone().into()));
        }
        if let Some(path) = &request.path {
            out.push((URL_PATH.to_string(), path.clone().into()));
        }
    }

    if let Some(exc) = &event.exception {
        let parts = [
            (EXCEPTION_TYPE, &exc.type_name),
            (EXCEPTION_MESSAGE, &exc.message),
            (EXCEPTION_STACKTRACE, &exc.stacktrace),
        ];
        for (key, value) in parts {
            if let Some(v) = value {
                out.push((key.to_string(), v.clone().into()));
            }
        }
    }

    out
}
