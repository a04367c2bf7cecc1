use crate::severity::Level;
use crate::value::AttributeValue;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a log call was made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// Logger name, usually the module path.
    pub name: String,
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl SourceLocation {
    pub fn new(name: impl Into<String>) -> Self {
        SourceLocation { name: name.into(), ..Default::default() }
    }
}

/// Error details attached to a log call. Each part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub type_name: Option<String>,
    pub message: Option<String>,
    pub stacktrace: Option<String>,
}

impl ExceptionInfo {
    /// Capture type name, message and source chain from an error value.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let mut info = Self::from_dyn_error(err.to_string(), err.source());
        info.type_name = Some(short_type_name(std::any::type_name::<E>()).to_string());
        info
    }

    /// Like [`from_error`](Self::from_error) for type-erased errors, whose
    /// concrete type name is unknown.
    pub fn from_dyn(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::from_dyn_error(err.to_string(), err.source())
    }

    fn from_dyn_error(message: String, mut source: Option<&dyn std::error::Error>) -> Self {
        let mut chain = Vec::new();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        ExceptionInfo {
            type_name: None,
            message: Some(message),
            stacktrace: if chain.is_empty() { None } else { Some(chain.join("\n")) },
        }
    }
}

/// Strip the module path and generic arguments from a type name.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// The narrow slice of an inbound request that log calls may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub host: Option<String>,
    pub path: Option<String>,
}

impl RequestContext {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        RequestContext { host: Some(host.into()), path: Some(path.into()) }
    }
}

/// A single log call, before translation.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    /// Message template or arbitrary value.
    pub body: AttributeValue,
    /// Positional arguments for `%`-style placeholders in `body`.
    pub args: Vec<AttributeValue>,
    pub location: SourceLocation,
    pub thread: Option<String>,
    pub exception: Option<ExceptionInfo>,
    pub request: Option<RequestContext>,
    /// User-supplied fields, in insertion order.
    pub fields: Vec<(String, AttributeValue)>,
}

impl LogEvent {
    /// Create an event stamped with the current time and thread.
    pub fn new(level: Level, body: impl Into<AttributeValue>) -> Self {
        LogEvent {
            timestamp: Utc::now(),
            level,
            body: body.into(),
            args: Vec::new(),
            location: SourceLocation::default(),
            thread: std::thread::current().name().map(str::to_string),
            exception: None,
            request: None,
            fields: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<AttributeValue>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn location(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn request(mut self, request: RequestContext) -> Self {
        self.request = Some(request);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
