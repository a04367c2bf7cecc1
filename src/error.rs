/// Failure while substituting positional arguments into a message
/// template. Never fatal: the translator keeps the raw template as body.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("not enough arguments for format string (placeholder {0})")]
    MissingArgument(usize),

    #[error("not all arguments converted during string formatting ({unused} left over)")]
    UnusedArguments { unused: usize },

    #[error("unsupported format character '{0}'")]
    UnsupportedConversion(char),

    #[error("%{conversion} format: a number is required, not {found}")]
    NotANumber { conversion: char, found: &'static str },

    #[error("%c requires an int or a single character")]
    InvalidCharacter,

    #[error("incomplete format")]
    Incomplete,

    #[error("positional arguments given for a non-string body")]
    NonStringTemplate,
}

/// Error returned by a [`StructuredStore`](crate::sink::StructuredStore).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The destination was created concurrently by someone else.
    #[error("destination `{0}` already exists")]
    AlreadyExists(String),

    #[error("store request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("store transport error: {0}")]
    Transport(String),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(feature = "opensearch")]
impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

/// Error returned by a [`LogSink`](crate::sink::LogSink).
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("stream write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("sink does not accept {0} output")]
    UnsupportedOutput(&'static str),
}

/// Error returned when reading [`PipelineConfig`](crate::init::PipelineConfig)
/// from the environment.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: `{value}` is not a valid {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("unknown log level `{0}`")]
    UnknownLevel(String),
}

/// Error returned while assembling a pipeline or installing the subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("a tokio runtime is required to start the delivery pool")]
    NoRuntime,

    #[error("failed to set global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("opensearch feature is not enabled")]
    OpenSearchFeatureDisabled,
}
