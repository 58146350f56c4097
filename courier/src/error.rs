use thiserror::Error;

use crate::format::Role;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by [`Mailer::deliver`](crate::Mailer::deliver) and
/// [`Mailer::deliver_async`](crate::Mailer::deliver_async).
///
/// `EmptyFrom` and `Format` are raised before any adapter method runs.
/// Everything the adapter reports comes back as `Transport`, untouched.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("email has an empty from address")]
    EmptyFrom,

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Transport(BoxError),

    #[error("async delivery was abandoned before reporting a result")]
    Abandoned,

    #[error("async delivery task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("async delivery requires a Tokio runtime")]
    NoRuntime,
}

impl MailError {
    /// True when the error was raised before the adapter was invoked.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::EmptyFrom | Self::Format(_))
    }
}

/// Failure to turn a recipient value into canonical addresses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("no formatter registered for `{type_name}` (used as {role})")]
    NoFormatter {
        type_name: &'static str,
        role: Role,
    },

    #[error("{role} must resolve to exactly one address, got {count}")]
    NotSingle { role: Role, count: usize },

    #[error("{role} address expansion nested too deeply")]
    TooDeep { role: Role },
}

/// Errors raised while defining a [`Mailer`](crate::Mailer).
///
/// A mailer that fails with one of these is never constructed, so these never
/// surface from a delivery call.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("mailer `{mailer}` has no adapter configured")]
    MissingAdapter { mailer: String },

    #[error("mailer `{mailer}` references unknown adapter `{adapter}`")]
    UnknownAdapter { mailer: String, adapter: String },

    #[error("mailer `{mailer}` is missing required config: {key}")]
    MissingConfig { mailer: String, key: String },

    #[error("invalid value for config `{key}`: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("config error: {0}")]
    Source(#[from] config::ConfigError),
}
