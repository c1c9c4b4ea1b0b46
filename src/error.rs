use std::error::Error as StdError;

use thiserror::Error as ThisError;

use crate::interceptor::Hook;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Read,
    Timeout,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Read => "read",
            Self::Timeout => "timeout",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

#[derive(Debug, ThisError)]
#[error("transport failed ({kind}): {source}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    #[source]
    pub source: BoxError,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn timeout(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::Timeout, source)
    }

    pub fn other(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::Other, source)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    Interceptor,
    Serialization,
    MissingAttribute,
    AuthSchemeResolution,
    EndpointResolution,
    Signing,
    Transport,
    Deserialization,
    Operation,
    InvalidTokenScope,
    TokenAcquisition,
    RetryRefresh,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interceptor => "interceptor",
            Self::Serialization => "serialization",
            Self::MissingAttribute => "missing_attribute",
            Self::AuthSchemeResolution => "auth_scheme_resolution",
            Self::EndpointResolution => "endpoint_resolution",
            Self::Signing => "signing",
            Self::Transport => "transport",
            Self::Deserialization => "deserialization",
            Self::Operation => "operation",
            Self::InvalidTokenScope => "invalid_token_scope",
            Self::TokenAcquisition => "token_acquisition",
            Self::RetryRefresh => "retry_refresh",
        }
    }
}

#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum Error<E>
where
    E: StdError + Send + Sync + 'static,
{
    #[error("interceptor failed in {hook}: {source}")]
    Interceptor {
        hook: Hook,
        #[source]
        source: BoxError,
    },
    #[error("failed to serialize operation input: {source}")]
    Serialization {
        #[source]
        source: BoxError,
    },
    #[error("required context attribute {name} is not set")]
    MissingAttribute { name: &'static str },
    #[error("failed to resolve an auth scheme: {source}")]
    AuthSchemeResolution {
        #[source]
        source: BoxError,
    },
    #[error("failed to resolve the endpoint: {source}")]
    EndpointResolution {
        #[source]
        source: BoxError,
    },
    #[error("failed to sign the request: {source}")]
    Signing {
        #[source]
        source: BoxError,
    },
    #[error("transport error ({kind}): {source}")]
    Transport {
        kind: TransportErrorKind,
        #[source]
        source: BoxError,
    },
    #[error("failed to deserialize the response: {source}")]
    Deserialization {
        #[source]
        source: BoxError,
    },
    #[error("operation failed: {source}")]
    Operation {
        #[source]
        source: E,
    },
    #[error("cannot derive a retry token scope: no partition and host is {host:?}")]
    InvalidTokenScope { host: Option<String> },
    #[error("failed to acquire the initial retry token for scope {scope}: {source}")]
    TokenAcquisition {
        scope: String,
        #[source]
        source: BoxError,
    },
    #[error("retry token refresh failed after {attempts} attempts: {source}")]
    RetryRefresh {
        attempts: u32,
        #[source]
        source: BoxError,
    },
}

impl<E> Error<E>
where
    E: StdError + Send + Sync + 'static,
{
    pub fn interceptor(hook: Hook, source: impl Into<BoxError>) -> Self {
        Self::Interceptor {
            hook,
            source: source.into(),
        }
    }

    pub fn serialization(source: impl Into<BoxError>) -> Self {
        Self::Serialization {
            source: source.into(),
        }
    }

    pub fn auth_scheme_resolution(source: impl Into<BoxError>) -> Self {
        Self::AuthSchemeResolution {
            source: source.into(),
        }
    }

    pub fn endpoint_resolution(source: impl Into<BoxError>) -> Self {
        Self::EndpointResolution {
            source: source.into(),
        }
    }

    pub fn signing(source: impl Into<BoxError>) -> Self {
        Self::Signing {
            source: source.into(),
        }
    }

    pub fn deserialization(source: impl Into<BoxError>) -> Self {
        Self::Deserialization {
            source: source.into(),
        }
    }

    pub fn operation(source: E) -> Self {
        Self::Operation { source }
    }

    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Interceptor { .. } => ErrorCode::Interceptor,
            Self::Serialization { .. } => ErrorCode::Serialization,
            Self::MissingAttribute { .. } => ErrorCode::MissingAttribute,
            Self::AuthSchemeResolution { .. } => ErrorCode::AuthSchemeResolution,
            Self::EndpointResolution { .. } => ErrorCode::EndpointResolution,
            Self::Signing { .. } => ErrorCode::Signing,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::Deserialization { .. } => ErrorCode::Deserialization,
            Self::Operation { .. } => ErrorCode::Operation,
            Self::InvalidTokenScope { .. } => ErrorCode::InvalidTokenScope,
            Self::TokenAcquisition { .. } => ErrorCode::TokenAcquisition,
            Self::RetryRefresh { .. } => ErrorCode::RetryRefresh,
        }
    }

    pub fn as_operation(&self) -> Option<&E> {
        match self {
            Self::Operation { source } => Some(source),
            _ => None,
        }
    }

    pub fn into_operation(self) -> Result<E, Self> {
        match self {
            Self::Operation { source } => Ok(source),
            other => Err(other),
        }
    }
}

impl<E> From<TransportError> for Error<E>
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: TransportError) -> Self {
        Self::Transport {
            kind: error.kind,
            source: error.source,
        }
    }
}
