use std::io;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    /// The status a transport should answer with when this error aborts a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpError::RequestError { source } => source.status_code(),
            HttpError::ResponseError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid host port `{value}`: {reason}")]
    InvalidHostPort { value: String, reason: String },

    #[error("invalid quoted csv: {reason}")]
    InvalidQuotedCsv { reason: String },

    #[error("bad header value for {name}: {reason}")]
    BadProxyHeader { name: String, reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_host_port<V: ToString, S: ToString>(value: V, reason: S) -> Self {
        Self::InvalidHostPort { value: value.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_quoted_csv<S: ToString>(str: S) -> Self {
        Self::InvalidQuotedCsv { reason: str.to_string() }
    }

    pub fn bad_proxy_header<N: ToString, S: ToString>(name: N, reason: S) -> Self {
        Self::BadProxyHeader { name: name.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ParseError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("a previous write is still pending")]
    WritePending,

    #[error("illegal state: {state}")]
    IllegalState { state: String },

    #[error("response aborted: {reason}")]
    Aborted { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn illegal_state<S: ToString>(state: S) -> Self {
        Self::IllegalState { state: state.to_string() }
    }

    pub fn aborted<S: ToString>(str: S) -> Self {
        Self::Aborted { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    #[inline]
    pub fn is_write_pending(&self) -> bool {
        matches!(self, SendError::WritePending)
    }
}
