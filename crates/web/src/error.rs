use edge_http::protocol::ParseError;
use http::header::InvalidHeaderName;
use thiserror::Error;

/// Errors raised while building a stage from its configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid header name `{name}`: {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: InvalidHeaderName,
    },

    #[error("invalid forced host `{value}`: {source}")]
    InvalidForcedHost {
        value: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid scheme `{value}`")]
    InvalidScheme { value: String },

    #[error("buffer size {size} is below the minimum {min}")]
    BufferTooSmall { size: usize, min: usize },

    #[error("invalid compression level {level}, expected 0..=9")]
    InvalidCompressionLevel { level: u32 },

    #[error("invalid mime type pattern `{value}`")]
    InvalidMimeType { value: String },

    #[error("invalid vary value `{value}`")]
    InvalidVary { value: String },

    #[error("invalid method `{value}`")]
    InvalidMethod { value: String },

    #[error("invalid config: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn invalid_header_name<S: ToString>(name: S, source: InvalidHeaderName) -> Self {
        Self::InvalidHeaderName { name: name.to_string(), source }
    }

    pub fn invalid_forced_host<S: ToString>(value: S, source: ParseError) -> Self {
        Self::InvalidForcedHost { value: value.to_string(), source }
    }

    pub fn invalid_scheme<S: ToString>(value: S) -> Self {
        Self::InvalidScheme { value: value.to_string() }
    }

    pub fn invalid_mime_type<S: ToString>(value: S) -> Self {
        Self::InvalidMimeType { value: value.to_string() }
    }

    pub fn invalid_method<S: ToString>(value: S) -> Self {
        Self::InvalidMethod { value: value.to_string() }
    }
}
