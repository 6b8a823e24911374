//! Request and response stages for an HTTP edge.
//!
//! - [`forwarded`]: resolves scheme, authority and client address from proxy headers
//! - [`gzip`]: streaming gzip compression of responses
//! - [`decorator`]: composes the stages around an application handler

mod error;

pub mod decorator;
pub mod forwarded;
pub mod gzip;

pub use error::ConfigError;
