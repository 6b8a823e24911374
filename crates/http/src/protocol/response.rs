//! Response head type.

use http::Response;

/// The head of a response before any content is written: status, version
/// and headers on an `http::Response<()>`.
pub type ResponseHead = Response<()>;
