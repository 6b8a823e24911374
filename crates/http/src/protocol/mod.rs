//! Protocol types shared by the edge pipeline.
//!
//! - [`RequestHeader`] and [`RemoteAddr`]: the inbound request with its
//!   mutable scheme, authority and peer address
//! - [`HostPort`]: `host[:port]` authorities
//! - [`QuotedCsv`]: tokenizer for comma separated, parameterized header values
//! - [`ResponseHead`], [`PayloadItem`], [`PayloadSize`]: outbound response pieces
//! - [`HttpError`], [`ParseError`], [`SendError`]: error types

mod message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RemoteAddr;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod host_port;
pub use host_port::HostPort;
pub use host_port::parse_port;

mod quoted_csv;
pub use quoted_csv::CsvElement;
pub use quoted_csv::QuotedCsv;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
