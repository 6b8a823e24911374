//! Streaming gzip compression of responses.
//!
//! [`GzipDecorator`] wraps a handler with a [`GzipHandler`], which checks the
//! request (method, path, `Accept-Encoding`) and hands the inner handler a
//! [`GzipResponse`]. That sink makes the final decision on its first write,
//! from the committed status and headers, and then compresses the body in
//! buffer sized steps with pooled [`Deflater`]s.

mod config;
mod deflater;
mod factory;
mod handler;
mod pool;
mod response;
mod session;
mod state;

pub use config::GzipConfig;
pub use deflater::Deflater;
pub use factory::DefaultGzipFactory;
pub use factory::GzipFactory;
pub use handler::GzipDecorator;
pub use handler::GzipHandler;
pub use handler::accepts_gzip;
pub use pool::ByteBufferPool;
pub use pool::DeflaterEntry;
pub use pool::DeflaterPool;
pub use response::GzipResponse;
pub use response::ensure_vary;
pub use response::etag_gzip;
pub use session::Action;
pub use session::CompressionSession;
pub use session::GZIP_HEADER;
pub use session::GzipWrite;
pub use state::CompressionState;
pub use state::StateCell;
