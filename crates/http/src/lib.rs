//! Protocol building blocks for an HTTP edge pipeline.
//!
//! This crate holds the types that sit between a transport and the request
//! processing stages built on top of it:
//!
//! - [`protocol`]: request header with proxy-rewritable connection facts,
//!   authority and header value parsers, error types
//! - [`sink`]: the push-style [`sink::ResponseSink`] contract and a
//!   channel-backed implementation exposing the response as an `http_body::Body`
//! - [`handler`]: the [`handler::Handler`] trait stages implement
//!
//! Framing (HTTP/1.1 or HTTP/2 codecs) and TLS are left to the transport.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use edge_http::handler::{make_handler, Handler};
//! use edge_http::protocol::{HttpError, RequestHeader};
//! use edge_http::sink::response_channel;
//! use http::{Request, Response, StatusCode};
//! use http_body_util::{BodyExt, Full};
//!
//! # async fn run() -> Result<(), HttpError> {
//! let handler = make_handler(|_req: Request<()>| async {
//!     Ok::<_, HttpError>(Response::builder().status(StatusCode::OK).body(Full::new(Bytes::from("hello"))).unwrap())
//! });
//!
//! let mut request: RequestHeader = Request::get("/").body(()).unwrap().into();
//! let (mut sink, receiver) = response_channel(Response::new(()));
//!
//! let (result, response) = tokio::join!(handler.handle(&mut request, &mut sink), receiver.into_response());
//! result?;
//! let body = response?.into_body().collect().await.unwrap().to_bytes();
//! assert_eq!(body, "hello");
//! # Ok(())
//! # }
//! ```

pub mod handler;
pub mod protocol;
pub mod sink;

mod utils;
pub(crate) use utils::ensure;
