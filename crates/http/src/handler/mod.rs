//! Request handling stages.
//!
//! A [`Handler`] gets the mutable request header and pushes its response into
//! a [`ResponseSink`]. Stages that rewrite the request or wrap the sink are
//! themselves handlers delegating to an inner one.

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use http::{Request, Response};
use http_body::Body;

use crate::protocol::{HttpError, RequestHeader};
use crate::sink::{ResponseSink, send_body};

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle<S>(&self, req: &mut RequestHeader, resp: &mut S) -> Result<(), HttpError>
    where
        S: ResponseSink;
}

#[async_trait]
impl<H: Handler> Handler for std::sync::Arc<H> {
    async fn handle<S>(&self, req: &mut RequestHeader, resp: &mut S) -> Result<(), HttpError>
    where
        S: ResponseSink,
    {
        (**self).handle(req, resp).await
    }
}

/// A handler built from an async function returning a whole `Response`.
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, B> Handler for HandlerFn<F>
where
    F: Fn(Request<()>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<B>, HttpError>> + Send,
    B: Body + Unpin + Send,
    B::Data: Send,
    B::Error: Display + Send,
{
    async fn handle<S>(&self, req: &mut RequestHeader, resp: &mut S) -> Result<(), HttpError>
    where
        S: ResponseSink,
    {
        let response = (self.f)(req.to_request()).await?;
        let (parts, body) = response.into_parts();

        let head = resp.head_mut();
        *head.status_mut() = parts.status;
        *head.version_mut() = parts.version;
        head.headers_mut().extend(parts.headers);

        send_body(body, resp).await?;
        Ok(())
    }
}

pub fn make_handler<F, Fut, B>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<()>) -> Fut,
    Fut: Future<Output = Result<Response<B>, HttpError>>,
    B: Body,
{
    HandlerFn { f }
}
