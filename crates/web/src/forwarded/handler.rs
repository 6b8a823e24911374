use std::sync::Arc;

use async_trait::async_trait;
use edge_http::handler::Handler;
use edge_http::protocol::{HttpError, RequestHeader};
use edge_http::sink::ResponseSink;

use crate::decorator::Decorator;
use crate::forwarded::{Customizer, ForwardedCustomizer};

/// Customizes the request from proxy headers, then delegates.
#[derive(Debug)]
pub struct ForwardedHandler<H, C = ForwardedCustomizer> {
    customizer: Arc<C>,
    handler: H,
}

impl<H, C> ForwardedHandler<H, C> {
    pub fn new(customizer: Arc<C>, handler: H) -> Self {
        Self { customizer, handler }
    }
}

#[async_trait]
impl<H, C> Handler for ForwardedHandler<H, C>
where
    H: Handler,
    C: Customizer,
{
    async fn handle<S>(&self, req: &mut RequestHeader, resp: &mut S) -> Result<(), HttpError>
    where
        S: ResponseSink,
    {
        self.customizer.customize(req)?;
        self.handler.handle(req, resp).await
    }
}

#[derive(Debug)]
pub struct ForwardedDecorator<C = ForwardedCustomizer> {
    customizer: Arc<C>,
}

impl<C> ForwardedDecorator<C> {
    pub fn new(customizer: Arc<C>) -> Self {
        Self { customizer }
    }
}

impl<C> Clone for ForwardedDecorator<C> {
    fn clone(&self) -> Self {
        Self { customizer: Arc::clone(&self.customizer) }
    }
}

impl<H: Handler, C: Customizer> Decorator<H> for ForwardedDecorator<C> {
    type Out = ForwardedHandler<H, C>;

    fn decorate(&self, raw: H) -> Self::Out {
        ForwardedHandler::new(Arc::clone(&self.customizer), raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forwarded::ForwardedConfig;
    use bytes::Bytes;
    use edge_http::handler::make_handler;
    use edge_http::sink::response_channel;
    use http::{Request, Response, StatusCode};
    use http_body_util::{BodyExt, Full};

    fn echo_host() -> impl Handler {
        make_handler(|req: Request<()>| async move {
            let host = req.headers().get(http::header::HOST).cloned();
            let body = host.map(|host| Bytes::copy_from_slice(host.as_bytes())).unwrap_or_default();
            Ok::<_, HttpError>(Response::builder().status(StatusCode::OK).body(Full::new(body)).unwrap())
        })
    }

    #[tokio::test]
    async fn inner_handler_sees_resolved_host() {
        let customizer = Arc::new(ForwardedCustomizer::new(ForwardedConfig::default()).unwrap());
        let handler = ForwardedDecorator::new(customizer).decorate(echo_host());

        let mut req: RequestHeader = Request::get("/")
            .header(http::header::HOST, "internal:8080")
            .header("X-Forwarded-Host", "www.example.com")
            .body(())
            .unwrap()
            .into();
        let (mut sink, receiver) = response_channel(Response::new(()));

        let (result, body) = tokio::join!(handler.handle(&mut req, &mut sink), async {
            receiver.into_response().await.unwrap().into_body().collect().await.unwrap().to_bytes()
        });

        result.unwrap();
        assert_eq!(body, Bytes::from_static(b"www.example.com:8080"));
    }

    #[tokio::test]
    async fn bad_header_stops_the_request() {
        let customizer = Arc::new(ForwardedCustomizer::new(ForwardedConfig::default()).unwrap());
        let handler = ForwardedDecorator::new(customizer).decorate(echo_host());

        let mut req: RequestHeader = Request::get("/").header("X-Forwarded-Port", "port").body(()).unwrap().into();
        let (mut sink, _receiver) = response_channel(Response::new(()));

        let error = handler.handle(&mut req, &mut sink).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert!(!sink.is_committed());
    }
}
