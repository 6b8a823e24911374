use std::sync::Arc;

use async_trait::async_trait;
use edge_http::handler::Handler;
use edge_http::protocol::{HttpError, QuotedCsv, RequestHeader};
use edge_http::sink::ResponseSink;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, IF_NONE_MATCH};
use http::{HeaderValue, Method};
use tracing::{debug, trace};

use crate::ConfigError;
use crate::decorator::Decorator;
use crate::gzip::config::GzipConfig;
use crate::gzip::factory::{DefaultGzipFactory, GzipFactory};
use crate::gzip::pool::ByteBufferPool;
use crate::gzip::response::{ETAG_GZIP_SUFFIX, GzipResponse, ensure_vary};

#[derive(Debug)]
struct GzipSettings {
    methods: Vec<Method>,
    excluded_paths: Vec<String>,
    vary: Option<HeaderValue>,
    buffer_size: usize,
    sync_flush: bool,
}

/// Compresses the responses of `handler` for clients accepting gzip.
pub struct GzipHandler<H> {
    settings: Arc<GzipSettings>,
    factory: Arc<dyn GzipFactory>,
    buffers: Arc<ByteBufferPool>,
    handler: H,
}

impl<H: std::fmt::Debug> std::fmt::Debug for GzipHandler<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipHandler").field("settings", &self.settings).field("handler", &self.handler).finish_non_exhaustive()
    }
}

impl<H> GzipHandler<H> {
    fn is_eligible(&self, req: &RequestHeader) -> bool {
        if !self.settings.methods.contains(req.method()) {
            trace!(method = %req.method(), "method not compressed");
            return false;
        }
        let path = req.uri().path();
        if self.settings.excluded_paths.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            trace!(path, "path excluded from compression");
            return false;
        }
        true
    }
}

/// Whether `Accept-Encoding` lists gzip (or `*`) with a non zero quality.
pub fn accepts_gzip(req: &RequestHeader) -> bool {
    let values = req.headers().get_all(ACCEPT_ENCODING).iter().filter_map(|value| value.to_str().ok());
    let elements = match QuotedCsv::parse_all(values) {
        Ok(elements) => elements,
        Err(e) => {
            debug!(cause = %e, "unparsable accept-encoding");
            return false;
        }
    };

    elements.iter().any(|element| {
        let coding = element.value().unwrap_or_default();
        let quality = element.param("q").map_or(Some(1.0), |q| q.trim().parse::<f32>().ok());
        (coding.eq_ignore_ascii_case("gzip") || coding == "*") && quality.is_some_and(|q| q > 0.0)
    })
}

#[async_trait]
impl<H: Handler> Handler for GzipHandler<H> {
    async fn handle<S>(&self, req: &mut RequestHeader, resp: &mut S) -> Result<(), HttpError>
    where
        S: ResponseSink,
    {
        if !self.is_eligible(req) {
            return self.handler.handle(req, resp).await;
        }

        if req.headers().contains_key(CONTENT_ENCODING) || !accepts_gzip(req) {
            if let Some(vary) = &self.settings.vary {
                ensure_vary(resp.head_mut().headers_mut(), vary);
            }
            return self.handler.handle(req, resp).await;
        }

        let mut request_etags = None;
        if let Some(if_none_match) = req.headers().get(IF_NONE_MATCH).and_then(|value| value.to_str().ok())
            && if_none_match.contains(ETAG_GZIP_SUFFIX)
        {
            let stripped = if_none_match.replace(ETAG_GZIP_SUFFIX, "");
            request_etags = Some(if_none_match.to_string());
            if let Ok(stripped) = HeaderValue::from_str(&stripped) {
                req.headers_mut().insert(IF_NONE_MATCH, stripped);
            }
        }

        let mut response = GzipResponse::new(resp, Arc::clone(&self.factory), Arc::clone(&self.buffers))
            .with_buffer(self.settings.buffer_size, self.settings.sync_flush)
            .with_vary(self.settings.vary.clone())
            .with_request_etags(request_etags);

        match self.handler.handle(req, &mut response).await {
            Ok(()) => {
                response.succeeded().await?;
                Ok(())
            }
            Err(e) => {
                response.failed(&e).await?;
                Err(e)
            }
        }
    }
}

/// Builds [`GzipHandler`]s sharing one factory and buffer pool.
#[derive(Clone)]
pub struct GzipDecorator {
    settings: Arc<GzipSettings>,
    factory: Arc<dyn GzipFactory>,
    buffers: Arc<ByteBufferPool>,
}

impl std::fmt::Debug for GzipDecorator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipDecorator").field("settings", &self.settings).finish_non_exhaustive()
    }
}

impl GzipDecorator {
    pub fn new(config: GzipConfig) -> Result<Self, ConfigError> {
        let factory = DefaultGzipFactory::new(&config)?;
        Self::with_factory(&config, Arc::new(factory))
    }

    pub fn with_factory(config: &GzipConfig, factory: Arc<dyn GzipFactory>) -> Result<Self, ConfigError> {
        config.validate()?;
        let vary = config
            .vary()
            .map(|vary| HeaderValue::from_str(vary).map_err(|_e| ConfigError::InvalidVary { value: vary.to_string() }))
            .transpose()?;

        let settings = GzipSettings {
            methods: config.methods()?,
            excluded_paths: config.excluded_paths().to_vec(),
            vary,
            buffer_size: config.buffer_size(),
            sync_flush: config.sync_flush(),
        };
        Ok(Self { settings: Arc::new(settings), factory, buffers: Arc::new(ByteBufferPool::default()) })
    }
}

impl<H: Handler> Decorator<H> for GzipDecorator {
    type Out = GzipHandler<H>;

    fn decorate(&self, raw: H) -> Self::Out {
        GzipHandler {
            settings: Arc::clone(&self.settings),
            factory: Arc::clone(&self.factory),
            buffers: Arc::clone(&self.buffers),
            handler: raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use bytes::Bytes;
    use edge_http::handler::make_handler;
    use edge_http::protocol::SendError;
    use flate2::read::GzDecoder;
    use http::header::{CONTENT_TYPE, ETAG, VARY};
    use http::{Request, Response, StatusCode};
    use http_body_util::Full;

    use super::*;
    use crate::gzip::response::tests::RecordingSink;

    const PAGE: &str = "<html><body>a page that is well above the minimum gzip size</body></html>";

    fn page_handler() -> impl Handler {
        make_handler(|req: Request<()>| async move {
            let mut builder = Response::builder().header(CONTENT_TYPE, "text/html").header(ETAG, "\"page\"");
            if req.headers().get(IF_NONE_MATCH).is_some_and(|etag| etag == "\"page\"") {
                builder = builder.status(StatusCode::NOT_MODIFIED);
                return Ok::<_, HttpError>(builder.body(Full::new(Bytes::new())).unwrap());
            }
            Ok(builder.body(Full::new(Bytes::from(PAGE))).unwrap())
        })
    }

    fn request(method: Method, path: &str, accept_encoding: Option<&str>) -> RequestHeader {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(accept_encoding) = accept_encoding {
            builder = builder.header(ACCEPT_ENCODING, accept_encoding);
        }
        builder.body(()).unwrap().into()
    }

    async fn serve(config: GzipConfig, mut req: RequestHeader) -> RecordingSink {
        let handler = GzipDecorator::new(config).unwrap().decorate(page_handler());
        let mut sink = RecordingSink::new(Response::new(()));
        handler.handle(&mut req, &mut sink).await.unwrap();
        sink
    }

    #[tokio::test]
    async fn compresses_when_accepted() {
        let sink = serve(GzipConfig::default(), request(Method::GET, "/index.html", Some("deflate, gzip;q=0.8"))).await;

        let head = sink.committed();
        assert_eq!(head.headers().get(CONTENT_ENCODING).unwrap(), "gzip");
        assert_eq!(head.headers().get(ETAG).unwrap(), "\"page--gzip\"");

        let mut decoded = String::new();
        GzDecoder::new(sink.body().as_slice()).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, PAGE);
    }

    #[tokio::test]
    async fn not_accepted_still_varies() {
        for accept_encoding in [None, Some("br"), Some("gzip;q=0"), Some("identity, *;q=0")] {
            let sink = serve(GzipConfig::default(), request(Method::GET, "/", accept_encoding)).await;
            let head = sink.committed();
            assert!(head.headers().get(CONTENT_ENCODING).is_none(), "{accept_encoding:?}");
            assert_eq!(head.headers().get(VARY).unwrap(), "Accept-Encoding");
            assert_eq!(sink.body(), PAGE.as_bytes());
        }
    }

    #[tokio::test]
    async fn wildcard_is_accepted() {
        let sink = serve(GzipConfig::default(), request(Method::GET, "/", Some("*"))).await;
        assert_eq!(sink.committed().headers().get(CONTENT_ENCODING).unwrap(), "gzip");
    }

    #[tokio::test]
    async fn method_and_path_gates() {
        let sink = serve(GzipConfig::default(), request(Method::POST, "/", Some("gzip"))).await;
        assert!(sink.committed().headers().get(CONTENT_ENCODING).is_none());
        assert!(sink.committed().headers().get(VARY).is_none());

        let config = GzipConfig::default().with_excluded_paths(["/download"]);
        let sink = serve(config, request(Method::GET, "/download/file.txt", Some("gzip"))).await;
        assert!(sink.committed().headers().get(CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn encoded_request_is_not_compressed() {
        let mut req = request(Method::GET, "/", Some("gzip"));
        req.headers_mut().insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        let sink = serve(GzipConfig::default(), req).await;
        assert!(sink.committed().headers().get(CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn gzip_etag_revalidates() {
        let mut req = request(Method::GET, "/", Some("gzip"));
        req.headers_mut().insert(IF_NONE_MATCH, HeaderValue::from_static("\"page--gzip\""));
        let sink = serve(GzipConfig::default(), req).await;

        let head = sink.committed();
        assert_eq!(head.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(head.headers().get(ETAG).unwrap(), "\"page--gzip\"");
        assert!(head.headers().get(CONTENT_ENCODING).is_none());
        assert!(sink.body().is_empty());
    }

    #[tokio::test]
    async fn handler_error_fails_the_response() {
        let failing = make_handler(|_req: Request<()>| async {
            Err::<Response<Full<Bytes>>, _>(HttpError::from(SendError::aborted("backend down")))
        });
        let handler = GzipDecorator::new(GzipConfig::default()).unwrap().decorate(failing);

        let mut req = request(Method::GET, "/", Some("gzip"));
        let mut sink = RecordingSink::new(Response::new(()));
        let error = handler.handle(&mut req, &mut sink).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(sink.committed.is_none());
    }

    #[test]
    fn invalid_vary_is_rejected() {
        let config = GzipConfig::default().with_vary(Some("Accept\u{7f}Encoding"));
        assert!(matches!(GzipDecorator::new(config), Err(ConfigError::InvalidVary { .. })));
    }
}
