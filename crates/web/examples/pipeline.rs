//! Runs one proxied request through the forwarded and gzip stages and prints
//! what a transport would send.

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use edge_http::handler::{Handler, make_handler};
use edge_http::protocol::{HttpError, RequestHeader};
use edge_http::sink::response_channel;
use edge_web::decorator::{Decorator, DecoratorComposer};
use edge_web::forwarded::{ForwardedConfig, ForwardedCustomizer, ForwardedDecorator};
use edge_web::gzip::{GzipConfig, GzipDecorator};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

async fn page(req: Request<()>) -> Result<Response<Full<Bytes>>, HttpError> {
    let host = req.headers().get(http::header::HOST).and_then(|host| host.to_str().ok()).unwrap_or("unknown");
    let body = format!("<html><body><h1>served for {host}</h1>{}</body></html>", "<p>lorem ipsum</p>".repeat(40));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .expect("static response parts are valid"))
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let customizer = Arc::new(ForwardedCustomizer::new(ForwardedConfig::default()).expect("default config is valid"));
    let pipeline = DecoratorComposer::new(
        GzipDecorator::new(GzipConfig::default()).expect("default config is valid"),
        ForwardedDecorator::new(customizer),
    );
    let handler = pipeline.decorate(make_handler(page));

    let mut request: RequestHeader = Request::get("/")
        .header(http::header::HOST, "10.0.0.7:8080")
        .header(http::header::ACCEPT_ENCODING, "gzip, br")
        .header("Forwarded", "for=198.51.100.17;proto=https;host=www.example.com")
        .body(())
        .expect("static request parts are valid")
        .into();
    let (mut sink, receiver) = response_channel(Response::new(()));

    let (result, response) = tokio::join!(handler.handle(&mut request, &mut sink), async {
        let response = receiver.into_response().await?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok::<_, edge_http::protocol::SendError>((parts, body))
    });
    result.expect("pipeline should handle the request");
    let (parts, body) = response.expect("response should be received");

    info!(scheme = %request.scheme(), secure = request.is_secure(), remote = ?request.remote_addr(), "resolved request");
    info!(status = %parts.status, headers = ?parts.headers, compressed = body.len(), "response");

    let mut html = String::new();
    flate2::read::GzDecoder::new(body.as_ref()).read_to_string(&mut html).expect("body should be valid gzip");
    info!(decompressed = html.len(), "{}", &html[..html.find("</h1>").map_or(html.len(), |end| end + 5)]);
}
