use std::hint::black_box;
use std::sync::Arc;

use async_trait::async_trait;
use bencher::{Fixture, TestCase};
use bytes::{Buf, Bytes};
use edge_http::protocol::{RequestHeader, ResponseHead, SendError};
use edge_http::sink::ResponseSink;
use edge_web::forwarded::{Customizer, ForwardedConfig, ForwardedCustomizer};
use edge_web::gzip::{ByteBufferPool, DefaultGzipFactory, GzipConfig, GzipResponse};
use http::Response;

#[cfg(feature = "codspeed")]
use codspeed_criterion_compat::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
#[cfg(not(feature = "codspeed"))]
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

static PLAIN: Fixture = Fixture::headers(&[("host", "internal.example:8080")]);
static LEGACY: Fixture = Fixture::headers(&[
    ("host", "internal.example:8080"),
    ("x-forwarded-host", "www.example.com"),
    ("x-forwarded-for", "203.0.113.195, 70.41.3.18, 150.172.238.178"),
    ("x-forwarded-port", "443"),
    ("x-forwarded-proto", "https"),
]);
static FORWARDED: Fixture = Fixture::headers(&[
    ("host", "internal.example:8080"),
    ("forwarded", r#"for="[2001:db8:cafe::17]:4711";proto=https;host=www.example.com, for=192.0.2.60;by=203.0.113.43"#),
    ("x-forwarded-for", "198.51.100.17"),
    ("proxy-ssl-id", "0123456789abcdef"),
]);

static SMALL_BODY: Fixture = Fixture::new(&[], "<li>item</li>", 8);
static NORMAL_BODY: Fixture = Fixture::new(&[], "<tr><td>row</td><td>some cell content</td></tr>\n", 256);
static LARGE_BODY: Fixture = Fixture::new(&[], "{\"id\":12345,\"name\":\"a json record\",\"tags\":[\"a\",\"b\"]},", 8192);

fn forwarded_cases() -> Vec<TestCase> {
    vec![TestCase::small("plain", PLAIN), TestCase::normal("legacy", LEGACY), TestCase::normal("forwarded", FORWARDED)]
}

fn gzip_cases() -> Vec<TestCase> {
    vec![TestCase::small("small", SMALL_BODY), TestCase::normal("normal", NORMAL_BODY), TestCase::large("large", LARGE_BODY)]
}

#[derive(Debug, Default)]
struct NullSink {
    head: ResponseHead,
    committed: bool,
    written: usize,
}

#[async_trait]
impl ResponseSink for NullSink {
    fn head_mut(&mut self) -> &mut ResponseHead {
        &mut self.head
    }

    fn is_committed(&self) -> bool {
        self.committed
    }

    async fn write<D>(&mut self, _last: bool, content: Option<D>) -> Result<(), SendError>
    where
        D: Buf + Send,
    {
        self.committed = true;
        self.written += content.map_or(0, |content| content.remaining());
        Ok(())
    }
}

fn benchmark_forwarded(criterion: &mut Criterion) {
    let customizer = ForwardedCustomizer::new(ForwardedConfig::default()).expect("default config is valid");
    let mut group = criterion.benchmark_group("forwarded");

    for case in forwarded_cases() {
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter_batched_ref(
                || RequestHeader::from(case.fixture().request()),
                |req| {
                    customizer.customize(req).expect("fixture headers are valid");
                    black_box(req.authority());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_gzip(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime should build");
    let config = GzipConfig::default();
    let factory = Arc::new(DefaultGzipFactory::new(&config).expect("default config is valid"));
    let buffers = Arc::new(ByteBufferPool::default());
    let mut group = criterion.benchmark_group("gzip");

    for case in gzip_cases() {
        let body = Bytes::from(case.fixture().body());
        let chunk_size = 4096;
        group.throughput(Throughput::Bytes(case.fixture().body_len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &body, |b, body| {
            b.iter(|| {
                runtime.block_on(async {
                    let head = Response::builder().header(http::header::CONTENT_TYPE, "text/html").body(()).expect("valid head");
                    let sink = NullSink { head, ..NullSink::default() };
                    let response = GzipResponse::new(sink, Arc::clone(&factory) as _, Arc::clone(&buffers))
                        .with_buffer(config.buffer_size(), config.sync_flush());

                    let mut remaining = body.clone();
                    while remaining.has_remaining() {
                        let chunk = remaining.split_to(chunk_size.min(remaining.len()));
                        response.write(false, Some(chunk)).await.expect("write should succeed");
                    }
                    response.succeeded().await.expect("completion should succeed");
                    black_box(response.into_inner().written)
                })
            });
        });
    }

    group.finish();
}

criterion_group!(edge, benchmark_forwarded, benchmark_gzip);
criterion_main!(edge);
