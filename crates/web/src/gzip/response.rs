use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use edge_http::protocol::{PayloadSize, ResponseHead, SendError};
use edge_http::sink::ResponseSink;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG, VARY};
use http::{HeaderMap, HeaderValue, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, error, trace};

use crate::gzip::config::{DEFAULT_BUFFER_SIZE, DEFAULT_VARY};
use crate::gzip::factory::GzipFactory;
use crate::gzip::pool::ByteBufferPool;
use crate::gzip::session::{Action, CompressionSession, GzipWrite};
use crate::gzip::state::{CompressionState, StateCell};

pub(crate) const ETAG_GZIP_SUFFIX: &str = "--gzip";

#[derive(Debug)]
struct Inner<S> {
    sink: S,
    session: CompressionSession,
}

/// A [`ResponseSink`] wrapper that gzip-encodes the body when the committed
/// head allows it.
///
/// The first write decides: the status, the content type and any existing
/// content-encoding are checked, and a deflater is requested from the
/// [`GzipFactory`]. If any of them says no, the response passes through
/// untouched. Otherwise `Content-Encoding: gzip` is set, `Content-Length` is
/// dropped and every later write is compressed into pooled buffers.
///
/// All operations take `&self`. Only one write may be in progress at a time;
/// a concurrent one fails with [`SendError::WritePending`].
pub struct GzipResponse<S> {
    state: StateCell,
    completed: AtomicBool,
    inner: Mutex<Inner<S>>,
    factory: Arc<dyn GzipFactory>,
    buffers: Arc<ByteBufferPool>,
    vary: Option<HeaderValue>,
    request_etags: Option<String>,
}

impl<S> std::fmt::Debug for GzipResponse<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GzipResponse")
            .field("state", &self.state.get())
            .field("completed", &self.completed.load(Ordering::Relaxed))
            .field("vary", &self.vary)
            .finish_non_exhaustive()
    }
}

impl<S: ResponseSink> GzipResponse<S> {
    pub fn new(sink: S, factory: Arc<dyn GzipFactory>, buffers: Arc<ByteBufferPool>) -> Self {
        Self {
            state: StateCell::default(),
            completed: AtomicBool::new(false),
            inner: Mutex::new(Inner { sink, session: CompressionSession::new(DEFAULT_BUFFER_SIZE, false) }),
            factory,
            buffers,
            vary: Some(HeaderValue::from_static(DEFAULT_VARY)),
            request_etags: None,
        }
    }

    #[must_use]
    pub fn with_buffer(mut self, buffer_size: usize, sync_flush: bool) -> Self {
        self.inner.get_mut().session = CompressionSession::new(buffer_size, sync_flush);
        self
    }

    #[must_use]
    pub fn with_vary(mut self, vary: Option<HeaderValue>) -> Self {
        self.vary = vary;
        self
    }

    /// The `If-None-Match` value the request carried before its gzip entity
    /// tags were stripped.
    #[must_use]
    pub fn with_request_etags(mut self, request_etags: Option<String>) -> Self {
        self.request_etags = request_etags;
        self
    }

    pub fn state(&self) -> CompressionState {
        self.state.get()
    }

    pub fn into_inner(self) -> S {
        self.inner.into_inner().sink
    }

    /// Writes body content; `last` ends the response.
    ///
    /// Once finished, writes without content are accepted and ignored.
    pub async fn write<D>(&self, last: bool, content: Option<D>) -> Result<(), SendError>
    where
        D: Buf + Send,
    {
        let content = content.filter(Buf::has_remaining).map(|mut data| data.copy_to_bytes(data.remaining()));
        self.dispatch(last, content).await
    }

    /// Completes the response with a final empty write.
    pub async fn succeeded(&self) -> Result<(), SendError> {
        if self.completed.swap(true, Ordering::AcqRel) {
            return Err(SendError::illegal_state("response already completed"));
        }
        self.dispatch(true, None).await
    }

    /// Abandons the response and returns its compression resources.
    pub async fn failed<E: std::fmt::Display + ?Sized>(&self, cause: &E) -> Result<(), SendError> {
        if self.completed.swap(true, Ordering::AcqRel) {
            return Err(SendError::illegal_state("response already completed"));
        }
        debug!(cause = %cause, state = %self.state.get(), "gzip response failed");
        let mut inner = self.inner.lock().await;
        inner.session.release(&self.buffers);
        self.state.set(CompressionState::Finished);
        Ok(())
    }

    /// Opts out of compression before anything was written.
    pub fn no_compression(&self) -> Result<(), SendError> {
        match self.state.compare_exchange(CompressionState::MightCompress, CompressionState::NotCompressing) {
            Ok(()) | Err(CompressionState::NotCompressing) => Ok(()),
            Err(state) => Err(SendError::illegal_state(state)),
        }
    }

    async fn dispatch(&self, last: bool, content: Option<Bytes>) -> Result<(), SendError> {
        loop {
            match self.state.get() {
                CompressionState::MightCompress => {
                    match self.state.compare_exchange(CompressionState::MightCompress, CompressionState::Committing) {
                        Ok(()) => return self.commit(last, content).await,
                        // lost the race, look again
                        Err(_state) => {}
                    }
                }
                CompressionState::Committing => return Err(SendError::WritePending),
                CompressionState::NotCompressing => {
                    let mut inner = self.inner.try_lock().map_err(|_e| SendError::WritePending)?;
                    return self.pass_through(&mut inner.sink, last, content).await;
                }
                CompressionState::Compressing => {
                    let mut inner = self.inner.try_lock().map_err(|_e| SendError::WritePending)?;
                    return self.compress(&mut inner, last, content).await;
                }
                CompressionState::Finished => {
                    return match content {
                        Some(_) => Err(SendError::illegal_state(CompressionState::Finished)),
                        None => Ok(()),
                    };
                }
            }
        }
    }

    async fn commit(&self, last: bool, content: Option<Bytes>) -> Result<(), SendError> {
        let mut inner = self.inner.lock().await;
        let Inner { sink, session } = &mut *inner;
        let head = sink.head_mut();

        if let Some(reason) = self.exclusion(head) {
            debug!(reason, status = head.status().as_u16(), "response not compressed");
            self.state.set(CompressionState::NotCompressing);
            return self.pass_through(sink, last, content).await;
        }

        if let Some(vary) = &self.vary {
            ensure_vary(head.headers_mut(), vary);
        }

        let content_length = match PayloadSize::from_headers(head.headers()) {
            PayloadSize::Length(length) => Some(length),
            PayloadSize::Empty => Some(0),
            PayloadSize::Chunked if last => Some(content.as_ref().map_or(0, |content| content.len() as u64)),
            PayloadSize::Chunked => None,
        };

        let Some(deflater) = self.factory.deflater_entry(content_length) else {
            debug!(?content_length, "no deflater, response not compressed");
            self.state.set(CompressionState::NotCompressing);
            return self.pass_through(sink, last, content).await;
        };

        let headers = head.headers_mut();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.remove(CONTENT_LENGTH);
        if let Some(etag) = headers.get(ETAG).and_then(|etag| etag.to_str().ok()).map(etag_gzip)
            && let Ok(etag) = HeaderValue::from_str(&etag)
        {
            headers.insert(ETAG, etag);
        }

        session.start(deflater);
        self.state.set(CompressionState::Compressing);
        trace!(?content_length, "compressing response");

        if content.is_none() && !last {
            let result = sink.write::<Bytes>(false, None).await;
            if let Err(e) = &result {
                error!(cause = %e, "failed to commit gzip response");
                session.release(&self.buffers);
                self.state.set(CompressionState::Finished);
            }
            return result;
        }

        self.compress(&mut inner, last, content).await
    }

    fn exclusion(&self, head: &mut ResponseHead) -> Option<&'static str> {
        let status = head.status();
        if status == StatusCode::NOT_MODIFIED {
            let headers = head.headers_mut();
            if let Some(request_etags) = &self.request_etags
                && let Some(etag) = headers.get(ETAG).and_then(|etag| etag.to_str().ok()).map(etag_gzip)
                && request_etags.contains(&etag)
                && let Ok(etag) = HeaderValue::from_str(&etag)
            {
                headers.insert(ETAG, etag);
            }
            if let Some(vary) = &self.vary {
                ensure_vary(headers, vary);
            }
            return Some("not modified");
        }
        if status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::RESET_CONTENT
            || status.as_u16() >= 300
        {
            return Some("status");
        }

        if let Some(content_type) = head.headers().get(CONTENT_TYPE) {
            let gzipable = content_type.to_str().is_ok_and(|content_type| self.factory.is_mime_type_gzipable(content_type));
            if !gzipable {
                return Some("mime type");
            }
        }

        if head.headers().contains_key(CONTENT_ENCODING) {
            return Some("content encoding");
        }
        None
    }

    async fn pass_through(&self, sink: &mut S, last: bool, content: Option<Bytes>) -> Result<(), SendError> {
        let result = sink.write(last, content).await;
        if last || result.is_err() {
            self.state.set(CompressionState::Finished);
        }
        result
    }

    async fn compress(&self, inner: &mut Inner<S>, last: bool, content: Option<Bytes>) -> Result<(), SendError> {
        let Inner { sink, session } = inner;
        let mut write = GzipWrite::new(last, content);

        loop {
            let action = match write.process(session, &self.buffers) {
                Ok(action) => action,
                Err(e) => {
                    error!(cause = %e, "failed to deflate response content");
                    session.release(&self.buffers);
                    self.state.set(CompressionState::Finished);
                    return Err(SendError::io(e));
                }
            };

            match action {
                Action::Flush { last } => {
                    if let Err(e) = sink.write(last, Some(session.output())).await {
                        error!(cause = %e, "failed to write compressed content");
                        session.release(&self.buffers);
                        self.state.set(CompressionState::Finished);
                        return Err(e);
                    }
                    if last {
                        session.release_buffer(&self.buffers);
                        self.state.set(CompressionState::Finished);
                        return Ok(());
                    }
                }
                Action::Idle => {}
                Action::Succeeded => return Ok(()),
            }
        }
    }
}

#[async_trait]
impl<S: ResponseSink> ResponseSink for GzipResponse<S> {
    fn head_mut(&mut self) -> &mut ResponseHead {
        self.inner.get_mut().sink.head_mut()
    }

    fn is_committed(&self) -> bool {
        match self.state.get() {
            CompressionState::MightCompress => false,
            CompressionState::NotCompressing => self.inner.try_lock().ok().is_none_or(|inner| inner.sink.is_committed()),
            CompressionState::Committing | CompressionState::Compressing | CompressionState::Finished => true,
        }
    }

    async fn write<D>(&mut self, last: bool, content: Option<D>) -> Result<(), SendError>
    where
        D: Buf + Send,
    {
        GzipResponse::write(self, last, content).await
    }
}

/// `"abc"` becomes `"abc--gzip"`, an unquoted tag just gets the suffix.
pub fn etag_gzip(etag: &str) -> String {
    match etag.strip_suffix('"') {
        Some(opaque) => format!("{opaque}{ETAG_GZIP_SUFFIX}\""),
        None => format!("{etag}{ETAG_GZIP_SUFFIX}"),
    }
}

/// Adds `vary` to the `Vary` header unless it, or `*`, is already listed.
pub fn ensure_vary(headers: &mut HeaderMap, vary: &HeaderValue) {
    let Ok(wanted) = vary.to_str() else {
        return;
    };

    let existing = headers
        .get_all(VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>();

    if existing.is_empty() {
        headers.insert(VARY, vary.clone());
        return;
    }

    let missing = wanted
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter(|token| !existing.iter().any(|present| *present == "*" || present.eq_ignore_ascii_case(token)))
        .collect::<Vec<_>>();
    if missing.is_empty() {
        return;
    }

    let merged = existing.into_iter().chain(missing).collect::<Vec<_>>().join(", ");
    if let Ok(merged) = HeaderValue::from_str(&merged) {
        headers.insert(VARY, merged);
    }
}
