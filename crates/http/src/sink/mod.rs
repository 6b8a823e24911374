//! Push-style response output.
//!
//! A [`ResponseSink`] receives the response head and then body content
//! through repeated [`ResponseSink::write`] calls. The head may be edited
//! until the first write commits it. A write with `last = true` ends the
//! response; later writes without content are accepted as no-ops.
//!
//! Each `write` returns once the sink accepted the content, which makes the
//! `.await` the point where a producer yields to the transport.

mod channel;

pub use channel::ChannelBody;
pub use channel::ChannelSink;
pub use channel::ResponseReceiver;
pub use channel::response_channel;

use std::fmt::Display;

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use http_body::Body;
use http_body_util::BodyExt;
use tracing::error;

use crate::protocol::{ResponseHead, SendError};

#[async_trait]
pub trait ResponseSink: Send {
    /// Mutable access to the head; edits after commit are not transmitted.
    fn head_mut(&mut self) -> &mut ResponseHead;

    fn is_committed(&self) -> bool;

    async fn write<D>(&mut self, last: bool, content: Option<D>) -> Result<(), SendError>
    where
        D: Buf + Send;
}

#[async_trait]
impl<S: ResponseSink> ResponseSink for &mut S {
    #[inline]
    fn head_mut(&mut self) -> &mut ResponseHead {
        (**self).head_mut()
    }

    #[inline]
    fn is_committed(&self) -> bool {
        (**self).is_committed()
    }

    async fn write<D>(&mut self, last: bool, content: Option<D>) -> Result<(), SendError>
    where
        D: Buf + Send,
    {
        (**self).write(last, content).await
    }
}

/// Drives `body` into `sink`: every data frame is written as non-final
/// content and the end of the body as `write(true, None)`.
pub async fn send_body<B, S>(body: B, sink: &mut S) -> Result<(), SendError>
where
    B: Body + Unpin + Send,
    B::Data: Send,
    B::Error: Display,
    S: ResponseSink,
{
    let mut body = body;
    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                let data = frame.into_data().map_err(|frame| {
                    error!(trailers = ?frame.trailers_ref(), "want data from body, but receive trailers");
                    SendError::invalid_body("trailers are not supported")
                })?;
                sink.write(false, Some(data)).await?;
            }
            Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve response body error: {e}"))),
            None => return sink.write::<Bytes>(true, None).await,
        }
    }
}
