use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use futures::channel::{mpsc, oneshot};
use futures::{SinkExt, StreamExt};
use http::Response;
use http_body::{Body, Frame, SizeHint};
use tracing::error;

use crate::protocol::{PayloadItem, PayloadSize, ResponseHead, SendError};
use crate::sink::ResponseSink;

type Acked = (PayloadItem, oneshot::Sender<()>);

/// Creates a sink/receiver pair connected by a channel.
///
/// The head is handed to the receiver by the first write. Every item is only
/// acknowledged once the consumer pulls it from the [`ChannelBody`], so a
/// writer never runs ahead of its reader by more than one item.
pub fn response_channel(head: ResponseHead) -> (ChannelSink, ResponseReceiver) {
    let (head_sender, head_receiver) = oneshot::channel();
    let (data_sender, data_receiver) = mpsc::channel(1);

    (
        ChannelSink { head, head_sender: Some(head_sender), data_sender, eof: false },
        ResponseReceiver { head_receiver, data_receiver },
    )
}

#[derive(Debug)]
pub struct ChannelSink {
    head: ResponseHead,
    head_sender: Option<oneshot::Sender<ResponseHead>>,
    data_sender: mpsc::Sender<Acked>,
    eof: bool,
}

impl ChannelSink {
    async fn send_item(&mut self, item: PayloadItem) -> Result<(), SendError> {
        let (ack_sender, ack_receiver) = oneshot::channel();
        if let Err(e) = self.data_sender.send((item, ack_sender)).await {
            error!(cause = %e, "failed to send payload through channel");
            return Err(SendError::aborted("response receiver dropped"));
        }

        ack_receiver.await.map_err(|_canceled| SendError::aborted("response body dropped before acknowledging"))
    }

    fn commit(&mut self) -> Result<(), SendError> {
        let Some(head_sender) = self.head_sender.take() else {
            return Ok(());
        };

        let mut committed = Response::new(());
        *committed.status_mut() = self.head.status();
        *committed.version_mut() = self.head.version();
        *committed.headers_mut() = self.head.headers().clone();

        head_sender.send(committed).map_err(|_head| SendError::aborted("response receiver dropped"))
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    fn head_mut(&mut self) -> &mut ResponseHead {
        &mut self.head
    }

    fn is_committed(&self) -> bool {
        self.head_sender.is_none()
    }

    async fn write<D>(&mut self, last: bool, content: Option<D>) -> Result<(), SendError>
    where
        D: Buf + Send,
    {
        let mut content = content.filter(Buf::has_remaining);

        if self.eof {
            return match content {
                Some(_) => Err(SendError::illegal_state("write after last")),
                None => Ok(()),
            };
        }

        self.commit()?;

        if let Some(data) = content.as_mut() {
            let bytes = data.copy_to_bytes(data.remaining());
            self.send_item(PayloadItem::Chunk(bytes)).await?;
        }

        if last {
            self.eof = true;
            self.send_item(PayloadItem::Eof).await?;
        }
        Ok(())
    }
}

/// The consumer half of [`response_channel`].
#[derive(Debug)]
pub struct ResponseReceiver {
    head_receiver: oneshot::Receiver<ResponseHead>,
    data_receiver: mpsc::Receiver<Acked>,
}

impl ResponseReceiver {
    /// Waits for the committed head and returns the response with a streaming body.
    pub async fn into_response(self) -> Result<Response<ChannelBody>, SendError> {
        let head = self.head_receiver.await.map_err(|_canceled| SendError::aborted("response sink dropped before commit"))?;
        let payload_size = PayloadSize::from_headers(head.headers());

        let body = ChannelBody { data_receiver: self.data_receiver, payload_size, eof: false };
        Ok(head.map(|()| body))
    }
}

#[derive(Debug)]
pub struct ChannelBody {
    data_receiver: mpsc::Receiver<Acked>,
    payload_size: PayloadSize,
    eof: bool,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = SendError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.eof {
            return Poll::Ready(None);
        }

        match this.data_receiver.poll_next_unpin(cx) {
            Poll::Ready(Some((item, ack))) => {
                // the writer may have given up waiting, nothing to do then
                let _ = ack.send(());
                match item {
                    PayloadItem::Chunk(bytes) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                    PayloadItem::Eof => {
                        this.eof = true;
                        Poll::Ready(None)
                    }
                }
            }
            Poll::Ready(None) => {
                this.eof = true;
                Poll::Ready(Some(Err(SendError::aborted("response sink dropped before the last write"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.eof
    }

    fn size_hint(&self) -> SizeHint {
        if self.eof { SizeHint::with_exact(0) } else { self.payload_size.into() }
    }
}
