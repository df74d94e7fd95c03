use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, error, trace};

/// Largest data frame handed to the caller.
pub const RELAY_CHUNK_SIZE: usize = 1024;

/// Relays an upstream body to the caller in frames of at most
/// `chunk_size` bytes.
///
/// hyper flushes every frame it is given, so each chunk reaches the caller
/// as soon as it has been read. Dropping the relay drops the upstream body,
/// which releases the upstream connection.
pub struct RelayBody<B> {
    inner: B,
    pending: Bytes,
    chunk_size: usize,
    relayed: u64,
    finished: bool,
}

impl<B> RelayBody<B> {
    pub fn new(inner: B) -> Self {
        Self::with_chunk_size(inner, RELAY_CHUNK_SIZE)
    }

    pub fn with_chunk_size(inner: B, chunk_size: usize) -> Self {
        Self {
            inner,
            pending: Bytes::new(),
            chunk_size: chunk_size.max(1),
            relayed: 0,
            finished: false,
        }
    }

    fn next_chunk(&mut self, mut data: Bytes) -> Bytes {
        if data.len() > self.chunk_size {
            self.pending = data.split_off(self.chunk_size);
        }
        self.relayed += data.len() as u64;
        data
    }
}

impl<B> HttpBody for RelayBody<B>
where
    B: HttpBody<Data = Bytes> + Unpin,
    B::Error: Display,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;

        if !this.pending.is_empty() {
            let rest = std::mem::take(&mut this.pending);
            let chunk = this.next_chunk(rest);
            this.finished = this.pending.is_empty() && this.inner.is_end_stream();
            return Poll::Ready(Some(Ok(Frame::data(chunk))));
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                let frame = match frame.into_data() {
                    Ok(data) => Frame::data(this.next_chunk(data)),
                    Err(frame) => frame,
                };
                this.finished = this.pending.is_empty() && this.inner.is_end_stream();
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                error!(relayed = this.relayed, "Error while reading response body: {}", err);
                this.finished = true;
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                trace!(relayed = this.relayed, "Upstream body finished");
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.pending.is_empty() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        let pending = self.pending.len() as u64;
        let inner = self.inner.size_hint();
        let mut hint = SizeHint::new();
        hint.set_lower(inner.lower() + pending);
        if let Some(upper) = inner.upper() {
            hint.set_upper(upper + pending);
        }
        hint
    }
}

impl<B> Drop for RelayBody<B> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                relayed = self.relayed,
                "Caller went away before the upstream body was fully relayed"
            );
        }
    }
}
