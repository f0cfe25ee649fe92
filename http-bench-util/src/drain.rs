use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// Collects every data frame of a body into a single buffer.
    /// Trailer frames are skipped.
    pub struct DrainBodyFuture<B: Body> {
        #[pin]
        body: B,
        buf: Vec<u8>,
    }
}

impl<B> DrainBodyFuture<B>
where
    B: Body,
{
    /// `size_hint` only sizes the initial buffer, the body may be longer.
    #[inline]
    #[must_use]
    pub fn with_capacity(body: B, size_hint: usize) -> Self {
        Self {
            body,
            buf: Vec::with_capacity(size_hint),
        }
    }
}

impl<B> Future for DrainBodyFuture<B>
where
    B: Body,
    B::Error: Display,
{
    type Output = Result<Vec<u8>, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            }
            let next_res = match slf.body.as_mut().poll_frame(cx) {
                Poll::Ready(Some(next_res)) => next_res,
                Poll::Ready(None) => return Poll::Ready(Ok(std::mem::take(slf.buf))),
                Poll::Pending => return Poll::Pending,
            };
            let frame = match next_res {
                Ok(frame) => frame,
                Err(e) => {
                    return Poll::Ready(Err(anyhow::anyhow!("Failed to poll next frame: {e}")));
                }
            };
            if let Ok(mut data) = frame.into_data() {
                while data.has_remaining() {
                    let chunk = data.chunk();
                    let len = chunk.len();
                    slf.buf.extend_from_slice(chunk);
                    data.advance(len);
                }
            }
        }
    }
}
