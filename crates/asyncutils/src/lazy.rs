use futures::future::BoxFuture;
use futures::io::AsyncRead;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

enum State<R> {
    Opening(BoxFuture<'static, io::Result<R>>),
    Open(R),
    Failed,
}

/// A reader that is only opened when it is first read from.
///
/// The opening future is polled on the first call to `poll_read`; if it fails
/// the error is returned once and every later read fails as well.
pub struct LazyReader<R> {
    state: State<R>,
}

impl<R> LazyReader<R> {
    pub fn new<F>(open: F) -> Self
    where
        F: Future<Output = io::Result<R>> + Send + 'static,
    {
        Self { state: State::Opening(Box::pin(open)) }
    }

    /// Whether the underlying reader has been opened yet.
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LazyReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                State::Opening(open) => match ready!(open.as_mut().poll(cx)) {
                    Ok(reader) => this.state = State::Open(reader),
                    Err(e) => {
                        this.state = State::Failed;
                        return Poll::Ready(Err(e));
                    },
                },
                State::Open(reader) => return Pin::new(reader).poll_read(cx, buf),
                State::Failed => return Poll::Ready(Err(io::Error::other("lazy reader failed to open"))),
            }
        }
    }
}
