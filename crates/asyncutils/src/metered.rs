use futures::io::AsyncRead;
use pin_project_lite::pin_project;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};

/// Shared view onto a [`MeteredReader`], usable after the reader has been
/// moved elsewhere (or dropped).
#[derive(Debug, Clone, Default)]
pub struct Meter {
    touched: Arc<AtomicBool>,
    bytes: Arc<AtomicU64>,
}
impl Meter {
    /// Whether the reader was polled at least once.
    pub fn touched(&self) -> bool {
        self.touched.load(Ordering::Acquire)
    }

    /// Total bytes handed out by the reader so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes.load(Ordering::Acquire)
    }
}

pin_project! {
    /// Pass-through reader that reports its consumption to a [`Meter`].
    pub struct MeteredReader<R> {
        #[pin]
        inner: R,
        meter: Meter,
    }
}

impl<R> MeteredReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, meter: Meter::default() }
    }

    pub fn meter(&self) -> Meter {
        self.meter.clone()
    }
}

impl<R: AsyncRead> AsyncRead for MeteredReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
        let this = self.project();
        this.meter.touched.store(true, Ordering::Release);
        let poll = this.inner.poll_read(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            this.meter.bytes.fetch_add(*n as u64, Ordering::AcqRel);
        }
        poll
    }
}
