//! Futures for deferred work and streaming reads.
//!
//! All three are thin wrappers around the matching `poll_*` methods; they
//! hold only references, so they are `Unpin`.

use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use embedded_hal::delay::DelayNs;

use super::signal::WorkSignal;
use crate::driver::error::IoResult;
use crate::driver::stream::StreamChannel;
use crate::hal::mmio::RegisterBlock;

/// Resolves once a channel has deferred completion work.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct WorkFuture<'a> {
    signal: &'a WorkSignal,
}

impl<'a> WorkFuture<'a> {
    pub(crate) fn new(signal: &'a WorkSignal) -> Self {
        Self { signal }
    }
}

impl Future for WorkFuture<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.signal.poll_wait(cx)
    }
}

/// Future for one streaming read.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct ReadFuture<'r, 'a, B, D, const N: usize, const BUF: usize>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    stream: &'r StreamChannel<'a, B, D, N, BUF>,
    buffer: &'r mut [u8],
    epoch: u32,
}

impl<'r, 'a, B, D, const N: usize, const BUF: usize> ReadFuture<'r, 'a, B, D, N, BUF>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    pub(crate) fn new(
        stream: &'r StreamChannel<'a, B, D, N, BUF>,
        buffer: &'r mut [u8],
        epoch: u32,
    ) -> Self {
        Self {
            stream,
            buffer,
            epoch,
        }
    }
}

impl<B, D, const N: usize, const BUF: usize> Future for ReadFuture<'_, '_, B, D, N, BUF>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    type Output = IoResult<usize>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.stream.poll_read(cx, this.buffer, this.epoch)
    }
}

/// Resolves once a stream has a unit ready.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct ReadableFuture<'r, 'a, B, D, const N: usize, const BUF: usize>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    stream: &'r StreamChannel<'a, B, D, N, BUF>,
}

impl<'r, 'a, B, D, const N: usize, const BUF: usize> ReadableFuture<'r, 'a, B, D, N, BUF>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    pub(crate) fn new(stream: &'r StreamChannel<'a, B, D, N, BUF>) -> Self {
        Self { stream }
    }
}

impl<B, D, const N: usize, const BUF: usize> Future for ReadableFuture<'_, '_, B, D, N, BUF>
where
    B: RegisterBlock,
    D: DelayNs + Clone,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.stream.poll_readable(cx)
    }
}
