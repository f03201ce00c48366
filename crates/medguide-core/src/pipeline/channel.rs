//! Bounded channels exposed as streams.
//!
//! Every stage hands its output to the next through a bounded mpsc channel.
//! The receiving half is wrapped in [`ChannelStream`]; dropping it closes the
//! channel, which producers observe as a failed send or via
//! [`mpsc::Sender::closed`] and use as their signal to stop.

use crate::config::PipelineConfig;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Create a bounded channel pair with the configured buffer size.
///
/// When the buffer is full the sender waits, so a slow consumer throttles
/// the producer instead of growing memory.
pub fn bounded_channel<T>(config: &PipelineConfig) -> (mpsc::Sender<T>, ChannelStream<T>) {
    channel_with_capacity(config.buffer_size)
}

/// Like [`bounded_channel`] with an explicit capacity (minimum 1).
pub fn channel_with_capacity<T>(capacity: usize) -> (mpsc::Sender<T>, ChannelStream<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ChannelStream { rx })
}

/// Receiving end of a stage. Ends once every sender is gone.
#[derive(Debug)]
pub struct ChannelStream<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Stream for ChannelStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
