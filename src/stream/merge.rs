//! Fairly interleave two asynchronous streams into one.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

/// Merge two streams, reading from `primary` first whenever both have a value
/// ready at the same pull.
///
/// No value is lost: once one source is exhausted, pulls read exclusively
/// from the other, and the merged stream closes only after both sources have
/// closed. Dropping the merged stream drops (cancels) both sources.
pub fn merge_streams<T: Send + 'static>(
    primary: BoxStream<'static, T>,
    secondary: BoxStream<'static, T>,
) -> BoxStream<'static, T> {
    MergedStream {
        primary: Some(primary),
        secondary: Some(secondary),
    }
    .boxed()
}

struct MergedStream<T> {
    primary: Option<BoxStream<'static, T>>,
    secondary: Option<BoxStream<'static, T>>,
}

impl<T> Stream for MergedStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = &mut *self;

        if let Some(primary) = this.primary.as_mut() {
            match primary.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => this.primary = None,
                Poll::Pending => {}
            }
        }

        if let Some(secondary) = this.secondary.as_mut() {
            match secondary.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => this.secondary = None,
                Poll::Pending => {}
            }
        }

        if this.primary.is_none() && this.secondary.is_none() {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}
