//! Guarded server streams
//!
//! Wraps a transport stream so the caller's cancellation token and the call
//! deadline are observed while waiting for each item and again before each
//! decode. The transport stream is owned by the generator, so dropping the
//! returned stream releases the subscription on every exit path.

use crate::error::{Error, Result};
use crate::metrics::ClientMetrics;
use crate::transport::WireStream;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Limits applied to a stream after it has been opened
#[derive(Debug, Clone)]
pub(crate) struct StreamGuard {
    pub operation: &'static str,
    pub cancel: CancellationToken,
    /// `None` for streams that may run forever
    pub deadline: Option<Instant>,
    pub timeout: Duration,
    pub metrics: Arc<ClientMetrics>,
}

impl StreamGuard {
    fn cancelled(&self) -> Error {
        self.metrics.record_cancelled_stream();
        debug!(operation = self.operation, "stream cancelled by caller");
        Error::Cancelled {
            operation: self.operation,
        }
    }

    fn expired(&self) -> Error {
        debug!(operation = self.operation, timeout = ?self.timeout, "stream deadline exceeded");
        Error::DeadlineExceeded {
            operation: self.operation,
            timeout: self.timeout,
        }
    }
}

enum Step<T> {
    Item(T),
    Failed(Error),
    Done,
    Cancelled,
    Expired,
}

async fn next_step<T>(inner: &mut WireStream<T>, guard: &StreamGuard) -> Step<T> {
    let deadline = async {
        match guard.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = guard.cancel.cancelled() => Step::Cancelled,
        _ = deadline => Step::Expired,
        item = inner.next() => match item {
            Some(Ok(item)) => Step::Item(item),
            Some(Err(e)) => Step::Failed(e),
            None => Step::Done,
        },
    }
}

/// Decode each wire item with `decode` until the stream ends, fails, is
/// cancelled or runs out of time. Errors end the stream.
pub(crate) fn guarded<T, U, F>(
    mut inner: WireStream<T>,
    guard: StreamGuard,
    mut decode: F,
) -> BoxStream<'static, Result<U>>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    async_stream::stream! {
        loop {
            match next_step(&mut inner, &guard).await {
                Step::Item(item) => {
                    if guard.cancel.is_cancelled() {
                        yield Err::<U, Error>(guard.cancelled());
                        break;
                    }
                    yield Ok(decode(item));
                }
                Step::Failed(e) => {
                    yield Err(e);
                    break;
                }
                Step::Done => break,
                Step::Cancelled => {
                    yield Err(guard.cancelled());
                    break;
                }
                Step::Expired => {
                    yield Err(guard.expired());
                    break;
                }
            }
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn guard(deadline: Option<Instant>) -> StreamGuard {
        StreamGuard {
            operation: "List",
            cancel: CancellationToken::new(),
            deadline,
            timeout: Duration::from_millis(20),
            metrics: Arc::new(ClientMetrics::new()),
        }
    }

    #[tokio::test]
    async fn test_passes_items_through() {
        let inner: WireStream<u32> = futures::stream::iter(vec![Ok(1), Ok(2), Ok(3)]).boxed();
        let items: Vec<u32> = guarded(inner, guard(None), |n| n * 10)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let inner: WireStream<u32> = futures::stream::iter(vec![
            Ok(1),
            Err(Error::Internal("broken".into())),
            Ok(3),
        ])
        .boxed();
        let results: Vec<Result<u32>> = guarded(inner, guard(None), |n| n).collect().await;
        assert_eq!(results.len(), 2);
        assert_matches!(results[1], Err(Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_deadline_ends_stalled_stream() {
        let inner: WireStream<u32> = futures::stream::iter(vec![Ok(1)])
            .chain(futures::stream::pending())
            .boxed();
        let deadline = Instant::now() + Duration::from_millis(20);
        let mut stream = guarded(inner, guard(Some(deadline)), |n| n);

        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert_matches!(
            stream.next().await,
            Some(Err(Error::DeadlineExceeded { operation: "List", .. }))
        );
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_wins_over_pending_items() {
        let guard = guard(None);
        let token = guard.cancel.clone();
        let metrics = guard.metrics.clone();
        let inner: WireStream<u32> = futures::stream::pending().boxed();
        let mut stream = guarded(inner, guard, |n| n);

        tokio_test::assert_pending!(futures::poll!(stream.next()));
        token.cancel();
        assert_matches!(stream.next().await, Some(Err(Error::Cancelled { .. })));
        assert!(stream.next().await.is_none());
        assert_eq!(metrics.snapshot().cancelled_streams, 1);
    }
}
