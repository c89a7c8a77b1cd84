//! Single-assignment completion handles.
//!
//! A [`Deferred`] is the producer side of a pending operation; it is consumed
//! by `resolve`/`reject`, so it can be settled at most once. The matching
//! [`Promise`] is a future yielding the settled value. If the producer is
//! dropped without settling, the promise completes with an illegal-state
//! error instead of hanging.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::errors::RuntimeError;

/// Producer side of a pending result.
#[derive(Debug)]
pub struct Deferred<T, E> {
    sender: oneshot::Sender<Result<T, E>>,
}

/// Consumer side of a pending result.
#[derive(Debug)]
pub struct Promise<T, E> {
    receiver: oneshot::Receiver<Result<T, E>>,
}

/// Create a connected deferred/promise pair.
pub fn deferred<T, E>() -> (Deferred<T, E>, Promise<T, E>) {
    let (sender, receiver) = oneshot::channel();
    (Deferred { sender }, Promise { receiver })
}

impl<T, E> Deferred<T, E> {
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(self, error: E) {
        self.settle(Err(error));
    }

    pub fn settle(self, result: Result<T, E>) {
        // The consumer may have stopped waiting; that is not an error.
        let _ = self.sender.send(result);
    }
}

impl<T, E> Future for Promise<T, E>
where
    E: From<RuntimeError>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RuntimeError::IllegalState(
                "deferred dropped before it was settled".to_string(),
            )
            .into())),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DiscoveryFailure;

    #[tokio::test]
    async fn test_resolve_after_await_started() {
        let (deferred, promise) = deferred::<u32, DiscoveryFailure>();
        let waiter = tokio::spawn(promise);
        tokio::task::yield_now().await;
        deferred.resolve(42);
        assert_eq!(waiter.await.unwrap(), Ok(42));
    }

    #[test]
    fn test_promise_pending_until_settled() {
        let (deferred, promise) = deferred::<&str, DiscoveryFailure>();
        let mut task = tokio_test::task::spawn(promise);
        tokio_test::assert_pending!(task.poll());

        deferred.reject(DiscoveryFailure::Runtime(RuntimeError::Other("boom".to_string())));
        assert!(task.is_woken());
        let result = tokio_test::assert_ready!(task.poll());
        assert!(matches!(result, Err(DiscoveryFailure::Runtime(RuntimeError::Other(_)))));
    }

    #[tokio::test]
    async fn test_dropped_deferred_rejects() {
        let (deferred, promise) = deferred::<(), DiscoveryFailure>();
        drop(deferred);
        let result = promise.await;
        assert!(matches!(
            result,
            Err(DiscoveryFailure::Runtime(RuntimeError::IllegalState(_)))
        ));
    }
}
