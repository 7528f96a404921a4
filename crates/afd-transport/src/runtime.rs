//! Async primitives shared by the transports and clients.
//!
//! The lock comes from `async-lock` so that lock-holding code does not
//! depend on a particular executor; channels use Tokio.

/// An async `RwLock`.
pub use async_lock::RwLock as AsyncRwLock;

/// Sender half of an unbounded MPSC channel.
pub type Sender<T> = tokio::sync::mpsc::UnboundedSender<T>;

/// Receiver half of an unbounded MPSC channel.
pub type Receiver<T> = tokio::sync::mpsc::UnboundedReceiver<T>;

/// Create an unbounded channel.
///
/// Handlers registered on a transport are synchronous closures; they hand
/// messages to async code through this channel without blocking.
#[must_use]
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    tokio::sync::mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_preserves_order() {
        let (tx, mut rx) = channel();
        for i in 0..3 {
            tx.send(i).unwrap();
        }
        drop(tx);
        let mut seen = Vec::new();
        while let Some(i) = rx.recv().await {
            seen.push(i);
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_rwlock_reexport() {
        let lock = AsyncRwLock::new(1);
        *lock.write().await += 1;
        assert_eq!(*lock.read().await, 2);
    }
}
