// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! One-shot "connection lost" signal
//!
//! Each session gets a fresh pair. The notifier side is handed to the
//! register link (which fires it when it gives up on the remote end); the
//! waiter side stays with the connection supervisor.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Create a linked notifier/waiter pair for one session
pub fn connection_lost_pair() -> (ConnectionLostNotifier, ConnectionLost) {
    let (sender, receiver) = oneshot::channel();
    (
        ConnectionLostNotifier {
            sender: Arc::new(Mutex::new(Some(sender))),
        },
        ConnectionLost { receiver },
    )
}

/// Firing side; cloneable, fires at most once
#[derive(Debug, Clone)]
pub struct ConnectionLostNotifier {
    sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl ConnectionLostNotifier {
    /// Fire the signal. Returns `false` if it had already been fired.
    pub fn notify(&self) -> bool {
        match self.sender.lock().take() {
            Some(sender) => {
                let _ = sender.send(());
                true
            }
            None => false,
        }
    }

    pub fn is_notified(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// Waiting side, owned by the session
#[derive(Debug)]
pub struct ConnectionLost {
    receiver: oneshot::Receiver<()>,
}

impl ConnectionLost {
    /// Resolves once the notifier fires, or once every notifier is dropped
    pub async fn wait(self) {
        let _ = self.receiver.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fires_exactly_once() {
        let (notifier, lost) = connection_lost_pair();
        let clone = notifier.clone();
        assert!(!notifier.is_notified());
        assert!(clone.notify());
        assert!(!notifier.notify());
        assert!(notifier.is_notified());
        tokio::time::timeout(Duration::from_secs(1), lost.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_notifier_resolves_waiter() {
        let (notifier, lost) = connection_lost_pair();
        drop(notifier);
        tokio::time::timeout(Duration::from_secs(1), lost.wait())
            .await
            .unwrap();
    }
}
