use arbor_assets::AssetError;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

/// Mutual exclusion for bulk synchronization.
///
/// Clones share the same lock, so synchronizers that must not fetch the same
/// subtree concurrently are built over clones of one gate.
#[derive(Clone, Default)]
pub struct SyncGate {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of one bulk synchronization; released on drop.
pub struct SyncGateGuard {
    _guard: OwnedMutexGuard<()>,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the gate, giving up if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<SyncGateGuard, AssetError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AssetError::Cancelled),
            guard = Arc::clone(&self.inner).lock_owned() => Ok(SyncGateGuard { _guard: guard }),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_waiter_does_not_take_the_gate() {
        let gate = SyncGate::new();
        let held = gate.acquire(&CancellationToken::new()).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = gate.clone().acquire(&cancel).await.err().unwrap();
        assert!(err.is_cancelled());

        drop(held);
        assert!(!gate.is_locked());
        let _again = gate.acquire(&CancellationToken::new()).await.unwrap();
        assert!(gate.is_locked());
    }
}
