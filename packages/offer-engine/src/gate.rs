//! Single-flight lock shared by all offer mutations.

use std::sync::atomic::{AtomicBool, Ordering};

/// At most one mutation runs at a time. A second caller is turned away
/// instead of queued.
#[derive(Debug, Default)]
pub struct MutationGate {
    busy: AtomicBool,
}

impl MutationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another guard is alive.
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// RAII guard from [`MutationGate::try_acquire`]. Reopens the gate on drop,
/// including when the holding future is cancelled.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a MutationGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let gate = MutationGate::new();
        let guard = gate.try_acquire();
        assert!(guard.is_some());
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_holder_releases() {
        let gate = MutationGate::new();
        let holder = async {
            let _guard = gate.try_acquire();
            std::future::pending::<()>().await;
        };
        let _ = tokio::time::timeout(std::time::Duration::from_millis(1), holder).await;
        assert!(!gate.is_busy());
    }
}
