// 8.4 engine/guard.rs: one engine call at a time. a collaborator that calls back into
// the engine while an operation is running gets `Reentrant` instead of a half-loaded
// context.

use super::results::EngineError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag marking an operation in progress. Clones see the same flag, so a
/// collaborator can hold one and check it.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    active: Arc<AtomicBool>,
}

/// Held for the duration of an operation; dropping it releases the guard.
#[derive(Debug)]
pub struct GuardToken {
    active: Arc<AtomicBool>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> Result<GuardToken, EngineError> {
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(EngineError::Reentrant);
        }
        Ok(GuardToken {
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_enter_rejected_until_released() {
        let guard = ReentrancyGuard::new();
        let token = guard.enter().unwrap();
        assert!(guard.is_active());
        assert!(matches!(guard.clone().enter(), Err(EngineError::Reentrant)));

        drop(token);
        assert!(!guard.is_active());
        assert!(guard.enter().is_ok());
    }
}
