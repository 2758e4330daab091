//! Access-code gate in front of the conversation.
//!
//! A user proves access once by entering a shared code; success is remembered
//! in an [`AccessFlagStore`] so later sessions skip the prompt. After
//! [`MAX_ACCESS_ATTEMPTS`] wrong codes the gate locks until [`AccessGate::reset`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

pub const MAX_ACCESS_ATTEMPTS: u32 = 3;

/// Key under which a successful verification is remembered.
pub const VERIFICATION_KEY: &str = "avatar_access_verified";

/// Persistence for the "already verified" flag.
pub trait AccessFlagStore: Send + Sync {
    fn is_set(&self, key: &str) -> bool;
    fn set(&self, key: &str);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    flags: Mutex<HashSet<String>>,
}

impl AccessFlagStore for MemoryFlagStore {
    fn is_set(&self, key: &str) -> bool {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    fn set(&self, key: &str) {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
    }

    fn remove(&self, key: &str) {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Granted,
    Rejected { remaining: u32 },
    Locked,
}

impl AccessOutcome {
    /// Text to show under the code prompt, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            AccessOutcome::Granted => None,
            AccessOutcome::Rejected { remaining } => {
                Some(format!("Неверный код. Осталось попыток: {remaining}"))
            }
            AccessOutcome::Locked => Some(
                "Превышено максимальное количество попыток. Пожалуйста, обновите страницу."
                    .to_string(),
            ),
        }
    }
}

pub struct AccessGate {
    code: String,
    max_attempts: u32,
    attempts: AtomicU32,
    store: Arc<dyn AccessFlagStore>,
}

impl AccessGate {
    pub fn new(code: impl Into<String>, store: Arc<dyn AccessFlagStore>) -> Self {
        Self {
            code: code.into(),
            max_attempts: MAX_ACCESS_ATTEMPTS,
            attempts: AtomicU32::new(0),
            store,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.store.is_set(VERIFICATION_KEY)
    }

    pub fn is_locked(&self) -> bool {
        self.attempts.load(Ordering::SeqCst) >= self.max_attempts
    }

    pub fn verify(&self, code: &str) -> AccessOutcome {
        if self.is_locked() {
            return AccessOutcome::Locked;
        }
        if code == self.code {
            self.store.set(VERIFICATION_KEY);
            info!("Access code verified");
            return AccessOutcome::Granted;
        }
        let used = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let remaining = self.max_attempts.saturating_sub(used);
        warn!(remaining, "Wrong access code");
        AccessOutcome::Rejected { remaining }
    }

    /// Forgets a previous verification and unlocks the prompt.
    pub fn reset(&self) {
        self.store.remove(VERIFICATION_KEY);
        self.attempts.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> AccessGate {
        AccessGate::new("123456", Arc::new(MemoryFlagStore::default()))
    }

    #[test]
    fn test_correct_code_is_remembered() {
        let store = Arc::new(MemoryFlagStore::default());
        let gate = AccessGate::new("123456", store.clone());
        assert!(!gate.is_verified());
        assert_eq!(gate.verify("123456"), AccessOutcome::Granted);
        assert!(gate.is_verified());

        // A new gate over the same store starts out verified.
        let again = AccessGate::new("123456", store);
        assert!(again.is_verified());
    }

    #[test]
    fn test_locks_after_three_wrong_codes() {
        let gate = gate();
        assert_eq!(gate.verify("000000"), AccessOutcome::Rejected { remaining: 2 });
        assert_eq!(gate.verify("111111"), AccessOutcome::Rejected { remaining: 1 });
        let last = gate.verify("222222");
        assert_eq!(last, AccessOutcome::Rejected { remaining: 0 });
        assert_eq!(
            last.message().as_deref(),
            Some("Неверный код. Осталось попыток: 0")
        );
        assert!(gate.is_locked());

        // Even the right code is refused once locked.
        assert_eq!(gate.verify("123456"), AccessOutcome::Locked);
        assert!(!gate.is_verified());
    }

    #[test]
    fn test_reset_clears_flag_and_attempts() {
        let gate = gate();
        gate.verify("123456");
        gate.verify("bad");
        gate.reset();
        assert!(!gate.is_verified());
        assert!(!gate.is_locked());
        assert_eq!(gate.verify("bad"), AccessOutcome::Rejected { remaining: 2 });
    }
}
