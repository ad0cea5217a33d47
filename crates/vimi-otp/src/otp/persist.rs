//! Persistence collaborator for the credential list.
//!
//! The engine only needs "read everything" and "write everything"; the
//! backing store (a JSON file, a browser key-value area, ...) lives outside.

use std::sync::{Arc, Mutex};

use crate::otp::types::*;

/// Durable home of the credential list. `get` is the source of truth on
/// start; `set` is asked to persist the whole list after every mutation.
pub trait CredentialPersistence: Send + Sync {
    fn get(&self) -> Result<Vec<Credential>, OtpError>;
    fn set(&self, credentials: &[Credential]) -> Result<(), OtpError>;
}

/// Volatile persistence, used by tests and as a fallback when nothing
/// durable is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    credentials: Vec<Credential>,
    writes: usize,
    fail_writes: bool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing list, as if it had been saved earlier.
    pub fn with_credentials(credentials: Vec<Credential>) -> Self {
        let p = Self::new();
        if let Ok(mut inner) = p.inner.lock() {
            inner.credentials = credentials;
        }
        p
    }

    /// Make every subsequent `set` fail.
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_writes = fail;
        }
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> usize {
        self.inner.lock().map(|i| i.writes).unwrap_or(0)
    }

    /// Snapshot of what is currently persisted.
    pub fn snapshot(&self) -> Vec<Credential> {
        self.inner
            .lock()
            .map(|i| i.credentials.clone())
            .unwrap_or_default()
    }
}

impl CredentialPersistence for MemoryPersistence {
    fn get(&self) -> Result<Vec<Credential>, OtpError> {
        let inner = self.inner.lock().map_err(|_| poisoned())?;
        Ok(inner.credentials.clone())
    }

    fn set(&self, credentials: &[Credential]) -> Result<(), OtpError> {
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        if inner.fail_writes {
            return Err(OtpError::new(
                OtpErrorKind::PersistenceFailure,
                "Simulated write failure",
            ));
        }
        inner.credentials = credentials.to_vec();
        inner.writes += 1;
        Ok(())
    }
}

fn poisoned() -> OtpError {
    OtpError::new(OtpErrorKind::PersistenceFailure, "Persistence lock poisoned")
}
