use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::{CredentialStore, Outcome, Provisioned, PublicKey, Signature, StoreResult};

/// In-process credential store with scripted outcomes.
///
/// Keys and signatures are SHA-256 digests, not real key material; the store
/// exists so the flows can run without an authenticator attached.
#[derive(Debug)]
pub struct MemoryStore {
    credentials: Mutex<HashMap<String, PublicKey>>,
    created: AtomicU64,
    supported: bool,
    locked: bool,
    sign_outcome: Option<Outcome>,
}

#[derive(Clone, Debug)]
pub struct MemoryHandle {
    name: String,
    public_key: PublicKey,
}

impl MemoryHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            credentials: Mutex::new(HashMap::new()),
            created: AtomicU64::new(0),
            supported: true,
            locked: false,
            sign_outcome: None,
        }
    }

    /// A store on a device without an authenticator.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    /// Every `sign` call fails with `outcome`, as if the user declined the
    /// presence prompt.
    pub fn with_sign_outcome(mut self, outcome: Outcome) -> Self {
        self.sign_outcome = Some(outcome);
        self
    }

    pub fn insert(&self, name: &str, public_key: PublicKey) {
        if let Ok(mut credentials) = self.credentials.lock() {
            credentials.insert(name.to_string(), public_key);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.credentials
            .lock()
            .map(|credentials| credentials.contains_key(name))
            .unwrap_or(false)
    }

    fn check_available(&self) -> StoreResult<()> {
        if !self.supported {
            return Err(Outcome::NotSupported);
        }
        if self.locked {
            return Err(Outcome::SecurityDeviceLocked);
        }
        Ok(())
    }

    fn generate_key(&self, name: &str) -> PublicKey {
        let serial = self.created.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(b"hellokey-memory-key");
        hasher.update(name.as_bytes());
        hasher.update(serial.to_be_bytes());
        PublicKey::new(hasher.finalize().to_vec())
    }
}

impl CredentialStore for MemoryStore {
    type Handle = MemoryHandle;

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create_or_open(&self, name: &str) -> StoreResult<Provisioned> {
        self.check_available()?;
        let mut credentials = self.credentials.lock().map_err(|_| Outcome::UnknownError)?;
        if let Some(existing) = credentials.get(name) {
            return Ok(Provisioned {
                outcome: Outcome::AlreadyExists,
                public_key: existing.clone(),
            });
        }
        let public_key = self.generate_key(name);
        credentials.insert(name.to_string(), public_key.clone());
        Ok(Provisioned {
            outcome: Outcome::Success,
            public_key,
        })
    }

    fn open(&self, name: &str) -> StoreResult<MemoryHandle> {
        self.check_available()?;
        let credentials = self.credentials.lock().map_err(|_| Outcome::UnknownError)?;
        let public_key = credentials.get(name).cloned().ok_or(Outcome::NotFound)?;
        Ok(MemoryHandle {
            name: name.to_string(),
            public_key,
        })
    }

    fn sign(&self, handle: &MemoryHandle, payload: &[u8]) -> StoreResult<Signature> {
        self.check_available()?;
        if let Some(outcome) = self.sign_outcome {
            return Err(outcome);
        }
        let mut hasher = Sha256::new();
        hasher.update(handle.public_key.as_bytes());
        hasher.update(payload);
        Ok(Signature::new(hasher.finalize().to_vec()))
    }

    fn store_kind(&self) -> &'static str {
        "memory"
    }
}
