use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("invalid key name: {0}")]
    InvalidKeyName(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Result category reported by every credential store operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Outcome {
    Success,
    AlreadyExists,
    NotFound,
    SecurityDeviceLocked,
    UserCanceled,
    UserPrefersPassword,
    UnknownError,
    NotSupported,
}

impl Outcome {
    pub const ALL: [Outcome; 8] = [
        Outcome::Success,
        Outcome::AlreadyExists,
        Outcome::NotFound,
        Outcome::SecurityDeviceLocked,
        Outcome::UserCanceled,
        Outcome::UserPrefersPassword,
        Outcome::UnknownError,
        Outcome::NotSupported,
    ];
}

/// Store results. The error side never carries [`Outcome::Success`].
pub type StoreResult<T> = std::result::Result<T, Outcome>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// OpenSSH-style `SHA256:` fingerprint of the raw key blob.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0);
        format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Public key handed back by `create_or_open`, tagged with whether the
/// credential was just created (`Success`) or already present
/// (`AlreadyExists`).
#[derive(Clone, Debug)]
pub struct Provisioned {
    pub outcome: Outcome,
    pub public_key: PublicKey,
}

pub trait CredentialStore: Send + Sync {
    type Handle: Send + 'static;

    fn is_supported(&self) -> bool;
    fn create_or_open(&self, name: &str) -> StoreResult<Provisioned>;
    fn open(&self, name: &str) -> StoreResult<Self::Handle>;
    fn sign(&self, handle: &Self::Handle, payload: &[u8]) -> StoreResult<Signature>;
    fn store_kind(&self) -> &'static str {
        "unknown"
    }
}

pub fn validate_key_name(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(CoreError::InvalidKeyName("name must not be empty"));
    }
    Ok(name)
}
