#[cfg(windows)]
mod platform {
    use tracing::{debug, warn};
    use windows::core::{Array, HSTRING};
    use windows::Security::Credentials::{
        KeyCredential, KeyCredentialCreationOption, KeyCredentialManager, KeyCredentialStatus,
    };
    use windows::Security::Cryptography::CryptographicBuffer;
    use windows::Storage::Streams::IBuffer;

    use crate::{CredentialStore, Outcome, Provisioned, PublicKey, Signature, StoreResult};

    /// Windows Hello key credentials through `KeyCredentialManager`.
    ///
    /// Every call blocks on the WinRT async operation, which in turn may wait
    /// on the user answering the Hello prompt.
    #[derive(Clone, Debug, Default)]
    pub struct HelloStore;

    impl HelloStore {
        pub fn new() -> Self {
            Self
        }

        fn open_credential(&self, name: &HSTRING) -> StoreResult<KeyCredential> {
            let result = KeyCredentialManager::OpenAsync(name)
                .and_then(|op| op.get())
                .map_err(|err| platform_error("open", err))?;
            let status = result
                .Status()
                .map_err(|err| platform_error("open status", err))?;
            match outcome_from_status(status) {
                Outcome::Success => result
                    .Credential()
                    .map_err(|err| platform_error("open credential", err)),
                other => Err(other),
            }
        }
    }

    impl CredentialStore for HelloStore {
        type Handle = KeyCredential;

        fn is_supported(&self) -> bool {
            match KeyCredentialManager::IsSupportedAsync().and_then(|op| op.get()) {
                Ok(supported) => supported,
                Err(err) => {
                    warn!(?err, "windows hello availability check failed");
                    false
                }
            }
        }

        fn create_or_open(&self, name: &str) -> StoreResult<Provisioned> {
            if !self.is_supported() {
                return Err(Outcome::NotSupported);
            }
            let name = HSTRING::from(name);
            let result = KeyCredentialManager::RequestCreateAsync(
                &name,
                KeyCredentialCreationOption::FailIfExists,
            )
            .and_then(|op| op.get())
            .map_err(|err| platform_error("create", err))?;
            let status = result
                .Status()
                .map_err(|err| platform_error("create status", err))?;

            match outcome_from_status(status) {
                Outcome::Success => {
                    let credential = result
                        .Credential()
                        .map_err(|err| platform_error("create credential", err))?;
                    Ok(Provisioned {
                        outcome: Outcome::Success,
                        public_key: retrieve_public_key(&credential)?,
                    })
                }
                Outcome::AlreadyExists => {
                    debug!(key_name = %name, "credential exists, opening it instead");
                    let credential = self.open_credential(&name)?;
                    Ok(Provisioned {
                        outcome: Outcome::AlreadyExists,
                        public_key: retrieve_public_key(&credential)?,
                    })
                }
                other => Err(other),
            }
        }

        fn open(&self, name: &str) -> StoreResult<KeyCredential> {
            if !self.is_supported() {
                return Err(Outcome::NotSupported);
            }
            self.open_credential(&HSTRING::from(name))
        }

        fn sign(&self, handle: &KeyCredential, payload: &[u8]) -> StoreResult<Signature> {
            let buffer = CryptographicBuffer::CreateFromByteArray(payload)
                .map_err(|err| platform_error("payload buffer", err))?;
            let result = handle
                .RequestSignAsync(&buffer)
                .and_then(|op| op.get())
                .map_err(|err| platform_error("sign", err))?;
            let status = result
                .Status()
                .map_err(|err| platform_error("sign status", err))?;
            match outcome_from_status(status) {
                Outcome::Success => {
                    let signature = result
                        .Result()
                        .map_err(|err| platform_error("sign result", err))?;
                    Ok(Signature::new(buffer_to_vec(&signature)?))
                }
                other => Err(other),
            }
        }

        fn store_kind(&self) -> &'static str {
            "windows_hello"
        }
    }

    fn retrieve_public_key(credential: &KeyCredential) -> StoreResult<PublicKey> {
        let buffer = credential
            .RetrievePublicKeyWithDefaultBlobType()
            .map_err(|err| platform_error("public key", err))?;
        Ok(PublicKey::new(buffer_to_vec(&buffer)?))
    }

    fn buffer_to_vec(buffer: &IBuffer) -> StoreResult<Vec<u8>> {
        let mut bytes = Array::<u8>::new();
        CryptographicBuffer::CopyToByteArray(buffer, &mut bytes)
            .map_err(|err| platform_error("copy buffer", err))?;
        Ok(bytes.to_vec())
    }

    fn outcome_from_status(status: KeyCredentialStatus) -> Outcome {
        match status {
            KeyCredentialStatus::Success => Outcome::Success,
            KeyCredentialStatus::CredentialAlreadyExists => Outcome::AlreadyExists,
            KeyCredentialStatus::NotFound => Outcome::NotFound,
            KeyCredentialStatus::SecurityDeviceLocked => Outcome::SecurityDeviceLocked,
            KeyCredentialStatus::UserCanceled => Outcome::UserCanceled,
            KeyCredentialStatus::UserPrefersPassword => Outcome::UserPrefersPassword,
            _ => Outcome::UnknownError,
        }
    }

    fn platform_error(operation: &'static str, err: windows::core::Error) -> Outcome {
        warn!(operation, ?err, "windows hello call failed");
        Outcome::UnknownError
    }
}

#[cfg(not(windows))]
mod platform {
    use crate::{CredentialStore, Outcome, Provisioned, Signature, StoreResult};

    #[derive(Clone, Debug, Default)]
    pub struct HelloStore;

    impl HelloStore {
        pub fn new() -> Self {
            Self
        }
    }

    impl CredentialStore for HelloStore {
        type Handle = ();

        fn is_supported(&self) -> bool {
            false
        }

        fn create_or_open(&self, _name: &str) -> StoreResult<Provisioned> {
            Err(Outcome::NotSupported)
        }

        fn open(&self, _name: &str) -> StoreResult<()> {
            Err(Outcome::NotSupported)
        }

        fn sign(&self, _handle: &(), _payload: &[u8]) -> StoreResult<Signature> {
            Err(Outcome::NotSupported)
        }

        fn store_kind(&self) -> &'static str {
            "windows_hello"
        }
    }
}

pub use platform::HelloStore;
