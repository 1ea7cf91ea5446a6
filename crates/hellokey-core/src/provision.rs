use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::pem::{check_key_file_name, pem_file_name, write_public_key};
use crate::status::{message, EXIT_EXISTING_KEY, EXIT_PROVISION_FAILED};
use crate::{run_blocking, validate_key_name, CredentialStore, Outcome, Result};

#[derive(Clone, Debug)]
pub struct ProvisionRequest {
    pub key_name: String,
    pub output_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ProvisionReport {
    pub exit_code: u8,
    pub outcome: Outcome,
    /// Set only when the key file was written.
    pub pem_path: Option<PathBuf>,
}

/// Creates the credential, or falls back to the existing one, and writes its
/// public key to `<key_name>.pem`.
///
/// `Success` exits 0 and `AlreadyExists` exits 170; both write the file.
/// Anything else exits 1 without touching the filesystem.
pub async fn provision<S, W, E>(
    store: Arc<S>,
    request: &ProvisionRequest,
    out: &mut W,
    err: &mut E,
) -> Result<ProvisionReport>
where
    S: CredentialStore + 'static,
    W: Write,
    E: Write,
{
    let key_name = check_key_file_name(validate_key_name(&request.key_name)?)?.to_string();
    let name = key_name.clone();
    let result = run_blocking(&store, move |store| store.create_or_open(&name)).await;

    let (exit_code, provisioned) = match result {
        Ok(provisioned) if provisioned.outcome == Outcome::Success => (0, provisioned),
        Ok(provisioned) if provisioned.outcome == Outcome::AlreadyExists => {
            writeln!(
                out,
                "Error: the key already exists; outputting the existing public key."
            )?;
            (EXIT_EXISTING_KEY, provisioned)
        }
        Ok(provisioned) => return fail(&key_name, provisioned.outcome, err),
        Err(outcome) => return fail(&key_name, outcome, err),
    };

    let path = write_public_key(&request.output_dir, &key_name, &provisioned.public_key)?;
    info!(
        key_name = %key_name,
        path = %path.display(),
        fingerprint = %provisioned.public_key.fingerprint(),
        store = store.store_kind(),
        "public key written"
    );
    writeln!(
        out,
        "Done. The public key is written to '{}'",
        pem_file_name(&key_name)
    )?;

    Ok(ProvisionReport {
        exit_code,
        outcome: provisioned.outcome,
        pem_path: Some(path),
    })
}

fn fail<E: Write>(key_name: &str, outcome: Outcome, err: &mut E) -> Result<ProvisionReport> {
    warn!(key_name = %key_name, ?outcome, "key creation failed");
    writeln!(err, "Error: key creation failed: {}", message(outcome, key_name))?;
    Ok(ProvisionReport {
        exit_code: EXIT_PROVISION_FAILED,
        outcome,
        pem_path: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pem::encode_public_key;
    use crate::{CoreError, MemoryStore, PublicKey};

    fn request(dir: &std::path::Path, name: &str) -> ProvisionRequest {
        ProvisionRequest {
            key_name: name.to_string(),
            output_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn new_credential_exits_zero_and_writes_pem() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let (mut out, mut err) = (Vec::new(), Vec::new());

        let report = provision(store.clone(), &request(temp.path(), "alice"), &mut out, &mut err)
            .await
            .expect("provision");

        assert_eq!(report.exit_code, 0);
        assert_eq!(report.outcome, Outcome::Success);
        let path = temp.path().join("alice.pem");
        assert_eq!(report.pem_path.as_deref(), Some(path.as_path()));
        let pem = std::fs::read_to_string(&path).expect("pem");
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
        assert!(pem.ends_with("-----END PUBLIC KEY-----\n"));
        assert!(String::from_utf8(out)
            .expect("utf8")
            .contains("Done. The public key is written to 'alice.pem'"));
        assert!(err.is_empty());
        assert!(store.contains("alice"));
    }

    #[tokio::test]
    async fn rerun_exits_170_and_keeps_same_key() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let req = request(temp.path(), "alice");

        let first = provision(store.clone(), &req, &mut Vec::new(), &mut Vec::new())
            .await
            .expect("first");
        let first_pem = std::fs::read_to_string(temp.path().join("alice.pem")).expect("pem");

        let mut out = Vec::new();
        let second = provision(store, &req, &mut out, &mut Vec::new())
            .await
            .expect("second");
        let second_pem = std::fs::read_to_string(temp.path().join("alice.pem")).expect("pem");

        assert_eq!(first.exit_code, 0);
        assert_eq!(second.exit_code, 170);
        assert_eq!(second.outcome, Outcome::AlreadyExists);
        assert_eq!(first_pem, second_pem);
        assert!(String::from_utf8(out)
            .expect("utf8")
            .contains("already exists"));
    }

    #[tokio::test]
    async fn existing_key_file_is_overwritten() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("alice.pem"), "old contents").expect("seed");
        let store = Arc::new(MemoryStore::new());
        let key = PublicKey::new(vec![5; 65]);
        store.insert("alice", key.clone());

        let report = provision(
            store,
            &request(temp.path(), "alice"),
            &mut Vec::new(),
            &mut Vec::new(),
        )
        .await
        .expect("provision");

        assert_eq!(report.exit_code, 170);
        let pem = std::fs::read_to_string(temp.path().join("alice.pem")).expect("pem");
        assert_eq!(pem, encode_public_key(&key));
    }

    #[tokio::test]
    async fn store_failure_exits_one_without_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        for (store, outcome) in [
            (MemoryStore::unsupported(), Outcome::NotSupported),
            (MemoryStore::new().locked(), Outcome::SecurityDeviceLocked),
        ] {
            let mut err = Vec::new();
            let report = provision(
                Arc::new(store),
                &request(temp.path(), "alice"),
                &mut Vec::new(),
                &mut err,
            )
            .await
            .expect("provision");

            assert_eq!(report.exit_code, 1);
            assert_eq!(report.outcome, outcome);
            assert!(report.pem_path.is_none());
            assert!(!temp.path().join("alice.pem").exists());
            let err = String::from_utf8(err).expect("utf8");
            assert!(err.contains(&message(outcome, "alice")));
        }
    }

    #[tokio::test]
    async fn empty_name_never_reaches_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let result = provision(
            store.clone(),
            &request(temp.path(), ""),
            &mut Vec::new(),
            &mut Vec::new(),
        )
        .await;
        assert!(matches!(result, Err(CoreError::InvalidKeyName(_))));
        assert!(!store.contains(""));
    }

    #[tokio::test]
    async fn path_like_name_never_reaches_store() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        for name in ["sub/alice", "/tmp/alice"] {
            let result = provision(
                store.clone(),
                &request(temp.path(), name),
                &mut Vec::new(),
                &mut Vec::new(),
            )
            .await;
            assert!(matches!(result, Err(CoreError::InvalidKeyName(_))), "{name}");
            assert!(!store.contains(name));
        }
    }
}
