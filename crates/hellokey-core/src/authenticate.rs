use std::io::Write;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::status::status;
use crate::{run_blocking, validate_key_name, CredentialStore, Outcome, Result};

/// Signs `payload` with the named credential and writes the raw signature to
/// `out`.
///
/// Returns the process exit code. On any failure the mapped message goes to
/// `err` and `out` is left untouched, so `out` only ever carries signature
/// bytes. A failing sign step is reported with its own outcome.
pub async fn authenticate<S, W, E>(
    store: Arc<S>,
    key_name: &str,
    payload: Vec<u8>,
    out: &mut W,
    err: &mut E,
) -> Result<u8>
where
    S: CredentialStore + 'static,
    W: Write,
    E: Write,
{
    let key_name = validate_key_name(key_name)?;

    match run_blocking(&store, |store| Ok(store.is_supported())).await {
        Ok(true) => {}
        Ok(false) => return report(key_name, Outcome::NotSupported, err),
        Err(outcome) => return report(key_name, outcome, err),
    }

    let name = key_name.to_string();
    let handle = match run_blocking(&store, move |store| store.open(&name)).await {
        Ok(handle) => handle,
        Err(outcome) => return report(key_name, outcome, err),
    };

    debug!(key_name = %key_name, bytes = payload.len(), "requesting signature");
    let signature = match run_blocking(&store, move |store| store.sign(&handle, &payload)).await {
        Ok(signature) => signature,
        Err(outcome) => return report(key_name, outcome, err),
    };

    out.write_all(signature.as_bytes())?;
    out.flush()?;
    debug!(key_name = %key_name, bytes = signature.len(), "signature written");
    Ok(0)
}

fn report<E: Write>(key_name: &str, outcome: Outcome, err: &mut E) -> Result<u8> {
    let status = status(outcome, key_name);
    warn!(key_name = %key_name, ?outcome, code = status.code, "authentication failed");
    writeln!(err, "{}", status.message)?;
    Ok(status.code)
}
