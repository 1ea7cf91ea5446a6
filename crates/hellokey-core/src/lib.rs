use std::sync::Arc;

use tracing::warn;

mod authenticate;
mod hello_store;
mod memory_store;
pub mod pem;
mod provision;
pub mod status;
mod types;

pub use authenticate::authenticate;
pub use hello_store::HelloStore;
pub use memory_store::{MemoryHandle, MemoryStore};
pub use provision::{provision, ProvisionReport, ProvisionRequest};
pub use status::{exit_code, Status};
pub use types::{
    validate_key_name, CoreError, CredentialStore, Outcome, Provisioned, PublicKey, Result,
    Signature, StoreResult,
};

/// Runs one store operation on the blocking pool and waits for it.
///
/// Store calls may sit on the presence prompt for as long as the user takes,
/// so they never run on the async executor itself. A worker that panics is
/// reported as `UnknownError`.
pub(crate) async fn run_blocking<S, T, F>(store: &Arc<S>, op: F) -> StoreResult<T>
where
    S: CredentialStore + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || op(&store)).await {
        Ok(result) => result,
        Err(err) => {
            warn!(?err, "credential store worker failed");
            Err(Outcome::UnknownError)
        }
    }
}
