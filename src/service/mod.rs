//! Entity services exposed to handlers.
//!
//! [`CrudService`] maps between the repository's DBOs and the DTOs callers see.
//! [`CachedCrudService`] layers a read-through / write-through cache on top of it.
//!
//! Every operation takes a [`CancellationToken`]. Cancelling it drops the in-flight
//! backing-store call and returns [`Error::Cancelled`]; the cache is only touched after the
//! store has answered, so a cancelled call leaves it as it was.

use crate::error::{Error, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub mod cached;
pub mod crud;

pub use cached::CachedCrudService;
pub use crud::CrudService;

/// Run `op` unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Operation cancelled before the backing store answered");
            Err(Error::Cancelled)
        }
        result = op => result,
    }
}
