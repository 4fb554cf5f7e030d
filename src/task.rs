// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Detached background work.

use std::future::Future;

use tokio::runtime::Handle;
use tracing::warn;

/// Whether a tokio runtime is available on this thread.
pub(crate) fn runtime_available() -> bool {
    Handle::try_current().is_ok()
}

/// Spawn `future` without awaiting it.
///
/// Returns `false` (and drops the future) when no runtime is running.
pub(crate) fn spawn_detached<F>(what: &'static str, future: F) -> bool
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
            true
        }
        Err(_) => {
            warn!(task = what, "No tokio runtime; skipping call tracking");
            false
        }
    }
}
