// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Worker threads for pessimistic timeouts and the default [`Spawner`].

use std::thread;

use anyspawn::Spawner;

const WORKER_THREAD_NAME: &str = "curfew-worker";

/// Returns the spawner used when none is configured.
///
/// Every unit of work is driven to completion on its own worker thread, which works with any
/// runtime (or none).
pub(crate) fn thread_spawner() -> Spawner {
    Spawner::new_custom(WORKER_THREAD_NAME, |work| spawn_worker(move || futures::executor::block_on(work)))
}

/// Runs `work` on a fresh, named worker thread.
///
/// # Panics
///
/// Panics if the operating system refuses to start the thread.
pub(crate) fn spawn_worker(work: impl FnOnce() + Send + 'static) {
    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(work)
        .expect("the operating system refused to start a curfew worker thread");
}
