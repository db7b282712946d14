// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tokio runtime helpers
//!
//! The component manager runs its tasks on the ambient runtime when it is
//! created inside a multi-threaded one, and on its own runtime otherwise.

use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tokio::task::block_in_place;

/// Create the runtime hosting the supervisor, poller and command worker
pub fn create_runtime() -> Result<Runtime, std::io::Error> {
    Builder::new_multi_thread()
        .thread_name("b5dc-supervisor")
        .enable_all()
        .build()
}

/// Ambient runtime handle, if it can host blocking callers
///
/// A current-thread runtime cannot: blocking its only thread would stall the
/// tasks the caller is waiting for.
pub fn ambient_multi_thread_handle() -> Option<Handle> {
    Handle::try_current()
        .ok()
        .filter(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
}

/// Block the calling thread on `future`, which runs on `handle`'s runtime
///
/// On a multi-threaded runtime worker this uses `block_in_place`. On a
/// current-thread runtime, where neither `block_in_place` nor a nested
/// `block_on` is allowed, the future is driven from a scoped helper thread;
/// `handle` must then belong to a different runtime.
pub fn block_on_handle<F>(handle: &Handle, future: F) -> F::Output
where
    F: Future + Send,
    F::Output: Send,
{
    match Handle::try_current() {
        Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
            block_in_place(|| handle.block_on(future))
        }
        Ok(_) => std::thread::scope(|scope| {
            match scope.spawn(|| handle.block_on(future)).join() {
                Ok(output) => output,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }),
        Err(_) => handle.block_on(future),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_block_on_outside_runtime() {
        let runtime = create_runtime().unwrap();
        let value = block_on_handle(runtime.handle(), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            7
        });
        assert_eq!(value, 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_block_on_inside_runtime() {
        let handle = Handle::current();
        assert!(ambient_multi_thread_handle().is_some());
        let value = block_on_handle(&handle, async { 11 });
        assert_eq!(value, 11);
    }

    #[tokio::test]
    async fn test_block_on_from_current_thread_runtime() {
        assert!(ambient_multi_thread_handle().is_none());

        let runtime = create_runtime().unwrap();
        let value = block_on_handle(runtime.handle(), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            13
        });
        assert_eq!(value, 13);
        runtime.shutdown_background();
    }
}
