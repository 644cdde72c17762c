//! Tokio runtime construction and bounded teardown.
//!
//! A counter read stuck in the kernel keeps its blocking-pool thread busy
//! after the session has been released. Dropping a runtime waits for every
//! blocking task, so the daemon ends its runtime through [`shutdown`], which
//! gives up on such threads after [`SHUTDOWN_GRACE`].

use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

/// How long teardown waits for outstanding blocking work.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Build the multi-threaded runtime the daemon runs on.
pub fn build() -> std::io::Result<Runtime> {
    Builder::new_multi_thread()
        .enable_all()
        .thread_name("pktcount-worker")
        .build()
}

/// Shut the runtime down without waiting on blocking tasks past the grace period.
pub fn shutdown(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_is_shorter_than_a_default_tick() {
        // default poll interval is 1000ms
        assert!(SHUTDOWN_GRACE < Duration::from_millis(1000));
    }

    #[test]
    fn runs_futures_to_completion() {
        let runtime = build().expect("runtime");
        let value = runtime.block_on(async { tokio::task::spawn_blocking(|| 7).await });
        shutdown(runtime);
        assert_eq!(value.expect("blocking task"), 7);
    }
}
