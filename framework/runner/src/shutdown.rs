use serving_bench_core::prelude::ShutdownHandle;
use tokio::signal;

pub(crate) fn start_shutdown_listener(
    runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<ShutdownHandle> {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl-C, the benchmark cannot be interrupted: {e}");
            return;
        }
        log::warn!("Received shutdown signal, shutting down...");
        listener_handle.shutdown();
    });

    Ok(handle)
}
