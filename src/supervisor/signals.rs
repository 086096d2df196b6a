//! Waits for a process termination request.
//!
//! Unix: SIGINT and SIGTERM (sent by Kubernetes on pod termination), with
//! [`tokio::signal::ctrl_c`] as fallback. Elsewhere only Ctrl-C. SIGQUIT keeps
//! its default disposition.

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let received = tokio::select! {
        _ = tokio::signal::ctrl_c() => "ctrl_c",
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };
    tracing::info!(signal = received, "Received termination signal");
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl_c", "Received termination signal");
    Ok(())
}
