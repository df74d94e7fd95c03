//! Listener lifecycle.
//!
//! [`serve`] runs the axum listener until the shutdown future resolves.
//! [`run`] wraps it in a supervisory task: a fault in the listener is logged
//! and reported as an error instead of being resumed.

use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::config::Config;
use crate::error::ServerError;
use crate::proxy::Forwarder;

/// Serves `forwarder` on `listener` until `shutdown` completes.
///
/// In-flight exchanges are allowed to finish once shutdown starts.
pub async fn serve<F>(listener: TcpListener, forwarder: Forwarder, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app: Router = forwarder.into();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Binds the configured address and serves until `shutdown` completes.
pub async fn run<F>(config: Config, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let forwarder = Forwarder::from_config(&config)?;
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.listen_addr.clone(),
            source,
        })?;

    supervise(listener, forwarder, shutdown).await
}

/// Runs [`serve`] in its own task and reports how it ended.
pub async fn supervise<F>(
    listener: TcpListener,
    forwarder: Forwarder,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    match listener.local_addr() {
        Ok(addr) => info!("Starting server at {}, forwarding to {}", addr, forwarder.upstream()),
        Err(_) => info!("Starting server, forwarding to {}", forwarder.upstream()),
    }

    watch(serve(listener, forwarder, shutdown)).await
}

/// Spawns the listener future and maps its outcome, panics included.
async fn watch<T>(listener: T) -> Result<(), ServerError>
where
    T: Future<Output = std::io::Result<()>> + Send + 'static,
{
    match tokio::spawn(listener).await {
        Ok(Ok(())) => {
            info!("Server stopped");
            Ok(())
        }
        Ok(Err(err)) => {
            error!("Listener failed: {}", err);
            Err(ServerError::Serve(err))
        }
        Err(err) => {
            let message = fault_message(err);
            error!("Listener task faulted: {}", message);
            Err(ServerError::Faulted(message))
        }
    }
}

fn fault_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Logs every panic with a captured backtrace.
///
/// Installed once by the binary before the listener starts.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        error!("Recovered panic: {}\nStack:\n{}", info, backtrace);
    }));
}

/// Resolves when the process is asked to stop.
///
/// SIGINT, SIGTERM and SIGQUIT stop the server; SIGHUP is logged and
/// ignored.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
        signal(SignalKind::hangup()),
    );
    let (Ok(mut interrupt), Ok(mut terminate), Ok(mut quit), Ok(mut hangup)) = handlers else {
        error!("Failed to install signal handlers, falling back to Ctrl-C");
        let _ = tokio::signal::ctrl_c().await;
        info!("Stop server");
        return;
    };

    loop {
        tokio::select! {
            _ = interrupt.recv() => {
                info!("Get a signal: SIGINT");
                break;
            }
            _ = terminate.recv() => {
                info!("Get a signal: SIGTERM");
                break;
            }
            _ = quit.recv() => {
                info!("Get a signal: SIGQUIT");
                break;
            }
            _ = hangup.recv() => {
                info!("Get a signal: SIGHUP, ignoring");
            }
        }
    }
    info!("Stop server");
}

#[cfg(not(unix))]
pub async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Stop server");
}
